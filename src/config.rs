use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

pub const CONFIG_FILE_NAME: &str = "langmap-translator.toml";
pub const CONFIG_ENV_VAR: &str = "LANGMAP_TRANSLATOR_CONFIG";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub chunking: ChunkingSection,
    #[serde(default)]
    pub languages: LanguagesSection,
    #[serde(default)]
    pub request: RequestSection,
    #[serde(default)]
    pub reconcile: ReconcileSection,
    #[serde(default)]
    pub pack: PackSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ChunkingSection {
    /// "chars" (bound the rendered block size) or "keys" (bound the key count).
    #[serde(default)]
    pub policy: Option<String>,
    #[serde(default)]
    pub max_chars: Option<usize>,
    #[serde(default)]
    pub max_keys: Option<usize>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct LanguagesSection {
    /// Resource file stem of the source language, e.g. `en_us`.
    #[serde(default)]
    pub source: Option<String>,
    /// Resource file stem written to the output pack, e.g. `ru_ru`.
    #[serde(default)]
    pub target: Option<String>,
    /// Language name used in request text.
    #[serde(default)]
    pub target_name: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct RequestSection {
    #[serde(default)]
    pub template: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ReconcileSection {
    /// "accept" or "drop".
    #[serde(default)]
    pub stray_keys: Option<String>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PackSection {
    #[serde(default)]
    pub pack_format: Option<u32>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

pub fn find_default_config(workdir: &Path, filename: &str) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    find_file_upwards(workdir, filename, 8)
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    parse_config(&text).with_context(|| format!("config: {}", path.display()))
}

pub fn parse_config(text: &str) -> anyhow::Result<AppConfig> {
    let cfg: AppConfig = toml::from_str(text).context("parse config toml")?;
    Ok(cfg)
}
