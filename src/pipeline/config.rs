use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};

use crate::config::{
    find_default_config, load_config, AppConfig, CONFIG_ENV_VAR, CONFIG_FILE_NAME,
};
use crate::pack::writer::PackSettings;
use crate::pipeline::chunk::{ChunkLimit, DEFAULT_MAX_CHARS, DEFAULT_MAX_KEYS};
use crate::pipeline::prompts::{default_prompt_files, RequestFormatter, DEFAULT_PROMPTS_DIR};
use crate::pipeline::session::StrayKeyPolicy;

pub const DEFAULT_SOURCE_LANG: &str = "en_us";
pub const DEFAULT_TARGET_LANG: &str = "ru_ru";
pub const DEFAULT_TARGET_NAME: &str = "Russian";

/// Command-line values that take precedence over the config file.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub max_keys: Option<usize>,
    pub max_chars: Option<usize>,
    pub source_lang: Option<String>,
    pub target_lang: Option<String>,
    pub drop_stray_keys: bool,
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub workdir: PathBuf,
    /// Config file actually loaded, if any.
    pub config_path: Option<PathBuf>,

    pub limit: ChunkLimit,
    pub source_lang: String,
    pub target_lang: String,
    pub formatter: RequestFormatter,
    pub stray_keys: StrayKeyPolicy,
    pub pack: PackSettings,
}

impl PipelineConfig {
    pub fn resolve(input: &Path, overrides: ConfigOverrides) -> anyhow::Result<Self> {
        let workdir = input
            .parent()
            .map(|p| p.to_path_buf())
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| PathBuf::from("."));
        let workdir = workdir.canonicalize().unwrap_or(workdir);

        let cfg_file = overrides
            .config_path
            .clone()
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
            .or_else(|| find_default_config(&workdir, CONFIG_FILE_NAME));

        let (file_cfg, config_path) = match cfg_file {
            Some(p) if p.exists() => (load_config(&p)?, Some(p)),
            Some(p) if overrides.config_path.is_some() => {
                return Err(anyhow!("config file not found: {}", p.display()));
            }
            _ => (AppConfig::default(), None),
        };
        Self::from_app_config(workdir, config_path, &file_cfg, &overrides)
    }

    pub fn from_app_config(
        workdir: PathBuf,
        config_path: Option<PathBuf>,
        file_cfg: &AppConfig,
        overrides: &ConfigOverrides,
    ) -> anyhow::Result<Self> {
        let limit = resolve_limit(file_cfg, overrides)?;

        let source_lang = non_empty(overrides.source_lang.clone())
            .or_else(|| non_empty(file_cfg.languages.source.clone()))
            .unwrap_or_else(|| DEFAULT_SOURCE_LANG.to_string());
        let target_lang = non_empty(overrides.target_lang.clone())
            .or_else(|| non_empty(file_cfg.languages.target.clone()))
            .unwrap_or_else(|| DEFAULT_TARGET_LANG.to_string());
        let target_name = non_empty(file_cfg.languages.target_name.clone())
            .unwrap_or_else(|| DEFAULT_TARGET_NAME.to_string());

        let config_dir = config_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| workdir.clone());
        let formatter = match non_empty(file_cfg.request.template.clone()) {
            Some(rel) => {
                let mut p = PathBuf::from(rel);
                if p.is_relative() {
                    p = config_dir.join(&p);
                }
                RequestFormatter::from_template_file(&p, &target_name)?
            }
            None => RequestFormatter::new(target_name),
        };

        let file_policy = StrayKeyPolicy::parse(file_cfg.reconcile.stray_keys.as_deref())?;
        let stray_keys = if overrides.drop_stray_keys {
            StrayKeyPolicy::Drop
        } else {
            file_policy
        };

        let defaults = PackSettings::default();
        let pack = PackSettings {
            pack_format: file_cfg.pack.pack_format.unwrap_or(defaults.pack_format),
            description: non_empty(file_cfg.pack.description.clone())
                .unwrap_or(defaults.description),
            file_name: non_empty(file_cfg.pack.file_name.clone()).unwrap_or(defaults.file_name),
            target_lang: target_lang.clone(),
        };

        Ok(Self {
            workdir,
            config_path,
            limit,
            source_lang,
            target_lang,
            formatter,
            stray_keys,
            pack,
        })
    }
}

fn resolve_limit(file_cfg: &AppConfig, overrides: &ConfigOverrides) -> anyhow::Result<ChunkLimit> {
    let limit = match (overrides.max_keys, overrides.max_chars) {
        (Some(_), Some(_)) => return Err(anyhow!("--max-keys and --max-chars are exclusive")),
        (Some(k), None) => ChunkLimit::Keys(k),
        (None, Some(c)) => ChunkLimit::Chars(c),
        (None, None) => {
            let c = &file_cfg.chunking;
            match c.policy.as_deref().unwrap_or("chars").trim().to_ascii_lowercase().as_str() {
                "keys" => ChunkLimit::Keys(c.max_keys.unwrap_or(DEFAULT_MAX_KEYS)),
                "chars" => ChunkLimit::Chars(c.max_chars.unwrap_or(DEFAULT_MAX_CHARS)),
                other => return Err(anyhow!("unknown chunking policy: {other} (use chars or keys)")),
            }
        }
    };
    match limit {
        ChunkLimit::Keys(0) | ChunkLimit::Chars(0) => Err(anyhow!("chunk limit must be positive")),
        ok => Ok(ok),
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(CONFIG_FILE_NAME);

    let prompts_dir = dir.join(DEFAULT_PROMPTS_DIR);
    std::fs::create_dir_all(&prompts_dir)
        .with_context(|| format!("create prompts dir: {}", prompts_dir.display()))?;

    for (fname, body) in default_prompt_files() {
        let p = prompts_dir.join(fname);
        if p.exists() && !force {
            continue;
        }
        std::fs::write(&p, body).with_context(|| format!("write prompt: {}", p.display()))?;
    }

    if cfg_path.exists() && !force {
        return Ok(cfg_path);
    }
    std::fs::write(&cfg_path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}

const DEFAULT_CONFIG_TOML: &str = r#"[chunking]
# "chars": bound each request by the size of its JSON block.
# "keys":  bound each request by the number of keys.
policy = "chars"
max_chars = 15000
max_keys = 250

[languages]
source = "en_us"
target = "ru_ru"
target_name = "Russian"

[request]
template = "prompts/request.txt"

[reconcile]
# "accept" keeps keys the translator returned but was never asked for; "drop" discards them.
stray_keys = "accept"

[pack]
pack_format = 15
description = "Generated by langmap-translator"
file_name = "Translations_Pack.zip"
"#;
