use std::fs::File;
use std::io::{Seek, Write};
use std::path::Path;

use anyhow::Context;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::PipelineError;
use crate::keymap::KeyMap;

pub const DEFAULT_PACK_FORMAT: u32 = 15;
pub const DEFAULT_PACK_DESCRIPTION: &str = "Generated by langmap-translator";
pub const DEFAULT_PACK_FILE_NAME: &str = "Translations_Pack.zip";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackSettings {
    pub pack_format: u32,
    pub description: String,
    pub file_name: String,
    /// Language file stem written for every unit, e.g. `ru_ru`.
    pub target_lang: String,
}

impl Default for PackSettings {
    fn default() -> Self {
        Self {
            pack_format: DEFAULT_PACK_FORMAT,
            description: DEFAULT_PACK_DESCRIPTION.to_string(),
            file_name: DEFAULT_PACK_FILE_NAME.to_string(),
            target_lang: crate::pipeline::config::DEFAULT_TARGET_LANG.to_string(),
        }
    }
}

/// One finished translation headed for the pack.
#[derive(Clone, Debug)]
pub struct PackEntry {
    pub identifier: String,
    pub map: KeyMap,
}

pub fn lang_entry_path(identifier: &str, target_lang: &str) -> String {
    format!("assets/{identifier}/lang/{target_lang}.json")
}

/// Checks every entry before anything is written: blank identifiers are
/// refused, empty maps are left out, and an all-empty set is refused.
fn writable_entries(entries: &[PackEntry]) -> Result<Vec<&PackEntry>, PipelineError> {
    if entries.iter().any(|e| e.identifier.trim().is_empty()) {
        return Err(PipelineError::IdentifierMissing);
    }
    let kept: Vec<&PackEntry> = entries.iter().filter(|e| !e.map.is_empty()).collect();
    if kept.is_empty() {
        return Err(PipelineError::EmptyOutput);
    }
    Ok(kept)
}

/// Writes `pack.mcmeta` plus one language file per non-empty entry.
/// Returns the number of language files written.
pub fn write_resource_pack<W: Write + Seek>(
    out: W,
    settings: &PackSettings,
    entries: &[PackEntry],
) -> anyhow::Result<usize> {
    let kept = writable_entries(entries)?;

    let mut zout = ZipWriter::new(out);
    let opts = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mcmeta = serde_json::json!({
        "pack": {
            "pack_format": settings.pack_format,
            "description": settings.description,
        }
    });
    let mcmeta = serde_json::to_string_pretty(&mcmeta).context("serialize pack.mcmeta")?;
    zout.start_file("pack.mcmeta", opts).context("start pack.mcmeta")?;
    zout.write_all(mcmeta.as_bytes()).context("write pack.mcmeta")?;

    for entry in &kept {
        let name = lang_entry_path(entry.identifier.trim(), &settings.target_lang);
        zout.start_file(name.as_str(), opts)
            .with_context(|| format!("start zip file: {name}"))?;
        zout.write_all(entry.map.to_pretty_json().as_bytes())
            .with_context(|| format!("write zip file: {name}"))?;
    }
    zout.finish().context("finish zip")?;
    Ok(kept.len())
}

/// Like [`write_resource_pack`], but creates the file only once the entries
/// have been validated, so a refused pack leaves nothing behind.
pub fn write_resource_pack_file(
    path: &Path,
    settings: &PackSettings,
    entries: &[PackEntry],
) -> anyhow::Result<usize> {
    writable_entries(entries)?;
    let f = File::create(path).with_context(|| format!("create pack: {}", path.display()))?;
    write_resource_pack(f, settings, entries)
}
