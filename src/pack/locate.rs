use std::path::{Path, PathBuf};

use anyhow::Context;
use regex::Regex;

use crate::error::PipelineError;
use crate::keymap::KeyMap;
use crate::pack::archive::{ArchiveSource, FlatFileSource, ResourceSource};
use crate::pipeline::batch::Batch;
use crate::pipeline::chunk::ChunkLimit;
use crate::pipeline::session::{TranslationSession, TranslationUnit};

/// Raw texts of the language files for one unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocatedResources {
    pub identifier: String,
    pub source_entry: String,
    pub source_text: String,
    pub target_entry: Option<String>,
    pub target_text: Option<String>,
}

impl LocatedResources {
    /// Parses both texts. A broken source is `MissingSourceData`; a broken
    /// existing target is an error too, since packaging over it would lose it.
    pub fn into_unit(self) -> anyhow::Result<TranslationUnit> {
        let source = KeyMap::parse_resource(&self.source_text)
            .with_context(|| format!("source language file: {}", self.source_entry))?;
        let original = match (self.target_text.as_deref(), self.target_entry.as_deref()) {
            (Some(text), Some(entry)) => Some(
                KeyMap::parse_resource(text)
                    .map_err(|e| anyhow::anyhow!("existing translation {entry} is unreadable: {e}"))?,
            ),
            _ => None,
        };
        Ok(TranslationUnit::new(self.identifier, source, original))
    }
}

/// Pattern for `assets/<id>/lang/<lang>.json`, case-insensitive, anywhere in the archive.
fn lang_file_regex(lang: &str) -> anyhow::Result<Regex> {
    let pat = format!(r"(?i)(?:^|/)assets/([^/]+)/lang/{}\.json$", regex::escape(lang));
    Regex::new(&pat).with_context(|| format!("language file pattern for {lang}"))
}

/// Finds the first source language file in archive order and its sibling
/// target file, if one exists.
pub fn locate_language_files<S: ResourceSource>(
    src: &mut S,
    source_lang: &str,
    target_lang: &str,
) -> anyhow::Result<LocatedResources> {
    let source_re = lang_file_regex(source_lang)?;
    let found = src.entry_names().into_iter().find_map(|name| {
        source_re
            .captures(name)
            .and_then(|caps| caps.get(1))
            .map(|id| (name.to_string(), id.as_str().to_string()))
    });
    let Some((source_entry, identifier)) = found else {
        return Err(PipelineError::MissingSourceData(format!(
            "no assets/<id>/lang/{source_lang}.json entry found"
        ))
        .into());
    };

    let dir_len = source_entry.rfind('/').map_or(0, |i| i + 1);
    let wanted = format!("{}{target_lang}.json", &source_entry[..dir_len]);
    let target_entry = src
        .entry_names()
        .into_iter()
        .find(|name| name.eq_ignore_ascii_case(&wanted))
        .map(str::to_string);

    let source_text = src.read_text(&source_entry)?;
    let target_text = match target_entry.as_deref() {
        Some(entry) => Some(src.read_text(entry)?),
        None => None,
    };
    Ok(LocatedResources {
        identifier,
        source_entry,
        source_text,
        target_entry,
        target_text,
    })
}

/// Loads a unit from an input path: an archive is searched for language
/// files; any other file is taken as the source map itself, named by its stem,
/// with `existing` as the optional partial translation.
pub fn load_unit(
    input: &Path,
    existing: Option<&Path>,
    source_lang: &str,
    target_lang: &str,
) -> anyhow::Result<TranslationUnit> {
    if is_archive(input) {
        let mut archive = ArchiveSource::open(input)?;
        let located = locate_language_files(&mut archive, source_lang, target_lang)
            .with_context(|| format!("archive: {}", input.display()))?;
        let mut unit = located.into_unit()?;
        if let Some(path) = existing {
            unit = TranslationUnit::new(
                unit.identifier(),
                unit.source().clone(),
                Some(read_flat_map(path)?),
            );
        }
        return Ok(unit);
    }

    let mut flat = FlatFileSource::new(input)?;
    let name = flat
        .entry_names()
        .first()
        .map(|s| (*s).to_string())
        .unwrap_or_default();
    let text = flat.read_text(&name)?;
    let source = KeyMap::parse_resource(&text)
        .with_context(|| format!("source language file: {}", input.display()))?;
    let identifier = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let original = existing.map(read_flat_map).transpose()?;
    Ok(TranslationUnit::new(identifier, source, original))
}

/// An input that could not be added to the batch.
#[derive(Debug)]
pub struct LoadFailure {
    pub input: PathBuf,
    pub error: anyhow::Error,
}

/// Loaded units plus the inputs that failed; one bad input never stops the others.
#[derive(Debug, Default)]
pub struct BatchLoad {
    pub batch: Batch,
    pub failures: Vec<LoadFailure>,
}

/// Loads every input into one batch. `existing` belongs to a single input,
/// so it is refused when several are given.
pub fn load_batch(
    inputs: &[PathBuf],
    existing: Option<&Path>,
    source_lang: &str,
    target_lang: &str,
    limit: ChunkLimit,
) -> anyhow::Result<BatchLoad> {
    if existing.is_some() && inputs.len() > 1 {
        anyhow::bail!("--existing can only be used with a single input");
    }
    let mut out = BatchLoad::default();
    for input in inputs {
        let added = load_unit(input, existing, source_lang, target_lang).and_then(|unit| {
            out.batch
                .push(TranslationSession::start(unit, limit))
                .map_err(anyhow::Error::from)
        });
        if let Err(error) = added {
            out.failures.push(LoadFailure {
                input: input.clone(),
                error,
            });
        }
    }
    Ok(out)
}

fn read_flat_map(path: &Path) -> anyhow::Result<KeyMap> {
    let mut flat = FlatFileSource::new(path)?;
    let name = flat.entry_names().first().map(|s| (*s).to_string()).unwrap_or_default();
    let text = flat.read_text(&name)?;
    KeyMap::parse_resource(&text)
        .map_err(|e| anyhow::anyhow!("existing translation {} is unreadable: {e}", path.display()))
}

pub fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("jar") || e.eq_ignore_ascii_case("zip"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    struct MemorySource(Vec<(String, String)>);

    impl ResourceSource for MemorySource {
        fn entry_names(&self) -> Vec<&str> {
            self.0.iter().map(|(n, _)| n.as_str()).collect()
        }

        fn read_text(&mut self, name: &str) -> anyhow::Result<String> {
            let by_name: HashMap<&str, &str> =
                self.0.iter().map(|(n, t)| (n.as_str(), t.as_str())).collect();
            by_name
                .get(name)
                .map(|t| (*t).to_string())
                .ok_or_else(|| anyhow::anyhow!("missing {name}"))
        }
    }

    fn source(entries: &[(&str, &str)]) -> MemorySource {
        MemorySource(
            entries
                .iter()
                .map(|(n, t)| ((*n).to_string(), (*t).to_string()))
                .collect(),
        )
    }

    #[test]
    fn finds_source_and_sibling_target() {
        let mut src = source(&[
            ("META-INF/MANIFEST.MF", ""),
            ("assets/coolmod/lang/EN_US.json", r#"{"a":"Apple"}"#),
            ("assets/coolmod/lang/ru_RU.json", r#"{"a":"Яблоко"}"#),
            ("assets/other/lang/ru_ru.json", r#"{"x":"y"}"#),
        ]);
        let found = locate_language_files(&mut src, "en_us", "ru_ru").expect("locate");
        assert_eq!(found.identifier, "coolmod");
        assert_eq!(found.target_entry.as_deref(), Some("assets/coolmod/lang/ru_RU.json"));

        let unit = found.into_unit().expect("unit");
        assert_eq!(unit.source().get("a"), Some("Apple"));
        assert_eq!(unit.original().and_then(|m| m.get("a")), Some("Яблоко"));
    }

    #[test]
    fn missing_target_is_none() {
        let mut src = source(&[("assets/m/lang/en_us.json", r#"{"a":"Apple"}"#)]);
        let found = locate_language_files(&mut src, "en_us", "de_de").expect("locate");
        assert!(found.target_entry.is_none());
        assert!(found.into_unit().expect("unit").original().is_none());
    }

    #[test]
    fn archive_without_source_is_missing_source_data() {
        let mut src = source(&[("assets/m/lang/de_de.json", "{}"), ("data/en_us.json", "{}")]);
        let err = locate_language_files(&mut src, "en_us", "ru_ru").expect_err("none");
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::MissingSourceData(_))
        ));
    }

    #[test]
    fn unparsable_source_is_missing_source_data() {
        let mut src = source(&[("assets/m/lang/en_us.json", "{ broken")]);
        let err = locate_language_files(&mut src, "en_us", "ru_ru")
            .expect("locate")
            .into_unit()
            .expect_err("broken");
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::MissingSourceData(_))
        ));
    }

    #[test]
    fn flat_json_uses_file_stem() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let input = tmp.path().join("mymod.json");
        let existing = tmp.path().join("mymod.ru.json");
        std::fs::write(&input, r#"{"a":"Apple","b":"Banana"}"#).expect("write");
        std::fs::write(&existing, r#"{"a":"Яблоко"}"#).expect("write");

        let unit = load_unit(&input, Some(&existing), "en_us", "ru_ru").expect("load");
        assert_eq!(unit.identifier(), "mymod");
        assert_eq!(unit.source().len(), 2);
        assert_eq!(unit.original().map(KeyMap::len), Some(1));
    }

    #[test]
    fn batch_load_keeps_going_past_bad_inputs() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let good = tmp.path().join("alpha.json");
        let broken = tmp.path().join("beta.json");
        let twin = tmp.path().join("sub").join("alpha.json");
        std::fs::create_dir_all(tmp.path().join("sub")).expect("mkdir");
        std::fs::write(&good, r#"{"a":"Apple"}"#).expect("write");
        std::fs::write(&broken, "not json").expect("write");
        std::fs::write(&twin, r#"{"b":"Banana"}"#).expect("write");
        let missing = tmp.path().join("gamma.json");

        let inputs = vec![good, broken.clone(), missing.clone(), twin.clone()];
        let loaded =
            load_batch(&inputs, None, "en_us", "ru_ru", ChunkLimit::default()).expect("load");
        assert_eq!(loaded.batch.len(), 1);
        assert_eq!(loaded.batch.sessions()[0].unit().identifier(), "alpha");

        let failed: Vec<&Path> = loaded.failures.iter().map(|f| f.input.as_path()).collect();
        assert_eq!(failed, vec![broken.as_path(), missing.as_path(), twin.as_path()]);
        assert!(matches!(
            loaded.failures[0].error.downcast_ref::<PipelineError>(),
            Some(PipelineError::MissingSourceData(_))
        ));
        assert!(matches!(
            loaded.failures[2].error.downcast_ref::<PipelineError>(),
            Some(PipelineError::DuplicateIdentifier(_))
        ));
    }

    #[test]
    fn existing_map_needs_a_single_input() {
        let inputs = vec![PathBuf::from("a.json"), PathBuf::from("b.json")];
        let err = load_batch(
            &inputs,
            Some(Path::new("a.ru.json")),
            "en_us",
            "ru_ru",
            ChunkLimit::default(),
        )
        .expect_err("ambiguous");
        assert!(err.to_string().contains("single input"));
    }

    #[test]
    fn archive_extensions() {
        assert!(is_archive(Path::new("mods/thing.JAR")));
        assert!(is_archive(Path::new("pack.zip")));
        assert!(!is_archive(Path::new("en_us.json")));
    }
}
