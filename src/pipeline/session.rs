use anyhow::anyhow;

use crate::error::{PipelineError, PipelineResult};
use crate::keymap::KeyMap;
use crate::pipeline::chunk::{partition, Chunk, ChunkLimit};
use crate::pipeline::delta::compute_delta;
use crate::pipeline::merge::merge;
use crate::pipeline::prompts::RequestFormatter;
use crate::pipeline::reconcile::{reconcile, ReconcileReport};

/// One translation job: a source map, the partial target map it already has
/// (if any), and the name its output is filed under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TranslationUnit {
    identifier: String,
    source: KeyMap,
    original: Option<KeyMap>,
}

impl TranslationUnit {
    pub fn new(identifier: impl Into<String>, source: KeyMap, original: Option<KeyMap>) -> Self {
        Self {
            identifier: identifier.into(),
            source,
            original,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// The identifier, or `IdentifierMissing` when it is blank.
    pub fn require_identifier(&self) -> PipelineResult<&str> {
        let id = self.identifier.trim();
        if id.is_empty() {
            return Err(PipelineError::IdentifierMissing);
        }
        Ok(id)
    }

    pub fn source(&self) -> &KeyMap {
        &self.source
    }

    pub fn original(&self) -> Option<&KeyMap> {
        self.original.as_ref()
    }
}

/// What to do with response keys that were never requested.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StrayKeyPolicy {
    #[default]
    Accept,
    Drop,
}

impl StrayKeyPolicy {
    pub fn parse(s: Option<&str>) -> anyhow::Result<Self> {
        match s.unwrap_or("accept").trim().to_ascii_lowercase().as_str() {
            "accept" => Ok(Self::Accept),
            "drop" | "reject" => Ok(Self::Drop),
            other => Err(anyhow!("unknown stray key policy: {other} (use accept or drop)")),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestPayload {
    pub ordinal: usize,
    pub total: usize,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportOutcome {
    pub final_map: KeyMap,
    pub report: ReconcileReport,
    /// Requested keys the responses did not supply.
    pub still_missing: Vec<String>,
}

/// State carried between exporting requests and importing responses.
///
/// Delta and chunks are derived once from the unit and never change, so the
/// same unit and limit always reproduce the same request boundaries.
#[derive(Clone, Debug)]
pub struct TranslationSession {
    unit: TranslationUnit,
    limit: ChunkLimit,
    delta: KeyMap,
    chunks: Vec<Chunk>,
}

impl TranslationSession {
    pub fn start(unit: TranslationUnit, limit: ChunkLimit) -> Self {
        let delta = compute_delta(unit.source(), unit.original());
        let chunks = partition(&delta, limit);
        Self {
            unit,
            limit,
            delta,
            chunks,
        }
    }

    pub fn unit(&self) -> &TranslationUnit {
        &self.unit
    }

    pub fn limit(&self) -> ChunkLimit {
        self.limit
    }

    pub fn delta(&self) -> &KeyMap {
        &self.delta
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Nothing left to translate.
    pub fn is_complete(&self) -> bool {
        self.delta.is_empty()
    }

    pub fn requests(&self, formatter: &RequestFormatter) -> PipelineResult<Vec<RequestPayload>> {
        self.unit.require_identifier()?;
        Ok(self
            .chunks
            .iter()
            .map(|chunk| RequestPayload {
                ordinal: chunk.ordinal(),
                total: chunk.total(),
                text: formatter.format(chunk, &self.unit),
            })
            .collect())
    }

    /// Reconciles pasted responses and merges them over the existing target map.
    pub fn import_responses(
        &self,
        raw: &str,
        policy: StrayKeyPolicy,
    ) -> PipelineResult<ImportOutcome> {
        let mut reconciled = reconcile(raw, self.chunks.len())?;

        let stray: Vec<String> = reconciled
            .entries
            .keys()
            .filter(|key| !self.delta.contains_key(key))
            .map(str::to_string)
            .collect();
        if policy == StrayKeyPolicy::Drop {
            for key in &stray {
                reconciled.entries.remove(key);
            }
            reconciled.report.stray_keys_dropped = true;
        }
        reconciled.report.stray_keys = stray;

        if reconciled.entries.is_empty() {
            return Err(PipelineError::NoValidPayload {
                skipped: reconciled.report.skipped.len(),
            });
        }

        let (final_map, still_missing) = self.settle(&reconciled.entries);
        Ok(ImportOutcome {
            final_map,
            report: reconciled.report,
            still_missing,
        })
    }

    /// Merges received translations over the existing target map and lists
    /// the requested keys they did not cover.
    pub(crate) fn settle(&self, received: &KeyMap) -> (KeyMap, Vec<String>) {
        let still_missing = self
            .delta
            .keys()
            .filter(|key| !received.contains_key(key))
            .map(str::to_string)
            .collect();
        (merge(self.unit.original(), received), still_missing)
    }

    /// Final map built from existing translations alone, for a unit that
    /// needs no requests.
    pub fn finalize_complete(&self) -> KeyMap {
        merge(self.unit.original(), &KeyMap::new())
    }
}
