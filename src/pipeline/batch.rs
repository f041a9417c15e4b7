use crate::error::{PipelineError, PipelineResult};
use crate::keymap::KeyMap;
use crate::pack::writer::PackEntry;
use crate::pipeline::prompts::RequestFormatter;
use crate::pipeline::reconcile::{reconcile, ReconcileReport};
use crate::pipeline::session::{RequestPayload, StrayKeyPolicy, TranslationSession};

/// Several units prepared together and written into one pack.
///
/// Every unit keeps its own delta and chunk sequence. Answers for all of them
/// are reconciled in one pass and routed back by key: a key goes to each unit
/// whose delta asked for it.
#[derive(Clone, Debug, Default)]
pub struct Batch {
    sessions: Vec<TranslationSession>,
}

/// A request payload together with the unit it belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitRequest {
    pub identifier: String,
    pub payload: RequestPayload,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnitOutcome {
    pub identifier: String,
    pub final_map: KeyMap,
    /// Keys this unit took from the responses.
    pub received: usize,
    pub still_missing: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchOutcome {
    pub report: ReconcileReport,
    pub units: Vec<UnitOutcome>,
    /// Stray keys that no unit's source knows, left out even when accepted.
    pub unrouted: Vec<String>,
}

impl BatchOutcome {
    pub fn pack_entries(&self) -> Vec<PackEntry> {
        self.units
            .iter()
            .map(|u| PackEntry {
                identifier: u.identifier.clone(),
                map: u.final_map.clone(),
            })
            .collect()
    }
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a unit. Two units under one identifier would write the same
    /// language file, so the second is refused.
    pub fn push(&mut self, session: TranslationSession) -> PipelineResult<()> {
        let id = session.unit().require_identifier()?;
        if self
            .sessions
            .iter()
            .any(|s| s.unit().identifier().trim() == id)
        {
            return Err(PipelineError::DuplicateIdentifier(id.to_string()));
        }
        self.sessions.push(session);
        Ok(())
    }

    pub fn sessions(&self) -> &[TranslationSession] {
        &self.sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.sessions.iter().all(TranslationSession::is_complete)
    }

    pub fn total_chunks(&self) -> usize {
        self.sessions.iter().map(|s| s.chunks().len()).sum()
    }

    /// Requests of every unit with work left, unit by unit in load order.
    pub fn requests(&self, formatter: &RequestFormatter) -> PipelineResult<Vec<UnitRequest>> {
        let mut out = Vec::with_capacity(self.total_chunks());
        for session in self.sessions.iter().filter(|s| !s.is_complete()) {
            let identifier = session.unit().require_identifier()?.to_string();
            for payload in session.requests(formatter)? {
                out.push(UnitRequest {
                    identifier: identifier.clone(),
                    payload,
                });
            }
        }
        Ok(out)
    }

    /// Reconciles answers pasted for any of the units and builds every
    /// unit's final map. Units that received nothing keep their existing
    /// translations.
    ///
    /// Accepted stray keys go to the units whose source has them; with a
    /// single unit they always go to that unit.
    pub fn import_responses(
        &self,
        raw: &str,
        policy: StrayKeyPolicy,
    ) -> PipelineResult<BatchOutcome> {
        let mut reconciled = reconcile(raw, self.total_chunks())?;
        let mut received = vec![KeyMap::new(); self.sessions.len()];
        let mut stray = Vec::new();
        let mut unrouted = Vec::new();

        for (key, value) in reconciled.entries.iter() {
            let requested_by: Vec<usize> = self.owners(|s| s.delta().contains_key(key));
            if !requested_by.is_empty() {
                for i in requested_by {
                    received[i].insert(key, value);
                }
                continue;
            }

            stray.push(key.to_string());
            if policy == StrayKeyPolicy::Drop {
                continue;
            }
            let mut known_by = self.owners(|s| s.unit().source().contains_key(key));
            if known_by.is_empty() && self.sessions.len() == 1 {
                known_by.push(0);
            }
            if known_by.is_empty() {
                unrouted.push(key.to_string());
            }
            for i in known_by {
                received[i].insert(key, value);
            }
        }
        reconciled.report.stray_keys = stray;
        reconciled.report.stray_keys_dropped = policy == StrayKeyPolicy::Drop;

        if received.iter().all(KeyMap::is_empty) {
            return Err(PipelineError::NoValidPayload {
                skipped: reconciled.report.skipped.len(),
            });
        }

        let units = self
            .sessions
            .iter()
            .zip(received)
            .map(|(session, got)| {
                let (final_map, still_missing) = session.settle(&got);
                UnitOutcome {
                    identifier: session.unit().identifier().trim().to_string(),
                    final_map,
                    received: got.len(),
                    still_missing,
                }
            })
            .collect();
        Ok(BatchOutcome {
            report: reconciled.report,
            units,
            unrouted,
        })
    }

    /// Existing translations of every unit, for a batch with nothing left to request.
    pub fn finalize_complete(&self) -> Vec<PackEntry> {
        self.sessions
            .iter()
            .map(|s| PackEntry {
                identifier: s.unit().identifier().trim().to_string(),
                map: s.finalize_complete(),
            })
            .collect()
    }

    fn owners(&self, pred: impl Fn(&TranslationSession) -> bool) -> Vec<usize> {
        self.sessions
            .iter()
            .enumerate()
            .filter(|&(_, s)| pred(s))
            .map(|(i, _)| i)
            .collect()
    }
}
