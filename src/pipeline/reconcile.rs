use std::collections::BTreeSet;

use crate::error::{MalformedFragment, PipelineError, PipelineResult};
use crate::keymap::KeyMap;

/// Combined result of every block recovered from pasted responses.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconciledMap {
    pub entries: KeyMap,
    pub report: ReconcileReport,
}

/// What happened while reconciling; logged by the caller, never fatal by itself.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub blocks_parsed: usize,
    pub expected_blocks: usize,
    pub skipped: Vec<MalformedFragment>,
    /// Keys that were not part of the request. Filled in by the session.
    pub stray_keys: Vec<String>,
    pub stray_keys_dropped: bool,
}

impl ReconcileReport {
    pub fn missing_blocks(&self) -> usize {
        self.expected_blocks.saturating_sub(self.blocks_parsed)
    }
}

/// A balanced `{...}` region found by [`scan_blocks`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Candidate<'a> {
    pub offset: usize,
    pub text: &'a str,
}

/// Recovers one key map from pasted text that may hold one block, several
/// blocks back to back, or blocks mixed with prose and broken fragments.
///
/// Blocks are merged in the order they appear; a later block overrides an
/// earlier one for the same key.
pub fn reconcile(raw: &str, expected_chunks: usize) -> PipelineResult<ReconciledMap> {
    let mut report = ReconcileReport {
        expected_blocks: expected_chunks,
        ..ReconcileReport::default()
    };

    if let Ok(whole) = KeyMap::parse_block(raw) {
        report.blocks_parsed = 1;
        return Ok(ReconciledMap { entries: whole, report });
    }

    let mut entries = KeyMap::new();
    for outcome in parse_candidates(raw) {
        match outcome {
            Ok(block) => {
                report.blocks_parsed += 1;
                for (key, value) in block {
                    entries.insert(key, value);
                }
            }
            Err(fragment) => report.skipped.push(fragment),
        }
    }

    if report.blocks_parsed == 0 {
        return Err(PipelineError::NoValidPayload {
            skipped: report.skipped.len(),
        });
    }
    Ok(ReconciledMap { entries, report })
}

/// Parses every candidate independently.
pub fn parse_candidates(raw: &str) -> Vec<Result<KeyMap, MalformedFragment>> {
    let (candidates, unterminated) = scan_blocks(raw);
    let mut out: Vec<Result<KeyMap, MalformedFragment>> = candidates
        .into_iter()
        .map(|c| {
            KeyMap::parse_block(c.text).map_err(|reason| MalformedFragment {
                offset: c.offset,
                reason,
            })
        })
        .collect();
    out.extend(unterminated.into_iter().map(|offset| {
        Err(MalformedFragment {
            offset,
            reason: "block is never closed (truncated paste?)".to_string(),
        })
    }));
    out
}

/// Finds every top-level balanced `{...}` region.
///
/// Nesting depth is tracked, and braces inside JSON string literals are
/// ignored once a block is open, so `"Вишня {0}"` never ends a block early.
/// Only a `{` followed by `"` or `}` (after whitespace) can open a block;
/// placeholders such as `{0}` never start one.
///
/// A `{` that is never closed is reported by offset and scanning resumes
/// right after it, so one truncated block does not swallow the blocks pasted
/// after it. Braces that the failed scan already saw opening outside a string
/// and never closing are skipped without a second scan: they cannot close
/// either, and each would otherwise rescan to the end of the input.
pub fn scan_blocks(raw: &str) -> (Vec<Candidate<'_>>, Vec<usize>) {
    let bytes = raw.as_bytes();
    let mut candidates = Vec::new();
    let mut unterminated = Vec::new();
    let mut dead = BTreeSet::new();
    let mut pos = 0;

    while let Some(rel) = raw[pos..].find('{') {
        let start = pos + rel;
        pos = start + 1;
        if dead.contains(&start) || !opens_object(bytes, start) {
            continue;
        }
        match block_end(bytes, start) {
            BlockScan::Closed(end) => {
                candidates.push(Candidate {
                    offset: start,
                    text: &raw[start..end],
                });
                pos = end;
            }
            BlockScan::Unclosed(open) => {
                unterminated.push(start);
                dead.extend(open);
            }
        }
    }
    (candidates, unterminated)
}

fn opens_object(bytes: &[u8], start: usize) -> bool {
    bytes[start + 1..]
        .iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|&b| b == b'"' || b == b'}')
}

enum BlockScan {
    /// Byte index just past the closing `}`.
    Closed(usize),
    /// Offsets of the braces, opened outside strings, still open at the end.
    Unclosed(Vec<usize>),
}

fn block_end(bytes: &[u8], start: usize) -> BlockScan {
    let mut open = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    // Braces and quotes are ASCII, so byte scanning never splits a UTF-8 sequence
    // at a position we slice on.
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => open.push(i),
            b'}' => {
                open.pop();
                if open.is_empty() {
                    return BlockScan::Closed(i + 1);
                }
            }
            _ => {}
        }
    }
    BlockScan::Unclosed(open)
}
