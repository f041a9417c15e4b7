use thiserror::Error;

/// A candidate block inside a pasted response that could not be used.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MalformedFragment {
    /// Byte offset of the fragment in the pasted text.
    pub offset: usize,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Source resource text absent or not a flat string map.
    #[error("source language data missing or unreadable: {0}")]
    MissingSourceData(String),

    #[error("skipped malformed block at byte {}: {}", .0.offset, .0.reason)]
    MalformedFragment(MalformedFragment),

    /// Nothing in the pasted response parsed; no output may be produced.
    #[error("no valid translation block found in the pasted response ({skipped} fragment(s) rejected)")]
    NoValidPayload { skipped: usize },

    #[error("no translation unit identifier: load an input before exporting")]
    IdentifierMissing,

    /// Two inputs resolved to the same identifier and would share one language file.
    #[error("identifier {0} is already used by another input")]
    DuplicateIdentifier(String),

    #[error("nothing to write: every final map is empty")]
    EmptyOutput,
}

pub type PipelineResult<T> = Result<T, PipelineError>;
