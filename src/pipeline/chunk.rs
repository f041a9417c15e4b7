use crate::keymap::{rendered_entry_len, KeyMap};

pub const DEFAULT_MAX_CHARS: usize = 15_000;
pub const DEFAULT_MAX_KEYS: usize = 250;

/// Upper bound for one chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChunkLimit {
    /// At most this many keys.
    Keys(usize),
    /// At most this many characters in the pretty-printed block.
    Chars(usize),
}

impl Default for ChunkLimit {
    fn default() -> Self {
        Self::Chars(DEFAULT_MAX_CHARS)
    }
}

/// One bounded slice of a delta. Immutable once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    index: usize,
    total: usize,
    entries: KeyMap,
}

impl Chunk {
    /// 1-based position, as shown to the user.
    pub fn ordinal(&self) -> usize {
        self.index + 1
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn entries(&self) -> &KeyMap {
        &self.entries
    }

    pub fn is_multipart(&self) -> bool {
        self.total > 1
    }
}

/// Running size of the chunk under construction, measured the way the limit is.
#[derive(Default)]
struct Meter {
    keys: usize,
    chars: usize,
}

impl Meter {
    fn with(&self, key: &str, value: &str) -> Self {
        let entry = rendered_entry_len(key, value);
        // "{" + "\n}" around the first entry, "," before each later one.
        let chars = if self.keys == 0 { 3 + entry } else { self.chars + 1 + entry };
        Self { keys: self.keys + 1, chars }
    }

    fn within(&self, limit: ChunkLimit) -> bool {
        match limit {
            ChunkLimit::Keys(max) => self.keys <= max,
            ChunkLimit::Chars(max) => self.chars <= max,
        }
    }
}

/// Splits `delta` into ordered chunks bounded by `limit`.
///
/// Each entry is tentatively appended to the open chunk. When that breaks the
/// limit and the chunk already held something, the entry is taken back, the
/// chunk is closed, and a new chunk starts with the entry. An entry that alone
/// exceeds the limit therefore travels in a chunk of its own, unsplit.
///
/// An empty delta yields no chunks.
pub fn partition(delta: &KeyMap, limit: ChunkLimit) -> Vec<Chunk> {
    let mut groups: Vec<KeyMap> = Vec::new();
    let mut current = KeyMap::new();
    let mut meter = Meter::default();

    for (key, value) in delta.iter() {
        let grown = meter.with(key, value);
        if grown.within(limit) || current.is_empty() {
            current.insert(key, value);
            meter = grown;
            continue;
        }
        groups.push(std::mem::take(&mut current));
        current.insert(key, value);
        meter = Meter::default().with(key, value);
    }
    if !current.is_empty() {
        groups.push(current);
    }

    let total = groups.len();
    groups
        .into_iter()
        .enumerate()
        .map(|(index, entries)| Chunk { index, total, entries })
        .collect()
}
