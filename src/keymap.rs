use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PipelineError, PipelineResult};

/// Ordered key -> text mapping for one language.
///
/// Keys are unique and keep the position they first appeared at; overwriting
/// a value never moves its key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyMap(IndexMap<String, String>);

impl KeyMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a language resource file (source or existing target).
    ///
    /// A leading BOM is dropped and non-breaking spaces become plain spaces
    /// before parsing, since resource files in the wild carry both.
    pub fn parse_resource(text: &str) -> PipelineResult<Self> {
        let cleaned = clean_resource_text(text);
        parse_flat_object(&cleaned).map_err(PipelineError::MissingSourceData)
    }

    /// Parses one structured block from a pasted response. The text is used
    /// verbatim; the error is a human-readable reason.
    pub fn parse_block(text: &str) -> Result<Self, String> {
        parse_flat_object(text)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Inserts or overwrites; returns the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    /// Removes `key` while keeping the order of the remaining entries.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.0.shift_remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Stable rendering: insertion order, two-space indentation.
    pub fn to_pretty_json(&self) -> String {
        // String keys and string values cannot fail to serialize.
        serde_json::to_string_pretty(&self.0).unwrap_or_else(|_| "{}".to_string())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for KeyMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl IntoIterator for KeyMap {
    type Item = (String, String);
    type IntoIter = indexmap::map::IntoIter<String, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

pub fn clean_resource_text(text: &str) -> String {
    text.strip_prefix('\u{FEFF}')
        .unwrap_or(text)
        .replace('\u{00A0}', " ")
}

fn parse_flat_object(text: &str) -> Result<KeyMap, String> {
    let value: Value = serde_json::from_str(text.trim()).map_err(|e| format!("invalid JSON: {e}"))?;
    let Value::Object(obj) = value else {
        return Err("expected a JSON object of key/text pairs".to_string());
    };
    let mut out = IndexMap::with_capacity(obj.len());
    for (key, value) in obj {
        if key.is_empty() {
            return Err("empty key".to_string());
        }
        match value {
            Value::String(s) => {
                out.insert(key, s);
            }
            other => {
                return Err(format!(
                    "value for key {key:?} is not a string ({})",
                    json_kind(&other)
                ));
            }
        }
    }
    Ok(KeyMap(out))
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Character count of `s` once rendered as a JSON string literal, quotes included.
pub fn json_string_len(s: &str) -> usize {
    let mut n = 2;
    for ch in s.chars() {
        n += match ch {
            '"' | '\\' | '\n' | '\r' | '\t' | '\u{08}' | '\u{0C}' => 2,
            c if (c as u32) < 0x20 => 6,
            _ => 1,
        };
    }
    n
}

/// Characters one entry adds to [`KeyMap::to_pretty_json`], excluding the
/// separator to its neighbour.
pub fn rendered_entry_len(key: &str, value: &str) -> usize {
    // newline + indent + key + ": " + value
    1 + 2 + json_string_len(key) + 2 + json_string_len(value)
}
