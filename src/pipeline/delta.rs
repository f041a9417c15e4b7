use crate::keymap::KeyMap;

/// Entries of `source` whose key is absent from `target`, in source order.
///
/// Presence is by key only: an existing empty translation counts as done.
pub fn compute_delta(source: &KeyMap, target: Option<&KeyMap>) -> KeyMap {
    let Some(target) = target else {
        return source.clone();
    };
    source
        .iter()
        .filter(|(key, _)| !target.contains_key(key))
        .collect()
}
