use crate::keymap::KeyMap;

/// Overlays `reconciled` on `original`.
///
/// Keys only in `original` survive untouched, keys in both take the reconciled
/// value in their original position, and new keys are appended in reconciled
/// order.
pub fn merge(original: Option<&KeyMap>, reconciled: &KeyMap) -> KeyMap {
    let mut out = original.cloned().unwrap_or_default();
    for (key, value) in reconciled.iter() {
        out.insert(key, value);
    }
    out
}
