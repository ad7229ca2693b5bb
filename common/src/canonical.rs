//! Deterministic byte/string encoding used to feed SHA-256 for both
//! transaction and block hashing/signing pre-images.
//!
//! Top-level struct fields are concatenated in a fixed, explicitly chosen
//! order (never alphabetical); free-form mappings nested inside a
//! pre-image (`additionalData`, contract `storage`) are rendered through
//! `serde_json`, whose `Map` is a `BTreeMap` as long as the
//! `preserve_order` cargo feature stays off — giving us lexicographic key
//! order "for free" instead of a hand-rolled sort.

use serde::Serialize;

/// Render any serializable value as canonical JSON: nested object keys in
/// lexicographic order, no extraneous whitespace.
pub fn canonical_json<T: Serialize>(value: &T) -> String {
    let as_value = serde_json::to_value(value).expect("canonical types never fail to serialize");
    serde_json::to_string(&as_value).expect("serde_json::Value always serializes")
}

/// Join canonical field fragments with a separator that cannot appear
/// inside any individual fragment (hex hashes/addresses, decimal digits,
/// and JSON are all separator-free by construction).
pub fn join_fields(fields: &[&str]) -> String {
    fields.join("|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn canonical_json_sorts_keys() {
        let mut map = BTreeMap::new();
        map.insert("zeta", "1");
        map.insert("alpha", "2");
        // BTreeMap already iterates sorted, but the point under test is
        // that serde_json's own Map preserves that order through a
        // round trip via Value rather than reverting to insertion order.
        let value = serde_json::json!({"zeta": "1", "alpha": "2"});
        assert_eq!(canonical_json(&value), canonical_json(&map));
    }

    #[test]
    fn join_fields_uses_pipe_separator() {
        assert_eq!(join_fields(&["a", "b", "c"]), "a|b|c");
    }
}
