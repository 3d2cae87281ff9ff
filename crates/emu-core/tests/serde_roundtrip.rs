use std::collections::BTreeMap;

use emu_core::hash::stable_hash_string;
use emu_core::provenance::{RunProvenance, SchemaVersion};
use emu_core::serde::{from_json_slice, from_yaml_slice, to_canonical_json_bytes, to_yaml_string};

#[test]
fn provenance_roundtrip_is_canonical() {
    let mut tool_versions = BTreeMap::new();
    tool_versions.insert("emu-core".to_string(), "0.1.0".to_string());
    let provenance = RunProvenance {
        config_hash: "abc".into(),
        seed: 9,
        world_size: 4,
        thread_budget: 2,
        created_at: "2024-01-01T00:00:00Z".into(),
        tool_versions,
    };
    let bytes = to_canonical_json_bytes(&provenance).unwrap();
    let back: RunProvenance = from_json_slice(&bytes).unwrap();
    assert_eq!(back, provenance);
    assert_eq!(
        stable_hash_string(&provenance).unwrap(),
        stable_hash_string(&back).unwrap()
    );

    let yaml = to_yaml_string(&provenance).unwrap();
    let from_yaml: RunProvenance = from_yaml_slice(yaml.as_bytes()).unwrap();
    assert_eq!(from_yaml, provenance);
}

#[test]
fn canonical_json_sorts_keys() {
    let value = serde_json::json!({"b": 1, "a": {"d": 2, "c": 3}});
    let bytes = to_canonical_json_bytes(&value).unwrap();
    assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"a":{"c":3,"d":2},"b":1}"#);
}

#[test]
fn schema_compatibility_follows_major_version() {
    let current = SchemaVersion::new(1, 2, 0);
    assert!(current.is_compatible_with(&SchemaVersion::new(1, 1, 5)));
    assert!(!current.is_compatible_with(&SchemaVersion::new(2, 0, 0)));
    assert!(!current.is_compatible_with(&SchemaVersion::new(1, 3, 0)));
}
