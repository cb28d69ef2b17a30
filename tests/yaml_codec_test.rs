//! YAML Codec Integration Tests

mod common;

use common::memory_store;
use rsettings::{SettingsConfig, ValueCodec, YamlCodec};
use serde_json::json;

fn yaml_config() -> SettingsConfig {
    SettingsConfig::builder("yaml_settings")
        .codec(YamlCodec::new())
        .default_serialized("servers", "- alpha\n- beta\n")
        .default_serialized("limits", "cpu: 2\nmemory: 512\n")
        .build()
        .unwrap()
}

#[test]
fn test_stored_text_is_yaml() {
    let store = memory_store(yaml_config());
    store.set("motd", json!({"text": "hello", "enabled": true})).unwrap();

    let stored = store.record("motd").unwrap().unwrap().value.unwrap();
    assert!(serde_json::from_str::<serde_json::Value>(&stored).is_err(), "{stored}");
    assert_eq!(
        YamlCodec::new().decode(&stored).unwrap(),
        Some(json!({"text": "hello", "enabled": true}))
    );
}

#[test]
fn test_serialized_defaults_use_the_table_codec() {
    let store = memory_store(yaml_config());

    assert_eq!(store.get("servers").unwrap(), Some(json!(["alpha", "beta"])));
    assert_eq!(store.get("limits").unwrap(), Some(json!({"cpu": 2, "memory": 512})));
}

#[test]
fn test_yaml_round_trips_through_the_store() {
    let store = memory_store(yaml_config());

    for value in [
        json!(null),
        json!("yes"),
        json!("123"),
        json!(-3.25),
        json!([]),
        json!({"a": [1, {"b": null}]}),
    ] {
        store.set("value", value.clone()).unwrap();
        assert_eq!(store.get("value").unwrap(), Some(value));
    }
}

#[test]
fn test_bad_serialized_default_fails_build() {
    let err = SettingsConfig::builder("yaml_settings")
        .codec(YamlCodec::new())
        .default_serialized("broken", "key: [unclosed")
        .build()
        .unwrap_err();

    assert!(err.to_string().contains("`broken`"));
}
