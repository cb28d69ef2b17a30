//! Value codecs
//!
//! A codec turns a structured [`Value`] into the text stored in a record's
//! `value` column and back. Codecs must be lossless for every value shape:
//! `decode(encode(v)) == Some(v)`.
//!
//! Empty stored text means "no value" and decodes to `None`, so a record whose
//! value column was never populated does not break resolution.

use crate::error::{Error, Result};
use serde_json::Value;

/// Trait for value codec implementations
///
/// This allows swapping JSON for YAML or other formats.
pub trait ValueCodec: Send + Sync {
    /// Codec name used in error messages and logs (e.g., "json", "yaml")
    fn name(&self) -> &'static str;

    /// Serialize a value to its stored text form
    fn encode(&self, value: &Value) -> Result<String>;

    /// Parse non-empty stored text back into a value
    fn decode_text(&self, text: &str) -> Result<Value>;

    /// Decode stored text, treating empty text as absent
    fn decode(&self, text: &str) -> Result<Option<Value>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        self.decode_text(text).map(Some)
    }
}

// =============================================================================
// JSON Codec
// =============================================================================

/// JSON codec (default)
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ValueCodec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, value: &Value) -> Result<String> {
        serde_json::to_string(value).map_err(|e| Error::Encode {
            codec: self.name(),
            reason: e.to_string(),
        })
    }

    fn decode_text(&self, text: &str) -> Result<Value> {
        serde_json::from_str(text).map_err(|e| Error::Decode {
            codec: self.name(),
            reason: e.to_string(),
        })
    }
}

// =============================================================================
// YAML Codec
// =============================================================================

/// YAML codec (requires `yaml` feature)
///
/// Values are still handled as [`serde_json::Value`] in memory; only the
/// stored text is YAML.
#[cfg(feature = "yaml")]
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlCodec;

#[cfg(feature = "yaml")]
impl YamlCodec {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "yaml")]
impl ValueCodec for YamlCodec {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn encode(&self, value: &Value) -> Result<String> {
        serde_yaml::to_string(value).map_err(|e| Error::Encode {
            codec: self.name(),
            reason: e.to_string(),
        })
    }

    fn decode_text(&self, text: &str) -> Result<Value> {
        serde_yaml::from_str(text).map_err(|e| Error::Decode {
            codec: self.name(),
            reason: e.to_string(),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn samples() -> Vec<Value> {
        vec![
            Value::Null,
            json!(true),
            json!(0),
            json!(-42),
            json!(u64::MAX),
            json!(0.1),
            json!(1.0e-300),
            json!(""),
            json!("true"),
            json!("line\nbreak \"quoted\" ünïcode"),
            json!([]),
            json!({}),
            json!([1, "two", [3.5, null], {"four": false}]),
            json!({"nested": {"list": [1, 2, {"deep": ["x"]}], "flag": true}}),
        ]
    }

    #[test]
    fn test_json_roundtrip() {
        let codec = JsonCodec::new();
        for value in samples() {
            let text = codec.encode(&value).unwrap();
            assert_eq!(codec.decode(&text).unwrap(), Some(value));
        }
    }

    #[test]
    fn test_empty_text_is_absent() {
        let codec = JsonCodec::new();
        assert_eq!(codec.decode("").unwrap(), None);
        assert_eq!(codec.decode("  \n").unwrap(), None);
    }

    #[test]
    fn test_null_is_not_absent() {
        let codec = JsonCodec::new();
        let text = codec.encode(&Value::Null).unwrap();
        assert_eq!(text, "null");
        assert_eq!(codec.decode(&text).unwrap(), Some(Value::Null));
    }

    #[test]
    fn test_corrupt_text_is_decode_error() {
        let codec = JsonCodec::new();
        let err = codec.decode("{not json").unwrap_err();
        assert!(matches!(err, Error::Decode { codec: "json", .. }));
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn test_yaml_roundtrip() {
        let codec = YamlCodec::new();
        for value in samples() {
            let text = codec.encode(&value).unwrap();
            assert_eq!(codec.decode(&text).unwrap(), Some(value), "yaml text: {text}");
        }
    }
}
