//! Payload decoding: JSON text to a generic value tree

use crate::error::DecodeError;

/// Closed variant tree (null, bool, number, string, array, ordered object)
/// used as template input.
pub type DecodedValue = serde_json::Value;

/// Decode a JSON payload into a value tree.
///
/// The whole text must be exactly one JSON value; trailing content is an
/// error. Any root type is accepted, not only objects.
pub fn decode(payload: &str) -> Result<DecodedValue, DecodeError> {
    let value = serde_json::from_str(payload)?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_object() {
        let value = decode(r#"{"name":"MoYan","items":["book","pen"]}"#).unwrap();
        assert_eq!(value, json!({"name": "MoYan", "items": ["book", "pen"]}));
    }

    #[test]
    fn test_decode_scalar_and_array_roots() {
        assert_eq!(decode("42").unwrap(), json!(42));
        assert_eq!(decode(r#""text""#).unwrap(), json!("text"));
        assert_eq!(decode("null").unwrap(), json!(null));
        assert_eq!(decode("[1, 2]").unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_decode_preserves_key_order() {
        let value = decode(r#"{"z": 1, "a": 2, "m": 3}"#).unwrap();
        let keys: Vec<&str> = value
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_decode_truncated_payload_fails() {
        let err = decode(r#"{"a":"#).unwrap_err();
        assert!(err.to_string().contains("EOF"), "got: {}", err);
    }

    #[test]
    fn test_decode_rejects_trailing_content() {
        assert!(decode(r#"{"a": 1} {"b": 2}"#).is_err());
    }

    #[test]
    fn test_decode_empty_payload_fails() {
        assert!(decode("").is_err());
    }
}
