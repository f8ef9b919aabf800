//! Error types for envelope decoding.

use thiserror::Error;

/// Result type alias using `CodecError`.
pub type Result<T> = std::result::Result<T, CodecError>;

/// Failure to decode a forwarded webhook envelope.
///
/// A decode failure only ever affects the event it came from. Callers log
/// it and drop that event.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Payload is not valid JSON.
    #[error("malformed payload: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// Payload is valid JSON but not an object.
    #[error("malformed payload: expected a JSON object, found {found}")]
    NotAnObject {
        /// JSON type that was found instead
        found: &'static str,
    },

    /// Envelope has no `body` key.
    #[error("malformed payload: missing `body` key")]
    MissingBody,
}

impl CodecError {
    /// Returns the JSON type name of a value for error reporting.
    pub(crate) fn type_name(value: &serde_json::Value) -> &'static str {
        match value {
            serde_json::Value::Null => "null",
            serde_json::Value::Bool(_) => "boolean",
            serde_json::Value::Number(_) => "number",
            serde_json::Value::String(_) => "string",
            serde_json::Value::Array(_) => "array",
            serde_json::Value::Object(_) => "object",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_format() {
        assert_eq!(CodecError::MissingBody.to_string(), "malformed payload: missing `body` key");
        assert_eq!(
            CodecError::NotAnObject { found: "array" }.to_string(),
            "malformed payload: expected a JSON object, found array"
        );
    }

    #[test]
    fn invalid_json_wraps_parser_error() {
        let parse_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = CodecError::from(parse_error);

        assert!(matches!(error, CodecError::InvalidJson(_)));
        assert!(error.to_string().starts_with("malformed payload: "));
    }
}
