//! Envelope decoding for forwarded webhooks.
//!
//! The relay service wraps every webhook it receives in a JSON envelope: the
//! original request body sits under `body`, the query string under `query`,
//! the original `host` under `host`, and every other top-level key is an HTTP
//! header of the original request.
//!
//! Decoding keeps object keys in the order they were received and re-encodes
//! the body without any whitespace, so the forwarded body matches what the
//! webhook sender signed. Numbers are carried through verbatim. Every
//! character outside printable ASCII is written as a `\uXXXX` escape, which
//! is the form the relay service itself produces.

use std::{collections::BTreeMap, io};

use serde::Serialize;
use serde_json::{ser::Formatter, Value};

use crate::error::{CodecError, Result};

/// Top-level envelope keys that are never forwarded as headers.
pub const RESERVED_KEYS: [&str; 3] = ["query", "body", "host"];

/// Headers and canonical body extracted from an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    /// Header name to string value. Never contains a reserved key.
    pub headers: BTreeMap<String, String>,
    /// Compact JSON encoding of the envelope's `body` field.
    pub body: String,
}

/// Decodes a raw envelope into forwarding headers and a canonical body.
///
/// String header values are used verbatim; any other JSON value is coerced
/// to its compact JSON text. The body is re-serialized in its original key
/// order with no extra separators, so decoding the same input always yields
/// byte-identical output.
///
/// # Errors
///
/// Returns `CodecError` if the payload is not JSON, not an object, or has no
/// `body` key.
///
/// # Example
///
/// ```
/// let decoded = hookrelay_core::decode(r#"{"body":{"b":2,"a":1},"x-test":"v"}"#).unwrap();
/// assert_eq!(decoded.body, r#"{"b":2,"a":1}"#);
/// assert_eq!(decoded.headers["x-test"], "v");
/// ```
pub fn decode(raw: &str) -> Result<DecodedMessage> {
    let envelope: Value = serde_json::from_str(raw)?;
    let Value::Object(fields) = envelope else {
        return Err(CodecError::NotAnObject { found: CodecError::type_name(&envelope) });
    };

    let body = fields.get("body").ok_or(CodecError::MissingBody)?;
    let body = to_ascii_json(body)?;

    let headers = fields
        .iter()
        .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), header_value(value)))
        .collect();

    Ok(DecodedMessage { headers, body })
}

/// Compact JSON with non-ASCII escaped.
fn to_ascii_json(value: &Value) -> serde_json::Result<String> {
    let mut buffer = Vec::with_capacity(128);
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, AsciiFormatter);
    value.serialize(&mut serializer)?;
    // Only ASCII bytes are ever written.
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

/// Compact formatter that escapes anything outside `' '..='~'`.
///
/// Control characters are already escaped by serde_json before they reach
/// `write_string_fragment`.
struct AsciiFormatter;

impl Formatter for AsciiFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (index, ch) in fragment.char_indices() {
            if (' '..='~').contains(&ch) {
                continue;
            }
            writer.write_all(&fragment.as_bytes()[start..index])?;
            let mut units = [0_u16; 2];
            for unit in ch.encode_utf16(&mut units) {
                write!(writer, "\\u{unit:04x}")?;
            }
            start = index + ch.len_utf8();
        }
        writer.write_all(&fragment.as_bytes()[start..])
    }
}

fn header_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
