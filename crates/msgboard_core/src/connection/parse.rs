//! Response body parsing into the message schema.
//!
//! # Invariants
//! - Instance bodies must be JSON objects.
//! - List bodies are either a JSON array or an object with an array `data`.

use super::error::{ConnectionError, ConnectionResult};
use crate::model::message::Message;
use serde_json::Value;

/// Envelope member holding list items.
pub const LIST_DATA_FIELD: &str = "data";

/// Parses one instance body.
pub fn parse_instance(body: Value) -> ConnectionResult<Message> {
    match body {
        Value::Object(_) => Ok(Message::from_value(body)),
        other => Err(ConnectionError::InvalidResponse(format!(
            "expected a message object, got {}",
            short_json(&other)
        ))),
    }
}

/// Parses an optional instance body from a write response.
///
/// An empty body means the server did not echo the record back.
pub fn parse_optional_instance(body: Option<Value>) -> ConnectionResult<Option<Message>> {
    body.map(parse_instance).transpose()
}

/// Parses a list body into raw items.
pub fn parse_list(body: Value) -> ConnectionResult<Vec<Value>> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut envelope) => match envelope.remove(LIST_DATA_FIELD) {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(ConnectionError::InvalidResponse(
                "expected an array or an object with an array `data` member".to_string(),
            )),
        },
        other => Err(ConnectionError::InvalidResponse(format!(
            "expected a message list, got {}",
            short_json(&other)
        ))),
    }
}

fn short_json(value: &Value) -> String {
    const MAX_CHARS: usize = 80;
    let text = value.to_string();
    if text.chars().count() <= MAX_CHARS {
        return text;
    }
    let mut truncated: String = text.chars().take(MAX_CHARS).collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::{parse_instance, parse_list, parse_optional_instance};
    use crate::connection::error::ConnectionError;
    use serde_json::json;

    #[test]
    fn parse_list_accepts_bare_array_and_data_envelope() {
        let bare = parse_list(json!([{ "id": 1 }])).unwrap();
        let wrapped = parse_list(json!({ "data": [{ "id": 1 }], "count": 1 })).unwrap();
        assert_eq!(bare, wrapped);
    }

    #[test]
    fn parse_list_rejects_other_shapes() {
        assert!(matches!(
            parse_list(json!({ "items": [] })),
            Err(ConnectionError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_list(json!("nope")),
            Err(ConnectionError::InvalidResponse(_))
        ));
    }

    #[test]
    fn parse_instance_requires_object() {
        let message = parse_instance(json!({ "id": 2, "name": "n" })).unwrap();
        assert_eq!(message.name.as_deref(), Some("n"));

        let err = parse_instance(json!([1, 2, 3])).unwrap_err();
        assert!(err.to_string().contains("[1,2,3]"));
    }

    #[test]
    fn empty_write_body_parses_to_none() {
        assert_eq!(parse_optional_instance(None).unwrap(), None);
    }
}
