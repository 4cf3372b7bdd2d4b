//! Message record schema.
//!
//! # Responsibility
//! - Define the `Message` record exchanged with the `/api/messages` endpoint.
//! - Apply the field coercion rules on construction and assignment.
//! - Keep ad-hoc fields that are not part of the declared schema.
//!
//! # Invariants
//! - Construction never fails; missing fields resolve to `None`.
//! - `id` is opaque and only ever assigned from server data or by the caller.
//! - Unknown fields survive a deserialize/serialize round trip unchanged.

use log::debug;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Opaque record identifier.
///
/// The server decides the id shape (number, string, ...), so the value is
/// carried through untouched.
pub type MessageId = Value;

/// Wire name of the identifier field.
pub const ID_FIELD: &str = "id";
/// Wire name of the display name field.
pub const NAME_FIELD: &str = "name";
/// Wire name of the message body field.
pub const BODY_FIELD: &str = "body";

/// One message record.
///
/// The schema is open: fields other than `id`, `name` and `body` land in
/// `extra` and are written back next to the named fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Server-assigned identifier. `None` until the record is persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<MessageId>,
    #[serde(
        default,
        deserialize_with = "deserialize_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_text",
        skip_serializing_if = "Option::is_none"
    )]
    pub body: Option<String>,
    /// Fields attached at runtime without a schema change.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Message {
    /// Creates an empty, unsaved message.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an unsaved message with both text fields set.
    pub fn with_fields(name: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            body: Some(body.into()),
            ..Self::default()
        }
    }

    /// Coerces an arbitrary JSON value into a message.
    ///
    /// Objects are read field by field with the schema coercions applied.
    /// Any other value produces an empty message.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(_) => match serde_json::from_value(value) {
                Ok(message) => message,
                Err(err) => {
                    debug!("event=message_coerce module=model status=fallback error={err}");
                    Self::default()
                }
            },
            other => {
                debug!(
                    "event=message_coerce module=model status=fallback input_kind={}",
                    value_kind(&other)
                );
                Self::default()
            }
        }
    }

    /// Builds the JSON object sent to the server.
    ///
    /// Absent named fields are omitted; extra fields are copied as-is.
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        if let Some(id) = &self.id {
            object.insert(ID_FIELD.to_string(), id.clone());
        }
        if let Some(name) = &self.name {
            object.insert(NAME_FIELD.to_string(), Value::String(name.clone()));
        }
        if let Some(body) = &self.body {
            object.insert(BODY_FIELD.to_string(), Value::String(body.clone()));
        }
        for (key, value) in &self.extra {
            object.insert(key.clone(), value.clone());
        }
        Value::Object(object)
    }

    /// Reads one field by wire name, named or extra.
    pub fn get(&self, field: &str) -> Option<Value> {
        match field {
            ID_FIELD => self.id.clone(),
            NAME_FIELD => self.name.clone().map(Value::String),
            BODY_FIELD => self.body.clone().map(Value::String),
            other => self.extra.get(other).cloned(),
        }
    }

    /// Assigns one field by wire name.
    ///
    /// Text fields go through the same coercion as deserialization; an
    /// assigned `null` id clears the id.
    pub fn set(&mut self, field: &str, value: Value) {
        match field {
            ID_FIELD => self.id = non_null(value),
            NAME_FIELD => self.name = coerce_text(value),
            BODY_FIELD => self.body = coerce_text(value),
            other => {
                self.extra.insert(other.to_string(), value);
            }
        }
    }

    /// Removes one field and returns its previous value.
    pub fn remove(&mut self, field: &str) -> Option<Value> {
        match field {
            ID_FIELD => self.id.take(),
            NAME_FIELD => self.name.take().map(Value::String),
            BODY_FIELD => self.body.take().map(Value::String),
            other => self.extra.remove(other),
        }
    }

    /// Applies every present field of `incoming` onto this record.
    ///
    /// Fields absent from `incoming` are left untouched.
    pub fn merge_from(&mut self, incoming: &Message) {
        if let Some(id) = &incoming.id {
            self.id = Some(id.clone());
        }
        if let Some(name) = &incoming.name {
            self.name = Some(name.clone());
        }
        if let Some(body) = &incoming.body {
            self.body = Some(body.clone());
        }
        for (key, value) in &incoming.extra {
            self.extra.insert(key.clone(), value.clone());
        }
    }

    /// Returns whether the record has not been persisted yet.
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }
}

impl From<Value> for Message {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

/// Text coercion for `name` and `body`.
///
/// Strings pass through, scalars become their textual form, `null` means
/// absent, and nested values keep their compact JSON text.
pub(crate) fn coerce_text(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        nested => Some(nested.to_string()),
    }
}

fn deserialize_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(coerce_text))
}

fn non_null(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        other => Some(other),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::{coerce_text, Message};
    use serde_json::{json, Value};

    #[test]
    fn coerce_text_follows_string_rules() {
        assert_eq!(coerce_text(json!("hi")), Some("hi".to_string()));
        assert_eq!(coerce_text(json!(42)), Some("42".to_string()));
        assert_eq!(coerce_text(json!(1.5)), Some("1.5".to_string()));
        assert_eq!(coerce_text(json!(true)), Some("true".to_string()));
        assert_eq!(coerce_text(Value::Null), None);
        assert_eq!(coerce_text(json!([1, 2])), Some("[1,2]".to_string()));
    }

    #[test]
    fn set_routes_named_fields_through_coercion() {
        let mut message = Message::new();
        message.set("name", json!(7));
        message.set("id", json!("m-1"));
        message.set("mood", json!("calm"));

        assert_eq!(message.name.as_deref(), Some("7"));
        assert_eq!(message.id, Some(json!("m-1")));
        assert_eq!(message.extra.get("mood"), Some(&json!("calm")));

        message.set("id", Value::Null);
        assert!(message.is_new());
    }

    #[test]
    fn non_object_values_coerce_to_empty_message() {
        assert_eq!(Message::from_value(json!("text")), Message::new());
        assert_eq!(Message::from_value(Value::Null), Message::new());
        assert_eq!(Message::from_value(json!([1])), Message::new());
    }

    #[test]
    fn merge_keeps_fields_missing_from_incoming() {
        let mut local = Message::with_fields("ann", "draft");
        local.set("pinned", json!(true));
        let incoming = Message::from_value(json!({ "id": 9, "body": "final" }));

        local.merge_from(&incoming);

        assert_eq!(local.id, Some(json!(9)));
        assert_eq!(local.name.as_deref(), Some("ann"));
        assert_eq!(local.body.as_deref(), Some("final"));
        assert_eq!(local.get("pinned"), Some(json!(true)));
    }

    #[test]
    fn to_value_omits_absent_named_fields() {
        let message = Message::from_value(json!({ "name": "only" }));
        assert_eq!(message.to_value(), json!({ "name": "only" }));
    }
}
