//! Transport seam between the connection and the message endpoint.
//!
//! # Responsibility
//! - Define the raw data operations the connection needs.
//! - Keep HTTP details out of caching and merge logic.
//!
//! # Invariants
//! - Implementations return raw JSON; parsing into `Message` happens in the
//!   connection.
//! - Write operations may return `None` when the server sends an empty body.

use super::error::ConnectionResult;
use crate::algebra::{IdentityKey, ListQuery};
use serde_json::Value;

/// Raw data access for the messages resource.
pub trait MessageTransport {
    fn get_data(&self, id: &IdentityKey) -> ConnectionResult<Value>;
    fn get_list_data(&self, query: &ListQuery) -> ConnectionResult<Value>;
    fn create_data(&self, body: &Value) -> ConnectionResult<Option<Value>>;
    fn update_data(&self, id: &IdentityKey, body: &Value) -> ConnectionResult<Option<Value>>;
    fn destroy_data(&self, id: &IdentityKey) -> ConnectionResult<Option<Value>>;
}

impl<T: MessageTransport + ?Sized> MessageTransport for &T {
    fn get_data(&self, id: &IdentityKey) -> ConnectionResult<Value> {
        (**self).get_data(id)
    }

    fn get_list_data(&self, query: &ListQuery) -> ConnectionResult<Value> {
        (**self).get_list_data(query)
    }

    fn create_data(&self, body: &Value) -> ConnectionResult<Option<Value>> {
        (**self).create_data(body)
    }

    fn update_data(&self, id: &IdentityKey, body: &Value) -> ConnectionResult<Option<Value>> {
        (**self).update_data(id, body)
    }

    fn destroy_data(&self, id: &IdentityKey) -> ConnectionResult<Option<Value>> {
        (**self).destroy_data(id)
    }
}
