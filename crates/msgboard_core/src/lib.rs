//! Client-side data model for the message board service.
//! Defines the `Message` record, its list type, the identity algebra and the
//! REST connection that fetches, caches and persists messages.

pub mod algebra;
pub mod config;
pub mod connection;
pub mod logging;
pub mod model;

pub use algebra::{IdentityAlgebra, IdentityKey, ListQuery, SetRelation};
pub use config::{ConfigError, ServiceConfig};
pub use connection::error::{ConnectionError, ConnectionResult};
pub use connection::http::HttpTransport;
pub use connection::transport::MessageTransport;
pub use connection::{MessageClient, MessageConnection, CONNECTION_NAME};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::message::{Message, MessageId};
pub use model::message_list::{ListChange, ListenerId, MessageList, SharedMessageList};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
