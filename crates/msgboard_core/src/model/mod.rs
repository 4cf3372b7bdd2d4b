//! Message data model.
//!
//! # Responsibility
//! - Define the `Message` record and its open field map.
//! - Define `MessageList`, the observable collection of messages.
//!
//! # Invariants
//! - Model types never fail to construct; coercion replaces validation.

pub mod message;
pub mod message_list;
