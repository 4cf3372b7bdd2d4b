//! Ordered, observable collection of messages.
//!
//! # Responsibility
//! - Hold messages in insertion order.
//! - Coerce every inserted item into a `Message`.
//! - Notify registered listeners after each mutation.
//! - Share one live list between views and the connection cache.
//!
//! # Invariants
//! - No deduplication or reordering happens here.
//! - Listeners observe the list only after the mutation is applied.
//! - Listeners run while the list is locked and must not lock it again.

use crate::model::message::Message;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt::{Debug, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Change notification delivered to list listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum ListChange {
    /// `count` items were inserted starting at `index`.
    Added { index: usize, count: usize },
    /// The item at `index` was removed.
    Removed { index: usize, message: Message },
    /// The item at `index` was replaced.
    Updated { index: usize },
    /// The whole content was replaced or cleared.
    Reset { len: usize },
}

/// Handle returned by `MessageList::on_change`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn Fn(&ListChange) + Send + Sync>;

/// Ordered list of `Message` records.
#[derive(Default)]
pub struct MessageList {
    items: Vec<Message>,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener: u64,
}

impl MessageList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a list from raw JSON values, coercing each entry.
    pub fn from_values(values: impl IntoIterator<Item = Value>) -> Self {
        values.into_iter().map(Message::from_value).collect()
    }

    /// Registers a change listener.
    pub fn on_change(
        &mut self,
        listener: impl Fn(&ListChange) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Unregisters a listener. Returns `false` when the id is unknown.
    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Message> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Message] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<Message> {
        self.items
    }

    /// Appends one item.
    pub fn push(&mut self, item: impl Into<Message>) {
        let index = self.items.len();
        self.items.push(item.into());
        self.emit(&ListChange::Added { index, count: 1 });
    }

    /// Appends one raw JSON value after coercing it.
    pub fn push_value(&mut self, value: Value) {
        self.push(Message::from_value(value));
    }

    /// Inserts one item at `index`, clamped to the list length.
    pub fn insert(&mut self, index: usize, item: impl Into<Message>) {
        let index = index.min(self.items.len());
        self.items.insert(index, item.into());
        self.emit(&ListChange::Added { index, count: 1 });
    }

    /// Removes and returns the item at `index`.
    pub fn remove(&mut self, index: usize) -> Option<Message> {
        if index >= self.items.len() {
            return None;
        }
        let message = self.items.remove(index);
        self.emit(&ListChange::Removed {
            index,
            message: message.clone(),
        });
        Some(message)
    }

    /// Replaces the item at `index`, returning the previous one.
    pub fn set(&mut self, index: usize, item: impl Into<Message>) -> Option<Message> {
        let slot = self.items.get_mut(index)?;
        let previous = std::mem::replace(slot, item.into());
        self.emit(&ListChange::Updated { index });
        Some(previous)
    }

    /// Replaces the whole content.
    pub fn replace_all(&mut self, items: impl IntoIterator<Item = Message>) {
        self.items = items.into_iter().collect();
        let len = self.items.len();
        self.emit(&ListChange::Reset { len });
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.emit(&ListChange::Reset { len: 0 });
    }

    fn emit(&self, change: &ListChange) {
        for (_, listener) in &self.listeners {
            listener(change);
        }
    }
}

impl Clone for MessageList {
    /// Copies items only; listeners stay with the original list.
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            listeners: Vec::new(),
            next_listener: 0,
        }
    }
}

impl PartialEq for MessageList {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl Debug for MessageList {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageList")
            .field("items", &self.items)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl FromIterator<Message> for MessageList {
    fn from_iter<I: IntoIterator<Item = Message>>(iter: I) -> Self {
        Self {
            items: iter.into_iter().collect(),
            ..Self::default()
        }
    }
}

impl From<Vec<Message>> for MessageList {
    fn from(items: Vec<Message>) -> Self {
        items.into_iter().collect()
    }
}

impl IntoIterator for MessageList {
    type Item = Message;
    type IntoIter = std::vec::IntoIter<Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a> IntoIterator for &'a MessageList {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl Serialize for MessageList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.items.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for MessageList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let values = Vec::<Value>::deserialize(deserializer)?;
        Ok(Self::from_values(values))
    }
}

/// Live message list shared between views and the connection cache.
///
/// Clones point at the same list, so changes applied by the connection show
/// up in every holder and reach every registered listener.
#[derive(Clone, Default)]
pub struct SharedMessageList(Arc<Mutex<MessageList>>);

impl SharedMessageList {
    pub fn new(list: MessageList) -> Self {
        Self(Arc::new(Mutex::new(list)))
    }

    /// Locks the list for reading or mutation.
    pub fn lock(&self) -> MutexGuard<'_, MessageList> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Detached copy of the current items.
    pub fn snapshot(&self) -> MessageList {
        self.lock().clone()
    }

    pub fn on_change(&self, listener: impl Fn(&ListChange) + Send + Sync + 'static) -> ListenerId {
        self.lock().on_change(listener)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.lock().off(id)
    }

    /// Returns whether both handles point at the same list.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<MessageList> for SharedMessageList {
    fn from(list: MessageList) -> Self {
        Self::new(list)
    }
}

impl Debug for SharedMessageList {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SharedMessageList").field(&*self.lock()).finish()
    }
}

impl Serialize for SharedMessageList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.lock().serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::{ListChange, MessageList, SharedMessageList};
    use crate::model::message::Message;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[test]
    fn listeners_see_each_mutation_until_removed() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let mut list = MessageList::new();
        let id = list.on_change(move |change| sink.lock().unwrap().push(change.clone()));

        list.push(Message::with_fields("a", "1"));
        list.insert(0, Message::with_fields("b", "2"));
        list.set(1, Message::with_fields("c", "3"));
        let removed = list.remove(0).unwrap();
        assert!(list.off(id));
        list.clear();

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                ListChange::Added { index: 0, count: 1 },
                ListChange::Added { index: 0, count: 1 },
                ListChange::Updated { index: 1 },
                ListChange::Removed {
                    index: 0,
                    message: removed,
                },
            ]
        );
    }

    #[test]
    fn out_of_range_mutations_are_noops() {
        let mut list = MessageList::new();
        assert!(list.remove(3).is_none());
        assert!(list.set(0, Message::new()).is_none());
        list.insert(10, Message::with_fields("tail", ""));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn clone_drops_listeners_but_keeps_items() {
        let mut list = MessageList::from_values(vec![json!({ "id": 1 })]);
        list.on_change(|_| {});
        let copy = list.clone();
        assert_eq!(copy, list);
        assert!(format!("{copy:?}").contains("listeners: 0"));
    }

    #[test]
    fn shared_handles_see_the_same_list() {
        let shared = SharedMessageList::new(MessageList::new());
        let view = shared.clone();
        let events = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&events);
        view.on_change(move |_| *counter.lock().unwrap() += 1);

        shared.lock().push_value(json!({ "id": 1 }));

        assert!(view.ptr_eq(&shared));
        assert_eq!(view.len(), 1);
        assert_eq!(*events.lock().unwrap(), 1);
        assert_eq!(view.snapshot().get(0).unwrap().id, Some(json!(1)));
        assert_eq!(serde_json::to_value(&view).unwrap(), json!([{ "id": 1 }]));
    }
}
