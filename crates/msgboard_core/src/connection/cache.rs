//! In-memory instance and list caches keyed by the identity algebra.
//!
//! # Invariants
//! - At most one instance per `IdentityKey`.
//! - Keyless records are never stored in the instance cache.
//! - Cached lists hold each key at most once.
//! - Cached lists are the same handles given to callers; every change goes
//!   through `MessageList` mutators so listeners see it.
//! - `generation` moves on every write that changes membership or evicts.

use crate::algebra::{IdentityAlgebra, IdentityKey, ListQuery, SetRelation};
use crate::model::message::Message;
use crate::model::message_list::{MessageList, SharedMessageList};
use std::collections::HashMap;

/// How a stored instance affects cached lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListSync {
    /// Refresh the record where a list already holds it.
    ReplaceOnly,
    /// Also add it to or drop it from lists according to their queries.
    Reevaluate,
}

#[derive(Debug)]
struct CachedList {
    query: ListQuery,
    list: SharedMessageList,
}

#[derive(Debug, Default)]
pub(crate) struct ConnectionCache {
    instances: HashMap<IdentityKey, Message>,
    lists: Vec<CachedList>,
    generation: u64,
}

impl ConnectionCache {
    pub(crate) fn instance(&self, key: &IdentityKey) -> Option<Message> {
        self.instances.get(key).cloned()
    }

    pub(crate) fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub(crate) fn list_count(&self) -> usize {
        self.lists.len()
    }

    /// Write generation, compared before and after a fetch to detect
    /// writes that landed while the cache lock was released.
    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Stores one record and propagates it into cached lists.
    ///
    /// Returns `false` when the record has no key and was not stored.
    pub(crate) fn store_instance(
        &mut self,
        algebra: &IdentityAlgebra,
        record: &Message,
        sync: ListSync,
    ) -> bool {
        let Some(key) = algebra.key(record) else {
            return false;
        };
        self.instances.insert(key, record.clone());
        if sync == ListSync::Reevaluate {
            self.generation += 1;
        }

        for cached in &self.lists {
            let mut list = cached.list.lock();
            let position = list
                .iter()
                .position(|item| algebra.same_record(item, record));
            let belongs = sync == ListSync::ReplaceOnly || algebra.matches(&cached.query, record);
            match (position, belongs) {
                (Some(index), true) => {
                    if list.get(index) != Some(record) {
                        list.set(index, record.clone());
                    }
                }
                (Some(index), false) => {
                    list.remove(index);
                }
                (None, true) if sync == ListSync::Reevaluate => list.push(record.clone()),
                (None, _) => {}
            }
        }
        true
    }

    /// Drops one record from the instance cache and every cached list.
    pub(crate) fn evict(&mut self, algebra: &IdentityAlgebra, key: &IdentityKey) {
        self.instances.remove(key);
        self.generation += 1;
        for cached in &self.lists {
            let mut list = cached.list.lock();
            loop {
                let Some(index) = list
                    .iter()
                    .position(|item| algebra.key(item).as_ref() == Some(key))
                else {
                    break;
                };
                list.remove(index);
            }
        }
    }

    /// Answers `query` from a cached list naming the same set or a superset.
    ///
    /// A superset hit is filtered into a new cached list so the narrower
    /// view stays live as well.
    pub(crate) fn lookup_list(
        &mut self,
        algebra: &IdentityAlgebra,
        query: &ListQuery,
    ) -> Option<SharedMessageList> {
        let mut superset = None;
        for cached in &self.lists {
            match algebra.compare(query, &cached.query) {
                SetRelation::Equal => return Some(cached.list.clone()),
                SetRelation::Subset if superset.is_none() => superset = Some(cached.list.clone()),
                _ => {}
            }
        }

        let items: MessageList = superset?
            .lock()
            .iter()
            .filter(|item| algebra.matches(query, item))
            .cloned()
            .collect();
        let list = SharedMessageList::new(items);
        self.lists.push(CachedList {
            query: query.clone(),
            list: list.clone(),
        });
        Some(list)
    }

    /// Stores a fetched list and returns its live handle.
    ///
    /// A list already cached for the same query keeps its handle and
    /// listeners; its content is replaced.
    pub(crate) fn store_list(
        &mut self,
        algebra: &IdentityAlgebra,
        query: ListQuery,
        items: Vec<Message>,
    ) -> SharedMessageList {
        for item in &items {
            self.store_instance(algebra, item, ListSync::ReplaceOnly);
        }
        if let Some(existing) = self
            .lists
            .iter()
            .find(|cached| algebra.compare(&query, &cached.query) == SetRelation::Equal)
        {
            existing.list.lock().replace_all(items);
            return existing.list.clone();
        }
        let list = SharedMessageList::new(MessageList::from(items));
        self.lists.push(CachedList {
            query,
            list: list.clone(),
        });
        list
    }

    pub(crate) fn clear(&mut self) {
        self.instances.clear();
        self.lists.clear();
        self.generation += 1;
    }
}
