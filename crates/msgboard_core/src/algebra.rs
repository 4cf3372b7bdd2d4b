//! Identity algebra over messages and list queries.
//!
//! # Responsibility
//! - Derive the identity key of a record from its id property.
//! - Compare list queries as sets so cached lists can answer narrower queries.
//! - Deduplicate and combine record sets by identity.
//!
//! # Invariants
//! - Two records are the same logical record iff both have a key and the keys
//!   are equal; other fields never participate.
//! - Keyless records are never merged with anything.

use crate::model::message::{Message, ID_FIELD};
use log::warn;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::{Display, Formatter};

/// Query parameters naming a subset of all messages.
///
/// The empty query names every message.
pub type ListQuery = BTreeMap<String, Value>;

/// Canonical identity of a record.
///
/// Built from the id value's text so that `1` and `"1"` denote one record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey(String);

impl IdentityKey {
    /// Builds the key for one id value. `null` has no key.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(text) => Some(Self(text.clone())),
            other => Some(Self(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for IdentityKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Relation between two query sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetRelation {
    Equal,
    /// Left set is strictly contained in the right set.
    Subset,
    /// Left set strictly contains the right set.
    Superset,
    /// Sets may share records but neither contains the other.
    Intersect,
    /// Sets cannot share any record.
    Disjoint,
}

/// Identity and set rules keyed by one id property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityAlgebra {
    id_prop: String,
}

impl Default for IdentityAlgebra {
    fn default() -> Self {
        Self::by_id(ID_FIELD)
    }
}

impl IdentityAlgebra {
    /// Uses `id_prop` as the identity property.
    pub fn by_id(id_prop: impl Into<String>) -> Self {
        Self {
            id_prop: id_prop.into(),
        }
    }

    pub fn id_prop(&self) -> &str {
        &self.id_prop
    }

    /// Identity key of a record.
    pub fn key(&self, record: &Message) -> Option<IdentityKey> {
        record
            .get(&self.id_prop)
            .and_then(|value| IdentityKey::from_value(&value))
    }

    /// Identity key of a bare id value.
    pub fn key_of(&self, id: &Value) -> Option<IdentityKey> {
        IdentityKey::from_value(id)
    }

    /// Returns whether both records denote the same logical record.
    pub fn same_record(&self, left: &Message, right: &Message) -> bool {
        match (self.key(left), self.key(right)) {
            (Some(left), Some(right)) => left == right,
            _ => false,
        }
    }

    /// Returns whether `record` belongs to the set named by `query`.
    ///
    /// An absent property reads as `null`.
    pub fn matches(&self, query: &ListQuery, record: &Message) -> bool {
        query.iter().all(|(prop, expected)| {
            let actual = record.get(prop).unwrap_or(Value::Null);
            loosely_equal(expected, &actual)
        })
    }

    /// Compares two query sets under property-equality semantics.
    ///
    /// A query with more constraints names a smaller set; queries that
    /// constrain the same property to different values are disjoint.
    pub fn compare(&self, left: &ListQuery, right: &ListQuery) -> SetRelation {
        let conflicting = left.iter().any(|(prop, value)| {
            right
                .get(prop)
                .is_some_and(|other| !loosely_equal(value, other))
        });
        if conflicting {
            return SetRelation::Disjoint;
        }

        let left_within_right = constrains_all(left, right);
        let right_within_left = constrains_all(right, left);
        match (left_within_right, right_within_left) {
            (true, true) => SetRelation::Equal,
            (true, false) => SetRelation::Subset,
            (false, true) => SetRelation::Superset,
            (false, false) => SetRelation::Intersect,
        }
    }

    /// Returns whether every record named by `left` is also named by `right`.
    pub fn is_subset(&self, left: &ListQuery, right: &ListQuery) -> bool {
        matches!(
            self.compare(left, right),
            SetRelation::Equal | SetRelation::Subset
        )
    }

    /// Collapses records sharing a key.
    ///
    /// The first occurrence keeps its position and takes the data of the
    /// last occurrence. Keyless records are all kept.
    pub fn dedup(&self, records: impl IntoIterator<Item = Message>) -> Vec<Message> {
        let mut out: Vec<Message> = Vec::new();
        let mut positions: HashMap<IdentityKey, usize> = HashMap::new();
        let mut keyless = 0usize;

        for record in records {
            match self.key(&record) {
                Some(key) => {
                    if let Some(&index) = positions.get(&key) {
                        out[index] = record;
                    } else {
                        positions.insert(key, out.len());
                        out.push(record);
                    }
                }
                None => {
                    keyless += 1;
                    out.push(record);
                }
            }
        }

        if keyless > 0 {
            warn!(
                "event=algebra_dedup module=algebra status=degraded keyless_records={keyless} id_prop={}",
                self.id_prop
            );
        }
        out
    }

    /// Records of `left` followed by records of `right` not already present.
    pub fn union(&self, left: &[Message], right: &[Message]) -> Vec<Message> {
        self.dedup(left.iter().chain(right.iter()).cloned())
    }

    /// Records of `left` whose key does not appear in `right`.
    pub fn difference(&self, left: &[Message], right: &[Message]) -> Vec<Message> {
        let excluded: HashSet<IdentityKey> = right.iter().filter_map(|r| self.key(r)).collect();
        left.iter()
            .filter(|record| {
                self.key(record)
                    .map_or(true, |key| !excluded.contains(&key))
            })
            .cloned()
            .collect()
    }
}

/// Returns whether every constraint in `outer` also appears in `inner`.
fn constrains_all(inner: &ListQuery, outer: &ListQuery) -> bool {
    outer.iter().all(|(prop, value)| {
        inner
            .get(prop)
            .is_some_and(|other| loosely_equal(value, other))
    })
}

/// Query values arrive as strings from URLs and as numbers from JSON bodies,
/// so scalars compare by their text.
fn loosely_equal(left: &Value, right: &Value) -> bool {
    match (IdentityKey::from_value(left), IdentityKey::from_value(right)) {
        (Some(left), Some(right)) => left == right,
        (None, None) => true,
        _ => false,
    }
}
