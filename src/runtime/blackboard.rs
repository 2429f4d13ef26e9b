//! The blackboard: typed, append-mostly shared state threaded through a process.
//!
//! Keys are built from `std::any::TypeId` plus an optional label, and values
//! are stored behind `Arc<dyn Any + Send + Sync>` recovered with
//! `downcast_ref`. This is the only channel for cross-action communication
//! and the sole source of planner preconditions.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

/// A blackboard key: a type identity plus an optional label for
/// disambiguating multiple bindings of the same type (e.g. "origin" vs.
/// "destination" addresses).
#[derive(Clone, PartialEq, Eq, Hash)]
struct TypeKey {
    type_id: TypeId,
    label: Option<&'static str>,
}

struct Binding {
    values: Vec<Arc<dyn Any + Send + Sync>>,
    last_write: DateTime<Utc>,
}

/// Typed append-mostly map keyed by type identity plus labels.
///
/// Values are immutable once bound; bindings are monotonically additive
/// during an action; presence/absence of a binding drives planner
/// preconditions.
#[derive(Default)]
pub struct Blackboard {
    bindings: HashMap<TypeKey, Binding>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value under its own type, unlabeled.
    pub fn add_object<T: Any + Send + Sync>(&mut self, value: T) {
        self.add_labeled(None, value);
    }

    /// Bind a value under its own type with an explicit label.
    pub fn add_labeled<T: Any + Send + Sync>(&mut self, label: Option<&'static str>, value: T) {
        let key = TypeKey {
            type_id: TypeId::of::<T>(),
            label,
        };
        let entry = self.bindings.entry(key).or_insert_with(|| Binding {
            values: Vec::new(),
            last_write: Utc::now(),
        });
        entry.values.push(Arc::new(value));
        entry.last_write = Utc::now();
    }

    /// The most recently bound value of type `T` (unlabeled), if any.
    pub fn last<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.last_labeled(None)
    }

    /// The most recently bound value of type `T` under the given label.
    pub fn last_labeled<T: Any + Send + Sync>(&self, label: Option<&'static str>) -> Option<Arc<T>> {
        let key = TypeKey {
            type_id: TypeId::of::<T>(),
            label,
        };
        self.bindings
            .get(&key)
            .and_then(|b| b.values.last())
            .and_then(|v| v.clone().downcast::<T>().ok())
    }

    /// All bound values of type `T` (unlabeled), oldest first.
    pub fn all<T: Any + Send + Sync>(&self) -> Vec<Arc<T>> {
        let key = TypeKey {
            type_id: TypeId::of::<T>(),
            label: None,
        };
        self.bindings
            .get(&key)
            .map(|b| {
                b.values
                    .iter()
                    .filter_map(|v| v.clone().downcast::<T>().ok())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether any value of type `T` (unlabeled) has been bound — the planner
    /// precondition check.
    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        let key = TypeKey {
            type_id: TypeId::of::<T>(),
            label: None,
        };
        self.bindings.contains_key(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Intent(&'static str);

    #[test]
    fn last_returns_most_recent_binding() {
        let mut bb = Blackboard::new();
        bb.add_object(Intent("book_flight"));
        bb.add_object(Intent("refund"));
        assert_eq!(*bb.last::<Intent>().unwrap(), Intent("refund"));
    }

    #[test]
    fn contains_reflects_presence_regardless_of_value() {
        let mut bb = Blackboard::new();
        assert!(!bb.contains::<Intent>());
        bb.add_object(Intent("anything"));
        assert!(bb.contains::<Intent>());
    }

    #[test]
    fn labels_disambiguate_same_type_bindings() {
        let mut bb = Blackboard::new();
        bb.add_labeled(Some("origin"), "SFO".to_string());
        bb.add_labeled(Some("destination"), "JFK".to_string());
        assert_eq!(*bb.last_labeled::<String>(Some("origin")).unwrap(), "SFO");
        assert_eq!(*bb.last_labeled::<String>(Some("destination")).unwrap(), "JFK");
    }

    #[test]
    fn all_returns_every_binding_oldest_first() {
        let mut bb = Blackboard::new();
        bb.add_object(1i32);
        bb.add_object(2i32);
        bb.add_object(3i32);
        let all: Vec<i32> = bb.all::<i32>().into_iter().map(|v| *v).collect();
        assert_eq!(all, vec![1, 2, 3]);
    }
}
