//! Persistent attribute store
//!
//! Every write produces a new snapshot. Untouched snapshots share their data,
//! so keeping the initial attributes around costs nothing until the first
//! write, and comparing two snapshots short-circuits on pointer equality.

use crate::path::{AttributePath, Segment};
use elif_validation::AttributeLookup;
use serde_json::{Map, Value};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct AttributeStore {
    root: Arc<Value>,
}

impl AttributeStore {
    pub fn new(data: Value) -> Self {
        Self {
            root: Arc::new(data),
        }
    }

    pub fn empty() -> Self {
        Self::new(Value::Object(Map::new()))
    }

    /// Value stored at `path`
    pub fn get(&self, path: &AttributePath) -> Option<&Value> {
        let mut current = self.root.as_ref();
        for segment in path.segments() {
            current = match (segment, current) {
                (Segment::Key(key), Value::Object(map)) => map.get(key)?,
                (Segment::Index(index), Value::Array(items)) => items.get(*index)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Owned copy of the value at `path`, `Null` when absent
    pub fn value(&self, path: &AttributePath) -> Value {
        self.get(path).cloned().unwrap_or(Value::Null)
    }

    /// Store `value` at `path`, creating intermediate objects and arrays.
    /// An array index may address an existing element or append one past the
    /// end; anything further is rejected. Paths holding a wildcard address no
    /// single location and are ignored. A rejected write leaves the store
    /// untouched.
    pub fn set(&mut self, path: &AttributePath, value: Value) -> bool {
        if !self.is_writable(path) {
            return false;
        }

        let mut current = Arc::make_mut(&mut self.root);
        for segment in path.segments() {
            current = match segment {
                Segment::Key(key) => {
                    if !current.is_object() {
                        *current = Value::Object(Map::new());
                    }
                    match current {
                        Value::Object(map) => map.entry(key.clone()).or_insert(Value::Null),
                        _ => return false,
                    }
                }
                Segment::Index(index) => {
                    if !current.is_array() {
                        *current = Value::Array(Vec::new());
                    }
                    match current {
                        Value::Array(items) => {
                            if *index == items.len() {
                                items.push(Value::Null);
                            }
                            match items.get_mut(*index) {
                                Some(item) => item,
                                None => return false,
                            }
                        }
                        _ => return false,
                    }
                }
                Segment::Wildcard => return false,
            };
        }

        *current = value;
        true
    }

    /// Whether `set` can reach `path` without leaving a gap in any array
    fn is_writable(&self, path: &AttributePath) -> bool {
        let mut current = Some(self.root.as_ref());
        for segment in path.segments() {
            current = match segment {
                Segment::Key(key) => current.and_then(Value::as_object).and_then(|m| m.get(key)),
                Segment::Index(index) => {
                    let items = current.and_then(Value::as_array);
                    if *index > items.map_or(0, Vec::len) {
                        return false;
                    }
                    items.and_then(|items| items.get(*index))
                }
                Segment::Wildcard => return false,
            };
        }
        true
    }

    /// The whole attribute tree
    pub fn as_value(&self) -> &Value {
        &self.root
    }

    pub fn to_value(&self) -> Value {
        self.root.as_ref().clone()
    }

    /// Whether both stores share the same snapshot
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.root, &other.root)
    }
}

impl Default for AttributeStore {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for AttributeStore {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.root == other.root
    }
}

impl AttributeLookup for AttributeStore {
    fn attribute(&self, path: &str) -> Value {
        self.value(&AttributePath::parse(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(p: &str) -> AttributePath {
        AttributePath::parse(p)
    }

    #[test]
    fn test_get_nested() {
        let store = AttributeStore::new(json!({"a": {"b": [{"c": 1}]}}));
        assert_eq!(store.get(&path("a.b[0].c")), Some(&json!(1)));
        assert_eq!(store.get(&path("a.b[1].c")), None);
        assert_eq!(store.value(&path("a.x")), Value::Null);
        assert_eq!(store.get(&AttributePath::root()), Some(&json!({"a": {"b": [{"c": 1}]}})));
    }

    #[test]
    fn test_set_creates_containers() {
        let mut store = AttributeStore::empty();
        assert!(store.set(&path("a.b[0].c"), json!("x")));
        assert!(store.set(&path("a.b[1]"), json!(2)));
        assert_eq!(store.to_value(), json!({"a": {"b": [{"c": "x"}, 2]}}));
    }

    #[test]
    fn test_set_rejects_index_past_the_end() {
        let mut store = AttributeStore::new(json!({"x": [1]}));
        let before = store.clone();

        assert!(!store.set(&path("x[5]"), json!(0)));
        assert!(!store.set(&path("y[3].z"), json!(0)));
        assert!(!store.set(&path("x[18446744073709551615]"), json!(0)));
        assert!(store.ptr_eq(&before));

        assert!(store.set(&path("x[1]"), json!(2)));
        assert_eq!(store.value(&path("x")), json!([1, 2]));
    }

    #[test]
    fn test_set_replaces_scalars_with_containers() {
        let mut store = AttributeStore::new(json!({"a": 5}));
        store.set(&path("a.b"), json!(1));
        assert_eq!(store.to_value(), json!({"a": {"b": 1}}));
    }

    #[test]
    fn test_wildcard_write_is_ignored() {
        let mut store = AttributeStore::empty();
        assert!(!store.set(&path("items[].name"), json!("x")));
        assert_eq!(store.to_value(), json!({}));
    }

    #[test]
    fn test_snapshots_are_persistent() {
        let initial = AttributeStore::new(json!({"name": "Ann"}));
        let mut current = initial.clone();
        assert!(current.ptr_eq(&initial));

        current.set(&path("name"), json!("Bob"));
        assert_eq!(initial.value(&path("name")), json!("Ann"));
        assert_eq!(current.value(&path("name")), json!("Bob"));
        assert_ne!(current, initial);

        current.set(&path("name"), json!("Ann"));
        assert!(!current.ptr_eq(&initial));
        assert_eq!(current, initial);
    }

    #[test]
    fn test_lookup_trait() {
        let store = AttributeStore::new(json!({"rows": [{"id": 7}]}));
        assert_eq!(store.attribute("rows[0].id"), json!(7));
    }
}
