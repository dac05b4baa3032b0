//! Structural comparison of value trees.
//!
//! `null` is a value, distinct from a missing key.  Values matched by the opaque-leaf predicate
//! are compared as a whole and never traversed.

use form_path::{FieldPath, Tree};
use serde_json::{Map, Value};

use crate::options::OpaqueLeaf;

#[derive(Clone, Default)]
pub(crate) struct Comparator {
    opaque_leaf: Option<OpaqueLeaf>,
}

impl Comparator {
    pub fn new(opaque_leaf: Option<OpaqueLeaf>) -> Self {
        Self {
            opaque_leaf,
        }
    }

    fn is_opaque(&self, value: &Value) -> bool {
        self.opaque_leaf
            .as_ref()
            .is_some_and(|predicate| predicate(value))
    }

    pub fn equal(&self, a: Option<&Value>, b: Option<&Value>) -> bool {
        match (a, b) {
            (None, None) => true,
            (Some(a), Some(b)) if self.is_opaque(a) || self.is_opaque(b) => a == b,
            (Some(Value::Object(a)), Some(Value::Object(b))) => a
                .keys()
                .chain(b.keys())
                .all(|key| self.equal(a.get(key), b.get(key))),
            (Some(Value::Array(a)), Some(Value::Array(b))) => {
                let len = a.len().max(b.len());
                (0..len).all(|index| self.equal(a.get(index), b.get(index)))
            }
            (Some(Value::Number(a)), Some(Value::Number(b))) => a.as_f64() == b.as_f64(),
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// The dirty flags for `value` compared to `default`, shaped like `value`.
    ///
    /// Containers without a matching default container are dirty throughout.  Only differing
    /// leaves are marked, so equal values produce an empty tree.
    pub fn diff(&self, default: Option<&Value>, value: Option<&Value>) -> Tree<bool> {
        match value {
            None => match default {
                None => Tree::Empty,
                Some(_) => Tree::Leaf(true),
            },
            Some(value) if self.is_opaque(value) => match Some(value) == default {
                true => Tree::Empty,
                false => Tree::Leaf(true),
            },
            Some(Value::Object(map)) => {
                let defaults = default.and_then(Value::as_object);
                let mut tree = Tree::new();
                for (key, child) in map {
                    let child_tree = match defaults {
                        Some(defaults) => self.diff(defaults.get(key), Some(child)),
                        None => self.mark_all(child),
                    };
                    tree.set(&FieldPath::from_segments([key.as_str().into()]), child_tree);
                }
                tree
            }
            Some(Value::Array(items)) => {
                let defaults = default.and_then(Value::as_array);
                let mut tree = Tree::new();
                for (index, child) in items.iter().enumerate() {
                    let child_tree = match defaults {
                        Some(defaults) => self.diff(defaults.get(index), Some(child)),
                        None => self.mark_all(child),
                    };
                    tree.set(&FieldPath::from_segments([index.into()]), child_tree);
                }
                tree
            }
            Some(value) => match self.equal(default, Some(value)) {
                true => Tree::Empty,
                false => Tree::Leaf(true),
            },
        }
    }

    /// Every leaf of `value` marked.
    pub fn mark_all(&self, value: &Value) -> Tree<bool> {
        match value {
            value if self.is_opaque(value) => Tree::Leaf(true),
            Value::Object(_) | Value::Array(_) => self.diff(None, Some(value)),
            _ => Tree::Leaf(true),
        }
    }
}

/// `value` laid over `base`: objects are merged key by key, everything else in `value` wins.
pub(crate) fn merge(base: &Value, value: &Value) -> Value {
    match (base, value) {
        (Value::Object(base), Value::Object(value)) => {
            let mut merged = Map::new();
            for (key, base_child) in base {
                match value.get(key) {
                    Some(child) => merged.insert(key.clone(), merge(base_child, child)),
                    None => merged.insert(key.clone(), base_child.clone()),
                };
            }
            for (key, child) in value {
                if !base.contains_key(key) {
                    merged.insert(key.clone(), child.clone());
                }
            }
            Value::Object(merged)
        }
        (_, value) => value.clone(),
    }
}

/// An empty string, an empty list or no value at all.
pub(crate) fn is_empty_input(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        _ => false,
    }
}
