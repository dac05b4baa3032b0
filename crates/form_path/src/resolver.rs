//! Path-addressed access to nested trees.
//!
//! The functions here never fail: reads through a missing or mismatched node return `None`,
//! writes create whatever containers are missing, and removals of missing paths do nothing.
//! Writes through an index above [`MAX_INDEX`] are ignored.
//!
//! Holes: removing an array slot leaves a hole (so sibling indexes do not shift), trailing holes
//! are trimmed, and containers left empty by a removal are removed from their parent, all the
//! way up to (but excluding) the root.
//!
//! JSON has no hole of its own.  In a [`Value`] `null` is a value like any other: a removed
//! array slot becomes `null` unless it is the last slot, which is dropped.

use serde_json::{Map, Value};

use crate::field_path::{FieldPath, Segment, MAX_INDEX};

/// A tree that can be addressed with a [`FieldPath`].
pub trait PathTree: Sized {
    /// The value used to fill slots created by writes past the end of an array.
    fn hole() -> Self;

    /// True for a slot that holds nothing, it reads as missing.
    fn is_hole(&self) -> bool;

    fn child(&self, segment: &Segment) -> Option<&Self>;

    fn child_mut(&mut self, segment: &Segment) -> Option<&mut Self>;

    /// Make `self` a container that can hold `segment`, replacing non-containers.
    fn ensure_container(&mut self, segment: &Segment);

    /// The child for `segment`, creating it if required.
    ///
    /// Only called after [`PathTree::ensure_container`].  `None` for indexes above
    /// [`MAX_INDEX`].
    fn entry(&mut self, segment: &Segment) -> Option<&mut Self>;

    /// Remove the child for `segment`, array slots become holes and trailing holes are trimmed.
    fn remove_child(&mut self, segment: &Segment);

    fn is_empty_container(&self) -> bool;

    fn from_items(items: Vec<Self>) -> Self;

    /// The slots of an array node, `None` for anything else.
    fn into_items(self) -> Option<Vec<Self>>;
}

/// The length an array needs to hold `index`.
fn slot_len(index: usize) -> Option<usize> {
    index
        .checked_add(1)
        .filter(|len| *len <= MAX_INDEX + 1)
}

pub fn get<'a, T: PathTree>(tree: &'a T, path: &FieldPath) -> Option<&'a T> {
    let node = path
        .segments()
        .iter()
        .try_fold(tree, |node, segment| node.child(segment))?;

    match node.is_hole() {
        true => None,
        false => Some(node),
    }
}

pub fn get_mut<'a, T: PathTree>(tree: &'a mut T, path: &FieldPath) -> Option<&'a mut T> {
    let node = path
        .segments()
        .iter()
        .try_fold(tree, |node, segment| node.child_mut(segment))?;

    match node.is_hole() {
        true => None,
        false => Some(node),
    }
}

/// Writes `value` at `path`, creating intermediate containers: objects for key segments and
/// arrays for index segments.  Setting the root path replaces the whole tree.
///
/// Paths with an index above [`MAX_INDEX`] leave the tree untouched.
pub fn set<T: PathTree>(tree: &mut T, path: &FieldPath, value: T) {
    if path
        .segments()
        .iter()
        .any(|segment| segment.as_index().is_some_and(|index| slot_len(index).is_none()))
    {
        return;
    }

    let mut node = tree;
    for segment in path.segments() {
        node.ensure_container(segment);
        node = match node.entry(segment) {
            Some(child) => child,
            None => return,
        };
    }
    *node = value;
}

/// Removes `path` and collapses containers left empty by the removal.
pub fn unset<T: PathTree>(tree: &mut T, path: &FieldPath) {
    let Some(parent_path) = path.parent() else {
        return;
    };
    let Some(last) = path.last() else {
        return;
    };

    let parent = parent_path
        .segments()
        .iter()
        .try_fold(&mut *tree, |node, segment| node.child_mut(segment));
    let collapse = match parent {
        Some(parent) => {
            parent.remove_child(last);
            parent.is_empty_container()
        }
        None => false,
    };

    if collapse && !parent_path.is_root() {
        unset(tree, &parent_path);
    }
}

pub fn unset_all<'p, T: PathTree>(tree: &mut T, paths: impl IntoIterator<Item = &'p FieldPath>) {
    for path in paths {
        unset(tree, path);
    }
}

/// Removes the array at `path` and returns its slots, holes included.
///
/// Missing paths and non-array nodes yield an empty list, the node is removed either way.
pub fn take_array<T: PathTree>(tree: &mut T, path: &FieldPath) -> Vec<T> {
    let Some(node) = get_mut(tree, path) else {
        return Vec::new();
    };
    let taken = std::mem::replace(node, T::hole());
    unset(tree, path);

    taken.into_items().unwrap_or_default()
}

/// Writes `items` as the array at `path`, trailing holes are trimmed and an array with nothing
/// but holes is removed entirely.
pub fn put_array<T: PathTree>(tree: &mut T, path: &FieldPath, mut items: Vec<T>) {
    while items
        .last()
        .is_some_and(|item| item.is_hole())
    {
        items.pop();
    }

    match items.is_empty() {
        true => unset(tree, path),
        false => set(tree, path, T::from_items(items)),
    }
}

impl PathTree for Value {
    fn hole() -> Self {
        Value::Null
    }

    fn is_hole(&self) -> bool {
        false
    }

    fn child(&self, segment: &Segment) -> Option<&Self> {
        match (self, segment) {
            (Value::Array(items), Segment::Index(index)) => items.get(*index),
            (Value::Object(map), segment) => map.get(&segment.to_key()),
            _ => None,
        }
    }

    fn child_mut(&mut self, segment: &Segment) -> Option<&mut Self> {
        match (self, segment) {
            (Value::Array(items), Segment::Index(index)) => items.get_mut(*index),
            (Value::Object(map), segment) => map.get_mut(&segment.to_key()),
            _ => None,
        }
    }

    fn ensure_container(&mut self, segment: &Segment) {
        match (&*self, segment) {
            (Value::Object(_), _) => {}
            (Value::Array(_), Segment::Index(_)) => {}
            (_, Segment::Index(_)) => *self = Value::Array(Vec::new()),
            (_, Segment::Key(_)) => *self = Value::Object(Map::new()),
        }
    }

    fn entry(&mut self, segment: &Segment) -> Option<&mut Self> {
        match self {
            Value::Array(items) => {
                let index = segment.as_index().unwrap_or_default();
                let len = slot_len(index)?;
                if items.len() < len {
                    items.resize(len, Value::Null);
                }
                items.get_mut(index)
            }
            Value::Object(map) => Some(
                map.entry(segment.to_key())
                    .or_insert(Value::Null),
            ),
            other => {
                other.ensure_container(segment);
                other.entry(segment)
            }
        }
    }

    fn remove_child(&mut self, segment: &Segment) {
        match (self, segment) {
            (Value::Array(items), Segment::Index(index)) => {
                if items.len().checked_sub(1) == Some(*index) {
                    items.pop();
                } else if let Some(slot) = items.get_mut(*index) {
                    *slot = Value::Null;
                }
            }
            (Value::Object(map), segment) => {
                let key = segment.to_key();
                map.retain(|existing, _| existing != &key);
            }
            _ => {}
        }
    }

    fn is_empty_container(&self) -> bool {
        match self {
            Value::Array(items) => items.is_empty(),
            Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }

    fn from_items(items: Vec<Self>) -> Self {
        Value::Array(items)
    }

    fn into_items(self) -> Option<Vec<Self>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}
