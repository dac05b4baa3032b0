use indexmap::IndexMap;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::field_path::{FieldPath, Segment, MAX_INDEX};
use crate::resolver::{self, PathTree};

/// A sparse tree with leaves of type `T`, shaped like the value tree it describes.
///
/// Used for errors, dirty and touched flags, where only a few leaves are present at a time.
/// Serializes like the equivalent JSON, `Empty` becomes `null`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Tree<T> {
    #[default]
    Empty,
    Leaf(T),
    Object(IndexMap<String, Tree<T>>),
    Array(Vec<Tree<T>>),
}

impl<T> Tree<T> {
    pub fn new() -> Self {
        Tree::Empty
    }

    /// True when the tree holds no leaves.
    pub fn is_empty(&self) -> bool {
        match self {
            Tree::Empty => true,
            Tree::Leaf(_) => false,
            Tree::Object(map) => map.values().all(Tree::is_empty),
            Tree::Array(items) => items.iter().all(Tree::is_empty),
        }
    }

    pub fn get(&self, path: &FieldPath) -> Option<&Tree<T>> {
        resolver::get(self, path)
    }

    pub fn get_mut(&mut self, path: &FieldPath) -> Option<&mut Tree<T>> {
        resolver::get_mut(self, path)
    }

    /// The leaf stored exactly at `path`.
    pub fn leaf(&self, path: &FieldPath) -> Option<&T> {
        match self.get(path) {
            Some(Tree::Leaf(leaf)) => Some(leaf),
            _ => None,
        }
    }

    /// True when there is a leaf at `path` or anywhere below it.
    pub fn contains(&self, path: &FieldPath) -> bool {
        self.get(path)
            .is_some_and(|node| !node.is_empty())
    }

    pub fn set_leaf(&mut self, path: &FieldPath, leaf: T) {
        resolver::set(self, path, Tree::Leaf(leaf));
    }

    pub fn set(&mut self, path: &FieldPath, tree: Tree<T>) {
        match tree.is_empty() {
            true => self.unset(path),
            false => resolver::set(self, path, tree),
        }
    }

    pub fn unset(&mut self, path: &FieldPath) {
        match path.is_root() {
            true => *self = Tree::Empty,
            false => resolver::unset(self, path),
        }
    }

    /// Removes and returns the subtree at `path`.
    pub fn take(&mut self, path: &FieldPath) -> Tree<T> {
        match path.is_root() {
            true => std::mem::take(self),
            false => match resolver::get_mut(self, path) {
                Some(node) => {
                    let taken = std::mem::take(node);
                    resolver::unset(self, path);
                    taken
                }
                None => Tree::Empty,
            },
        }
    }

    pub fn take_array(&mut self, path: &FieldPath) -> Vec<Tree<T>> {
        resolver::take_array(self, path)
    }

    pub fn put_array(&mut self, path: &FieldPath, items: Vec<Tree<T>>) {
        let items = items
            .into_iter()
            .map(|item| match item.is_empty() {
                true => Tree::Empty,
                false => item,
            })
            .collect();
        resolver::put_array(self, path, items)
    }

    /// All leaves with their paths, in tree order.
    pub fn leaves(&self) -> Vec<(FieldPath, &T)> {
        let mut leaves = Vec::new();
        self.collect_leaves(FieldPath::root(), &mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, path: FieldPath, leaves: &mut Vec<(FieldPath, &'a T)>) {
        match self {
            Tree::Empty => {}
            Tree::Leaf(leaf) => leaves.push((path, leaf)),
            Tree::Object(map) => {
                for (key, child) in map {
                    child.collect_leaves(path.join(Segment::Key(key.clone())), leaves);
                }
            }
            Tree::Array(items) => {
                for (index, child) in items.iter().enumerate() {
                    child.collect_leaves(path.join(index), leaves);
                }
            }
        }
    }

    pub fn map<U>(&self, f: &impl Fn(&T) -> U) -> Tree<U> {
        match self {
            Tree::Empty => Tree::Empty,
            Tree::Leaf(leaf) => Tree::Leaf(f(leaf)),
            Tree::Object(map) => Tree::Object(
                map.iter()
                    .map(|(key, child)| (key.clone(), child.map(f)))
                    .collect(),
            ),
            Tree::Array(items) => Tree::Array(
                items
                    .iter()
                    .map(|child| child.map(f))
                    .collect(),
            ),
        }
    }
}

impl<T> PathTree for Tree<T> {
    fn hole() -> Self {
        Tree::Empty
    }

    fn is_hole(&self) -> bool {
        matches!(self, Tree::Empty)
    }

    fn child(&self, segment: &Segment) -> Option<&Self> {
        match (self, segment) {
            (Tree::Array(items), Segment::Index(index)) => items.get(*index),
            (Tree::Object(map), segment) => map.get(&segment.to_key()),
            _ => None,
        }
    }

    fn child_mut(&mut self, segment: &Segment) -> Option<&mut Self> {
        match (self, segment) {
            (Tree::Array(items), Segment::Index(index)) => items.get_mut(*index),
            (Tree::Object(map), segment) => map.get_mut(&segment.to_key()),
            _ => None,
        }
    }

    fn ensure_container(&mut self, segment: &Segment) {
        match (&*self, segment) {
            (Tree::Object(_), _) => {}
            (Tree::Array(_), Segment::Index(_)) => {}
            (_, Segment::Index(_)) => *self = Tree::Array(Vec::new()),
            (_, Segment::Key(_)) => *self = Tree::Object(IndexMap::new()),
        }
    }

    fn entry(&mut self, segment: &Segment) -> Option<&mut Self> {
        match self {
            Tree::Array(items) => {
                let index = segment.as_index().unwrap_or_default();
                let len = index
                    .checked_add(1)
                    .filter(|len| *len <= MAX_INDEX + 1)?;
                if items.len() < len {
                    items.resize_with(len, || Tree::Empty);
                }
                items.get_mut(index)
            }
            Tree::Object(map) => Some(
                map.entry(segment.to_key())
                    .or_default(),
            ),
            other => {
                other.ensure_container(segment);
                other.entry(segment)
            }
        }
    }

    fn remove_child(&mut self, segment: &Segment) {
        match (self, segment) {
            (Tree::Array(items), Segment::Index(index)) => {
                if let Some(slot) = items.get_mut(*index) {
                    *slot = Tree::Empty;
                }
                while matches!(items.last(), Some(Tree::Empty)) {
                    items.pop();
                }
            }
            (Tree::Object(map), segment) => {
                map.shift_remove(&segment.to_key());
            }
            _ => {}
        }
    }

    fn is_empty_container(&self) -> bool {
        match self {
            Tree::Array(items) => items.iter().all(Tree::is_hole),
            Tree::Object(map) => map.is_empty(),
            _ => false,
        }
    }

    fn from_items(items: Vec<Self>) -> Self {
        Tree::Array(items)
    }

    fn into_items(self) -> Option<Vec<Self>> {
        match self {
            Tree::Array(items) => Some(items),
            _ => None,
        }
    }
}

impl<T: Serialize> Serialize for Tree<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Tree::Empty => serializer.serialize_none(),
            Tree::Leaf(leaf) => leaf.serialize(serializer),
            Tree::Object(map) => {
                let mut state = serializer.serialize_map(Some(map.len()))?;
                for (key, child) in map {
                    state.serialize_entry(key, child)?;
                }
                state.end()
            }
            Tree::Array(items) => {
                let mut state = serializer.serialize_seq(Some(items.len()))?;
                for child in items {
                    state.serialize_element(child)?;
                }
                state.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use serde_json::json;

    use super::*;

    fn path(value: &str) -> FieldPath {
        FieldPath::from_str(value).unwrap()
    }

    #[test]
    pub fn leaves_in_tree_order() {
        // given
        let mut tree = Tree::new();
        tree.set_leaf(&path("b"), 1);
        tree.set_leaf(&path("a.1.x"), 2);
        tree.set_leaf(&path("a.0"), 3);

        // when
        let leaves = tree
            .leaves()
            .into_iter()
            .map(|(path, leaf)| (path.to_string(), *leaf))
            .collect::<Vec<_>>();

        // then
        assert_eq!(
            leaves,
            vec![("b".to_string(), 1), ("a.0".to_string(), 3), ("a.1.x".to_string(), 2),]
        );
    }

    #[test]
    pub fn unset_collapses_to_empty() {
        // given
        let mut tree = Tree::new();
        tree.set_leaf(&path("a.b"), true);
        tree.set_leaf(&path("list.2.name"), true);

        // when
        tree.unset(&path("a.b"));
        tree.unset(&path("list.2.name"));

        // then
        assert_eq!(tree, Tree::Object(IndexMap::new()));
        assert!(tree.is_empty());
        assert!(!tree.contains(&path("a")));
    }

    #[test]
    pub fn contains_checks_subtrees() {
        // given
        let mut tree = Tree::new();
        tree.set_leaf(&path("a.b.c"), "x");

        // expect
        assert!(tree.contains(&path("a")));
        assert!(tree.contains(&path("a.b.c")));
        assert!(!tree.contains(&path("a.c")));
        assert_eq!(tree.leaf(&path("a.b.c")), Some(&"x"));
        assert_eq!(tree.leaf(&path("a.b")), None);
    }

    #[test]
    pub fn serializes_like_json() {
        // given
        let mut tree = Tree::new();
        tree.set_leaf(&path("rows.1.name"), true);
        tree.set_leaf(&path("title"), false);

        // when
        let value = serde_json::to_value(&tree).unwrap();

        // then
        assert_eq!(value, json!({"rows": [null, {"name": true}], "title": false}));
    }

    #[test]
    pub fn take_removes_subtree() {
        // given
        let mut tree = Tree::new();
        tree.set_leaf(&path("a.x"), 1);
        tree.set_leaf(&path("b"), 2);

        // when
        let taken = tree.take(&path("a"));

        // then
        assert_eq!(taken.leaf(&path("x")), Some(&1));
        assert_eq!(tree.leaves().len(), 1);
    }
}
