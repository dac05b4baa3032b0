//! Field paths and path-addressed access to nested value trees.
//!
//! Field names such as `items.0.name` or `items[0]["name"]` are compiled into a [`FieldPath`],
//! which is then used to read, write and remove nodes of a [`serde_json::Value`] or a sparse
//! [`Tree`].

mod cache;
mod field_path;
pub mod resolver;
mod tree;

pub use cache::PathCache;
pub use field_path::{FieldPath, PathError, Segment, MAX_INDEX};
pub use resolver::PathTree;
pub use tree::Tree;
