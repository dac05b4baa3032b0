//! Property tests for field paths and the path resolver.
//!
//! 1. Any value written at a path reads back unchanged.
//! 2. Writing below one top-level name never disturbs another top-level name.
//! 3. Displaying and re-parsing a path is lossless.
//! 4. Removing the only written path leaves the tree empty.
//! 5. `null` survives a write and a removal of a sibling.

use std::str::FromStr;

use form_path::{resolver, FieldPath, Segment, Tree};
use proptest::prelude::*;
use serde_json::{json, Value};

fn arb_segment() -> impl Strategy<Value = Segment> {
    prop_oneof![
        "[a-z]{1,3}".prop_map(Segment::Key),
        (0usize..4).prop_map(Segment::Index),
        "[a-z]\\.[a-z]".prop_map(Segment::Key),
    ]
}

fn arb_path() -> impl Strategy<Value = FieldPath> {
    proptest::collection::vec(arb_segment(), 1..=5).prop_map(FieldPath::from_segments)
}

fn arb_leaf() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[ -~]{0,8}".prop_map(Value::from),
    ]
}

proptest! {
    #[test]
    fn get_after_set_returns_value(path in arb_path(), value in arb_leaf(), seed in arb_leaf()) {
        let mut tree = json!({"seed": seed});

        resolver::set(&mut tree, &path, value.clone());

        prop_assert_eq!(resolver::get(&tree, &path), Some(&value));
    }

    #[test]
    fn set_leaves_siblings_alone(first in arb_path(), second in arb_path(), a in arb_leaf(), b in arb_leaf()) {
        prop_assume!(first.first().map(Segment::to_key) != second.first().map(Segment::to_key));
        let mut tree = json!({});
        resolver::set(&mut tree, &first, a.clone());

        resolver::set(&mut tree, &second, b);

        prop_assert_eq!(resolver::get(&tree, &first), Some(&a));
    }

    #[test]
    fn display_round_trip(path in arb_path()) {
        let displayed = path.to_string();

        prop_assert_eq!(FieldPath::from_str(&displayed), Ok(path));
    }

    #[test]
    fn unset_keeps_null_siblings(path in arb_path()) {
        let mut tree = json!({"kept": null});
        resolver::set(&mut tree, &path.clone().concat(&FieldPath::from_segments([Segment::key("x")])), json!(1));

        resolver::unset(&mut tree, &path.concat(&FieldPath::from_segments([Segment::key("x")])));

        prop_assert_eq!(resolver::get(&tree, &FieldPath::from_segments([Segment::key("kept")])), Some(&Value::Null));
    }

    #[test]
    fn unset_restores_empty_tree(path in arb_path()) {
        let mut tree: Tree<bool> = Tree::new();
        tree.set_leaf(&path, true);

        tree.unset(&path);

        prop_assert!(tree.is_empty());
        prop_assert!(tree.leaves().is_empty());
    }
}
