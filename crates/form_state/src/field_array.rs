//! List-typed fields with stable row identity.
//!
//! Each array keeps an arena of rows and the order of the rows in the array.  Structural
//! operations permute the order; only rows created by an operation get a fresh [`RowKey`], and
//! keys are never reused.

use std::collections::{HashMap, HashSet};
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use form_path::{resolver, FieldPath, Tree};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use slotmap::{new_key_type, SlotMap};
use tracing::{debug, trace};
use uuid::Uuid;

use crate::control::Control;
use crate::error::FormError;
use crate::rules::ArrayRules;
use crate::state::{ArrayAction, ArrayEvent, ChangeKind};
use crate::task::Task;
use crate::validation::plan::{CommitMode, Scope};

new_key_type! {
    struct RowId;
}

/// The identity of a row, preserved across moves and swaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct RowKey(Uuid);

impl RowKey {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for RowKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldArrayRow {
    pub key: RowKey,
    pub value: Value,
}

/// A structural operation on an array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ArrayOp {
    Append(usize),
    Prepend(usize),
    Insert(usize, usize),
    Remove(Vec<usize>),
    RemoveAll,
    Swap(usize, usize),
    Move(usize, usize),
    Update(usize),
    Replace(usize),
}

impl ArrayOp {
    /// Applies the operation to `items`, `fresh` creates the items of new rows in order.
    ///
    /// Out-of-range indexes are clamped for insertions and moves, other operations ignore them.
    pub fn apply<T>(&self, items: &mut Vec<T>, mut fresh: impl FnMut() -> T) {
        match self {
            ArrayOp::Append(count) => {
                for _ in 0..*count {
                    items.push(fresh());
                }
            }
            ArrayOp::Prepend(count) => {
                for offset in 0..*count {
                    items.insert(offset, fresh());
                }
            }
            ArrayOp::Insert(index, count) => {
                let index = (*index).min(items.len());
                for offset in 0..*count {
                    items.insert(index + offset, fresh());
                }
            }
            ArrayOp::Remove(indexes) => {
                let mut indexes = indexes
                    .iter()
                    .copied()
                    .filter(|index| *index < items.len())
                    .collect::<Vec<_>>();
                indexes.sort_unstable();
                indexes.dedup();
                for index in indexes.into_iter().rev() {
                    items.remove(index);
                }
            }
            ArrayOp::RemoveAll => items.clear(),
            ArrayOp::Swap(a, b) => {
                if *a < items.len() && *b < items.len() {
                    items.swap(*a, *b);
                }
            }
            ArrayOp::Move(from, to) => {
                if *from < items.len() {
                    let item = items.remove(*from);
                    let to = (*to).min(items.len());
                    items.insert(to, item);
                }
            }
            ArrayOp::Update(index) => {
                if let Some(item) = items.get_mut(*index) {
                    *item = fresh();
                }
            }
            ArrayOp::Replace(count) => {
                items.clear();
                for _ in 0..*count {
                    items.push(fresh());
                }
            }
        }
    }

    /// The index of the first row created by the operation, used for focusing.
    pub fn created_index(&self, len: usize) -> Option<usize> {
        match self {
            ArrayOp::Append(count) if *count > 0 => Some(len),
            ArrayOp::Prepend(count) if *count > 0 => Some(0),
            ArrayOp::Insert(index, count) if *count > 0 => Some((*index).min(len)),
            _ => None,
        }
    }

    /// For every old row index, its index after the operation, `None` for rows that are gone.
    pub fn mapping(&self, len: usize) -> HashMap<usize, usize> {
        let mut slots = (0..len).map(Some).collect::<Vec<_>>();
        self.apply(&mut slots, || None);
        slots
            .into_iter()
            .enumerate()
            .filter_map(|(new_index, old_index)| old_index.map(|old_index| (old_index, new_index)))
            .collect()
    }
}

#[derive(Debug)]
pub(crate) struct ArrayState {
    rows: SlotMap<RowId, RowKey>,
    order: Vec<RowId>,
    pub rules: ArrayRules,
}

impl ArrayState {
    fn new(len: usize, rules: ArrayRules) -> Self {
        let mut state = Self {
            rows: SlotMap::with_key(),
            order: Vec::new(),
            rules,
        };
        state.reconcile(len);
        state
    }

    pub fn keys(&self) -> Vec<RowKey> {
        self.order
            .iter()
            .filter_map(|id| self.rows.get(*id).copied())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Adds rows with fresh keys, or drops trailing rows, until there are `len` rows.
    pub fn reconcile(&mut self, len: usize) {
        while self.order.len() > len {
            if let Some(id) = self.order.pop() {
                self.rows.remove(id);
            }
        }
        while self.order.len() < len {
            let id = self.rows.insert(RowKey::generate());
            self.order.push(id);
        }
    }

    /// Replaces every row with a fresh one.
    pub fn regenerate(&mut self, len: usize) {
        self.rows.clear();
        self.order.clear();
        self.reconcile(len);
    }

    pub fn apply(&mut self, op: &ArrayOp) {
        let rows = &mut self.rows;
        op.apply(&mut self.order, || rows.insert(RowKey::generate()));

        let live = self
            .order
            .iter()
            .copied()
            .collect::<HashSet<_>>();
        self.rows
            .retain(|id, _| live.contains(&id));
    }
}

/// The registered field arrays, keyed by path.
#[derive(Debug, Default)]
pub(crate) struct FieldArrays {
    arrays: IndexMap<FieldPath, ArrayState>,
}

impl FieldArrays {
    /// Registers the array at `path`, a re-registration keeps the rows and replaces the rules.
    pub fn register(&mut self, path: &FieldPath, rules: ArrayRules, len: usize) {
        match self.arrays.get_mut(path) {
            Some(state) => {
                state.rules = rules;
                state.reconcile(len);
            }
            None => {
                debug!("Registering field array. path: {}, rows: {}", path, len);
                self.arrays
                    .insert(path.clone(), ArrayState::new(len, rules));
            }
        }
    }

    pub fn contains(&self, path: &FieldPath) -> bool {
        self.arrays.contains_key(path)
    }

    pub fn get(&self, path: &FieldPath) -> Option<&ArrayState> {
        self.arrays.get(path)
    }

    pub fn get_mut(&mut self, path: &FieldPath) -> Option<&mut ArrayState> {
        self.arrays.get_mut(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldPath, &ArrayState)> {
        self.arrays.iter()
    }

    /// Re-reads row counts after a write to `path`.
    ///
    /// Arrays at or below `path` were replaced and get fresh keys throughout, they are returned.
    /// Arrays above `path` only gain or lose trailing rows.
    pub fn sync(&mut self, path: &FieldPath, values: &Value) -> Vec<FieldPath> {
        let mut replaced = Vec::new();
        for (array, state) in self.arrays.iter_mut() {
            let len = array_len(values, array);
            if array.starts_with(path) {
                state.regenerate(len);
                replaced.push(array.clone());
            } else if path.starts_with(array) && state.len() != len {
                state.reconcile(len);
            }
        }
        replaced
    }

    pub fn remove_under(&mut self, path: &FieldPath) -> Vec<FieldPath> {
        let removed = self
            .arrays
            .keys()
            .filter(|array| array.starts_with(path))
            .cloned()
            .collect::<Vec<_>>();
        self.arrays
            .retain(|array, _| !array.starts_with(path));
        removed
    }

    /// Moves arrays nested in the rows of `array` along with their rows.
    pub fn rekey_nested(&mut self, array: &FieldPath, mapping: &HashMap<usize, usize>) {
        rekey_map(&mut self.arrays, array, mapping);
    }
}

pub(crate) fn array_len(values: &Value, path: &FieldPath) -> usize {
    match resolver::get(values, path) {
        Some(Value::Array(items)) => items.len(),
        _ => 0,
    }
}

/// Re-keys the entries of `map` that live in the rows of `array`, entries of removed rows are
/// dropped.
pub(crate) fn rekey_map<V>(map: &mut IndexMap<FieldPath, V>, array: &FieldPath, mapping: &HashMap<usize, usize>) {
    let entries = std::mem::take(map);
    for (path, value) in entries {
        match path.index_below(array) {
            Some(index) => {
                if let Some(new_index) = mapping.get(&index) {
                    map.insert(path.with_index_at(array.len(), *new_index), value);
                }
            }
            None => {
                map.insert(path, value);
            }
        }
    }
}

/// Applies `op` to the sparse array at `path` of `tree`, padding it to `len` rows first.
///
/// A leaf at `path` belongs to the array as a whole and is left in place.
pub(crate) fn permute_tree<T>(tree: &mut Tree<T>, path: &FieldPath, len: usize, op: &ArrayOp) {
    if matches!(tree.get(path), Some(Tree::Leaf(_))) {
        return;
    }
    let mut items = tree.take_array(path);
    items.resize_with(len.max(items.len()), Tree::new);
    op.apply(&mut items, Tree::new);
    tree.put_array(path, items);
}

/// Where to move the focus after rows were added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FocusOptions {
    /// Defaults to true.
    pub should_focus: Option<bool>,
    /// The row to focus, instead of the first added row.
    pub focus_index: Option<usize>,
    /// The field to focus, instead of the first field of the row.
    pub focus_name: Option<String>,
}

impl FocusOptions {
    pub fn none() -> Self {
        Self {
            should_focus: Some(false),
            ..Self::default()
        }
    }

    pub fn index(index: usize) -> Self {
        Self {
            focus_index: Some(index),
            ..Self::default()
        }
    }

    pub fn name(name: impl Into<String>) -> Self {
        Self {
            focus_name: Some(name.into()),
            ..Self::default()
        }
    }

    fn target(&self, array: &FieldPath, created: Option<usize>) -> Result<Option<FieldPath>, FormError> {
        if !self.should_focus.unwrap_or(true) {
            return Ok(None);
        }
        if let Some(name) = &self.focus_name {
            return Ok(Some(name.parse()?));
        }
        Ok(self
            .focus_index
            .or(created)
            .map(|index| array.join(index)))
    }
}

/// A handle on a field array, returned by [`Control::field_array`].
#[derive(Clone)]
pub struct FieldArray {
    control: Arc<Control>,
    name: String,
    path: FieldPath,
}

impl FieldArray {
    pub(crate) fn new(control: Arc<Control>, name: String, path: FieldPath) -> Self {
        Self {
            control,
            name,
            path,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The rows with their keys, in order.
    pub fn fields(&self) -> Vec<FieldArrayRow> {
        self.control
            .read(|store| store.array_rows(&self.path))
    }

    pub fn keys(&self) -> Vec<RowKey> {
        self.fields()
            .into_iter()
            .map(|row| row.key)
            .collect()
    }

    pub fn append(&self, rows: Vec<Value>, focus: FocusOptions) -> Task<Result<(), FormError>> {
        self.apply(ArrayOp::Append(rows.len()), ArrayAction::Append, rows, focus)
    }

    pub fn prepend(&self, rows: Vec<Value>, focus: FocusOptions) -> Task<Result<(), FormError>> {
        self.apply(ArrayOp::Prepend(rows.len()), ArrayAction::Prepend, rows, focus)
    }

    pub fn insert(&self, index: usize, rows: Vec<Value>, focus: FocusOptions) -> Task<Result<(), FormError>> {
        self.apply(ArrayOp::Insert(index, rows.len()), ArrayAction::Insert, rows, focus)
    }

    pub fn remove(&self, indexes: &[usize]) -> Task<Result<(), FormError>> {
        self.apply(
            ArrayOp::Remove(indexes.to_vec()),
            ArrayAction::Remove,
            Vec::new(),
            FocusOptions::none(),
        )
    }

    pub fn remove_all(&self) -> Task<Result<(), FormError>> {
        self.apply(ArrayOp::RemoveAll, ArrayAction::Remove, Vec::new(), FocusOptions::none())
    }

    pub fn swap(&self, a: usize, b: usize) -> Task<Result<(), FormError>> {
        self.apply(ArrayOp::Swap(a, b), ArrayAction::Swap, Vec::new(), FocusOptions::none())
    }

    pub fn move_row(&self, from: usize, to: usize) -> Task<Result<(), FormError>> {
        self.apply(ArrayOp::Move(from, to), ArrayAction::Move, Vec::new(), FocusOptions::none())
    }

    /// Replaces the row at `index`, the row gets a new key.
    pub fn update(&self, index: usize, row: Value) -> Task<Result<(), FormError>> {
        self.apply(ArrayOp::Update(index), ArrayAction::Update, vec![row], FocusOptions::none())
    }

    /// Replaces every row, all rows get new keys.
    pub fn replace(&self, rows: Vec<Value>) -> Task<Result<(), FormError>> {
        self.apply(ArrayOp::Replace(rows.len()), ArrayAction::Replace, rows, FocusOptions::none())
    }

    fn apply(&self, op: ArrayOp, action: ArrayAction, rows: Vec<Value>, focus: FocusOptions) -> Task<Result<(), FormError>> {
        self.control
            .apply_array_op(&self.path, &self.name, op, action, rows, focus)
    }
}

impl Control {
    pub(crate) fn apply_array_op(
        self: &Arc<Self>,
        path: &FieldPath,
        name: &str,
        op: ArrayOp,
        action: ArrayAction,
        rows: Vec<Value>,
        focus: FocusOptions,
    ) -> Task<Result<(), FormError>> {
        let plan = self.mutate(|store, outbox| {
            if !store.arrays.contains(path) {
                return Err(FormError::UnknownFieldArray(name.to_string()));
            }
            let len = array_len(&store.values, path);
            let focus_target = focus.target(path, op.created_index(len))?;
            trace!("Field array operation. name: {}, action: {}, rows: {}", name, action, len);

            // values, an emptied array stays an empty list
            let mut items = match resolver::get(&store.values, path) {
                Some(Value::Array(items)) => items.clone(),
                _ => Vec::new(),
            };
            let mut created = rows.into_iter();
            op.apply(&mut items, || created.next().unwrap_or(Value::Null));
            let len_after = items.len();
            resolver::set(&mut store.values, path, Value::Array(items));

            if let Some(state) = store.arrays.get_mut(path) {
                state.reconcile(len);
                state.apply(&op);
            }

            // per-row state follows the rows
            permute_tree(&mut store.errors, path, len, &op);
            permute_tree(&mut store.touched, path, len, &op);
            let mapping = op.mapping(len);
            // fields registered past the last row are not rows yet
            let removed = store
                .registry
                .rekey_array(path, |index| match index < len {
                    true => mapping.get(&index).copied(),
                    false => Some(index),
                });
            rekey_map(&mut store.validity, path, &mapping);
            rekey_map(&mut store.validating, path, &mapping);
            store
                .delayed
                .retain(|delayed, _| delayed.index_below(path).is_none());
            store.arrays.rekey_nested(path, &mapping);
            store.rekey_root_errors(path, &mapping);
            store.revisions.touch(path);

            for (_, field) in removed {
                outbox.detached.extend(field.handles());
            }

            store.recompute_dirty(path);

            outbox.name = Some(name.to_string());
            outbox.arrays.push(ArrayEvent {
                name: name.to_string(),
                action,
                rows: store.array_rows(path),
            });
            outbox.values_changed(Some(name), ChangeKind::ArrayAction);

            if let Some(target) = focus_target {
                store.pending_focus = Some(target);
                outbox.focus(store.resolve_pending_focus());
            }
            debug!("Applied field array operation. name: {}, action: {}, rows: {}", name, action, len_after);

            let validate = self
                .options
                .validate_after_array_action(store.is_submitted);
            Ok(match validate {
                true => store.plan(&self.options, Scope::Arrays(vec![path.clone()]), CommitMode::Errors {
                    delayed: false,
                }),
                false => None,
            })
        });

        match plan {
            Ok(Some(plan)) => self
                .run_plan(plan)
                .map(|result| result.map(|_| ())),
            Ok(None) => Task::done(Ok(())),
            Err(error) => Task::done(Err(error)),
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(ArrayOp::Append(2), vec![0, 1, 2, -1, -1])]
    #[case(ArrayOp::Prepend(1), vec![-1, 0, 1, 2])]
    #[case(ArrayOp::Insert(1, 1), vec![0, -1, 1, 2])]
    #[case(ArrayOp::Insert(9, 1), vec![0, 1, 2, -1])]
    #[case(ArrayOp::Remove(vec![2, 0, 7]), vec![1])]
    #[case(ArrayOp::RemoveAll, vec![])]
    #[case(ArrayOp::Swap(0, 2), vec![2, 1, 0])]
    #[case(ArrayOp::Swap(0, 3), vec![0, 1, 2])]
    #[case(ArrayOp::Move(0, 2), vec![1, 2, 0])]
    #[case(ArrayOp::Move(2, 0), vec![2, 0, 1])]
    #[case(ArrayOp::Move(0, 9), vec![1, 2, 0])]
    #[case(ArrayOp::Update(1), vec![0, -1, 2])]
    #[case(ArrayOp::Update(5), vec![0, 1, 2])]
    #[case(ArrayOp::Replace(1), vec![-1])]
    pub fn apply(#[case] op: ArrayOp, #[case] expected: Vec<i32>) {
        // given
        let mut items = vec![0, 1, 2];

        // when
        op.apply(&mut items, || -1);

        // then
        assert_eq!(items, expected);
    }

    #[test]
    pub fn mapping_follows_the_rows() {
        // given
        let op = ArrayOp::Remove(vec![1]);

        // when
        let mapping = op.mapping(3);

        // then
        assert_eq!(mapping, HashMap::from([(0, 0), (2, 1)]));
    }

    #[test]
    pub fn swap_twice_restores_keys() {
        // given
        let mut state = ArrayState::new(3, ArrayRules::default());
        let keys = state.keys();

        // when
        state.apply(&ArrayOp::Swap(0, 2));
        let swapped = state.keys();
        state.apply(&ArrayOp::Swap(0, 2));

        // then
        assert_eq!(swapped, vec![keys[2], keys[1], keys[0]]);
        assert_eq!(state.keys(), keys);
    }

    #[test]
    pub fn only_new_rows_get_new_keys() {
        // given
        let mut state = ArrayState::new(2, ArrayRules::default());
        let keys = state.keys();

        // when
        state.apply(&ArrayOp::Insert(1, 1));

        // then
        let after = state.keys();
        assert_eq!(after.len(), 3);
        assert_eq!(after[0], keys[0]);
        assert_eq!(after[2], keys[1]);
        assert!(!keys.contains(&after[1]));
    }

    #[test]
    pub fn permute_tree_moves_row_state() {
        // given
        let array: FieldPath = "items".parse().unwrap();
        let mut touched = Tree::new();
        touched.set_leaf(&"items.0.name".parse().unwrap(), true);
        touched.set_leaf(&"items.2.name".parse().unwrap(), true);

        // when
        permute_tree(&mut touched, &array, 3, &ArrayOp::Remove(vec![0]));

        // then
        assert_eq!(touched.leaves().len(), 1);
        assert_eq!(touched.leaf(&"items.1.name".parse().unwrap()), Some(&true));
    }

    #[test]
    pub fn rekey_map_drops_removed_rows() {
        // given
        let array: FieldPath = "items".parse().unwrap();
        let mut map = IndexMap::from([
            ("items.0.a".parse::<FieldPath>().unwrap(), 1),
            ("items.1.a".parse::<FieldPath>().unwrap(), 2),
            ("title".parse::<FieldPath>().unwrap(), 3),
        ]);

        // when
        rekey_map(&mut map, &array, &ArrayOp::Remove(vec![0]).mapping(2));

        // then
        assert_eq!(map.get(&"items.0.a".parse::<FieldPath>().unwrap()), Some(&2));
        assert_eq!(map.len(), 2);
    }
}
