use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use form_path::{resolver, FieldPath, Segment, Tree};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::trace;

use crate::element::Handle;
use crate::error::FieldError;
use crate::field_array::{FieldArrayRow, FieldArrays};
use crate::options::FormOptions;
use crate::registry::Registry;
use crate::revision::Revisions;
use crate::rules::Rules;
use crate::state::{ArrayAction, ArrayEvent, ChangeKind, FormState, FormStateFlags};
use crate::values::Comparator;

/// The mutable state behind a [`crate::Control`], only touched with the store lock held.
pub(crate) struct Store {
    pub values: Value,
    pub defaults: Value,
    pub errors: Tree<FieldError>,
    pub dirty: Tree<bool>,
    pub touched: Tree<bool>,
    /// Number of in-flight validations per path.
    pub validating: IndexMap<FieldPath, usize>,
    pub root_errors: IndexMap<String, FieldError>,

    pub is_submitting: bool,
    pub is_submitted: bool,
    pub is_submit_successful: bool,
    pub submit_count: u32,

    /// The last validation verdict per field, and per field array.
    pub validity: IndexMap<FieldPath, bool>,
    /// The verdict of the last resolver pass over the whole tree.
    pub schema_valid: Option<bool>,

    pub registry: Registry,
    pub arrays: FieldArrays,
    pub revisions: Revisions,
    pub delayed: IndexMap<FieldPath, (Instant, FieldError)>,
    /// Prefix of the field to focus once it is attached.
    pub pending_focus: Option<FieldPath>,

    /// The flags state subscribers read.
    pub interest: Interest,
    pub published: Arc<FormState>,
    pub comparator: Comparator,
}

/// Reference counts of the [`FormStateFlags`] read by live state subscriptions.
#[derive(Debug, Default)]
pub(crate) struct Interest {
    counts: IndexMap<FormStateFlags, usize>,
    flags: FormStateFlags,
}

impl Interest {
    pub fn acquire(&mut self, flags: FormStateFlags) {
        for flag in flags.iter() {
            *self.counts.entry(flag).or_default() += 1;
        }
        self.flags |= flags;
    }

    pub fn release(&mut self, flags: FormStateFlags) {
        for flag in flags.iter() {
            let Some(count) = self.counts.get_mut(&flag) else {
                continue;
            };
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.counts.shift_remove(&flag);
                self.flags.remove(flag);
            }
        }
    }

    /// The union of the flags of every live subscription.
    pub fn flags(&self) -> FormStateFlags {
        self.flags
    }

    pub fn contains(&self, flags: FormStateFlags) -> bool {
        self.flags.contains(flags)
    }
}

impl Store {
    pub fn new(options: &FormOptions) -> Self {
        let defaults = match &options.default_values {
            Value::Object(_) => options.default_values.clone(),
            _ => Value::Object(Default::default()),
        };
        let values = match options.should_unregister {
            true => Value::Object(Default::default()),
            false => defaults.clone(),
        };

        Self {
            values,
            defaults,
            errors: Tree::new(),
            dirty: Tree::new(),
            touched: Tree::new(),
            validating: IndexMap::new(),
            root_errors: IndexMap::new(),
            is_submitting: false,
            is_submitted: false,
            is_submit_successful: false,
            submit_count: 0,
            validity: IndexMap::new(),
            schema_valid: None,
            registry: Registry::default(),
            arrays: FieldArrays::default(),
            revisions: Revisions::default(),
            delayed: IndexMap::new(),
            pending_focus: None,
            interest: Interest::default(),
            published: Arc::new(FormState::default()),
            comparator: Comparator::new(options.opaque_leaf.clone()),
        }
    }

    pub fn value(&self, path: &FieldPath) -> Option<&Value> {
        resolver::get(&self.values, path)
    }

    pub fn default_value(&self, path: &FieldPath) -> Option<&Value> {
        resolver::get(&self.defaults, path)
    }

    /// Writes a value and keeps option groups and field arrays in step with it.
    ///
    /// Returns the field arrays that were replaced by the write.
    pub fn write_value(&mut self, path: &FieldPath, value: Value) -> Vec<FieldPath> {
        let mut shrunk = Vec::new();
        if let Some(previous) = self.value(path) {
            shrunk_arrays(previous, &value, path, &mut shrunk);
        }
        match path.is_root() {
            true => self.values = value,
            false => resolver::set(&mut self.values, path, value),
        }
        for (array, len) in shrunk {
            self.prune_rows(&array, len);
        }
        self.revisions.touch(path);
        self.sync_options(path);
        self.arrays.sync(path, &self.values)
    }

    /// Drops the errors, touched and dirty flags, validity and pending validations of the rows
    /// of `array` at or past `len`.
    pub fn prune_rows(&mut self, array: &FieldPath, len: usize) {
        trace!("Pruning rows. array: {}, len: {}", array, len);
        let dropped = |path: &FieldPath| {
            path.index_below(array)
                .is_some_and(|index| index >= len)
        };
        prune_tree(&mut self.errors, dropped);
        prune_tree(&mut self.touched, dropped);
        prune_tree(&mut self.dirty, dropped);
        self.validity
            .retain(|path, _| !dropped(path));
        self.validating
            .retain(|path, _| !dropped(path));
        self.delayed
            .retain(|path, _| !dropped(path));
        self.root_errors.retain(|name, _| {
            !name
                .parse::<FieldPath>()
                .is_ok_and(|path| dropped(&path))
        });
    }

    pub fn remove_value(&mut self, path: &FieldPath) {
        resolver::unset(&mut self.values, path);
        self.revisions.touch(path);
        self.arrays.sync(path, &self.values);
    }

    /// Seeds a newly registered field from the defaults, or from the rules' initial value.
    pub fn seed(&mut self, path: &FieldPath, rules: &Rules) -> bool {
        if self.value(path).is_some() {
            return false;
        }
        let seed = self
            .default_value(path)
            .cloned()
            .or_else(|| rules.value.clone());
        match seed {
            Some(value) => {
                trace!("Seeding field value. path: {}", path);
                self.write_value(path, value);
                true
            }
            None => false,
        }
    }

    /// Updates the checked state of options of the fields overlapping `path`.
    pub fn sync_options(&mut self, path: &FieldPath) {
        for (field_path, field) in self.registry.iter_mut() {
            if !field.options.is_empty() && field_path.overlaps(path) {
                field.sync_options(resolver::get(&self.values, field_path));
            }
        }
    }

    pub fn array_rows(&self, path: &FieldPath) -> Vec<FieldArrayRow> {
        let Some(state) = self.arrays.get(path) else {
            return Vec::new();
        };
        let items = match self.value(path) {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        };
        state
            .keys()
            .into_iter()
            .zip(items.iter())
            .map(|(key, value)| FieldArrayRow {
                key,
                value: value.clone(),
            })
            .collect()
    }

    /// The array events for arrays whose rows were replaced by a write.
    pub fn sync_events(&self, replaced: Vec<FieldPath>) -> Vec<ArrayEvent> {
        replaced
            .into_iter()
            .map(|path| ArrayEvent {
                name: path.to_string(),
                action: ArrayAction::Sync,
                rows: self.array_rows(&path),
            })
            .collect()
    }

    /// Moves root errors of arrays nested in the rows of `array` along with their rows.
    pub fn rekey_root_errors(&mut self, array: &FieldPath, mapping: &HashMap<usize, usize>) {
        let entries = std::mem::take(&mut self.root_errors);
        for (name, error) in entries {
            let nested = name
                .parse::<FieldPath>()
                .ok()
                .and_then(|path| path.index_below(array).map(|index| (path, index)));
            match nested {
                Some((path, index)) => {
                    if let Some(new_index) = mapping.get(&index) {
                        self.root_errors.insert(
                            path.with_index_at(array.len(), *new_index)
                                .to_string(),
                            error,
                        );
                    }
                }
                None => {
                    self.root_errors.insert(name, error);
                }
            }
        }
    }

    /// Writes a computed error, manual errors are never replaced or cleared by validation.
    pub fn write_error(&mut self, path: &FieldPath, error: Option<FieldError>) {
        if self
            .errors
            .leaf(path)
            .is_some_and(FieldError::is_manual)
        {
            return;
        }
        self.delayed.shift_remove(path);
        match error {
            Some(error) => self.errors.set_leaf(path, error),
            None => {
                if matches!(self.errors.get(path), Some(Tree::Leaf(_))) {
                    self.errors.unset(path);
                }
            }
        }
    }

    /// Commits delayed errors whose delay has passed, or all of them.
    pub fn flush_delayed(&mut self, now: Instant, all: bool) -> usize {
        let due = self
            .delayed
            .iter()
            .filter(|(_, (deadline, _))| all || *deadline <= now)
            .map(|(path, _)| path.clone())
            .collect::<Vec<_>>();
        for path in due.iter() {
            if let Some((_, error)) = self.delayed.shift_remove(path) {
                self.write_error(path, Some(error));
            }
        }
        due.len()
    }

    /// Focuses the pending focus target if a field below it has an element.
    pub fn resolve_pending_focus(&mut self) -> Option<Handle> {
        let prefix = self.pending_focus.as_ref()?;
        let handle = self
            .registry
            .under(prefix)
            .find_map(|(_, field)| field.focus_handle())?;
        self.pending_focus = None;
        Some(handle)
    }

    /// The element of the first field with an error, in registration order.
    pub fn first_error_handle(&self) -> Option<Handle> {
        self.registry
            .iter()
            .filter(|(path, field)| !field.rules.is_disabled() && self.errors.contains(path))
            .find_map(|(_, field)| field.focus_handle())
    }
}

/// Notifications collected while the store is locked, delivered once it is released.
#[derive(Default)]
pub(crate) struct Outbox {
    /// The field the change originated from.
    pub name: Option<String>,
    pub values: Vec<(Option<String>, ChangeKind)>,
    pub arrays: Vec<ArrayEvent>,
    pub focus: Option<Handle>,
    pub detached: Vec<Handle>,
}

impl Outbox {
    pub fn values_changed(&mut self, name: Option<&str>, kind: ChangeKind) {
        self.values
            .push((name.map(str::to_string), kind));
    }

    pub fn focus(&mut self, handle: Option<Handle>) {
        if handle.is_some() {
            self.focus = handle;
        }
    }
}

/// Collects the arrays of `previous` that `next` replaces with fewer rows, with their new length.
fn shrunk_arrays(previous: &Value, next: &Value, at: &FieldPath, shrunk: &mut Vec<(FieldPath, usize)>) {
    match previous {
        Value::Array(before) => {
            let after = match next {
                Value::Array(items) => items.as_slice(),
                _ => &[],
            };
            if after.len() < before.len() {
                shrunk.push((at.clone(), after.len()));
            }
            for (index, (before, after)) in before.iter().zip(after).enumerate() {
                shrunk_arrays(before, after, &at.join(Segment::Index(index)), shrunk);
            }
        }
        Value::Object(before) => {
            let Value::Object(after) = next else {
                return;
            };
            for (key, before) in before {
                if let Some(after) = after.get(key) {
                    shrunk_arrays(before, after, &at.join(Segment::key(key)), shrunk);
                }
            }
        }
        _ => {}
    }
}

fn prune_tree<T>(tree: &mut Tree<T>, dropped: impl Fn(&FieldPath) -> bool) {
    let paths = tree
        .leaves()
        .into_iter()
        .map(|(path, _)| path)
        .filter(|path| dropped(path))
        .collect::<Vec<_>>();
    for path in paths {
        tree.unset(&path);
    }
}
