use std::sync::Arc;

use bitflags::bitflags;
use form_path::Tree;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use strum_macros::Display;

use crate::error::FieldError;
use crate::field_array::FieldArrayRow;

bitflags! {
    /// The parts of [`FormState`] a subscriber reads.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FormStateFlags: u32 {
        const VALUES = 1 << 0;
        const ERRORS = 1 << 1;
        const DIRTY_FIELDS = 1 << 2;
        const TOUCHED_FIELDS = 1 << 3;
        const VALIDATING_FIELDS = 1 << 4;
        const IS_DIRTY = 1 << 5;
        const IS_VALID = 1 << 6;
        const IS_VALIDATING = 1 << 7;
        const IS_SUBMITTING = 1 << 8;
        const IS_SUBMITTED = 1 << 9;
        const IS_SUBMIT_SUCCESSFUL = 1 << 10;
        const SUBMIT_COUNT = 1 << 11;
        const ROOT_ERRORS = 1 << 12;
    }
}

/// An immutable snapshot of the form.
///
/// `errors`, `dirty_fields`, `touched_fields` and `validating_fields` mirror the shape of
/// `values`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormState {
    pub values: Value,
    pub errors: Tree<FieldError>,
    pub dirty_fields: Tree<bool>,
    pub touched_fields: Tree<bool>,
    pub validating_fields: Tree<bool>,
    /// Errors of field-array level rules, keyed by array name.
    pub root_errors: IndexMap<String, FieldError>,
    pub is_dirty: bool,
    pub is_valid: bool,
    pub is_validating: bool,
    pub is_submitting: bool,
    pub is_submitted: bool,
    pub is_submit_successful: bool,
    pub submit_count: u32,
}

impl FormState {
    /// The flags of the parts that differ between `self` and `other`.
    pub fn changes(&self, other: &FormState) -> FormStateFlags {
        let mut changed = FormStateFlags::empty();
        changed.set(FormStateFlags::VALUES, self.values != other.values);
        changed.set(FormStateFlags::ERRORS, self.errors != other.errors);
        changed.set(FormStateFlags::DIRTY_FIELDS, self.dirty_fields != other.dirty_fields);
        changed.set(FormStateFlags::TOUCHED_FIELDS, self.touched_fields != other.touched_fields);
        changed.set(FormStateFlags::VALIDATING_FIELDS, self.validating_fields != other.validating_fields);
        changed.set(FormStateFlags::ROOT_ERRORS, self.root_errors != other.root_errors);
        changed.set(FormStateFlags::IS_DIRTY, self.is_dirty != other.is_dirty);
        changed.set(FormStateFlags::IS_VALID, self.is_valid != other.is_valid);
        changed.set(FormStateFlags::IS_VALIDATING, self.is_validating != other.is_validating);
        changed.set(FormStateFlags::IS_SUBMITTING, self.is_submitting != other.is_submitting);
        changed.set(FormStateFlags::IS_SUBMITTED, self.is_submitted != other.is_submitted);
        changed.set(
            FormStateFlags::IS_SUBMIT_SUCCESSFUL,
            self.is_submit_successful != other.is_submit_successful,
        );
        changed.set(FormStateFlags::SUBMIT_COUNT, self.submit_count != other.submit_count);
        changed
    }
}

/// Per-field view of the form state.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldState {
    pub invalid: bool,
    pub is_dirty: bool,
    pub is_touched: bool,
    pub is_validating: bool,
    pub error: Option<FieldError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "camelCase")]
pub enum ChangeKind {
    Change,
    SetValue,
    Register,
    Unregister,
    Reset,
    ResetField,
    ArrayAction,
}

/// Published on the values subject whenever the value tree changes.
#[derive(Debug, Clone)]
pub struct ValuesEvent {
    /// The changed field, `None` when the whole tree may have changed.
    pub name: Option<String>,
    pub kind: ChangeKind,
    pub values: Arc<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "camelCase")]
pub enum ArrayAction {
    Append,
    Prepend,
    Insert,
    Remove,
    Swap,
    Move,
    Update,
    Replace,
    /// Rows re-read from the value tree, e.g. after `reset` or `set_value`.
    Sync,
}

/// Published on the array subject after a structural change of a field array.
#[derive(Debug, Clone)]
pub struct ArrayEvent {
    pub name: String,
    pub action: ArrayAction,
    pub rows: Vec<FieldArrayRow>,
}

/// Published on the state subject when any part of [`FormState`] changed.
#[derive(Debug, Clone)]
pub struct StateEvent {
    /// The field the change originated from, if any.
    pub name: Option<String>,
    pub changed: FormStateFlags,
    pub state: Arc<FormState>,
}
