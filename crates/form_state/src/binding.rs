use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use form_path::FieldPath;
use serde_json::Value;

use crate::control::Control;
use crate::element::{ChangeEvent, FieldElement};
use crate::error::FormError;
use crate::state::FieldState;
use crate::task::Task;

/// The view layer's handle on a registered field, returned by [`Control::register`].
///
/// Feed it the element's input with [`FieldBinding::on_change`] and [`FieldBinding::on_blur`],
/// and tell it when elements come and go with [`FieldBinding::attach`] and
/// [`FieldBinding::detach`].
#[derive(Clone)]
pub struct FieldBinding {
    control: Arc<Control>,
    name: String,
    path: FieldPath,
}

impl FieldBinding {
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

    pub fn on_change(&self, event: impl Into<ChangeEvent>) -> Task<Result<(), FormError>> {
        self.control
            .change_at(&self.path, &self.name, event.into())
    }

    pub fn on_blur(&self) -> Task<Result<(), FormError>> {
        self.control
            .blur_at(&self.path, &self.name)
    }

    /// Attaches a live element; checkbox and radio elements join the field's option group.
    pub fn attach(&self, element: FieldElement) {
        self.control
            .attach_at(&self.path, element);
    }

    pub fn detach(&self) {
        self.control.detach_at(&self.path);
    }

    pub fn value(&self) -> Option<Value> {
        self.control
            .read(|store| store.value(&self.path).cloned())
    }

    pub fn state(&self) -> FieldState {
        self.control
            .read(|store| store.field_state(&self.path))
    }
}

impl Debug for FieldBinding {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldBinding")
            .field("name", &self.name)
            .finish()
    }
}
