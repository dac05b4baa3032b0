use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use serde_json::Value;
use strum_macros::Display;

/// The view-side element behind a field.
///
/// Implemented by the view layer; the engine only focuses elements, asks whether they are still
/// part of the view and tells them to drop their listeners.
pub trait ElementHandle: Send + Sync {
    fn focus(&self);

    fn select(&self) {}

    fn is_connected(&self) -> bool {
        true
    }

    /// Remove any listeners the view attached for this field.
    fn detach(&self) {}
}

pub type Handle = Arc<dyn ElementHandle>;

/// A live element attached to a field.
///
/// Checkbox and radio elements are options of a group; the group value is derived from which
/// options are checked.
#[derive(Clone, Display)]
pub enum FieldElement {
    Text(Option<Handle>),
    /// A checkbox option, `value` is the value contributed when checked.
    Checkbox { value: Option<Value>, handle: Option<Handle> },
    Radio { value: Value, handle: Option<Handle> },
    MultiSelect(Option<Handle>),
    File(Option<Handle>),
    Custom(Option<Handle>),
}

impl FieldElement {
    pub fn text() -> Self {
        FieldElement::Text(None)
    }

    pub fn checkbox(value: impl Into<Value>) -> Self {
        FieldElement::Checkbox {
            value: Some(value.into()),
            handle: None,
        }
    }

    pub fn radio(value: impl Into<Value>) -> Self {
        FieldElement::Radio {
            value: value.into(),
            handle: None,
        }
    }

    pub fn with_handle(self, handle: Handle) -> Self {
        match self {
            FieldElement::Text(_) => FieldElement::Text(Some(handle)),
            FieldElement::Checkbox { value, .. } => FieldElement::Checkbox {
                value,
                handle: Some(handle),
            },
            FieldElement::Radio { value, .. } => FieldElement::Radio {
                value,
                handle: Some(handle),
            },
            FieldElement::MultiSelect(_) => FieldElement::MultiSelect(Some(handle)),
            FieldElement::File(_) => FieldElement::File(Some(handle)),
            FieldElement::Custom(_) => FieldElement::Custom(Some(handle)),
        }
    }

    pub fn handle(&self) -> Option<&Handle> {
        match self {
            FieldElement::Text(handle)
            | FieldElement::MultiSelect(handle)
            | FieldElement::File(handle)
            | FieldElement::Custom(handle) => handle.as_ref(),
            FieldElement::Checkbox { handle, .. } | FieldElement::Radio { handle, .. } => handle.as_ref(),
        }
    }

    pub fn is_option(&self) -> bool {
        matches!(self, FieldElement::Checkbox { .. } | FieldElement::Radio { .. })
    }

    /// The value that identifies an option within its group.
    pub(crate) fn option_value(&self) -> Option<Value> {
        match self {
            FieldElement::Checkbox { value, .. } => Some(value.clone().unwrap_or(Value::Null)),
            FieldElement::Radio { value, .. } => Some(value.clone()),
            _ => None,
        }
    }

    /// Text-like elements have their input transformed by `value_as_*` and `set_value_as`.
    pub(crate) fn is_text_like(&self) -> bool {
        matches!(self, FieldElement::Text(_) | FieldElement::Custom(_))
    }
}

impl Debug for FieldElement {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldElement::Checkbox { value, handle } => f
                .debug_struct("Checkbox")
                .field("value", value)
                .field("handle", &handle.is_some())
                .finish(),
            FieldElement::Radio { value, handle } => f
                .debug_struct("Radio")
                .field("value", value)
                .field("handle", &handle.is_some())
                .finish(),
            other => f
                .debug_tuple(&other.to_string())
                .field(&other.handle().is_some())
                .finish(),
        }
    }
}

/// Input delivered by the view layer to [`crate::FieldBinding::on_change`].
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// The new raw value of a text, select, file or custom element.
    Value(Value),
    /// A checkbox or radio option was checked or unchecked.
    Checked { option: Value, checked: bool },
}

impl From<Value> for ChangeEvent {
    fn from(value: Value) -> Self {
        ChangeEvent::Value(value)
    }
}

impl From<&str> for ChangeEvent {
    fn from(value: &str) -> Self {
        ChangeEvent::Value(Value::from(value))
    }
}
