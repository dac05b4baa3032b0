//! A reactive form-state engine.
//!
//! A [`Control`] owns the values of a form together with everything derived from them: field
//! errors, dirty and touched flags, validation progress and submission state.  The view layer
//! registers fields, feeds their input into [`FieldBinding`]s and subscribes to the changes it
//! renders.
//!
//! ```rust
//! use futures::executor::block_on;
//! use serde_json::json;
//! use form_state::{Control, FormOptions, Mode, Rules};
//!
//! let control = Control::new(FormOptions::default().with_mode(Mode::OnChange));
//! let name = control.register("name", Rules::new().required("Name is required")).unwrap();
//!
//! block_on(name.on_change(json!(""))).unwrap();
//! assert_eq!(name.state().error.unwrap().message, "Name is required");
//!
//! block_on(name.on_change("Ann")).unwrap();
//! assert!(control.form_state().is_valid);
//! ```

mod binding;
mod control;
mod element;
mod error;
mod field_array;
mod meta;
mod options;
mod registry;
mod revision;
mod rules;
mod state;
mod store;
mod submit;
mod task;
mod validation;
mod values;


pub use binding::FieldBinding;
pub use control::Control;
pub use element::{ChangeEvent, ElementHandle, FieldElement, Handle};
pub use error::{ErrorKind, FieldError, FormError};
pub use field_array::{FieldArray, FieldArrayRow, FocusOptions, RowKey};
pub use options::{
    CriteriaMode, FormOptions, Mode, OpaqueLeaf, ReValidateMode, ResetFieldOptions, ResetOptions, SetValueOptions,
    UnregisterOptions,
};
pub use rules::{ArrayRules, Bound, LengthBound, Pattern, Rules, Transform, Validator, Verdict};
pub use state::{
    ArrayAction, ArrayEvent, ChangeKind, FieldState, FormState, FormStateFlags, StateEvent, ValuesEvent,
};
pub use submit::SubmitHandler;
pub use task::Task;
pub use validation::resolver::{Resolver, ResolverOptions, ResolverResult, ValidatorResolver, ROOT_ERROR_KEY};

pub use form_path::{FieldPath, PathError, Tree};
pub use form_reactive::{Subscription, SubscriptionBag};
