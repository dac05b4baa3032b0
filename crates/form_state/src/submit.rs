//! Submission: validate everything, then hand the values to the valid or the invalid handler.

use std::sync::Arc;

use form_path::{resolver, FieldPath, Segment, Tree};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::control::Control;
use crate::error::{FieldError, FormError};
use crate::task::Task;
use crate::validation::plan::{CommitMode, Scope};
use crate::validation::resolver::ROOT_ERROR_KEY;
use crate::values::merge;

type ValidHandler = Arc<dyn Fn(Value) -> Task<anyhow::Result<()>> + Send + Sync>;
type InvalidHandler = Arc<dyn Fn(Tree<FieldError>) -> Task<anyhow::Result<()>> + Send + Sync>;

/// Submits the form, created by [`Control::handle_submit`].
///
/// Can be submitted any number of times; each submission validates the whole form first.
#[derive(Clone)]
pub struct SubmitHandler {
    control: Arc<Control>,
    on_valid: ValidHandler,
    on_invalid: Option<InvalidHandler>,
}

impl SubmitHandler {
    /// Called with the errors when the form is invalid.
    pub fn on_invalid(
        mut self,
        on_invalid: impl Fn(Tree<FieldError>) -> Task<anyhow::Result<()>> + Send + Sync + 'static,
    ) -> Self {
        self.on_invalid = Some(Arc::new(on_invalid));
        self
    }

    /// Validates the form and calls the matching handler.
    ///
    /// Returns the handler's failure, or the resolver's; invalid fields are not a failure.  The
    /// submission counters are updated however the submission ends.
    pub fn submit(&self) -> Task<Result<(), FormError>> {
        let control = self.control.clone();
        let on_valid = self.on_valid.clone();
        let on_invalid = self.on_invalid.clone();

        Task::future(async move {
            let plan = control.mutate(|store, _| {
                debug!("Submitting form. submit_count: {}", store.submit_count);
                store.is_submitting = true;
                store
                    .errors
                    .unset(&FieldPath::from(Segment::key(ROOT_ERROR_KEY)));
                store.plan(&control.options, Scope::All, CommitMode::Errors {
                    delayed: false,
                })
            });

            let schema_values = match plan {
                Some(plan) => match control.run_plan(plan).await {
                    Ok(result) => result.values,
                    Err(error) => {
                        control.mutate(|store, _| {
                            store.is_submitting = false;
                            store.is_submitted = true;
                            store.submit_count += 1;
                            store.is_submit_successful = false;
                        });
                        return Err(error);
                    }
                },
                None => None,
            };

            let (valid, values, errors) = control.mutate(|store, outbox| {
                let valid = store.errors.is_empty() && store.root_errors.is_empty();
                let mut values = match (schema_values, control.options.should_unregister) {
                    (Some(values), _) => values,
                    (None, true) => store.values.clone(),
                    (None, false) => merge(&store.defaults, &store.values),
                };
                // disabled fields are never submitted
                for (path, field) in store.registry.iter() {
                    if field.rules.is_disabled() {
                        resolver::unset(&mut values, path);
                    }
                }
                if !valid && control.options.should_focus_error {
                    outbox.focus(store.first_error_handle());
                }
                (valid, values, store.errors.clone())
            });

            let handled = match (valid, on_invalid) {
                (true, _) => on_valid(values).await,
                (false, Some(on_invalid)) => on_invalid(errors).await,
                (false, None) => Ok(()),
            };
            if let Err(cause) = &handled {
                warn!("Submit handler failed. cause: {}", cause);
            }

            control.mutate(|store, _| {
                store.is_submitting = false;
                store.is_submitted = true;
                store.submit_count += 1;
                store.is_submit_successful = valid && handled.is_ok();
                info!("Submitted form. valid: {}, submit_count: {}", valid, store.submit_count);
            });

            handled.map_err(FormError::Handler)
        })
    }
}

impl Control {
    /// Creates a submit handler that calls `on_valid` with the values of a valid form.
    pub fn handle_submit(
        self: &Arc<Self>,
        on_valid: impl Fn(Value) -> Task<anyhow::Result<()>> + Send + Sync + 'static,
    ) -> SubmitHandler {
        SubmitHandler {
            control: self.clone(),
            on_valid: Arc::new(on_valid),
            on_invalid: None,
        }
    }
}
