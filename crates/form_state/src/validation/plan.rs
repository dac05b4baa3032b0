//! Validation passes: planned with the store locked, run without it, committed with it again.
//!
//! Fields whose rules are all synchronous are checked and committed while the pass is planned, so
//! their errors are current even when the returned task is never polled.  Only asynchronous
//! validators and the resolver are left to the task.
//!
//! A plan captures a [`Stamp`] of the write history.  When the pass completes, results for paths
//! written since the stamp are discarded, so a slow validation never overwrites the outcome of a
//! newer edit.

use std::sync::Arc;
use std::time::{Duration, Instant};

use form_path::FieldPath;
use serde_json::Value;
use tracing::{debug, trace};

use crate::error::FieldError;
use crate::options::FormOptions;
use crate::revision::Stamp;
use crate::store::Store;
use crate::task::Task;
use crate::validation::resolver::{ResolverOptions, ResolverResult};
use crate::validation::{evaluate_now, lookup_error, validate_fields, FieldCheck, Subject};

/// What a pass validates.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Scope {
    All,
    /// The fields and field arrays at or below these paths.
    Paths(Vec<FieldPath>),
    /// The rules of these field arrays only.
    Arrays(Vec<FieldPath>),
}

impl Scope {
    fn contains_field(&self, path: &FieldPath) -> bool {
        match self {
            Scope::All => true,
            Scope::Paths(prefixes) => prefixes
                .iter()
                .any(|prefix| path.starts_with(prefix)),
            Scope::Arrays(_) => false,
        }
    }

    fn contains_array(&self, path: &FieldPath) -> bool {
        match self {
            Scope::All => true,
            Scope::Paths(prefixes) => prefixes
                .iter()
                .any(|prefix| path.starts_with(prefix)),
            Scope::Arrays(arrays) => arrays.contains(path),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CommitMode {
    /// Results are written to the errors, `delayed` holds new errors back by the configured delay.
    Errors { delayed: bool },
    /// Only the validity is recorded, the visible errors are left alone.
    Silent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    path: FieldPath,
    is_array: bool,
}

pub(crate) enum Outcome {
    Native(Vec<Option<FieldError>>),
    Schema(ResolverResult),
}

#[derive(Debug, Clone)]
pub(crate) struct PlanMeta {
    stamp: Stamp,
    targets: Vec<Target>,
    scope: Scope,
    mode: CommitMode,
    /// False when a target checked during planning failed.
    eager_valid: bool,
}

pub(crate) struct Plan {
    pub meta: PlanMeta,
    pub work: Task<anyhow::Result<Outcome>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct PassResult {
    pub valid: bool,
    /// The values produced by a resolver.
    pub values: Option<Value>,
}

impl Store {
    /// Plans a validation pass, `None` when there is nothing to validate.
    pub fn plan(&mut self, options: &FormOptions, scope: Scope, mode: CommitMode) -> Option<Plan> {
        let schema = options.resolver.is_some();

        let fields = self
            .registry
            .iter()
            .filter(|(path, field)| {
                scope.contains_field(path)
                    && field.mounted
                    && !field.rules.is_disabled()
                    && (schema || field.rules.has_validation())
            })
            .map(|(path, _)| Target {
                path: path.clone(),
                is_array: false,
            });
        let arrays = self
            .arrays
            .iter()
            .filter(|(path, state)| scope.contains_array(path) && (schema || state.rules.has_validation()))
            .map(|(path, _)| Target {
                path: path.clone(),
                is_array: true,
            });
        let mut targets = fields.chain(arrays).collect::<Vec<_>>();
        let stamp = self.revisions.stamp();
        let mut eager_valid = true;

        let work = match &options.resolver {
            Some(resolver) => {
                let names = match scope {
                    Scope::All => None,
                    _ => Some(
                        targets
                            .iter()
                            .map(|target| target.path.to_string())
                            .collect(),
                    ),
                };
                let resolver_options = ResolverOptions {
                    names,
                    criteria_mode: options.criteria_mode,
                    fields: self
                        .registry
                        .iter()
                        .map(|(_, field)| field.name.clone())
                        .collect(),
                };
                resolver
                    .resolve(self.values.clone(), options.context.clone(), resolver_options)
                    .map(|result| result.map(Outcome::Schema))
            }
            None => {
                let (checked, checks): (Vec<_>, Vec<_>) = targets
                    .into_iter()
                    .filter_map(|target| self.check(&target).map(|check| (target, check)))
                    .unzip();
                if checked.is_empty() {
                    return None;
                }

                let (now, later): (Vec<_>, Vec<_>) = checked
                    .into_iter()
                    .zip(checks)
                    .partition(|(_, check)| check.rules.is_synchronous());
                let eager = PlanMeta {
                    stamp,
                    targets: Vec::new(),
                    scope: scope.clone(),
                    mode,
                    eager_valid: true,
                };
                let delay = match mode {
                    CommitMode::Errors { delayed: true } => options.delay(),
                    _ => None,
                };
                for (target, check) in now {
                    let error = evaluate_now(&check, &self.values, options.criteria_mode);
                    trace!("Validated field. path: {}, error: {:?}", check.path, error);
                    eager_valid &= error.is_none();
                    self.commit_target(&eager, &target, &target.path, error, delay);
                }

                let (deferred, checks): (Vec<_>, Vec<_>) = later.into_iter().unzip();
                targets = deferred;
                validate_fields(checks, Arc::new(self.values.clone()), options.criteria_mode).map(|results| {
                    Ok(Outcome::Native(
                        results
                            .into_iter()
                            .map(|(_, error)| error)
                            .collect(),
                    ))
                })
            }
        };

        if schema && targets.is_empty() && scope != Scope::All {
            return None;
        }

        trace!("Planned validation. deferred targets: {}, mode: {:?}", targets.len(), mode);
        Some(Plan {
            meta: PlanMeta {
                stamp,
                targets,
                scope,
                mode,
                eager_valid,
            },
            work,
        })
    }

    fn check(&self, target: &Target) -> Option<FieldCheck> {
        let value = self.value(&target.path).cloned();
        match target.is_array {
            true => {
                let state = self.arrays.get(&target.path)?;
                Some(FieldCheck {
                    path: target.path.clone(),
                    rules: Arc::new(state.rules.to_rules()),
                    subject: Subject::ArrayRoot,
                    value,
                })
            }
            false => {
                let field = self.registry.get(&target.path)?;
                let subject = match field.is_checkbox() || field.is_radio() {
                    true => Subject::Group {
                        checked: field
                            .options
                            .iter()
                            .any(|option| option.checked),
                    },
                    false => Subject::Field,
                };
                Some(FieldCheck {
                    path: target.path.clone(),
                    rules: field.rules.clone(),
                    subject,
                    value,
                })
            }
        }
    }

    pub fn mark_validating(&mut self, meta: &PlanMeta) {
        if meta.mode == CommitMode::Silent || !self.revisions.is_same_generation(meta.stamp) {
            return;
        }
        for target in meta.targets.iter() {
            *self
                .validating
                .entry(target.path.clone())
                .or_default() += 1;
        }
    }

    pub fn unmark_validating(&mut self, meta: &PlanMeta) {
        if meta.mode == CommitMode::Silent || !self.revisions.is_same_generation(meta.stamp) {
            return;
        }
        for target in meta.targets.iter() {
            if let Some(count) = self.validating.get_mut(&target.path) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    self.validating.shift_remove(&target.path);
                }
            }
        }
    }

    /// Commits the results of a pass, skipping every path written since the pass was planned.
    pub fn commit(&mut self, meta: &PlanMeta, outcome: Outcome, delay: Option<Duration>) -> PassResult {
        self.unmark_validating(meta);
        let delay = match meta.mode {
            CommitMode::Errors { delayed: true } => delay,
            _ => None,
        };

        match outcome {
            Outcome::Native(errors) => {
                let valid = meta.eager_valid && errors.iter().all(Option::is_none);
                for (target, error) in meta.targets.iter().zip(errors) {
                    self.commit_target(meta, target, &target.path, error, delay);
                }
                PassResult {
                    valid,
                    values: None,
                }
            }
            Outcome::Schema(result) => {
                if self
                    .revisions
                    .unchanged_since(&FieldPath::root(), meta.stamp)
                {
                    self.schema_valid = Some(result.is_valid());
                }
                let valid = match meta.scope {
                    Scope::All => result.is_valid(),
                    _ => true,
                };

                if meta.scope == Scope::All && matches!(meta.mode, CommitMode::Errors { .. }) {
                    self.replace_errors(meta, &result);
                    return PassResult {
                        valid,
                        values: Some(result.values),
                    };
                }

                // errors reported on an ancestor object belong to the field below it
                let resolved = meta
                    .targets
                    .iter()
                    .map(|target| match target.is_array {
                        true => (target.path.clone(), result.errors.leaf(&target.path).cloned()),
                        false => {
                            let is_other_field =
                                |path: &FieldPath| path != &target.path && self.registry.contains(path);
                            let (previous, _) = lookup_error(&self.errors, &target.path, is_other_field);
                            lookup_error(&result.errors, &previous, is_other_field)
                        }
                    })
                    .collect::<Vec<_>>();

                let mut all_valid = valid;
                for (target, (path, error)) in meta.targets.iter().zip(resolved) {
                    all_valid &= error.is_none();
                    self.commit_target(meta, target, &path, error, delay);
                }
                PassResult {
                    valid: all_valid,
                    values: Some(result.values),
                }
            }
        }
    }

    fn commit_target(
        &mut self,
        meta: &PlanMeta,
        target: &Target,
        error_path: &FieldPath,
        error: Option<FieldError>,
        delay: Option<Duration>,
    ) {
        if !self
            .revisions
            .unchanged_since(&target.path, meta.stamp)
        {
            debug!("Discarding stale validation result. path: {}", target.path);
            return;
        }
        self.validity
            .insert(target.path.clone(), error.is_none());

        if meta.mode == CommitMode::Silent {
            return;
        }
        if target.is_array || self.arrays.contains(error_path) {
            let name = error_path.to_string();
            match error {
                Some(error) => self.root_errors.insert(name, error),
                None => self.root_errors.shift_remove(&name),
            };
            return;
        }

        match (error, delay) {
            (Some(error), Some(delay)) => {
                if !self
                    .errors
                    .leaf(error_path)
                    .is_some_and(FieldError::is_manual)
                {
                    self.delayed
                        .insert(error_path.clone(), (Instant::now() + delay, error));
                }
            }
            (error, _) => self.write_error(error_path, error),
        }
    }

    /// Replaces the computed errors with a whole-form resolver result.
    fn replace_errors(&mut self, meta: &PlanMeta, result: &ResolverResult) {
        let stamp = meta.stamp;
        let arrays = self
            .arrays
            .iter()
            .map(|(path, _)| path.clone())
            .collect::<Vec<_>>();

        let stale = self
            .errors
            .leaves()
            .into_iter()
            .filter(|(path, error)| !error.is_manual() && result.errors.leaf(path).is_none())
            .map(|(path, _)| path)
            .collect::<Vec<_>>();
        for path in stale {
            if self.revisions.unchanged_since(&path, stamp) {
                self.write_error(&path, None);
            }
        }

        for (path, error) in result.errors.leaves() {
            if !self.revisions.unchanged_since(&path, stamp) {
                continue;
            }
            match arrays.contains(&path) {
                true => {
                    self.root_errors
                        .insert(path.to_string(), error.clone());
                }
                false => self.write_error(&path, Some(error.clone())),
            }
        }
        for array in arrays.iter() {
            if result.errors.leaf(array).is_none() && self.revisions.unchanged_since(array, stamp) {
                self.root_errors
                    .shift_remove(&array.to_string());
            }
        }

        for target in meta.targets.iter() {
            if self
                .revisions
                .unchanged_since(&target.path, stamp)
            {
                let valid = !result.errors.contains(&target.path);
                self.validity
                    .insert(target.path.clone(), valid);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;
    use crate::rules::{Rules, Validator, Verdict};

    fn path(name: &str) -> FieldPath {
        name.parse().unwrap()
    }

    fn store_with_required_field(options: &FormOptions) -> Store {
        let mut store = Store::new(options);
        store
            .registry
            .register(&path("name"), "name", Rules::new().required("Required"));
        store
    }

    fn store_with_remote_check(options: &FormOptions) -> Store {
        let available = Validator::future(|value, _values| {
            let taken = value.as_str() == Some("taken");
            Task::future(async move {
                match taken {
                    true => Verdict::Invalid("Taken".to_string()),
                    false => Verdict::Valid,
                }
            })
        });
        let mut store = Store::new(options);
        store
            .registry
            .register(&path("name"), "name", Rules::new().validate(available));
        store.write_value(&path("name"), json!("taken"));
        store
    }

    #[test]
    pub fn synchronous_rules_are_committed_while_planning() {
        // given
        let options = FormOptions::default();
        let mut store = store_with_required_field(&options);

        // when
        let plan = store
            .plan(&options, Scope::All, CommitMode::Errors {
                delayed: false,
            })
            .unwrap();

        // then
        assert_eq!(store.errors.leaf(&path("name")).map(|error| error.kind.clone()), Some(ErrorKind::Required));
        assert_eq!(store.validity.get(&path("name")), Some(&false));

        // when
        let outcome = block_on(plan.work).unwrap();
        let result = store.commit(&plan.meta, outcome, None);

        // then
        assert!(!result.valid);
    }

    #[test]
    pub fn results_for_rewritten_paths_are_discarded() {
        // given
        let options = FormOptions::default();
        let mut store = store_with_remote_check(&options);
        let plan = store
            .plan(&options, Scope::All, CommitMode::Errors {
                delayed: false,
            })
            .unwrap();

        // when
        store.write_value(&path("name"), json!("Ann"));
        let outcome = block_on(plan.work).unwrap();
        let result = store.commit(&plan.meta, outcome, None);

        // then
        assert!(!result.valid);
        assert!(store.errors.is_empty());
        assert!(store.validity.is_empty());
    }

    #[test]
    pub fn current_results_are_committed() {
        // given
        let options = FormOptions::default();
        let mut store = store_with_remote_check(&options);
        let plan = store
            .plan(&options, Scope::Paths(vec![path("name")]), CommitMode::Errors {
                delayed: false,
            })
            .unwrap();
        assert!(store.errors.is_empty());

        // when
        store.mark_validating(&plan.meta);
        let validating = !store.validating.is_empty();
        let outcome = block_on(plan.work).unwrap();
        store.commit(&plan.meta, outcome, None);

        // then
        assert!(validating);
        assert!(store.validating.is_empty());
        assert_eq!(
            store.errors.leaf(&path("name")).map(|error| error.kind.clone()),
            Some(ErrorKind::Validate)
        );
        assert_eq!(store.validity.get(&path("name")), Some(&false));
    }

    #[test]
    pub fn silent_passes_leave_errors_alone() {
        // given
        let options = FormOptions::default();
        let mut store = store_with_required_field(&options);
        let plan = store
            .plan(&options, Scope::All, CommitMode::Silent)
            .unwrap();

        // when
        let outcome = block_on(plan.work).unwrap();
        store.commit(&plan.meta, outcome, None);

        // then
        assert!(store.errors.is_empty());
        assert_eq!(store.validity.get(&path("name")), Some(&false));
    }

    #[test]
    pub fn manual_errors_survive_validation() {
        // given
        let options = FormOptions::default();
        let mut store = store_with_required_field(&options);
        store
            .errors
            .set_leaf(&path("name"), FieldError::manual("Taken"));
        store.write_value(&path("name"), json!("Ann"));
        let plan = store
            .plan(&options, Scope::All, CommitMode::Errors {
                delayed: false,
            })
            .unwrap();

        // when
        let outcome = block_on(plan.work).unwrap();
        store.commit(&plan.meta, outcome, None);

        // then
        assert_eq!(store.errors.leaf(&path("name")), Some(&FieldError::manual("Taken")));
    }

    #[test]
    pub fn delayed_errors_wait_for_a_flush() {
        // given
        let options = FormOptions::default();
        let mut store = store_with_remote_check(&options);
        let plan = store
            .plan(&options, Scope::All, CommitMode::Errors {
                delayed: true,
            })
            .unwrap();

        // when
        let outcome = block_on(plan.work).unwrap();
        store.commit(&plan.meta, outcome, Some(Duration::from_secs(60)));

        // then
        assert!(store.errors.is_empty());
        assert_eq!(store.flush_delayed(Instant::now(), false), 0);
        assert_eq!(store.flush_delayed(Instant::now(), true), 1);
        assert!(store.errors.contains(&path("name")));
    }
}
