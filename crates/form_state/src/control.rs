//! The form controller.
//!
//! Every operation locks the store, mutates it, derives the new [`FormState`] and releases the
//! lock before anything is published.  Observers therefore always see a consistent state and may
//! call back into the controller.

use std::sync::Arc;
use std::time::Instant;

use form_path::{resolver, FieldPath, PathCache, Tree};
use form_reactive::{Subject, Subscription};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::binding::FieldBinding;
use crate::element::{ChangeEvent, FieldElement, Handle};
use crate::error::{FieldError, FormError};
use crate::field_array::{array_len, FieldArray};
use crate::options::{FormOptions, ResetFieldOptions, ResetOptions, SetValueOptions, UnregisterOptions};
use crate::registry::Attached;
use crate::rules::{ArrayRules, Rules};
use crate::state::{ArrayEvent, ChangeKind, FieldState, FormState, FormStateFlags, StateEvent, ValuesEvent};
use crate::store::{Outbox, Store};
use crate::task::Task;
use crate::validation::plan::{CommitMode, PassResult, Plan, Scope};

#[derive(Default)]
struct Subjects {
    values: Subject<ValuesEvent>,
    array: Subject<ArrayEvent>,
    state: Subject<StateEvent>,
}

/// Owns the state of one form.
///
/// Created with [`Control::new`] and shared as an `Arc`; field bindings, field arrays and
/// submit handlers keep a reference to it.
pub struct Control {
    pub(crate) options: FormOptions,
    paths: PathCache,
    store: Arc<Mutex<Store>>,
    subjects: Subjects,
}

impl Control {
    pub fn new(options: FormOptions) -> Arc<Self> {
        debug!("Creating form. mode: {}, re_validate_mode: {}", options.mode, options.re_validate_mode);
        let store = Store::new(&options);
        Arc::new(Self {
            options,
            paths: PathCache::new(),
            store: Arc::new(Mutex::new(store)),
            subjects: Subjects::default(),
        })
    }

    pub fn options(&self) -> &FormOptions {
        &self.options
    }

    pub(crate) fn path(&self, name: &str) -> Result<FieldPath, FormError> {
        Ok(self.paths.compile(name)?)
    }

    fn paths_for(&self, names: &[&str]) -> Result<Vec<FieldPath>, FormError> {
        names
            .iter()
            .map(|name| self.path(name))
            .collect()
    }

    pub(crate) fn read<R>(&self, f: impl FnOnce(&Store) -> R) -> R {
        let store = self.store.lock();
        f(&store)
    }

    /// Runs `f` with the store locked, then publishes what changed once the lock is released.
    pub(crate) fn mutate<R>(&self, f: impl FnOnce(&mut Store, &mut Outbox) -> R) -> R {
        let mut outbox = Outbox::default();
        let (result, values, state) = {
            let mut store = self.store.lock();
            let result = f(&mut store, &mut outbox);

            let interest = store.interest.flags();
            let state = match interest.is_empty() {
                true => None,
                false => {
                    let snapshot = store.snapshot(&self.options, interest);
                    let changed = snapshot.changes(&store.published) & interest;
                    match changed.is_empty() {
                        true => None,
                        false => {
                            let snapshot = Arc::new(snapshot);
                            store.published = snapshot.clone();
                            Some((changed, snapshot))
                        }
                    }
                }
            };
            let values = match outbox.values.is_empty() {
                true => None,
                false => Some(Arc::new(store.values.clone())),
            };
            (result, values, state)
        };

        self.deliver(outbox, values, state);
        result
    }

    fn deliver(&self, outbox: Outbox, values: Option<Arc<Value>>, state: Option<(FormStateFlags, Arc<FormState>)>) {
        for handle in outbox.detached {
            handle.detach();
        }
        for event in outbox.arrays {
            self.subjects.array.next(&event);
        }
        if let Some(values) = values {
            for (name, kind) in outbox.values {
                self.subjects.values.next(&ValuesEvent {
                    name,
                    kind,
                    values: values.clone(),
                });
            }
        }
        if let Some((changed, state)) = state {
            trace!("Publishing form state. changed: {:?}", changed);
            self.subjects.state.next(&StateEvent {
                name: outbox.name,
                changed,
                state,
            });
        }
        if let Some(handle) = outbox.focus {
            handle.focus();
        }
    }

    /// Runs a planned pass: marks its targets validating, awaits the work, commits the results.
    pub(crate) fn run_plan(self: &Arc<Self>, plan: Plan) -> Task<Result<PassResult, FormError>> {
        let control = self.clone();
        let Plan {
            meta,
            work,
        } = plan;

        Task::future(async move {
            control.mutate(|store, _| store.mark_validating(&meta));
            match work.await {
                Ok(outcome) => Ok(control.mutate(|store, _| store.commit(&meta, outcome, control.options.delay()))),
                Err(cause) => {
                    warn!("Validation failed. cause: {}", cause);
                    control.mutate(|store, _| store.unmark_validating(&meta));
                    Err(FormError::Resolver(cause))
                }
            }
        })
    }

    fn settle(self: &Arc<Self>, plan: Option<Plan>) -> Task<Result<(), FormError>> {
        match plan {
            Some(plan) => self
                .run_plan(plan)
                .map(|result| result.map(|_| ())),
            None => Task::done(Ok(())),
        }
    }

    /// A pass that only refreshes `is_valid`, planned when a subscriber reads it.
    fn validity_plan(&self, store: &mut Store) -> Option<Plan> {
        match store
            .interest
            .contains(FormStateFlags::IS_VALID)
        {
            true => store.plan(&self.options, Scope::All, CommitMode::Silent),
            false => None,
        }
    }

    //
    // registration
    //

    /// Registers a field, or merges `rules` into an existing registration.
    ///
    /// A field without a value is seeded from the default values, or from the rules' `value`.
    pub fn register(self: &Arc<Self>, name: &str, rules: Rules) -> Result<FieldBinding, FormError> {
        let path = self.path(name)?;
        self.mutate(|store, outbox| {
            if store.seed(&path, &rules) {
                outbox.values_changed(Some(name), ChangeKind::Register);
            }
            store
                .registry
                .register(&path, name, rules);
            outbox.name = Some(name.to_string());
        });
        Ok(FieldBinding::new(self.clone(), name.to_string(), path))
    }

    pub(crate) fn attach_at(&self, path: &FieldPath, element: FieldElement) {
        self.mutate(|store, outbox| {
            match store.registry.attach(path, element) {
                None => {
                    warn!("Attaching an element to an unregistered field. path: {}", path);
                    return;
                }
                Some(Attached::Option) => store.sync_options(path),
                Some(Attached::Element) | Some(Attached::Duplicate) => {}
            }
            if store
                .pending_focus
                .as_ref()
                .is_some_and(|prefix| path.starts_with(prefix))
            {
                outbox.focus(store.resolve_pending_focus());
            }
        });
    }

    /// The element of a field went away.
    ///
    /// Fields that should unregister are unregistered, the others keep their state but are no
    /// longer validated.
    pub(crate) fn detach_at(&self, path: &FieldPath) {
        let should_unregister = self.read(|store| {
            store.registry.get(path).map(|field| {
                field
                    .rules
                    .should_unregister
                    .unwrap_or(self.options.should_unregister)
            })
        });

        match should_unregister {
            None => {}
            Some(true) => self.unregister_paths(&[path.clone()], UnregisterOptions::default()),
            Some(false) => self.mutate(|store, _| {
                trace!("Unmounting field. path: {}", path);
                if let Some(field) = store.registry.get_mut(path) {
                    field.mounted = false;
                    field.element = None;
                    field.options.clear();
                }
                store.validity.shift_remove(path);
            }),
        }
    }

    pub fn unregister(&self, name: &str, options: UnregisterOptions) -> Result<(), FormError> {
        let path = self.path(name)?;
        self.unregister_paths(&[path], options);
        Ok(())
    }

    pub fn unregister_many(&self, names: &[&str], options: UnregisterOptions) -> Result<(), FormError> {
        let paths = self.paths_for(names)?;
        self.unregister_paths(&paths, options);
        Ok(())
    }

    /// Unregisters every field and field array.
    pub fn unregister_all(&self, options: UnregisterOptions) {
        let paths = self.read(|store| {
            let mut paths = store.registry.paths();
            paths.extend(store.arrays.iter().map(|(path, _)| path.clone()));
            paths
        });
        self.unregister_paths(&paths, options);
    }

    fn unregister_paths(&self, paths: &[FieldPath], options: UnregisterOptions) {
        self.mutate(|store, outbox| {
            for path in paths {
                let removed = store.registry.remove_under(path);
                let arrays = store.arrays.remove_under(path);
                debug!("Unregistering. path: {}, fields: {}, arrays: {}", path, removed.len(), arrays.len());

                if !options.keep_value {
                    store.remove_value(path);
                }
                if !options.keep_error {
                    store.errors.unset(path);
                    store.root_errors.retain(|name, _| {
                        name.parse::<FieldPath>()
                            .map_or(true, |existing| !existing.starts_with(path))
                    });
                }
                if !options.keep_dirty {
                    store.dirty.unset(path);
                }
                if !options.keep_touched {
                    store.touched.unset(path);
                }
                if !options.keep_is_valid {
                    store
                        .validity
                        .retain(|existing, _| !existing.starts_with(path));
                }
                if !self.options.should_unregister && !options.keep_default_value {
                    resolver::unset(&mut store.defaults, path);
                }
                store
                    .delayed
                    .retain(|existing, _| !existing.starts_with(path));
                store
                    .validating
                    .retain(|existing, _| !existing.starts_with(path));
                store.revisions.touch(path);

                outbox.values_changed(Some(&path.to_string()), ChangeKind::Unregister);
            }
        });
    }

    //
    // input
    //

    pub(crate) fn change_at(self: &Arc<Self>, path: &FieldPath, name: &str, event: ChangeEvent) -> Task<Result<(), FormError>> {
        let plan = self.mutate(|store, outbox| {
            let as_list = matches!(store.value(path), Some(Value::Array(_)));
            let Some(field) = store.registry.get_mut(path) else {
                debug!("Ignoring change of an unregistered field. name: {}", name);
                return None;
            };

            let value = match event {
                ChangeEvent::Checked {
                    option,
                    checked,
                } => {
                    let is_radio = field.is_radio();
                    for candidate in field.options.iter_mut() {
                        if candidate.value == option {
                            candidate.checked = checked;
                        } else if is_radio && checked {
                            candidate.checked = false;
                        }
                    }
                    field
                        .group_value(as_list)
                        .unwrap_or(Value::Null)
                }
                ChangeEvent::Value(value) => match field.is_text_like() {
                    true => field.rules.transform_input(value),
                    false => value,
                },
            };
            let rules = field.rules.clone();
            trace!("Field changed. name: {}, value: {}", name, value);

            let replaced = store.write_value(path, value);
            outbox
                .arrays
                .extend(store.sync_events(replaced));
            store.recompute_dirty(path);
            outbox.name = Some(name.to_string());
            outbox.values_changed(Some(name), ChangeKind::Change);

            let is_touched = store.touched.contains(path);
            let skip = rules.is_disabled()
                || self
                    .options
                    .skip_validation(false, is_touched, store.is_submitted);
            match skip {
                true => self.validity_plan(store),
                false => store.plan(
                    &self.options,
                    Scope::Paths(self.with_deps(path, &rules)),
                    CommitMode::Errors {
                        delayed: true,
                    },
                ),
            }
        });
        self.settle(plan)
    }

    pub(crate) fn blur_at(self: &Arc<Self>, path: &FieldPath, name: &str) -> Task<Result<(), FormError>> {
        let plan = self.mutate(|store, outbox| {
            let Some(rules) = store
                .registry
                .get(path)
                .map(|field| field.rules.clone())
            else {
                debug!("Ignoring blur of an unregistered field. name: {}", name);
                return None;
            };

            store.mark_touched(path);
            let flushed = store.flush_delayed(Instant::now(), true);
            if flushed > 0 {
                trace!("Flushed delayed errors on blur. errors: {}", flushed);
            }
            outbox.name = Some(name.to_string());

            let skip = rules.is_disabled()
                || self
                    .options
                    .skip_validation(true, true, store.is_submitted);
            match skip {
                true => self.validity_plan(store),
                false => store.plan(
                    &self.options,
                    Scope::Paths(self.with_deps(path, &rules)),
                    CommitMode::Errors {
                        delayed: true,
                    },
                ),
            }
        });
        self.settle(plan)
    }

    fn with_deps(&self, path: &FieldPath, rules: &Rules) -> Vec<FieldPath> {
        let mut paths = vec![path.clone()];
        for dep in rules.deps.iter() {
            match self.path(dep) {
                Ok(dep) => paths.push(dep),
                Err(cause) => warn!("Ignoring invalid dependency. name: {}, cause: {}", dep, cause),
            }
        }
        paths
    }

    //
    // values
    //

    /// Writes a value, optionally marking it dirty and touched and validating it.
    pub fn set_value(self: &Arc<Self>, name: &str, value: Value, options: SetValueOptions) -> Task<Result<(), FormError>> {
        let path = match self.path(name) {
            Ok(path) => path,
            Err(error) => return Task::done(Err(error)),
        };

        let plan = self.mutate(|store, outbox| {
            let replaced = store.write_value(&path, value);
            outbox
                .arrays
                .extend(store.sync_events(replaced));

            if options.should_dirty {
                store.recompute_dirty(&path);
            }
            if options.should_touch {
                let fields = store
                    .registry
                    .under(&path)
                    .map(|(field_path, _)| field_path.clone())
                    .collect::<Vec<_>>();
                match fields.is_empty() {
                    true => {
                        store.mark_touched(&path);
                    }
                    false => {
                        for field_path in fields.iter() {
                            store.mark_touched(field_path);
                        }
                    }
                }
            }
            outbox.name = Some(name.to_string());
            outbox.values_changed(Some(name), ChangeKind::SetValue);

            match options.should_validate {
                true => store.plan(&self.options, Scope::Paths(vec![path.clone()]), CommitMode::Errors {
                    delayed: false,
                }),
                false => self.validity_plan(store),
            }
        });
        self.settle(plan)
    }

    pub fn get_values(&self) -> Value {
        self.read(|store| store.values.clone())
    }

    pub fn get_value(&self, name: &str) -> Result<Option<Value>, FormError> {
        let path = self.path(name)?;
        Ok(self.read(|store| store.value(&path).cloned()))
    }

    pub fn get_values_for(&self, names: &[&str]) -> Result<Vec<Option<Value>>, FormError> {
        let paths = self.paths_for(names)?;
        Ok(self.read(|store| {
            paths
                .iter()
                .map(|path| store.value(path).cloned())
                .collect()
        }))
    }

    pub fn get_field_state(&self, name: &str) -> Result<FieldState, FormError> {
        let path = self.path(name)?;
        Ok(self.read(|store| store.field_state(&path)))
    }

    /// The current values of `names`.
    ///
    /// Missing values fall back to `default`, then to the form's default values.
    pub fn watch(&self, names: &[&str], default: Option<Value>) -> Result<Vec<Value>, FormError> {
        let paths = self.paths_for(names)?;
        Ok(self.read(|store| {
            paths
                .iter()
                .map(|path| {
                    store
                        .value(path)
                        .or(default.as_ref())
                        .or_else(|| store.default_value(path))
                        .cloned()
                        .unwrap_or(Value::Null)
                })
                .collect()
        }))
    }

    pub fn watch_all(&self) -> Value {
        self.get_values()
    }

    //
    // validation
    //

    /// Validates `names`, or the whole form, and returns whether they passed.
    ///
    /// With `should_focus` the first field with an error is focused when validation fails.
    pub fn trigger(self: &Arc<Self>, names: Option<&[&str]>, should_focus: bool) -> Task<Result<bool, FormError>> {
        let scope = match names {
            None => Scope::All,
            Some(names) => match self.paths_for(names) {
                Ok(paths) => Scope::Paths(paths),
                Err(error) => return Task::done(Err(error)),
            },
        };

        let plan = self.mutate(|store, _| {
            store.plan(&self.options, scope, CommitMode::Errors {
                delayed: false,
            })
        });
        let Some(plan) = plan else {
            return Task::done(Ok(true));
        };

        let control = self.clone();
        self.run_plan(plan).map(move |result: Result<PassResult, FormError>| -> Result<bool, FormError> {
            let valid = result?.valid;
            if !valid && should_focus {
                control.mutate(|store, outbox| outbox.focus(store.first_error_handle()));
            }
            Ok(valid)
        })
    }

    /// Re-computes `is_valid` without touching the visible errors.
    pub fn update_valid(self: &Arc<Self>) -> Task<Result<(), FormError>> {
        let plan = self.mutate(|store, _| store.plan(&self.options, Scope::All, CommitMode::Silent));
        self.settle(plan)
    }

    /// Commits the delayed errors whose delay has passed, returns how many were committed.
    pub fn flush_delayed_errors(&self) -> usize {
        self.mutate(|store, _| store.flush_delayed(Instant::now(), false))
    }

    /// Sets an error that validation neither replaces nor clears.
    pub fn set_error(&self, name: &str, error: FieldError, should_focus: bool) -> Result<(), FormError> {
        let path = self.path(name)?;
        self.mutate(|store, outbox| {
            store.delayed.shift_remove(&path);
            match store.arrays.contains(&path) {
                true => {
                    store
                        .root_errors
                        .insert(name.to_string(), error);
                }
                false => store.errors.set_leaf(&path, error),
            }
            outbox.name = Some(name.to_string());
            if should_focus {
                outbox.focus(
                    store
                        .registry
                        .get(&path)
                        .and_then(|field| field.focus_handle()),
                );
            }
        });
        Ok(())
    }

    /// Clears the errors of `names`, or every error.
    pub fn clear_errors(&self, names: Option<&[&str]>) -> Result<(), FormError> {
        let paths = names
            .map(|names| self.paths_for(names))
            .transpose()?;
        self.mutate(|store, _| match paths {
            None => {
                store.errors = Tree::new();
                store.root_errors.clear();
                store.delayed.clear();
            }
            Some(paths) => {
                for path in paths.iter() {
                    store.errors.unset(path);
                    store.root_errors.retain(|name, _| {
                        name.parse::<FieldPath>()
                            .map_or(true, |existing| !existing.starts_with(path))
                    });
                    store
                        .delayed
                        .retain(|existing, _| !existing.starts_with(path));
                }
            }
        });
        Ok(())
    }

    //
    // reset
    //

    /// Resets the form to `values`, or to the default values.
    ///
    /// Registrations survive a reset; validations in flight when the reset happens are discarded.
    pub fn reset(self: &Arc<Self>, values: Option<Value>, options: ResetOptions) -> Task<Result<(), FormError>> {
        let plan = self.mutate(|store, outbox| {
            let values = values.filter(|values| match values {
                Value::Object(map) => !map.is_empty(),
                Value::Null => false,
                _ => true,
            });
            debug!("Resetting form. values: {}", values.is_some());

            let next = values
                .clone()
                .unwrap_or_else(|| store.defaults.clone());
            if !options.keep_default_values {
                if let Some(values) = values {
                    store.defaults = values;
                }
            }

            if !options.keep_values {
                let mut next = next;
                if options.keep_dirty_values {
                    for (path, _) in store.registry.iter() {
                        if store.dirty.contains(path) {
                            if let Some(value) = store.value(path) {
                                resolver::set(&mut next, path, value.clone());
                            }
                        }
                    }
                }
                store.values = next;
                store.sync_options(&FieldPath::root());
            }

            let seeds = store
                .registry
                .iter()
                .map(|(path, field)| (path.clone(), field.rules.clone()))
                .collect::<Vec<_>>();
            for (path, rules) in seeds {
                store.seed(&path, &rules);
            }

            let replaced = store
                .arrays
                .sync(&FieldPath::root(), &store.values);
            outbox
                .arrays
                .extend(store.sync_events(replaced));

            if !options.keep_dirty {
                store.dirty = Tree::new();
                store.recompute_dirty(&FieldPath::root());
            }
            if !options.keep_touched {
                store.touched = Tree::new();
            }
            if !options.keep_errors {
                store.errors = Tree::new();
                store.root_errors.clear();
                store.delayed.clear();
            }
            if !options.keep_is_valid {
                store.validity.clear();
                store.schema_valid = None;
            }
            if !options.keep_is_submitted {
                store.is_submitted = false;
            }
            if !options.keep_submit_count {
                store.submit_count = 0;
            }
            if !options.keep_is_submit_successful {
                store.is_submit_successful = false;
            }
            store.is_submitting = false;
            store.pending_focus = None;
            store.validating.clear();
            store.revisions.reset();

            outbox.values_changed(None, ChangeKind::Reset);
            self.validity_plan(store)
        });
        self.settle(plan)
    }

    /// Resets one field to its default value.
    pub fn reset_field(self: &Arc<Self>, name: &str, options: ResetFieldOptions) -> Task<Result<(), FormError>> {
        let path = match self.path(name) {
            Ok(path) => path,
            Err(error) => return Task::done(Err(error)),
        };

        let plan = self.mutate(|store, outbox| {
            if !store.registry.contains(&path) && !store.arrays.contains(&path) {
                debug!("Ignoring reset of an unregistered field. name: {}", name);
                return None;
            }

            let default = match options.default_value {
                Some(value) => {
                    resolver::set(&mut store.defaults, &path, value.clone());
                    Some(value)
                }
                None => store.default_value(&path).cloned(),
            };
            let replaced = match default {
                Some(value) => store.write_value(&path, value),
                None => {
                    store.remove_value(&path);
                    Vec::new()
                }
            };
            outbox
                .arrays
                .extend(store.sync_events(replaced));

            match options.keep_dirty {
                true => store.recompute_dirty(&path),
                false => store.dirty.unset(&path),
            }
            if !options.keep_touched {
                store.touched.unset(&path);
            }
            if !options.keep_error {
                store.errors.unset(&path);
                store
                    .delayed
                    .retain(|existing, _| !existing.starts_with(&path));
                store
                    .validity
                    .retain(|existing, _| !existing.starts_with(&path));
            }

            outbox.name = Some(name.to_string());
            outbox.values_changed(Some(name), ChangeKind::ResetField);
            self.validity_plan(store)
        });
        self.settle(plan)
    }

    //
    // focus
    //

    pub fn set_focus(&self, name: &str, should_select: bool) -> Result<(), FormError> {
        let path = self.path(name)?;
        let handle: Option<Handle> = self.read(|store| {
            store
                .registry
                .get(&path)
                .and_then(|field| field.focus_handle())
        });
        match handle {
            Some(handle) => {
                handle.focus();
                if should_select {
                    handle.select();
                }
            }
            None => trace!("No element to focus. name: {}", name),
        }
        Ok(())
    }

    //
    // subscriptions
    //

    /// Observes value changes of `names`, or of every field.
    ///
    /// Without `exact` a change of a parent or child of a name matches too.  Changes of the whole
    /// tree, e.g. a reset, always match.
    pub fn subscribe_values(
        &self,
        names: Option<&[&str]>,
        exact: bool,
        observer: impl Fn(&ValuesEvent) + Send + Sync + 'static,
    ) -> Result<Subscription, FormError> {
        let filter = NameFilter::new(names.map(|names| self.paths_for(names)).transpose()?, exact);
        Ok(self.subjects.values.subscribe(move |event: &ValuesEvent| {
            if filter.matches(event.name.as_deref()) {
                observer(event)
            }
        }))
    }

    /// Observes changes of the parts of the form state named by `flags`.
    ///
    /// Only the parts named by the flags of live subscriptions are filled in the published
    /// [`StateEvent::state`].  Subscribing to [`FormStateFlags::IS_VALID`] makes the form keep
    /// `is_valid` current while fields change, even when the validation mode would not validate
    /// them, until the subscription is dropped.
    pub fn subscribe_form_state(
        &self,
        flags: FormStateFlags,
        names: Option<&[&str]>,
        exact: bool,
        observer: impl Fn(&StateEvent) + Send + Sync + 'static,
    ) -> Result<Subscription, FormError> {
        let filter = NameFilter::new(names.map(|names| self.paths_for(names)).transpose()?, exact);
        {
            let mut store = self.store.lock();
            store.interest.acquire(flags);
            let interest = store.interest.flags();
            store.published = Arc::new(store.snapshot(&self.options, interest));
        }

        let store = Arc::downgrade(&self.store);
        let subscription = self
            .subjects
            .state
            .subscribe(move |event: &StateEvent| {
                if event.changed.intersects(flags) && filter.matches(event.name.as_deref()) {
                    observer(event)
                }
            });
        Ok(subscription.on_unsubscribe(move || {
            if let Some(store) = store.upgrade() {
                trace!("Releasing form state interest. flags: {:?}", flags);
                store.lock().interest.release(flags);
            }
        }))
    }

    pub fn subscribe_array(&self, observer: impl Fn(&ArrayEvent) + Send + Sync + 'static) -> Subscription {
        self.subjects.array.subscribe(observer)
    }

    /// The current form state.
    pub fn form_state(&self) -> Arc<FormState> {
        self.read(|store| Arc::new(store.snapshot(&self.options, FormStateFlags::all())))
    }

    //
    // field arrays
    //

    /// Registers a field array, seeding it from the default values.
    pub fn field_array(self: &Arc<Self>, name: &str, rules: ArrayRules) -> Result<FieldArray, FormError> {
        let path = self.path(name)?;
        self.mutate(|store, outbox| {
            if store.value(&path).is_none() {
                if let Some(default) = store.default_value(&path).cloned() {
                    store.write_value(&path, default);
                    outbox.values_changed(Some(name), ChangeKind::Register);
                }
            }
            let len = array_len(&store.values, &path);
            store
                .arrays
                .register(&path, rules, len);
            outbox.name = Some(name.to_string());
        });
        Ok(FieldArray::new(self.clone(), name.to_string(), path))
    }
}

/// Matches event names against subscribed names.
struct NameFilter {
    paths: Option<Vec<FieldPath>>,
    exact: bool,
}

impl NameFilter {
    fn new(paths: Option<Vec<FieldPath>>, exact: bool) -> Self {
        Self {
            paths,
            exact,
        }
    }

    fn matches(&self, name: Option<&str>) -> bool {
        let (Some(paths), Some(name)) = (&self.paths, name) else {
            return true;
        };
        let Ok(path) = name.parse::<FieldPath>() else {
            return false;
        };
        paths.iter().any(|candidate| match self.exact {
            true => candidate == &path,
            false => candidate.overlaps(&path),
        })
    }
}
