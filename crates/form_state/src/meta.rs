//! Dirty, touched and validity bookkeeping, and the derived form state.

use form_path::{FieldPath, Tree};
use indexmap::IndexMap;
use serde_json::Value;

use crate::options::{FormOptions, Mode};
use crate::state::{FieldState, FormState, FormStateFlags};
use crate::store::Store;

impl Store {
    /// Re-diffs the value at `path` against its default.
    ///
    /// Leaves equal to their default are removed, so `dirty` never holds `false`.
    pub fn recompute_dirty(&mut self, path: &FieldPath) {
        let dirty = self
            .comparator
            .diff(self.default_value(path), self.value(path));
        self.dirty.set(path, dirty);
    }

    /// Returns true if the field was not touched before.
    pub fn mark_touched(&mut self, path: &FieldPath) -> bool {
        match self.touched.leaf(path) {
            Some(true) => false,
            _ => {
                self.touched.set_leaf(path, true);
                true
            }
        }
    }

    pub fn is_dirty(&self) -> bool {
        !self
            .comparator
            .equal(Some(&self.values), Some(&self.defaults))
    }

    /// The fields and field arrays whose rules must pass for the form to be valid.
    pub fn rule_bearing(&self, schema: bool) -> Vec<FieldPath> {
        let fields = self
            .registry
            .iter()
            .filter(|(_, field)| field.mounted && !field.rules.is_disabled() && (schema || field.rules.has_validation()))
            .map(|(path, _)| path.clone());
        let arrays = self
            .arrays
            .iter()
            .filter(|(_, state)| schema || state.rules.has_validation())
            .map(|(path, _)| path.clone());
        fields.chain(arrays).collect()
    }

    /// Before the first submission of an `OnSubmit` form the form is presumed valid until a
    /// validation fails; otherwise every rule-bearing field must have passed.
    pub fn is_valid(&self, options: &FormOptions) -> bool {
        if !self.errors.is_empty() || !self.root_errors.is_empty() {
            return false;
        }
        let presumed = options.mode == Mode::OnSubmit && !self.is_submitted;

        match (options.resolver.is_some(), presumed) {
            (true, true) => self.schema_valid != Some(false),
            (true, false) => self.schema_valid == Some(true),
            (false, true) => self
                .validity
                .values()
                .all(|valid| *valid),
            (false, false) => self
                .rule_bearing(false)
                .iter()
                .all(|path| self.validity.get(path) == Some(&true)),
        }
    }

    /// The form state with the parts named by `slices` filled in, the other parts are left at
    /// their defaults.
    pub fn snapshot(&self, options: &FormOptions, slices: FormStateFlags) -> FormState {
        let wants = |flag: FormStateFlags| slices.contains(flag);
        let mut validating_fields = Tree::new();
        if wants(FormStateFlags::VALIDATING_FIELDS) {
            for path in self.validating.keys() {
                validating_fields.set_leaf(path, true);
            }
        }

        FormState {
            values: match wants(FormStateFlags::VALUES) {
                true => self.values.clone(),
                false => Value::Null,
            },
            errors: match wants(FormStateFlags::ERRORS) {
                true => self.errors.clone(),
                false => Tree::new(),
            },
            dirty_fields: match wants(FormStateFlags::DIRTY_FIELDS) {
                true => self.dirty.clone(),
                false => Tree::new(),
            },
            touched_fields: match wants(FormStateFlags::TOUCHED_FIELDS) {
                true => self.touched.clone(),
                false => Tree::new(),
            },
            validating_fields,
            root_errors: match wants(FormStateFlags::ROOT_ERRORS) {
                true => self.root_errors.clone(),
                false => IndexMap::new(),
            },
            is_dirty: wants(FormStateFlags::IS_DIRTY) && self.is_dirty(),
            is_valid: wants(FormStateFlags::IS_VALID) && self.is_valid(options),
            is_validating: !self.validating.is_empty(),
            is_submitting: self.is_submitting,
            is_submitted: self.is_submitted,
            is_submit_successful: self.is_submit_successful,
            submit_count: self.submit_count,
        }
    }

    pub fn field_state(&self, path: &FieldPath) -> FieldState {
        let root_error = self.root_errors.get(&path.to_string());
        FieldState {
            invalid: self.errors.contains(path) || root_error.is_some(),
            is_dirty: self.dirty.contains(path),
            is_touched: self.touched.contains(path),
            is_validating: self
                .validating
                .keys()
                .any(|validating| validating.starts_with(path)),
            error: self
                .errors
                .leaf(path)
                .or(root_error)
                .cloned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::rules::Rules;

    fn path(name: &str) -> FieldPath {
        name.parse().unwrap()
    }

    #[test]
    pub fn dirty_follows_the_defaults() {
        // given
        let options = FormOptions::default().with_default_values(json!({"a": {"b": 1}}));
        let mut store = Store::new(&options);

        // when
        store.write_value(&path("a.b"), json!(5));
        store.recompute_dirty(&path("a.b"));

        // then
        assert_eq!(store.dirty.leaf(&path("a.b")), Some(&true));
        assert!(store.is_dirty());

        // when
        store.write_value(&path("a.b"), json!(1));
        store.recompute_dirty(&path("a.b"));

        // then
        assert!(store.dirty.is_empty());
        assert_eq!(store.dirty.get(&path("a")), None);
        assert!(!store.is_dirty());
    }

    #[test]
    pub fn touched_is_marked_once() {
        // given
        let mut store = Store::new(&FormOptions::default());

        // expect
        assert!(store.mark_touched(&path("a")));
        assert!(!store.mark_touched(&path("a")));
    }

    #[test]
    pub fn validity_requires_every_rule_bearing_field() {
        // given
        let options = FormOptions::default().with_mode(Mode::OnChange);
        let mut store = Store::new(&options);
        store
            .registry
            .register(&path("a"), "a", Rules::new().required("Required"));
        store
            .registry
            .register(&path("b"), "b", Rules::new());

        // expect
        assert!(!store.is_valid(&options));

        // when
        store.validity.insert(path("a"), true);

        // then
        assert!(store.is_valid(&options));
    }

    #[test]
    pub fn on_submit_forms_are_presumed_valid() {
        // given
        let options = FormOptions::default();
        let mut store = Store::new(&options);
        store
            .registry
            .register(&path("a"), "a", Rules::new().required("Required"));

        // expect
        assert!(store.is_valid(&options));

        // when
        store.validity.insert(path("a"), false);

        // then
        assert!(!store.is_valid(&options));
    }
}
