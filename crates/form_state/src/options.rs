use std::sync::Arc;
use std::time::Duration;

use derivative::Derivative;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum_macros::{Display, EnumString};

use crate::validation::resolver::Resolver;

/// When fields are validated before the first submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum Mode {
    #[default]
    OnSubmit,
    OnBlur,
    OnChange,
    /// First validation on blur, then on every change.
    OnTouched,
    All,
}

/// When fields are re-validated after a submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum ReValidateMode {
    OnBlur,
    #[default]
    OnChange,
    OnSubmit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum CriteriaMode {
    /// Stop at the first failing rule.
    #[default]
    FirstError,
    /// Evaluate every rule and collect the failures in [`crate::FieldError::types`].
    All,
}

pub type OpaqueLeaf = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Construction options for a [`crate::Control`].
///
/// The data fields can be loaded from configuration, e.g. JSON; the resolver and the opaque-leaf
/// predicate are set with the builder methods.
#[derive(Derivative, Clone, Serialize, Deserialize)]
#[derivative(Debug)]
#[serde(default, rename_all = "camelCase")]
pub struct FormOptions {
    pub mode: Mode,
    pub re_validate_mode: ReValidateMode,
    pub criteria_mode: CriteriaMode,
    pub should_focus_error: bool,
    pub should_unregister: bool,
    /// Milliseconds a new field error is held back before it becomes visible.
    pub delay_error: Option<u64>,
    pub default_values: Value,
    pub context: Value,

    #[serde(skip)]
    #[derivative(Debug = "ignore")]
    pub resolver: Option<Arc<dyn Resolver>>,

    #[serde(skip)]
    #[derivative(Debug = "ignore")]
    pub opaque_leaf: Option<OpaqueLeaf>,
}

impl Default for FormOptions {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            re_validate_mode: ReValidateMode::default(),
            criteria_mode: CriteriaMode::default(),
            should_focus_error: true,
            should_unregister: false,
            delay_error: None,
            default_values: Value::Object(Default::default()),
            context: Value::Null,
            resolver: None,
            opaque_leaf: None,
        }
    }
}

impl FormOptions {
    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_re_validate_mode(mut self, re_validate_mode: ReValidateMode) -> Self {
        self.re_validate_mode = re_validate_mode;
        self
    }

    pub fn with_criteria_mode(mut self, criteria_mode: CriteriaMode) -> Self {
        self.criteria_mode = criteria_mode;
        self
    }

    pub fn with_default_values(mut self, default_values: Value) -> Self {
        self.default_values = default_values;
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = context;
        self
    }

    pub fn with_should_focus_error(mut self, should_focus_error: bool) -> Self {
        self.should_focus_error = should_focus_error;
        self
    }

    pub fn with_should_unregister(mut self, should_unregister: bool) -> Self {
        self.should_unregister = should_unregister;
        self
    }

    pub fn with_delay_error(mut self, delay: Duration) -> Self {
        self.delay_error = Some(delay.as_millis() as u64);
        self
    }

    pub fn with_resolver(mut self, resolver: impl Resolver + 'static) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Values matching `predicate` are compared and dirty-marked as a whole.
    pub fn with_opaque_leaf(mut self, predicate: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.opaque_leaf = Some(Arc::new(predicate));
        self
    }

    pub(crate) fn delay(&self) -> Option<Duration> {
        self.delay_error
            .map(Duration::from_millis)
    }

    /// Whether a change (or blur) of a field should skip validation under the current policy.
    pub(crate) fn skip_validation(&self, is_blur: bool, is_touched: bool, is_submitted: bool) -> bool {
        if self.mode == Mode::All {
            return false;
        }
        if !is_submitted && self.mode == Mode::OnTouched {
            return !(is_touched || is_blur);
        }

        let (on_blur, on_change) = match is_submitted {
            true => (
                self.re_validate_mode == ReValidateMode::OnBlur,
                self.re_validate_mode == ReValidateMode::OnChange,
            ),
            false => (self.mode == Mode::OnBlur, self.mode == Mode::OnChange),
        };

        match (on_blur, on_change) {
            (true, _) => !is_blur,
            (_, true) => is_blur,
            _ => true,
        }
    }

    /// Whether structural field-array operations re-validate the array's own rules.
    pub(crate) fn validate_after_array_action(&self, is_submitted: bool) -> bool {
        (self.mode != Mode::OnSubmit || is_submitted) && self.re_validate_mode != ReValidateMode::OnSubmit
    }
}

/// Options of [`crate::Control::set_value`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetValueOptions {
    pub should_validate: bool,
    pub should_dirty: bool,
    pub should_touch: bool,
}

/// Options of [`crate::Control::unregister`], each `keep_*` retains that part of the field's state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnregisterOptions {
    pub keep_value: bool,
    pub keep_error: bool,
    pub keep_dirty: bool,
    pub keep_touched: bool,
    pub keep_is_valid: bool,
    pub keep_default_value: bool,
}

/// Options of [`crate::Control::reset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetOptions {
    pub keep_errors: bool,
    pub keep_dirty: bool,
    /// Dirty fields keep their current value, the others take the reset value.
    pub keep_dirty_values: bool,
    pub keep_values: bool,
    pub keep_default_values: bool,
    pub keep_is_submitted: bool,
    pub keep_touched: bool,
    pub keep_is_valid: bool,
    pub keep_submit_count: bool,
    pub keep_is_submit_successful: bool,
}

/// Options of [`crate::Control::reset_field`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResetFieldOptions {
    pub keep_dirty: bool,
    pub keep_touched: bool,
    pub keep_error: bool,
    /// Becomes the field's new default value as well as its value.
    pub default_value: Option<Value>,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use indoc::indoc;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Mode::OnSubmit, false, false, false, true)]
    #[case(Mode::OnChange, false, false, false, false)]
    #[case(Mode::OnChange, true, false, false, true)]
    #[case(Mode::OnBlur, false, false, false, true)]
    #[case(Mode::OnBlur, true, false, false, false)]
    #[case(Mode::OnTouched, false, false, false, true)]
    #[case(Mode::OnTouched, false, true, false, false)]
    #[case(Mode::OnTouched, true, false, false, false)]
    #[case(Mode::All, true, false, false, false)]
    #[case(Mode::All, false, false, false, false)]
    // after submission the re-validate mode, on change by default, applies
    #[case(Mode::OnSubmit, false, false, true, false)]
    #[case(Mode::OnSubmit, true, false, true, true)]
    #[case(Mode::OnTouched, true, true, true, true)]
    pub fn skip_validation(
        #[case] mode: Mode,
        #[case] is_blur: bool,
        #[case] is_touched: bool,
        #[case] is_submitted: bool,
        #[case] expected: bool,
    ) {
        // given
        let options = FormOptions::default().with_mode(mode);

        // expect
        assert_eq!(options.skip_validation(is_blur, is_touched, is_submitted), expected);
    }

    #[test]
    pub fn deserialize_with_defaults() {
        // given
        let content = indoc! {r#"
            {
                "mode": "onTouched",
                "criteriaMode": "all",
                "delayError": 250,
                "defaultValues": { "firstName": "" }
            }
        "#};

        // when
        let options: FormOptions = serde_json::from_str(content).unwrap();

        // then
        assert_eq!(options.mode, Mode::OnTouched);
        assert_eq!(options.re_validate_mode, ReValidateMode::OnChange);
        assert_eq!(options.criteria_mode, CriteriaMode::All);
        assert!(options.should_focus_error);
        assert_eq!(options.delay(), Some(Duration::from_millis(250)));
        assert_eq!(options.default_values, serde_json::json!({ "firstName": "" }));
    }

    #[test]
    pub fn mode_names() {
        // expect
        assert_eq!(Mode::OnSubmit.to_string(), "onSubmit");
        assert_eq!(Mode::from_str("onBlur"), Ok(Mode::OnBlur));
        assert_eq!(ReValidateMode::from_str("onSubmit"), Ok(ReValidateMode::OnSubmit));
    }
}
