use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;

use crate::task::Task;
use crate::validation::parse_date;

/// The outcome of a custom validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid(String),
}

impl From<bool> for Verdict {
    fn from(value: bool) -> Self {
        match value {
            true => Verdict::Valid,
            false => Verdict::Invalid(String::new()),
        }
    }
}

impl From<&str> for Verdict {
    fn from(value: &str) -> Self {
        Verdict::Invalid(value.to_string())
    }
}

impl From<String> for Verdict {
    fn from(value: String) -> Self {
        Verdict::Invalid(value)
    }
}

impl From<Option<String>> for Verdict {
    fn from(value: Option<String>) -> Self {
        match value {
            None => Verdict::Valid,
            Some(message) => Verdict::Invalid(message),
        }
    }
}

type CheckFn = dyn Fn(&Value, &Value) -> Verdict + Send + Sync;
type CheckLaterFn = dyn Fn(&Value, &Value) -> Task<Verdict> + Send + Sync;

#[derive(Clone)]
enum Check {
    Now(Arc<CheckFn>),
    Later(Arc<CheckLaterFn>),
}

/// A custom validation predicate.
///
/// Called with the field value and the whole value tree.  Synchronous validators run while the
/// triggering operation is applied; asynchronous ones run when the returned task is awaited.
#[derive(Clone)]
pub struct Validator(Check);

impl Validator {
    pub fn new<V>(f: impl Fn(&Value, &Value) -> V + Send + Sync + 'static) -> Self
    where
        V: Into<Verdict>,
    {
        Self(Check::Now(Arc::new(move |value, values| f(value, values).into())))
    }

    /// A validator that produces its verdict asynchronously.
    pub fn future(f: impl Fn(&Value, &Value) -> Task<Verdict> + Send + Sync + 'static) -> Self {
        Self(Check::Later(Arc::new(f)))
    }

    pub(crate) fn is_async(&self) -> bool {
        matches!(self.0, Check::Later(_))
    }

    /// The verdict of a synchronous validator, `None` for an asynchronous one.
    pub(crate) fn run_now(&self, value: &Value, values: &Value) -> Option<Verdict> {
        match &self.0 {
            Check::Now(f) => Some(f(value, values)),
            Check::Later(_) => None,
        }
    }

    pub(crate) fn run(&self, value: &Value, values: &Value) -> Task<Verdict> {
        match &self.0 {
            Check::Now(f) => Task::done(f(value, values)),
            Check::Later(f) => f(value, values),
        }
    }
}

impl Debug for Validator {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Validator")
    }
}

/// A transform applied to text input before it is stored.
#[derive(Clone)]
pub struct Transform(Arc<dyn Fn(Value) -> Value + Send + Sync>);

impl Transform {
    pub fn new(f: impl Fn(Value) -> Value + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub(crate) fn apply(&self, value: Value) -> Value {
        (self.0)(value)
    }
}

impl Debug for Transform {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("Transform")
    }
}

/// A numeric or date bound.  Date bounds are strings, e.g. `2024-01-31`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bound {
    pub value: Value,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthBound {
    pub value: usize,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct Pattern {
    pub regex: Regex,
    pub message: String,
}

/// The key used for a single, unnamed custom validator.
pub(crate) const UNNAMED_VALIDATOR: &str = "";

/// Validation rules and registration options for a field.
///
/// Built with the builder methods, e.g.
/// `Rules::new().required("Required").min_length(2, "Too short")`.
#[derive(Debug, Clone, Default)]
pub struct Rules {
    pub required: Option<String>,
    pub min: Option<Bound>,
    pub max: Option<Bound>,
    pub min_length: Option<LengthBound>,
    pub max_length: Option<LengthBound>,
    pub pattern: Option<Pattern>,
    /// Custom validators in evaluation order, an empty name marks a single unnamed validator.
    pub validate: IndexMap<String, Validator>,

    pub value_as_number: bool,
    pub value_as_date: bool,
    pub set_value_as: Option<Transform>,

    /// Disabled fields are neither validated nor submitted.
    pub disabled: Option<bool>,
    /// Fields re-validated after this one validates.
    pub deps: Vec<String>,
    pub should_unregister: Option<bool>,
    /// Initial value, used when neither a live value nor a default exists.
    pub value: Option<Value>,
}

impl Rules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, message: impl Into<String>) -> Self {
        self.required = Some(message.into());
        self
    }

    pub fn min(mut self, value: impl Into<Value>, message: impl Into<String>) -> Self {
        self.min = Some(Bound {
            value: value.into(),
            message: message.into(),
        });
        self
    }

    pub fn max(mut self, value: impl Into<Value>, message: impl Into<String>) -> Self {
        self.max = Some(Bound {
            value: value.into(),
            message: message.into(),
        });
        self
    }

    pub fn min_length(mut self, value: usize, message: impl Into<String>) -> Self {
        self.min_length = Some(LengthBound {
            value,
            message: message.into(),
        });
        self
    }

    pub fn max_length(mut self, value: usize, message: impl Into<String>) -> Self {
        self.max_length = Some(LengthBound {
            value,
            message: message.into(),
        });
        self
    }

    pub fn pattern(mut self, regex: Regex, message: impl Into<String>) -> Self {
        self.pattern = Some(Pattern {
            regex,
            message: message.into(),
        });
        self
    }

    /// A single custom validator, reported as `validate`.
    pub fn validate(mut self, validator: Validator) -> Self {
        self.validate
            .insert(UNNAMED_VALIDATOR.to_string(), validator);
        self
    }

    /// A named custom validator, reported with its name as the error type.
    pub fn validate_named(mut self, name: &str, validator: Validator) -> Self {
        self.validate
            .insert(name.to_string(), validator);
        self
    }

    pub fn value_as_number(mut self) -> Self {
        self.value_as_number = true;
        self
    }

    pub fn value_as_date(mut self) -> Self {
        self.value_as_date = true;
        self
    }

    pub fn set_value_as(mut self, transform: Transform) -> Self {
        self.set_value_as = Some(transform);
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = Some(disabled);
        self
    }

    pub fn deps(mut self, deps: &[&str]) -> Self {
        self.deps = deps
            .iter()
            .map(|dep| dep.to_string())
            .collect();
        self
    }

    pub fn should_unregister(mut self, should_unregister: bool) -> Self {
        self.should_unregister = Some(should_unregister);
        self
    }

    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// True when any rule would be evaluated by the validation engine.
    pub fn has_validation(&self) -> bool {
        self.required.is_some()
            || self.min.is_some()
            || self.max.is_some()
            || self.min_length.is_some()
            || self.max_length.is_some()
            || self.pattern.is_some()
            || !self.validate.is_empty()
    }

    /// True when no custom validator is asynchronous.
    pub(crate) fn is_synchronous(&self) -> bool {
        !self
            .validate
            .values()
            .any(Validator::is_async)
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled.unwrap_or(false)
    }

    /// Converts raw text input into the stored value.
    ///
    /// `value_as_number` wins over `value_as_date`, which wins over `set_value_as`; input that does
    /// not parse as requested is stored as `null`.
    pub(crate) fn transform_input(&self, value: Value) -> Value {
        match (&value, self.value_as_number, self.value_as_date) {
            (Value::String(text), true, _) => {
                let text = text.trim();
                match text.parse::<i64>() {
                    Ok(number) => Value::from(number),
                    Err(_) => text
                        .parse::<f64>()
                        .ok()
                        .and_then(serde_json::Number::from_f64)
                        .map(Value::Number)
                        .unwrap_or(Value::Null),
                }
            }
            (Value::String(text), false, true) => match parse_date(text) {
                Some(_) => value,
                None => Value::Null,
            },
            _ => match &self.set_value_as {
                Some(transform) => transform.apply(value),
                None => value,
            },
        }
    }

    /// Merge rules from a re-registration, rules present in `other` win.
    pub fn merge(&mut self, other: Rules) {
        if other.required.is_some() {
            self.required = other.required;
        }
        if other.min.is_some() {
            self.min = other.min;
        }
        if other.max.is_some() {
            self.max = other.max;
        }
        if other.min_length.is_some() {
            self.min_length = other.min_length;
        }
        if other.max_length.is_some() {
            self.max_length = other.max_length;
        }
        if other.pattern.is_some() {
            self.pattern = other.pattern;
        }
        self.validate.extend(other.validate);

        self.value_as_number |= other.value_as_number;
        self.value_as_date |= other.value_as_date;
        if other.set_value_as.is_some() {
            self.set_value_as = other.set_value_as;
        }
        if other.disabled.is_some() {
            self.disabled = other.disabled;
        }
        if !other.deps.is_empty() {
            self.deps = other.deps;
        }
        if other.should_unregister.is_some() {
            self.should_unregister = other.should_unregister;
        }
        if other.value.is_some() {
            self.value = other.value;
        }
    }
}

/// Rules for a field array as a whole, evaluated against the list of rows.
#[derive(Debug, Clone, Default)]
pub struct ArrayRules {
    pub required: Option<String>,
    pub min_length: Option<LengthBound>,
    pub max_length: Option<LengthBound>,
    pub validate: IndexMap<String, Validator>,
}

impl ArrayRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, message: impl Into<String>) -> Self {
        self.required = Some(message.into());
        self
    }

    pub fn min_length(mut self, value: usize, message: impl Into<String>) -> Self {
        self.min_length = Some(LengthBound {
            value,
            message: message.into(),
        });
        self
    }

    pub fn max_length(mut self, value: usize, message: impl Into<String>) -> Self {
        self.max_length = Some(LengthBound {
            value,
            message: message.into(),
        });
        self
    }

    pub fn validate(mut self, validator: Validator) -> Self {
        self.validate
            .insert(UNNAMED_VALIDATOR.to_string(), validator);
        self
    }

    pub fn has_validation(&self) -> bool {
        self.required.is_some() || self.min_length.is_some() || self.max_length.is_some() || !self.validate.is_empty()
    }

    /// The equivalent field rules, the array value is validated like any other list value.
    pub(crate) fn to_rules(&self) -> Rules {
        Rules {
            required: self.required.clone(),
            min_length: self.min_length.clone(),
            max_length: self.max_length.clone(),
            validate: self.validate.clone(),
            ..Rules::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[test]
    pub fn merge_keeps_existing_rules() {
        // given
        let mut rules = Rules::new()
            .required("Required")
            .min_length(2, "Too short");

        // when
        rules.merge(Rules::new().min_length(3, "Longer please").deps(&["other"]));

        // then
        assert_eq!(rules.required.as_deref(), Some("Required"));
        assert_eq!(
            rules.min_length,
            Some(LengthBound {
                value: 3,
                message: "Longer please".to_string()
            })
        );
        assert_eq!(rules.deps, vec!["other".to_string()]);
    }

    #[test]
    pub fn validator_verdicts() {
        // given
        let positive = Validator::new(|value, _values| value.as_i64().unwrap_or(0) > 0);
        let message = Validator::new(|value, _values| match value.as_str() {
            Some("ok") => None,
            _ => Some("Say ok".to_string()),
        });

        // expect
        assert_eq!(block_on(positive.run(&json!(1), &json!({}))), Verdict::Valid);
        assert_eq!(block_on(positive.run(&json!(-1), &json!({}))), Verdict::Invalid(String::new()));
        assert_eq!(block_on(message.run(&json!("no"), &json!({}))), Verdict::Invalid("Say ok".to_string()));
        assert_eq!(block_on(message.run(&json!("ok"), &json!({}))), Verdict::Valid);
        assert_eq!(message.run_now(&json!("ok"), &json!({})), Some(Verdict::Valid));
    }

    #[test]
    pub fn asynchronous_validators_only_run_as_tasks() {
        // given
        let later = Validator::future(|value, _values| {
            let valid = value.as_bool().unwrap_or(false);
            Task::done(Verdict::from(valid))
        });
        let rules = Rules::new().validate(later.clone());

        // expect
        assert!(later.is_async());
        assert_eq!(later.run_now(&json!(true), &json!({})), None);
        assert_eq!(block_on(later.run(&json!(true), &json!({}))), Verdict::Valid);
        assert!(!rules.is_synchronous());
        assert!(Rules::new().required("Required").is_synchronous());
    }

    #[rstest]
    #[case(Rules::new().value_as_number(), json!("42"), json!(42))]
    #[case(Rules::new().value_as_number(), json!(" 1.5 "), json!(1.5))]
    #[case(Rules::new().value_as_number(), json!(""), json!(null))]
    #[case(Rules::new().value_as_number(), json!("abc"), json!(null))]
    #[case(Rules::new().value_as_date(), json!("2024-02-01"), json!("2024-02-01"))]
    #[case(Rules::new().value_as_date(), json!("tomorrow"), json!(null))]
    #[case(Rules::new(), json!("text"), json!("text"))]
    pub fn transform_input(#[case] rules: Rules, #[case] input: Value, #[case] expected: Value) {
        // expect
        assert_eq!(rules.transform_input(input), expected);
    }

    #[test]
    pub fn set_value_as_applies_without_value_as() {
        // given
        let rules = Rules::new().set_value_as(Transform::new(|value| match value {
            Value::String(text) => Value::from(text.to_uppercase()),
            other => other,
        }));

        // expect
        assert_eq!(rules.transform_input(json!("abc")), json!("ABC"));
    }

    #[test]
    pub fn has_validation() {
        // expect
        assert!(!Rules::new().value_as_number().has_validation());
        assert!(Rules::new().validate(Validator::new(|_, _| true)).has_validation());
        assert!(!ArrayRules::new().has_validation());
        assert!(ArrayRules::new().min_length(1, "One row").has_validation());
    }
}
