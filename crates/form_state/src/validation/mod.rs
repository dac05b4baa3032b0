//! Native rule evaluation.
//!
//! Rules are evaluated in a fixed order: required, min/max, min/max length, pattern, then the
//! custom validators.  With [`CriteriaMode::FirstError`] evaluation stops at the first failure,
//! with [`CriteriaMode::All`] every failure is collected in [`FieldError::types`] while
//! `kind`/`message` keep the first failure.

pub(crate) mod plan;
pub mod resolver;

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use form_path::{FieldPath, Tree};
use serde_json::Value;
use tracing::trace;

use crate::error::{ErrorKind, FieldError};
use crate::options::CriteriaMode;
use crate::rules::{Bound, Rules, Verdict, UNNAMED_VALIDATOR};
use crate::task::Task;
use crate::values::is_empty_input;

/// What is being checked, and how its emptiness is decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Subject {
    Field,
    /// A checkbox or radio group, `checked` is true when any option is checked.
    Group { checked: bool },
    /// The rows of a field array.
    ArrayRoot,
}

/// A single field (or field array) to validate, detached from the store.
#[derive(Debug, Clone)]
pub(crate) struct FieldCheck {
    pub path: FieldPath,
    pub rules: Arc<Rules>,
    pub subject: Subject,
    pub value: Option<Value>,
}

struct Collector {
    criteria: CriteriaMode,
    error: Option<FieldError>,
}

impl Collector {
    fn new(criteria: CriteriaMode) -> Self {
        Self {
            criteria,
            error: None,
        }
    }

    /// Records a failure, returns true when evaluation should stop.
    fn fail(&mut self, kind: ErrorKind, message: &str) -> bool {
        match self.criteria {
            CriteriaMode::FirstError => {
                self.error = Some(FieldError::new(kind, message));
                true
            }
            CriteriaMode::All => {
                let type_name = kind.to_string();
                let error = self
                    .error
                    .get_or_insert_with(|| FieldError::new(kind, message));
                error
                    .types
                    .insert(type_name, message.to_string());
                false
            }
        }
    }

    /// Records the verdict of the custom validator `name`, returns true when evaluation should stop.
    fn verdict(&mut self, name: &str, verdict: Verdict) -> bool {
        let Verdict::Invalid(message) = verdict else {
            return false;
        };
        let kind = match name {
            UNNAMED_VALIDATOR => ErrorKind::Validate,
            name => ErrorKind::Custom(name.to_string()),
        };
        self.fail(kind, &message)
    }
}

enum Flow {
    Done(Option<FieldError>),
    /// The built-in rules are through, the custom validators run next with this input.
    Validators(Collector, Value),
}

/// Validates each check in turn, as a whole-form pass does.
pub(crate) fn validate_fields(
    checks: Vec<FieldCheck>,
    values: Arc<Value>,
    criteria: CriteriaMode,
) -> Task<Vec<(FieldCheck, Option<FieldError>)>> {
    Task::future(async move {
        let mut results = Vec::with_capacity(checks.len());
        for check in checks {
            let error = evaluate(&check, &values, criteria).await;
            trace!("Validated field. path: {}, error: {:?}", check.path, error);
            results.push((check, error));
        }
        results
    })
}

/// Evaluates a check whose custom validators are all synchronous.
pub(crate) fn evaluate_now(check: &FieldCheck, values: &Value, criteria: CriteriaMode) -> Option<FieldError> {
    let (mut collector, input) = match evaluate_builtin(check, criteria) {
        Flow::Done(error) => return error,
        Flow::Validators(collector, input) => (collector, input),
    };
    for (name, validator) in check.rules.validate.iter() {
        let Some(verdict) = validator.run_now(&input, values) else {
            continue;
        };
        if collector.verdict(name, verdict) {
            break;
        }
    }
    collector.error
}

async fn evaluate(check: &FieldCheck, values: &Value, criteria: CriteriaMode) -> Option<FieldError> {
    let (mut collector, input) = match evaluate_builtin(check, criteria) {
        Flow::Done(error) => return error,
        Flow::Validators(collector, input) => (collector, input),
    };
    for (name, validator) in check.rules.validate.iter() {
        let verdict = validator.run(&input, values).await;
        if collector.verdict(name, verdict) {
            break;
        }
    }
    collector.error
}

fn evaluate_builtin(check: &FieldCheck, criteria: CriteriaMode) -> Flow {
    let rules = &check.rules;
    let value = check
        .value
        .as_ref()
        .filter(|value| !value.is_null());
    let is_empty = is_empty_input(value);
    let mut collector = Collector::new(criteria);

    if let Some(message) = &rules.required {
        let missing = match check.subject {
            Subject::Group { checked } => !checked,
            Subject::Field | Subject::ArrayRoot => is_empty || value == Some(&Value::Bool(false)),
        };
        if missing && collector.fail(ErrorKind::Required, message) {
            return Flow::Done(collector.error);
        }
    }

    if let Some(value) = value.filter(|_| !is_empty) {
        let exceeds_max = rules
            .max
            .as_ref()
            .and_then(|bound| compare(value, bound, rules.value_as_date))
            .is_some_and(|ordering| ordering == Ordering::Greater);
        let exceeds_min = rules
            .min
            .as_ref()
            .and_then(|bound| compare(value, bound, rules.value_as_date))
            .is_some_and(|ordering| ordering == Ordering::Less);

        let failure = match (exceeds_max, exceeds_min, &rules.max, &rules.min) {
            (true, _, Some(max), _) => Some((ErrorKind::Max, max.message.as_str())),
            (_, true, _, Some(min)) => Some((ErrorKind::Min, min.message.as_str())),
            _ => None,
        };
        if let Some((kind, message)) = failure {
            if collector.fail(kind, message) {
                return Flow::Done(collector.error);
            }
        }

        let length = match (value, check.subject) {
            (Value::String(text), _) => Some(text.chars().count()),
            (Value::Array(items), Subject::ArrayRoot) => Some(items.len()),
            _ => None,
        };
        if let Some(length) = length {
            let failure = match (&rules.max_length, &rules.min_length) {
                (Some(max), _) if length > max.value => Some((ErrorKind::MaxLength, max.message.as_str())),
                (_, Some(min)) if length < min.value => Some((ErrorKind::MinLength, min.message.as_str())),
                _ => None,
            };
            if let Some((kind, message)) = failure {
                if collector.fail(kind, message) {
                    return Flow::Done(collector.error);
                }
            }
        }

        if let (Some(pattern), Value::String(text)) = (&rules.pattern, value) {
            if !pattern.regex.is_match(text) && collector.fail(ErrorKind::Pattern, &pattern.message) {
                return Flow::Done(collector.error);
            }
        }
    }

    let input = value.cloned().unwrap_or(Value::Null);
    Flow::Validators(collector, input)
}

/// Compares `value` with a bound, numerically when both sides are numbers, as dates otherwise.
///
/// `None` when the two cannot be compared, such a bound never fails.
fn compare(value: &Value, bound: &Bound, value_as_date: bool) -> Option<Ordering> {
    if !value_as_date {
        if let (Some(number), Some(limit)) = (as_number(value), as_number(&bound.value)) {
            return number.partial_cmp(&limit);
        }
    }

    let date = value.as_str().and_then(parse_date)?;
    let limit = bound
        .value
        .as_str()
        .and_then(parse_date)?;
    Some(date.cmp(&limit))
}

pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Accepts RFC 3339 timestamps, local date-times, dates and times of day.
pub(crate) fn parse_date(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(date_time) = DateTime::parse_from_rfc3339(text) {
        return Some(date_time.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(date_time) = NaiveDateTime::parse_from_str(text, format) {
            return Some(date_time);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    // times of day compare on a fixed date
    for format in ["%H:%M:%S", "%H:%M"] {
        if let Ok(time) = NaiveTime::parse_from_str(text, format) {
            return NaiveDate::from_ymd_opt(1970, 1, 1).map(|date| date.and_time(time));
        }
    }
    None
}

/// The error for `path` in a resolver result.
///
/// When the resolver reported nothing at `path` itself, the nearest ancestor holding an error is
/// used, unless a registered field sits in between.
pub(crate) fn lookup_error(
    errors: &Tree<FieldError>,
    path: &FieldPath,
    is_registered: impl Fn(&FieldPath) -> bool,
) -> (FieldPath, Option<FieldError>) {
    if let Some(error) = errors.leaf(path) {
        return (path.clone(), Some(error.clone()));
    }

    let mut current = path.parent();
    while let Some(ancestor) = current {
        if ancestor.is_root() {
            break;
        }
        if is_registered(&ancestor) {
            return (path.clone(), None);
        }
        if let Some(error) = errors.leaf(&ancestor) {
            return (ancestor.clone(), Some(error.clone()));
        }
        current = ancestor.parent();
    }

    (path.clone(), None)
}
