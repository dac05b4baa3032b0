//! Whole-tree validation by an external schema.
//!
//! A [`Resolver`] receives the complete value tree and returns the errors for every field it
//! knows about; the engine picks the errors of the fields it asked for.

use std::marker::PhantomData;

use form_path::{FieldPath, Segment, Tree};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::trace;
use validator::{Validate, ValidationErrors, ValidationErrorsKind};

use crate::error::{ErrorKind, FieldError};
use crate::options::CriteriaMode;
use crate::task::Task;

/// The key struct-level (schema) errors are reported under when they belong to the whole form.
pub const ROOT_ERROR_KEY: &str = "root";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolverOptions {
    /// The fields being validated, `None` for the whole form.
    pub names: Option<Vec<String>>,
    pub criteria_mode: CriteriaMode,
    /// Every registered field name.
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolverResult {
    /// The values to submit, resolvers may coerce or strip values.
    pub values: Value,
    pub errors: Tree<FieldError>,
}

impl ResolverResult {
    pub fn valid(values: Value) -> Self {
        Self {
            values,
            errors: Tree::new(),
        }
    }

    pub fn invalid(errors: Tree<FieldError>) -> Self {
        Self {
            values: Value::Object(Default::default()),
            errors,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validates the whole value tree.
///
/// An `Err` is a failure of the resolver itself, it is propagated to whoever awaited the
/// operation; field failures are reported in [`ResolverResult::errors`].
pub trait Resolver: Send + Sync {
    fn resolve(&self, values: Value, context: Value, options: ResolverOptions) -> Task<anyhow::Result<ResolverResult>>;
}

impl<F> Resolver for F
where
    F: Fn(Value, Value, ResolverOptions) -> Task<anyhow::Result<ResolverResult>> + Send + Sync,
{
    fn resolve(&self, values: Value, context: Value, options: ResolverOptions) -> Task<anyhow::Result<ResolverResult>> {
        self(values, context, options)
    }
}

/// A [`Resolver`] backed by a `validator` schema.
///
/// The value tree is deserialized into `T` and validated; a tree that does not deserialize is
/// a resolver failure.  Errors are keyed by the schema's field names, which must match the
/// registered field names.  Error messages fall back to the error code when the rule has none.
pub struct ValidatorResolver<T> {
    _schema: PhantomData<fn() -> T>,
}

impl<T> ValidatorResolver<T> {
    pub fn new() -> Self {
        Self {
            _schema: PhantomData,
        }
    }
}

impl<T> Default for ValidatorResolver<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Resolver for ValidatorResolver<T>
where
    T: Validate + DeserializeOwned,
{
    fn resolve(&self, values: Value, _context: Value, options: ResolverOptions) -> Task<anyhow::Result<ResolverResult>> {
        let result = serde_json::from_value::<T>(values.clone())
            .map_err(anyhow::Error::from)
            .map(|schema| match schema.validate() {
                Ok(()) => ResolverResult::valid(values),
                Err(errors) => {
                    let mut tree = Tree::new();
                    collect_errors(&errors, &FieldPath::root(), options.criteria_mode, &mut tree);
                    trace!("Schema validation failed. errors: {}", tree.leaves().len());
                    ResolverResult::invalid(tree)
                }
            });
        Task::done(result)
    }
}

fn collect_errors(errors: &ValidationErrors, path: &FieldPath, criteria: CriteriaMode, tree: &mut Tree<FieldError>) {
    let mut entries = errors.errors().iter().collect::<Vec<_>>();
    entries.sort_by(|(a, _), (b, _)| a.cmp(b));

    for (key, kind) in entries {
        let key: &str = key.as_ref();
        let field_path = match (key, path.is_root()) {
            ("__all__", true) => FieldPath::from(Segment::key(ROOT_ERROR_KEY)),
            ("__all__", false) => path.clone(),
            (key, _) => path.join(Segment::key(key)),
        };

        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                let mut error: Option<FieldError> = None;
                for field_error in field_errors {
                    let code = field_error.code.to_string();
                    let message = field_error
                        .message
                        .as_ref()
                        .map(|message| message.to_string())
                        .unwrap_or_else(|| code.clone());
                    match error {
                        None => {
                            let first = FieldError::new(ErrorKind::custom(&code), message.clone());
                            error = Some(match criteria {
                                CriteriaMode::All => first.with_type(code, message),
                                CriteriaMode::FirstError => first,
                            });
                        }
                        Some(ref mut error) => match criteria {
                            CriteriaMode::All => {
                                error.types.insert(code, message);
                            }
                            CriteriaMode::FirstError => break,
                        },
                    }
                }
                if let Some(error) = error {
                    tree.set_leaf(&field_path, error);
                }
            }
            ValidationErrorsKind::Struct(nested) => collect_errors(nested, &field_path, criteria, tree),
            ValidationErrorsKind::List(rows) => {
                for (index, nested) in rows {
                    collect_errors(nested, &field_path.join(*index), criteria, tree);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[derive(Debug, Deserialize, Validate)]
    struct Person {
        #[validate(length(min = 1, message = "First name is required"))]
        first_name: String,
        #[validate(range(min = 18, code = "too-young"))]
        age: u32,
        #[validate(nested)]
        #[serde(default)]
        pets: Vec<Pet>,
    }

    #[derive(Debug, Deserialize, Validate)]
    struct Pet {
        #[validate(length(min = 2, message = "Name too short"))]
        name: String,
    }

    fn path(name: &str) -> FieldPath {
        name.parse().unwrap()
    }

    #[test]
    pub fn valid_values_are_passed_through() {
        // given
        let resolver = ValidatorResolver::<Person>::new();
        let values = json!({"first_name": "Ann", "age": 30});

        // when
        let result = block_on(resolver.resolve(values.clone(), Value::Null, ResolverOptions::default())).unwrap();

        // then
        assert!(result.is_valid());
        assert_eq!(result.values, values);
    }

    #[test]
    pub fn errors_are_shaped_like_the_values() {
        // given
        let resolver = ValidatorResolver::<Person>::new();
        let values = json!({"first_name": "", "age": 12, "pets": [{"name": "Rex"}, {"name": "A"}]});

        // when
        let result = block_on(resolver.resolve(values, Value::Null, ResolverOptions::default())).unwrap();

        // then
        assert_eq!(
            result.errors.leaf(&path("first_name")),
            Some(&FieldError::new(ErrorKind::custom("length"), "First name is required"))
        );
        assert_eq!(
            result.errors.leaf(&path("age")),
            Some(&FieldError::new(ErrorKind::custom("too-young"), "too-young"))
        );
        assert_eq!(
            result.errors.leaf(&path("pets.1.name")),
            Some(&FieldError::new(ErrorKind::custom("length"), "Name too short"))
        );
        assert!(!result.errors.contains(&path("pets.0")));
    }

    #[test]
    pub fn undeserializable_values_fail_the_resolver() {
        // given
        let resolver = ValidatorResolver::<Person>::new();

        // when
        let result = block_on(resolver.resolve(json!({"age": "old"}), Value::Null, ResolverOptions::default()));

        // then
        assert!(result.is_err());
    }

    #[test]
    pub fn closures_are_resolvers() {
        // given
        let resolver = |values: Value, _context: Value, _options: ResolverOptions| {
            let mut errors = Tree::new();
            if values["a"].is_null() {
                errors.set_leaf(&"a".parse().unwrap(), FieldError::new(ErrorKind::Required, "A is required"));
            }
            Task::done(Ok(ResolverResult {
                values,
                errors,
            }))
        };

        // when
        let result = block_on(resolver.resolve(json!({}), Value::Null, ResolverOptions::default())).unwrap();

        // then
        assert!(!result.is_valid());
    }
}
