use std::sync::Arc;

use form_path::FieldPath;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, trace};

use crate::element::{FieldElement, Handle};
use crate::rules::Rules;

/// A checkbox or radio option of a field.
#[derive(Debug, Clone)]
pub(crate) struct FieldOption {
    pub element: FieldElement,
    pub value: Value,
    pub checked: bool,
}

/// The descriptor of a registered field.
#[derive(Debug, Clone)]
pub(crate) struct Field {
    pub name: String,
    pub rules: Arc<Rules>,
    pub element: Option<FieldElement>,
    pub options: Vec<FieldOption>,
    pub mounted: bool,
}

impl Field {
    fn new(name: String, rules: Rules) -> Self {
        Self {
            name,
            rules: Arc::new(rules),
            element: None,
            options: Vec::new(),
            mounted: true,
        }
    }

    pub fn is_checkbox(&self) -> bool {
        matches!(
            self.options.first().map(|option| &option.element),
            Some(FieldElement::Checkbox { .. })
        )
    }

    pub fn is_radio(&self) -> bool {
        matches!(
            self.options.first().map(|option| &option.element),
            Some(FieldElement::Radio { .. })
        )
    }

    pub fn is_text_like(&self) -> bool {
        self.options.is_empty()
            && self
                .element
                .as_ref()
                .is_none_or(FieldElement::is_text_like)
    }

    /// The handle to focus: the element, or the first option of a group.
    pub fn focus_handle(&self) -> Option<Handle> {
        match &self.element {
            Some(element) => element.handle().cloned(),
            None => self
                .options
                .iter()
                .find_map(|option| option.element.handle().cloned()),
        }
    }

    pub fn handles(&self) -> Vec<Handle> {
        self.element
            .iter()
            .chain(self.options.iter().map(|option| &option.element))
            .filter_map(|element| element.handle().cloned())
            .collect()
    }

    /// The value of a checkbox or radio group, derived from the checked options.
    ///
    /// Checkbox groups with more than one option (or whose value is a list) produce the list of
    /// checked values; a single checkbox produces its value, or `true`, when checked and `false`
    /// otherwise.  Radio groups produce the checked value or `null`.
    pub fn group_value(&self, as_list: bool) -> Option<Value> {
        if self.is_radio() {
            return Some(
                self.options
                    .iter()
                    .find(|option| option.checked)
                    .map(|option| option.value.clone())
                    .unwrap_or(Value::Null),
            );
        }
        if !self.is_checkbox() {
            return None;
        }

        match as_list || self.options.len() > 1 {
            true => Some(Value::Array(
                self.options
                    .iter()
                    .filter(|option| option.checked)
                    .map(|option| option.value.clone())
                    .collect(),
            )),
            false => {
                let option = &self.options[0];
                Some(match (option.checked, &option.value) {
                    (false, _) => Value::Bool(false),
                    (true, Value::Null) => Value::Bool(true),
                    (true, Value::String(text)) if text.is_empty() => Value::Bool(true),
                    (true, value) => value.clone(),
                })
            }
        }
    }

    /// Update the checked state of every option to reflect `value`.
    pub fn sync_options(&mut self, value: Option<&Value>) {
        let is_radio = self.is_radio();
        for option in self.options.iter_mut() {
            option.checked = match (is_radio, value) {
                (_, None) | (_, Some(Value::Null)) => false,
                (true, Some(value)) => value == &option.value,
                (false, Some(Value::Array(values))) => values.contains(&option.value),
                (false, Some(Value::Bool(checked))) => *checked,
                (false, Some(value)) => value == &option.value,
            };
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Attached {
    Element,
    Option,
    /// The same option was attached before.
    Duplicate,
}

/// Field descriptors keyed by path, in registration order.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    fields: IndexMap<FieldPath, Field>,
}

impl Registry {
    pub fn get(&self, path: &FieldPath) -> Option<&Field> {
        self.fields.get(path)
    }

    pub fn get_mut(&mut self, path: &FieldPath) -> Option<&mut Field> {
        self.fields.get_mut(path)
    }

    pub fn contains(&self, path: &FieldPath) -> bool {
        self.fields.contains_key(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldPath, &Field)> {
        self.fields.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&FieldPath, &mut Field)> {
        self.fields.iter_mut()
    }

    pub fn paths(&self) -> Vec<FieldPath> {
        self.fields.keys().cloned().collect()
    }

    /// Registers `path`, or merges `rules` into an existing registration.
    ///
    /// Returns true for a new registration.
    pub fn register(&mut self, path: &FieldPath, name: &str, rules: Rules) -> bool {
        match self.fields.get_mut(path) {
            Some(field) => {
                trace!("Merging rules. name: {}", name);
                Arc::make_mut(&mut field.rules).merge(rules);
                field.mounted = true;
                false
            }
            None => {
                debug!("Registering field. name: {}", name);
                self.fields
                    .insert(path.clone(), Field::new(name.to_string(), rules));
                true
            }
        }
    }

    /// Attaches a live element, options are deduplicated by their value.
    pub fn attach(&mut self, path: &FieldPath, element: FieldElement) -> Option<Attached> {
        let field = self.fields.get_mut(path)?;
        field.mounted = true;

        match element.option_value() {
            Some(value) => {
                if field
                    .options
                    .iter()
                    .any(|option| option.value == value)
                {
                    return Some(Attached::Duplicate);
                }
                // options of the other kind, or disconnected ones, do not belong to the group
                let is_checkbox = matches!(element, FieldElement::Checkbox { .. });
                field.options.retain(|option| {
                    matches!(option.element, FieldElement::Checkbox { .. }) == is_checkbox
                        && option
                            .element
                            .handle()
                            .is_none_or(|handle| handle.is_connected())
                });
                field.element = None;
                field.options.push(FieldOption {
                    element,
                    value,
                    checked: false,
                });
                Some(Attached::Option)
            }
            None => {
                field.options.clear();
                field.element = Some(element);
                Some(Attached::Element)
            }
        }
    }

    /// Removes `path` and every field below it.
    pub fn remove_under(&mut self, path: &FieldPath) -> Vec<(FieldPath, Field)> {
        let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.fields)
            .into_iter()
            .partition(|(existing, _)| existing.starts_with(path));
        self.fields = kept.into_iter().collect();
        removed
    }

    /// `path` itself and the fields below it, in registration order.
    pub fn under<'a>(&'a self, path: &'a FieldPath) -> impl Iterator<Item = (&'a FieldPath, &'a Field)> + 'a {
        self.fields
            .iter()
            .filter(move |(existing, _)| existing.starts_with(path))
    }

    /// Re-keys the rows of the array at `array` after a structural change.
    ///
    /// `mapping` gives the new index for an old row index, `None` drops the row's fields, which
    /// are returned.
    pub fn rekey_array(
        &mut self,
        array: &FieldPath,
        mapping: impl Fn(usize) -> Option<usize>,
    ) -> Vec<(FieldPath, Field)> {
        let mut removed = Vec::new();
        let fields = std::mem::take(&mut self.fields);
        for (path, mut field) in fields {
            match path.index_below(array) {
                Some(index) => match mapping(index) {
                    Some(new_index) => {
                        let new_path = path.with_index_at(array.len(), new_index);
                        field.name = new_path.to_string();
                        self.fields.insert(new_path, field);
                    }
                    None => removed.push((path, field)),
                },
                None => {
                    self.fields.insert(path, field);
                }
            }
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn path(name: &str) -> FieldPath {
        name.parse().unwrap()
    }

    #[test]
    pub fn register_twice_merges() {
        // given
        let mut registry = Registry::default();

        // when
        let first = registry.register(&path("a"), "a", Rules::new().required("Required"));
        let second = registry.register(&path("a"), "a", Rules::new().min_length(2, "Short"));

        // then
        assert!(first);
        assert!(!second);
        let field = registry.get(&path("a")).unwrap();
        assert!(field.rules.required.is_some());
        assert!(field.rules.min_length.is_some());
    }

    #[test]
    pub fn duplicate_options_are_ignored() {
        // given
        let mut registry = Registry::default();
        registry.register(&path("color"), "color", Rules::new());

        // when
        let outcomes = [
            registry.attach(&path("color"), FieldElement::radio("red")),
            registry.attach(&path("color"), FieldElement::radio("red")),
            registry.attach(&path("color"), FieldElement::radio("blue")),
        ];

        // then
        assert_eq!(
            outcomes,
            [Some(Attached::Option), Some(Attached::Duplicate), Some(Attached::Option)]
        );
        assert_eq!(
            registry
                .get(&path("color"))
                .unwrap()
                .options
                .len(),
            2
        );
    }

    #[test]
    pub fn group_values() {
        // given
        let mut registry = Registry::default();
        registry.register(&path("tags"), "tags", Rules::new());
        registry.attach(&path("tags"), FieldElement::checkbox("a"));
        registry.attach(&path("tags"), FieldElement::checkbox("b"));
        registry.register(&path("agree"), "agree", Rules::new());
        registry.attach(&path("agree"), FieldElement::Checkbox {
            value: None,
            handle: None,
        });

        // when
        registry
            .get_mut(&path("tags"))
            .unwrap()
            .sync_options(Some(&json!(["b"])));
        registry
            .get_mut(&path("agree"))
            .unwrap()
            .sync_options(Some(&json!(true)));

        // then
        assert_eq!(registry.get(&path("tags")).unwrap().group_value(false), Some(json!(["b"])));
        assert_eq!(registry.get(&path("agree")).unwrap().group_value(false), Some(json!(true)));
        assert_eq!(registry.get(&path("agree")).unwrap().group_value(true), Some(json!([null])));
    }

    #[test]
    pub fn rekey_array_moves_and_drops_rows() {
        // given
        let mut registry = Registry::default();
        for name in ["items.0.name", "items.1.name", "items.2.name", "title"] {
            registry.register(&path(name), name, Rules::new());
        }

        // when
        let removed = registry.rekey_array(&path("items"), |index| match index {
            0 => Some(0),
            1 => None,
            other => Some(other - 1),
        });

        // then
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].0, path("items.1.name"));
        let names = registry
            .iter()
            .map(|(_, field)| field.name.clone())
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["items.0.name", "items.1.name", "title"]);
    }
}
