mod common;

use common::path;
use form_state::test::{Recorder, RecordingElement};
use form_state::{
    ArrayAction, ArrayEvent, ArrayRules, Control, ErrorKind, FieldElement, FieldError, FocusOptions, FormError,
    FormOptions, Mode, ResolverOptions, ResolverResult, Rules, SetValueOptions, Task, Tree,
};
use futures::executor::block_on;
use serde_json::{json, Value};

fn letters() -> FormOptions {
    FormOptions::default().with_default_values(json!({"items": [{"v": "a"}, {"v": "b"}, {"v": "c"}]}))
}

#[test]
pub fn remove_keeps_the_keys_of_remaining_rows() {
    // given
    let control = Control::new(letters());
    let items = control
        .field_array("items", ArrayRules::new())
        .unwrap();
    let keys = items.keys();
    let events = Recorder::<ArrayEvent>::new();
    let _subscription = control.subscribe_array(events.observer());

    // when
    block_on(items.remove(&[1])).unwrap();

    // then
    assert_eq!(control.get_value("items").unwrap(), Some(json!([{"v": "a"}, {"v": "c"}])));
    assert_eq!(items.keys(), vec![keys[0], keys[2]]);
    let events = events.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, "items");
    assert_eq!(events[0].action, ArrayAction::Remove);
    assert_eq!(events[0].rows.len(), 2);
}

#[test]
pub fn swapping_twice_restores_values_and_keys() {
    // given
    let control = Control::new(letters());
    let items = control
        .field_array("items", ArrayRules::new())
        .unwrap();
    let rows = items.fields();

    // when
    block_on(items.swap(0, 2)).unwrap();

    // then
    assert_eq!(control.get_value("items.0.v").unwrap(), Some(json!("c")));

    // when
    block_on(items.swap(0, 2)).unwrap();

    // then
    assert_eq!(items.fields(), rows);
}

#[test]
pub fn insert_only_keys_the_new_row() {
    // given
    let control = Control::new(letters());
    let items = control
        .field_array("items", ArrayRules::new())
        .unwrap();
    let keys = items.keys();

    // when
    block_on(items.insert(1, vec![json!({"v": "x"})], FocusOptions::none())).unwrap();

    // then
    let after = items.keys();
    assert_eq!(after.len(), 4);
    assert_eq!(after[0], keys[0]);
    assert_eq!(&after[2..], &keys[1..]);
    assert!(!keys.contains(&after[1]));
    assert_eq!(control.get_value("items.1.v").unwrap(), Some(json!("x")));
}

#[test]
pub fn move_update_and_replace() {
    // given
    let control = Control::new(letters());
    let items = control
        .field_array("items", ArrayRules::new())
        .unwrap();
    let keys = items.keys();

    // when
    block_on(items.move_row(0, 2)).unwrap();

    // then
    assert_eq!(items.keys(), vec![keys[1], keys[2], keys[0]]);

    // when
    block_on(items.update(0, json!({"v": "z"}))).unwrap();

    // then
    let after = items.keys();
    assert!(!keys.contains(&after[0]));
    assert_eq!(&after[1..], &[keys[2], keys[0]]);

    // when
    block_on(items.replace(vec![json!({"v": "q"})])).unwrap();

    // then
    assert_eq!(control.get_value("items").unwrap(), Some(json!([{"v": "q"}])));
    assert!(!after.contains(&items.keys()[0]));
}

#[test]
pub fn row_state_follows_its_row() {
    // given
    let control = Control::new(letters());
    let items = control
        .field_array("items", ArrayRules::new())
        .unwrap();
    for index in 0..3 {
        control
            .register(&format!("items.{}.v", index), Rules::new())
            .unwrap();
    }
    control
        .set_error("items.2.v", FieldError::manual("Taken"), false)
        .unwrap();

    // when
    block_on(items.remove(&[1])).unwrap();

    // then
    assert_eq!(
        control
            .get_field_state("items.1.v")
            .unwrap()
            .error,
        Some(FieldError::manual("Taken"))
    );
    assert!(!control
        .form_state()
        .errors
        .contains(&path("items.2")));
}

#[test]
pub fn removed_rows_detach_their_elements() {
    // given
    let control = Control::new(letters());
    let items = control
        .field_array("items", ArrayRules::new())
        .unwrap();
    let elements = [RecordingElement::new(), RecordingElement::new()];
    for (index, element) in elements.iter().enumerate() {
        control
            .register(&format!("items.{}.v", index), Rules::new())
            .unwrap()
            .attach(FieldElement::text().with_handle(element.handle()));
    }

    // when
    block_on(items.remove(&[1])).unwrap();

    // then
    assert_eq!(elements[0].detach_count(), 0);
    assert_eq!(elements[1].detach_count(), 1);
}

#[test]
pub fn array_rules_are_reported_as_root_errors() {
    // given
    let control = Control::new(letters().with_mode(Mode::OnChange));
    let items = control
        .field_array("items", ArrayRules::new().min_length(3, "Three rows please"))
        .unwrap();

    // when
    block_on(items.remove(&[0])).unwrap();

    // then
    let state = control.form_state();
    assert_eq!(
        state
            .root_errors
            .get("items")
            .map(|error| error.kind.clone()),
        Some(ErrorKind::MinLength)
    );
    assert!(!state.is_valid);

    // when
    block_on(items.append(vec![json!({"v": "d"})], FocusOptions::none())).unwrap();

    // then
    let state = control.form_state();
    assert!(state.root_errors.is_empty());
    assert!(state.is_valid);
}

#[test]
pub fn appended_rows_are_focused_once_attached() {
    // given
    let control = Control::new(letters());
    let items = control
        .field_array("items", ArrayRules::new())
        .unwrap();
    let element = RecordingElement::new();

    // when
    block_on(items.append(vec![json!({"v": "d"})], FocusOptions::default())).unwrap();
    control
        .register("items.3.v", Rules::new())
        .unwrap()
        .attach(FieldElement::text().with_handle(element.handle()));

    // then
    assert_eq!(element.focus_count(), 1);
}

#[test]
pub fn writing_the_array_value_rekeys_every_row() {
    // given
    let control = Control::new(letters());
    let items = control
        .field_array("items", ArrayRules::new())
        .unwrap();
    let keys = items.keys();
    let events = Recorder::<ArrayEvent>::new();
    let _subscription = control.subscribe_array(events.observer());

    // when
    block_on(control.set_value("items", json!([{"v": "a"}]), SetValueOptions::default())).unwrap();

    // then
    let after = items.keys();
    assert_eq!(after.len(), 1);
    assert!(!keys.contains(&after[0]));
    assert_eq!(events.events()[0].action, ArrayAction::Sync);
}

#[test]
pub fn unknown_arrays_fail() {
    // given
    let control = Control::new(letters());
    let items = control
        .field_array("items", ArrayRules::new())
        .unwrap();
    control.unregister_all(Default::default());

    // when
    let result = block_on(items.append(vec![json!({})], FocusOptions::none()));

    // then
    assert!(matches!(result, Err(FormError::UnknownFieldArray(name)) if name == "items"));
}

#[test]
pub fn shrinking_the_array_value_drops_state_of_the_removed_rows() {
    // given
    let control = Control::new(letters().with_mode(Mode::OnChange));
    let fields = ["items.0.v", "items.1.v", "items.2.v"]
        .into_iter()
        .map(|name| {
            control
                .register(name, Rules::new().required("Required"))
                .unwrap()
        })
        .collect::<Vec<_>>();
    for field in fields.iter().skip(1) {
        block_on(field.on_change("")).unwrap();
        block_on(field.on_blur()).unwrap();
    }
    assert!(control.form_state().errors.contains(&path("items.2.v")));

    // when
    block_on(control.set_value("items", json!([{"v": "a"}, {"v": ""}]), SetValueOptions::default())).unwrap();

    // then
    let state = control.form_state();
    assert!(state.errors.contains(&path("items.1.v")));
    assert!(!state.errors.contains(&path("items.2")));
    assert!(!state.touched_fields.contains(&path("items.2")));
    assert!(!state.dirty_fields.contains(&path("items.2")));
    assert!(!fields[2].state().invalid);
}

#[test]
pub fn fields_past_the_last_row_survive_row_operations() {
    // given
    let control = Control::new(letters());
    let items = control
        .field_array("items", ArrayRules::new())
        .unwrap();
    let element = RecordingElement::new();
    control
        .register("items.5.v", Rules::new())
        .unwrap()
        .attach(FieldElement::text().with_handle(element.handle()));

    // when
    block_on(items.remove(&[0])).unwrap();

    // then
    assert_eq!(element.detach_count(), 0);
}

#[test]
pub fn whole_array_resolver_errors_survive_row_operations() {
    // given
    let resolver = |values: Value, _context: Value, _options: ResolverOptions| {
        let mut errors = Tree::new();
        errors.set_leaf(&"items".parse().unwrap(), FieldError::new(ErrorKind::Validate, "Rows do not add up"));
        Task::done(Ok(ResolverResult {
            values,
            errors,
        }))
    };
    let control = Control::new(letters().with_resolver(resolver));
    let items = control
        .field_array("items", ArrayRules::new())
        .unwrap();
    control
        .register("items.0.v", Rules::new())
        .unwrap();

    // when
    let valid = block_on(control.trigger(Some(&["items.0.v"]), false)).unwrap();

    // then
    assert!(!valid);
    assert!(control.form_state().root_errors.contains_key("items"));

    // when
    block_on(items.append(vec![json!({"v": "d"})], FocusOptions::none())).unwrap();

    // then
    let state = control.form_state();
    assert_eq!(
        state
            .root_errors
            .get("items")
            .map(|error| error.message.clone()),
        Some("Rows do not add up".to_string())
    );
    assert!(!state.errors.contains(&path("items.0.v")));
}

#[test]
pub fn errors_on_the_array_itself_follow_no_row() {
    // given
    let control = Control::new(letters());
    control
        .set_error("items", FieldError::manual("Pick at least one"), false)
        .unwrap();
    let items = control
        .field_array("items", ArrayRules::new())
        .unwrap();

    // when
    block_on(items.prepend(vec![json!({"v": "z"})], FocusOptions::none())).unwrap();

    // then
    assert_eq!(
        control.form_state().errors.leaf(&path("items")),
        Some(&FieldError::manual("Pick at least one"))
    );
}
