mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::dirty;
use form_state::test::Recorder;
use form_state::{
    ChangeKind, Control, FormOptions, FormStateFlags, ResetOptions, SetValueOptions, StateEvent, SubscriptionBag,
    ValuesEvent,
};
use futures::executor::block_on;
use serde_json::json;

fn names(events: &Recorder<ValuesEvent>) -> Vec<(Option<String>, ChangeKind)> {
    events
        .events()
        .into_iter()
        .map(|event| (event.name, event.kind))
        .collect()
}

#[test]
pub fn value_subscriptions_filter_by_name() {
    // given
    let control = Control::new(FormOptions::default());
    let related = Recorder::<ValuesEvent>::new();
    let exact = Recorder::<ValuesEvent>::new();
    let _related = control
        .subscribe_values(Some(&["a"]), false, related.observer())
        .unwrap();
    let _exact = control
        .subscribe_values(Some(&["a.b"]), true, exact.observer())
        .unwrap();

    // when
    block_on(control.set_value("a.b", json!(1), SetValueOptions::default())).unwrap();
    block_on(control.set_value("c", json!(1), SetValueOptions::default())).unwrap();
    block_on(control.set_value("a", json!({"b": 2}), SetValueOptions::default())).unwrap();
    block_on(control.reset(None, ResetOptions::default())).unwrap();

    // then
    assert_eq!(
        names(&related),
        vec![
            (Some("a.b".to_string()), ChangeKind::SetValue),
            (Some("a".to_string()), ChangeKind::SetValue),
            (None, ChangeKind::Reset),
        ]
    );
    assert_eq!(
        names(&exact),
        vec![(Some("a.b".to_string()), ChangeKind::SetValue), (None, ChangeKind::Reset)]
    );
    assert_eq!(
        related.events()[1].values.as_ref(),
        &json!({"a": {"b": 2}, "c": 1})
    );
}

#[test]
pub fn state_subscriptions_only_see_their_flags() {
    // given
    let control = Control::new(FormOptions::default().with_default_values(json!({"a": 1})));
    let events = Recorder::<StateEvent>::new();
    let _subscription = control
        .subscribe_form_state(FormStateFlags::IS_DIRTY, None, false, events.observer())
        .unwrap();

    // when
    block_on(control.set_value("a", json!(2), dirty())).unwrap();
    block_on(control.set_value("a", json!(3), dirty())).unwrap();

    // then
    let events = events.events();
    assert_eq!(events.len(), 1);
    assert!(events[0].changed.contains(FormStateFlags::IS_DIRTY));
    assert!(events[0].state.is_dirty);
    assert_eq!(events[0].name.as_deref(), Some("a"));
}

#[test]
pub fn dropped_subscriptions_stop_receiving() {
    // given
    let control = Control::new(FormOptions::default());
    let events = Recorder::<ValuesEvent>::new();
    let bag = SubscriptionBag::new();
    bag.add(
        control
            .subscribe_values(None, false, events.observer())
            .unwrap(),
    );
    block_on(control.set_value("a", json!(1), SetValueOptions::default())).unwrap();

    // when
    bag.unsubscribe_all();
    block_on(control.set_value("a", json!(2), SetValueOptions::default())).unwrap();

    // then
    assert_eq!(events.len(), 1);
}

#[test]
pub fn observers_may_read_the_form() {
    // given
    let control = Control::new(FormOptions::default());
    let seen = Arc::new(AtomicUsize::new(0));
    let _subscription = control
        .subscribe_values(None, false, {
            let control = control.clone();
            let seen = seen.clone();
            move |_event: &ValuesEvent| {
                if control.get_value("a").unwrap() == Some(json!(1)) {
                    seen.fetch_add(1, Ordering::SeqCst);
                }
            }
        })
        .unwrap();

    // when
    block_on(control.set_value("a", json!(1), SetValueOptions::default())).unwrap();

    // then
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}
