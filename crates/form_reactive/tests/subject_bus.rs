use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use form_reactive::{Subject, SubscriptionBag};

#[test]
pub fn observers_added_during_delivery_see_the_next_payload_only() {
    // given
    let subject = Subject::<u32>::new();
    let late_calls = Arc::new(AtomicUsize::new(0));
    let bag = Arc::new(SubscriptionBag::new());
    let _joiner = subject.subscribe({
        let subject = subject.clone();
        let bag = bag.clone();
        let late_calls = late_calls.clone();
        move |_| {
            if bag.is_empty() {
                let late_calls = late_calls.clone();
                bag.add(subject.subscribe(move |_| {
                    late_calls.fetch_add(1, Ordering::SeqCst);
                }));
            }
        }
    });

    // when
    subject.next(&1);

    // then
    assert_eq!(late_calls.load(Ordering::SeqCst), 0);

    // when
    subject.next(&2);

    // then
    assert_eq!(late_calls.load(Ordering::SeqCst), 1);
}

#[test]
pub fn publishing_from_several_threads() {
    // given
    let subject = Subject::<usize>::new();
    let total = Arc::new(AtomicUsize::new(0));
    let _subscription = subject.subscribe({
        let total = total.clone();
        move |value| {
            total.fetch_add(*value, Ordering::SeqCst);
        }
    });

    // when
    let handles = (1..=4)
        .map(|value| {
            let subject = subject.clone();
            thread::spawn(move || subject.next(&value))
        })
        .collect::<Vec<_>>();
    for handle in handles {
        handle.join().unwrap();
    }

    // then
    assert_eq!(total.load(Ordering::SeqCst), 10);
}
