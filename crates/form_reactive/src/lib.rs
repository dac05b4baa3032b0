//! A minimal multicast observer bus.
//!
//! A [`Subject`] delivers each payload synchronously, in subscription order, to the observers
//! subscribed at the time of the call.  Subscribing returns a [`Subscription`] guard that
//! unsubscribes when dropped; a [`SubscriptionBag`] keeps a group of guards alive together.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use form_reactive::Subject;
//!
//! let subject = Subject::<usize>::new();
//! let total = Arc::new(AtomicUsize::new(0));
//!
//! let subscription = subject.subscribe({
//!     let total = total.clone();
//!     move |value: &usize| {
//!         total.fetch_add(*value, Ordering::SeqCst);
//!     }
//! });
//!
//! subject.next(&2);
//! subscription.unsubscribe();
//! subject.next(&3);
//!
//! assert_eq!(total.load(Ordering::SeqCst), 2);
//! ```

mod bag;
mod subject;

pub use bag::SubscriptionBag;
pub use subject::{Subject, Subscription};
