use parking_lot::Mutex;

use crate::subject::Subscription;

/// Keeps a group of subscriptions alive, typically everything a single view subscribed to.
///
/// Dropping the bag, or calling [`SubscriptionBag::unsubscribe_all`], tears them all down.
#[derive(Debug, Default)]
pub struct SubscriptionBag {
    subscriptions: Mutex<Vec<Subscription>>,
}

impl SubscriptionBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, subscription: Subscription) {
        self.subscriptions.lock().push(subscription);
    }

    pub fn len(&self) -> usize {
        self.subscriptions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.lock().is_empty()
    }

    pub fn unsubscribe_all(&self) {
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        for subscription in subscriptions {
            subscription.unsubscribe();
        }
    }
}
