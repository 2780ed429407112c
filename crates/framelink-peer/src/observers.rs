use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Handle for a registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer<T> = Rc<dyn Fn(&T)>;

/// Registry of change observers for a value.
///
/// Observers may subscribe, unsubscribe, or read the observed value while
/// being notified.
pub struct Subscribers<T> {
    next_id: Cell<u64>,
    entries: RefCell<Vec<(SubscriptionId, Observer<T>)>>,
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self {
            next_id: Cell::new(0),
            entries: RefCell::new(Vec::new()),
        }
    }
}

impl<T> Subscribers<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, observer: impl Fn(&T) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.entries.borrow_mut().push((id, Rc::new(observer)));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    /// Call every observer registered at the time of the call.
    pub fn notify(&self, value: &T) {
        let snapshot: Vec<Observer<T>> = self
            .entries
            .borrow()
            .iter()
            .map(|(_, observer)| observer.clone())
            .collect();
        for observer in snapshot {
            observer(value);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl<T> fmt::Debug for Subscribers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifies_in_subscription_order() {
        let subscribers = Subscribers::<u32>::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        for tag in ["first", "second"] {
            let sink = seen.clone();
            subscribers.subscribe(move |value: &u32| sink.borrow_mut().push(format!("{tag}:{value}")));
        }
        subscribers.notify(&7);

        assert_eq!(*seen.borrow(), vec!["first:7", "second:7"]);
    }

    #[test]
    fn unsubscribed_observer_is_silent() {
        let subscribers = Subscribers::<u32>::new();
        let hits = Rc::new(Cell::new(0));
        let sink = hits.clone();
        let id = subscribers.subscribe(move |_| sink.set(sink.get() + 1));

        assert!(subscribers.unsubscribe(id));
        assert!(!subscribers.unsubscribe(id));
        subscribers.notify(&1);

        assert_eq!(hits.get(), 0);
        assert!(subscribers.is_empty());
    }

    #[test]
    fn observer_may_subscribe_during_notify() {
        let subscribers = Rc::new(Subscribers::<u32>::new());
        let registry = subscribers.clone();
        subscribers.subscribe(move |_| {
            registry.subscribe(|_| {});
        });

        subscribers.notify(&1);
        assert_eq!(subscribers.len(), 2);
    }
}
