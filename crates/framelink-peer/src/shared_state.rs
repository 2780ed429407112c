//! Last-write-wins shared value carried over a link.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use framelink_wire::{ControlMessage, StateMessage};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::clock::{next_timestamp, Clock, SystemClock};
use crate::error::Result;
use crate::link::{Link, LinkBuilder};
use crate::observers::{Subscribers, SubscriptionId};

/// Both sides of a shared value with the times they were written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateRecord<S> {
    pub local_value: S,
    pub local_timestamp: u64,
    pub remote_value: S,
    pub remote_timestamp: u64,
}

impl<S: Clone> StateRecord<S> {
    /// Both sides start at `initial` with timestamp zero.
    pub fn new(initial: S) -> Self {
        Self {
            local_value: initial.clone(),
            local_timestamp: 0,
            remote_value: initial,
            remote_timestamp: 0,
        }
    }
}

impl<S> StateRecord<S> {
    /// The local value if it was written strictly later, otherwise the
    /// remote one. Ties go to the remote side.
    pub fn observed(&self) -> &S {
        if self.local_timestamp > self.remote_timestamp {
            &self.local_value
        } else {
            &self.remote_value
        }
    }

    pub fn apply_local(&mut self, value: S, timestamp: u64) {
        self.local_value = value;
        self.local_timestamp = timestamp;
    }

    /// Stored unconditionally, even when older than what is held.
    pub fn apply_remote(&mut self, value: S, timestamp: u64) {
        self.remote_value = value;
        self.remote_timestamp = timestamp;
    }
}

struct StateInner<S> {
    record: RefCell<StateRecord<S>>,
    clock: Rc<dyn Clock>,
    subscribers: Subscribers<S>,
}

impl<S: Clone> StateInner<S> {
    fn observed(&self) -> S {
        self.record.borrow().observed().clone()
    }

    fn publish(&self) {
        let observed = self.observed();
        self.subscribers.notify(&observed);
    }

    fn receive(&self, message: StateMessage<S>) {
        match message.body {
            ControlMessage::SetState { state, timestamp } => {
                tracing::trace!(timestamp, "applying remote state");
                self.record.borrow_mut().apply_remote(state, timestamp);
                self.publish();
            }
            ControlMessage::Mounted { .. } => {
                tracing::trace!("ignoring announcement on state channel");
            }
        }
    }
}

/// A value shared between a parent and one child.
///
/// Each side keeps its own last write and the peer's last broadcast; readers
/// see whichever was written later. Subscribers are notified with the
/// observed value after every local or remote update.
pub struct SharedState<S> {
    inner: Rc<StateInner<S>>,
    link: Link<StateMessage<S>>,
}

impl<S> SharedState<S>
where
    S: Clone + Serialize + DeserializeOwned + 'static,
{
    /// Start the link in `builder` carrying a shared value, stamped with the
    /// system clock.
    ///
    /// Any message handler already set on `builder` is replaced.
    pub fn start(builder: LinkBuilder<StateMessage<S>>, initial: S) -> Result<Self> {
        Self::start_with_clock(builder, initial, Rc::new(SystemClock))
    }

    pub fn start_with_clock(
        builder: LinkBuilder<StateMessage<S>>,
        initial: S,
        clock: Rc<dyn Clock>,
    ) -> Result<Self> {
        let inner = Rc::new(StateInner {
            record: RefCell::new(StateRecord::new(initial)),
            clock,
            subscribers: Subscribers::new(),
        });

        let weak: Weak<StateInner<S>> = Rc::downgrade(&inner);
        let link = builder
            .carrying_state()
            .on_message(move |message, _| {
                if let Some(inner) = weak.upgrade() {
                    inner.receive(message);
                }
            })
            .start()?;

        Ok(Self { inner, link })
    }

    /// The observed value.
    pub fn get(&self) -> S {
        self.inner.observed()
    }

    /// Write a new local value and broadcast it to the peer.
    ///
    /// Broadcasts queue like any other message, so a parent's writes reach
    /// the child only once the handshake completes.
    pub fn set(&self, value: S) -> Result<()> {
        let previous = self.inner.record.borrow().local_timestamp;
        let timestamp = next_timestamp(self.inner.clock.as_ref(), previous);

        self.link
            .dispatch(&StateMessage::set_state(value.clone(), timestamp))?;
        self.inner.record.borrow_mut().apply_local(value, timestamp);
        tracing::trace!(timestamp, "applied local state");

        self.inner.publish();
        Ok(())
    }

    /// Replace the value with `f(observed)`.
    pub fn update<F>(&self, f: F) -> Result<()>
    where
        F: FnOnce(&S) -> S,
    {
        let next = f(&self.get());
        self.set(next)
    }

    pub fn subscribe(&self, observer: impl Fn(&S) + 'static) -> SubscriptionId {
        self.inner.subscribers.subscribe(observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.subscribers.unsubscribe(id)
    }

    /// Snapshot of both sides and their timestamps.
    pub fn record(&self) -> StateRecord<S> {
        self.inner.record.borrow().clone()
    }
}

impl<S> SharedState<S> {
    /// The link carrying state broadcasts.
    pub fn link(&self) -> &Link<StateMessage<S>> {
        &self.link
    }

    /// Stop the underlying link. Returns the number of unsent broadcasts
    /// discarded.
    pub fn stop(self) -> usize {
        self.link.stop()
    }
}

impl<S: fmt::Debug> fmt::Debug for SharedState<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("SharedState");
        match self.inner.record.try_borrow() {
            Ok(record) => debug.field("record", &*record),
            Err(_) => debug.field("record", &"<busy>"),
        };
        debug
            .field("subscribers", &self.inner.subscribers.len())
            .field("link", &self.link)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use framelink_transport::MemoryBus;

    use super::*;
    use crate::clock::ManualClock;

    #[test]
    fn newer_side_wins() {
        let mut record = StateRecord::new("initial");
        assert_eq!(*record.observed(), "initial");

        record.apply_local("mine", 10);
        record.apply_remote("theirs", 5);
        assert_eq!(*record.observed(), "mine");

        record.apply_remote("newer", 15);
        assert_eq!(*record.observed(), "newer");
    }

    #[test]
    fn ties_go_to_remote() {
        let mut record = StateRecord::new(0);
        record.apply_local(1, 7);
        record.apply_remote(2, 7);
        assert_eq!(*record.observed(), 2);
    }

    #[test]
    fn stale_remote_is_still_stored() {
        let mut record = StateRecord::new(0);
        record.apply_remote(5, 20);
        record.apply_remote(3, 4);
        assert_eq!(record.remote_value, 3);
        assert_eq!(record.remote_timestamp, 4);
    }

    #[test]
    fn set_stamps_strictly_increasing_timestamps() {
        let bus = MemoryBus::new();
        let top = bus.open_window();
        let frame = bus.embed(top, Some("state")).unwrap();
        let clock = Rc::new(ManualClock::new(100));

        let state = SharedState::start_with_clock(
            LinkBuilder::new(frame.transport()).target(frame.clone()),
            0u32,
            clock.clone(),
        )
        .unwrap();

        state.set(1).unwrap();
        state.set(2).unwrap();
        clock.set(50);
        state.set(3).unwrap();

        let record = state.record();
        assert_eq!(record.local_value, 3);
        assert_eq!(record.local_timestamp, 102);
        assert_eq!(state.get(), 3);
        assert_eq!(state.link().queued(), 3);
    }

    #[test]
    fn subscribers_see_local_writes() {
        let bus = MemoryBus::new();
        let top = bus.open_window();
        let frame = bus.embed(top, Some("state")).unwrap();

        let state = SharedState::start_with_clock(
            LinkBuilder::new(frame.transport()).target(frame.clone()),
            String::from("a"),
            Rc::new(ManualClock::new(1)),
        )
        .unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let id = state.subscribe(move |value: &String| sink.borrow_mut().push(value.clone()));

        state.update(|value| format!("{value}b")).unwrap();
        assert!(state.unsubscribe(id));
        state.set("ignored".to_string()).unwrap();

        assert_eq!(*seen.borrow(), vec!["ab".to_string()]);
    }
}
