use std::cell::RefCell;
use std::rc::Rc;

use framelink_peer::{Clock, HandshakeState, LinkBuilder, ManualClock, SharedState};
use framelink_transport::{MemoryBus, MemoryFrame};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Counter {
    count: u32,
    label: String,
}

impl Counter {
    fn new(count: u32, label: &str) -> Self {
        Self {
            count,
            label: label.to_string(),
        }
    }
}

struct Pair {
    bus: MemoryBus,
    parent: SharedState<Counter>,
    child: SharedState<Counter>,
    parent_clock: Rc<ManualClock>,
    child_clock: Rc<ManualClock>,
}

fn pair(frame_id: &str) -> Pair {
    let bus = MemoryBus::new();
    let top = bus.open_window();
    let frame: MemoryFrame = bus.embed(top, Some(frame_id)).expect("frame should embed");

    let parent_clock = Rc::new(ManualClock::new(1_000));
    let child_clock = Rc::new(ManualClock::new(1_000));
    let initial = Counter::new(0, "initial");

    let parent = SharedState::start_with_clock(
        LinkBuilder::new(frame.transport()).target(frame.clone()),
        initial.clone(),
        parent_clock.clone() as Rc<dyn Clock>,
    )
    .expect("parent state should start");
    let child = SharedState::start_with_clock(
        LinkBuilder::new(frame.child_transport()).document(frame.document()),
        initial,
        child_clock.clone() as Rc<dyn Clock>,
    )
    .expect("child state should start");

    Pair {
        bus,
        parent,
        child,
        parent_clock,
        child_clock,
    }
}

#[test]
fn both_sides_start_from_the_initial_value() {
    let pair = pair("state");
    pair.bus.run_until_idle();

    assert_eq!(pair.parent.get(), Counter::new(0, "initial"));
    assert_eq!(pair.child.get(), Counter::new(0, "initial"));
    assert_eq!(pair.parent.link().state(), HandshakeState::Established);

    let record = pair.child.record();
    assert_eq!(record.local_timestamp, 0);
    assert_eq!(record.remote_timestamp, 0);
}

#[test]
fn child_write_reaches_parent() {
    let pair = pair("state");
    pair.bus.run_until_idle();

    pair.child
        .set(Counter::new(1, "child"))
        .expect("set should broadcast");
    assert_eq!(pair.child.get(), Counter::new(1, "child"));
    assert_eq!(pair.parent.get(), Counter::new(0, "initial"));

    pair.bus.run_until_idle();
    assert_eq!(pair.parent.get(), Counter::new(1, "child"));

    let record = pair.parent.record();
    assert_eq!(record.remote_timestamp, 1_000);
    assert_eq!(record.local_timestamp, 0);
}

#[test]
fn parent_write_before_handshake_arrives_after_it() {
    let bus = MemoryBus::new();
    let top = bus.open_window();
    let frame = bus.embed(top, Some("late-child")).expect("frame should embed");

    let parent = SharedState::start_with_clock(
        LinkBuilder::new(frame.transport()).target(frame.clone()),
        10u64,
        Rc::new(ManualClock::new(5)),
    )
    .expect("parent state should start");
    parent.set(11).expect("set should queue");
    assert_eq!(parent.link().queued(), 1);
    assert_eq!(parent.get(), 11);

    let child = SharedState::start_with_clock(
        LinkBuilder::new(frame.child_transport()).document(frame.document()),
        10u64,
        Rc::new(ManualClock::new(1)),
    )
    .expect("child state should start");
    assert_eq!(child.get(), 10);

    bus.run_until_idle();
    assert_eq!(parent.link().queued(), 0);
    assert_eq!(child.get(), 11);
}

#[test]
fn later_write_wins_across_the_link() {
    let pair = pair("state");
    pair.bus.run_until_idle();

    pair.parent_clock.set(10);
    pair.child_clock.set(5);
    pair.parent
        .set(Counter::new(1, "parent@10"))
        .expect("set should broadcast");
    pair.child
        .set(Counter::new(2, "child@5"))
        .expect("set should broadcast");
    pair.bus.run_until_idle();

    assert_eq!(pair.parent.get(), Counter::new(1, "parent@10"));
    assert_eq!(pair.child.get(), Counter::new(1, "parent@10"));

    pair.child_clock.set(15);
    pair.child
        .set(Counter::new(3, "child@15"))
        .expect("set should broadcast");
    pair.bus.run_until_idle();

    assert_eq!(pair.parent.get(), Counter::new(3, "child@15"));
    assert_eq!(pair.child.get(), Counter::new(3, "child@15"));
}

#[test]
fn subscribers_hear_remote_updates() {
    let pair = pair("state");
    pair.bus.run_until_idle();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    pair.parent
        .subscribe(move |value: &Counter| sink.borrow_mut().push(value.count));

    pair.child
        .update(|current| Counter::new(current.count + 1, "bumped"))
        .expect("update should broadcast");
    pair.child
        .update(|current| Counter::new(current.count + 1, "bumped"))
        .expect("update should broadcast");
    pair.bus.run_until_idle();

    assert_eq!(*seen.borrow(), vec![1, 2]);
}

#[test]
fn subscriber_may_write_while_notified() {
    let pair = pair("state");
    pair.bus.run_until_idle();

    let parent = Rc::new(pair.parent);
    let echo = Rc::downgrade(&parent);
    parent.subscribe(move |value: &Counter| {
        if value.label == "ask" {
            if let Some(parent) = echo.upgrade() {
                parent
                    .set(Counter::new(value.count * 10, "answer"))
                    .expect("set should broadcast");
            }
        }
    });

    pair.child_clock.set(2_000);
    pair.parent_clock.set(3_000);
    pair.child
        .set(Counter::new(4, "ask"))
        .expect("set should broadcast");
    pair.bus.run_until_idle();

    assert_eq!(parent.get(), Counter::new(40, "answer"));
    assert_eq!(pair.child.get(), Counter::new(40, "answer"));
}

#[test]
fn stopping_discards_unsent_broadcasts() {
    let bus = MemoryBus::new();
    let top = bus.open_window();
    let frame = bus.embed(top, Some("never")).expect("frame should embed");

    let parent = SharedState::start_with_clock(
        LinkBuilder::new(frame.transport()).target(frame.clone()),
        0i32,
        Rc::new(ManualClock::new(1)),
    )
    .expect("parent state should start");
    parent.set(1).expect("set should queue");
    parent.set(2).expect("set should queue");

    assert_eq!(parent.stop(), 2);
    assert_eq!(bus.listener_count(top), 0);
}
