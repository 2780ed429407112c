//! Two-frame example: one page embeds two frames, queues a greeting for each
//! before they load, and shares a counter with the first.
//!
//! Run with:
//!   cargo run --example two-frames --features peer

use std::rc::Rc;

use framelink::peer::{Dispatcher, Link, LinkBuilder, ManualClock, SharedState};
use framelink::transport::MemoryBus;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum Greeting {
    Hello { to: String },
    Reply { from: String },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let bus = MemoryBus::new();
    let page = bus.open_window();
    let left = bus.embed(page, Some("left"))?;
    let right = bus.embed(page, Some("right"))?;

    let mut parents = Vec::new();
    for frame in [&left, &right] {
        let parent: Link<Greeting> = Link::builder(frame.transport())
            .target(frame.clone())
            .on_message(|message, _: &Dispatcher<Greeting>| {
                eprintln!("[page] received {message:?}");
            })
            .start()?;
        let to = parent.expected_id().unwrap_or_default();
        parent.dispatch(&Greeting::Hello { to })?;
        eprintln!(
            "[page] queued greeting, handshake {} ({} waiting)",
            parent.state(),
            parent.queued()
        );
        parents.push(parent);
    }

    let mut children = Vec::new();
    for frame in [&left, &right] {
        let child: Link<Greeting> = Link::builder(frame.child_transport())
            .document(frame.document())
            .on_message(|message, reply: &Dispatcher<Greeting>| {
                if let Greeting::Hello { to } = message {
                    eprintln!("[{to}] greeted by page");
                    if let Err(err) = reply.dispatch(&Greeting::Reply { from: to }) {
                        eprintln!("[child] reply failed: {err}");
                    }
                }
            })
            .start()?;
        children.push(child);
    }

    bus.run_until_idle();
    for parent in &parents {
        eprintln!(
            "[page] link to {:?} is {}",
            parent.expected_id(),
            parent.state()
        );
    }

    // A second pair of links on the left frame carries a shared counter.
    let clock = Rc::new(ManualClock::new(1));
    let page_counter = SharedState::start_with_clock(
        LinkBuilder::new(left.transport()).target(left.clone()),
        0u32,
        clock.clone(),
    )?;
    let frame_counter = SharedState::start_with_clock(
        LinkBuilder::new(left.child_transport()).document(left.document()),
        0u32,
        clock.clone(),
    )?;
    frame_counter.subscribe(|value: &u32| eprintln!("[left] counter is now {value}"));

    page_counter.update(|count| count + 1)?;
    clock.advance(5);
    page_counter.update(|count| count + 1)?;
    bus.run_until_idle();

    eprintln!(
        "[page] counter={} [left] counter={}",
        page_counter.get(),
        frame_counter.get()
    );
    Ok(())
}
