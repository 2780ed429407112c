use std::cell::Cell;
use std::rc::Rc;

use framelink_peer::{Dispatcher, HandshakeState, Link};
use framelink_transport::{MemoryBus, MemoryFrame};
use serde_json::Value;

use crate::cmd::SimulateArgs;
use crate::exit::{link_error, transport_error, CliError, CliResult, FAILURE, SUCCESS, USAGE};
use crate::output::{print_simulation, LinkReport, OutputFormat};

struct Pair {
    frame: MemoryFrame,
    id: String,
    lost: bool,
    parent: Option<Link<Value>>,
    // Held so the child keeps listening until the page is idle.
    _child: Option<Link<Value>>,
    delivered: Rc<Cell<usize>>,
}

/// Embed one frame per id, queue messages on every parent link before its
/// child loads, then pump the page until idle.
///
/// Exits with `FAILURE` when any parent is still waiting for its child.
pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    let frames: Vec<String> = args
        .frames
        .iter()
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();
    if frames.is_empty() {
        return Err(CliError::new(USAGE, "--frames must name at least one frame"));
    }
    if let Some(unknown) = args.lose.iter().find(|id| !frames.contains(id)) {
        return Err(CliError::new(
            USAGE,
            format!("--lose names unknown frame {unknown}"),
        ));
    }
    let message: Value = serde_json::from_str(&args.message)
        .map_err(|err| CliError::new(USAGE, format!("--message is not valid JSON: {err}")))?;

    let bus = MemoryBus::new();
    let top = bus.open_window();
    let mut pairs = Vec::with_capacity(frames.len());
    for id in frames {
        let frame = bus
            .embed(top, Some(&id))
            .map_err(|err| transport_error("embed failed", err))?;
        let lost = args.lose.contains(&id);
        pairs.push(Pair {
            frame,
            id,
            lost,
            parent: None,
            _child: None,
            delivered: Rc::new(Cell::new(0)),
        });
    }

    // Children that load first announce to a parent with no listener yet.
    for pair in pairs.iter_mut().filter(|pair| pair.lost) {
        pair._child = Some(start_child(pair)?);
    }
    bus.run_until_idle();

    for pair in &mut pairs {
        let parent = Link::<Value>::builder(pair.frame.transport())
            .target(pair.frame.clone())
            .start()
            .map_err(|err| link_error(&format!("parent link for {} failed", pair.id), err))?;
        for _ in 0..args.count {
            parent
                .dispatch(&message)
                .map_err(|err| link_error("dispatch failed", err))?;
        }
        pair.parent = Some(parent);
    }

    for pair in pairs.iter_mut().filter(|pair| !pair.lost) {
        pair._child = Some(start_child(pair)?);
    }
    let delivered = bus.run_until_idle();
    tracing::debug!(delivered, "page idle");

    let reports: Vec<LinkReport> = pairs.iter().map(report).collect();
    let stalled = reports
        .iter()
        .any(|report| report.handshake != HandshakeState::Established.to_string());

    let transcript = args.transcript.then(|| bus.transcript());
    print_simulation(&reports, transcript.as_deref(), format);

    Ok(if stalled { FAILURE } else { SUCCESS })
}

fn start_child(pair: &Pair) -> CliResult<Link<Value>> {
    let delivered = pair.delivered.clone();
    Link::builder(pair.frame.child_transport())
        .document(pair.frame.document())
        .on_message(move |_: Value, _: &Dispatcher<Value>| {
            delivered.set(delivered.get() + 1);
        })
        .start()
        .map_err(|err| link_error(&format!("child link for {} failed", pair.id), err))
}

fn report(pair: &Pair) -> LinkReport {
    let (handshake, queued) = match &pair.parent {
        Some(parent) => (parent.state().to_string(), parent.queued()),
        None => (HandshakeState::Pending.to_string(), 0),
    };
    LinkReport {
        frame: pair.id.clone(),
        handshake,
        queued,
        delivered: pair.delivered.get(),
        announcement_lost: pair.lost,
    }
}
