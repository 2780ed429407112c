//! Deterministic in-memory stand-in for a browser's window messaging.
//!
//! A [`MemoryBus`] owns a tree of windows (top-level documents and the frames
//! embedded in them) and a single FIFO of posted packets. Nothing is delivered
//! until the bus is pumped with [`MemoryBus::deliver_next`] or
//! [`MemoryBus::run_until_idle`], which mirrors how `postMessage` queues a task
//! on the receiving event loop instead of running listeners inline.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use crate::error::{Result, TransportError};
use crate::host::{non_empty, FrameCandidate, FrameElement, HostDocument};
use crate::traits::{ListenerId, ReceiveCallback, Transport};

/// Identifies one window (document) on a [`MemoryBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(usize);

impl WindowId {
    /// Raw index on the owning bus.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window-{}", self.0)
    }
}

/// A packet posted on the bus, in posting order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedPacket {
    /// Window the packet was posted to.
    pub target: WindowId,
    /// Raw channel payload.
    pub payload: String,
}

struct WindowSlot {
    parent: Option<WindowId>,
    element_id: Option<String>,
    frames: Vec<WindowId>,
    listeners: Vec<(ListenerId, ReceiveCallback)>,
    removed: bool,
}

impl WindowSlot {
    fn new(parent: Option<WindowId>, element_id: Option<String>) -> Self {
        Self {
            parent,
            element_id,
            frames: Vec::new(),
            listeners: Vec::new(),
            removed: false,
        }
    }
}

#[derive(Default)]
struct BusState {
    windows: Vec<WindowSlot>,
    pending: VecDeque<PostedPacket>,
    transcript: Vec<PostedPacket>,
    next_listener: u64,
}

impl BusState {
    fn live(&self, id: WindowId) -> Result<&WindowSlot> {
        match self.windows.get(id.0) {
            Some(slot) if !slot.removed => Ok(slot),
            _ => Err(TransportError::UnknownWindow(id.0)),
        }
    }

    fn live_mut(&mut self, id: WindowId) -> Result<&mut WindowSlot> {
        match self.windows.get_mut(id.0) {
            Some(slot) if !slot.removed => Ok(slot),
            _ => Err(TransportError::UnknownWindow(id.0)),
        }
    }

    fn push_window(&mut self, slot: WindowSlot) -> WindowId {
        self.windows.push(slot);
        WindowId(self.windows.len() - 1)
    }
}

/// Single-threaded message bus shared by every window of one simulated page.
///
/// Cloning is cheap; clones refer to the same bus.
#[derive(Clone, Default)]
pub struct MemoryBus {
    state: Rc<RefCell<BusState>>,
}

impl MemoryBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a new top-level window.
    pub fn open_window(&self) -> WindowId {
        self.state
            .borrow_mut()
            .push_window(WindowSlot::new(None, None))
    }

    /// Embed a new frame in `parent`, optionally carrying an identifier
    /// attribute on its frame element.
    pub fn embed(&self, parent: WindowId, element_id: Option<&str>) -> Result<MemoryFrame> {
        let mut state = self.state.borrow_mut();
        state.live(parent)?;
        let window = state.push_window(WindowSlot::new(
            Some(parent),
            element_id.map(str::to_string),
        ));
        state.live_mut(parent)?.frames.push(window);
        tracing::trace!(%parent, %window, ?element_id, "embedded frame");
        Ok(MemoryFrame {
            bus: self.clone(),
            parent,
            window,
        })
    }

    /// Remove a frame (and its listeners) from its parent document.
    ///
    /// Packets already posted to the removed window are dropped on delivery.
    pub fn remove_frame(&self, frame: &MemoryFrame) {
        let mut state = self.state.borrow_mut();
        if let Ok(parent) = state.live_mut(frame.parent) {
            parent.frames.retain(|id| *id != frame.window);
        }
        if let Some(slot) = state.windows.get_mut(frame.window.0) {
            slot.removed = true;
            slot.listeners.clear();
        }
    }

    /// A transport that posts to `peer` and listens on `own`.
    pub fn transport(&self, own: WindowId, peer: WindowId) -> MemoryTransport {
        MemoryTransport {
            bus: self.clone(),
            own,
            peer,
        }
    }

    /// The window embedding `window`, if any.
    pub fn parent_of(&self, window: WindowId) -> Option<WindowId> {
        self.state
            .borrow()
            .windows
            .get(window.0)
            .and_then(|slot| slot.parent)
    }

    /// The host-document view seen from inside `window`.
    pub fn document(&self, window: WindowId) -> MemoryDocument {
        MemoryDocument {
            bus: self.clone(),
            window,
        }
    }

    /// Post a raw packet to `target`, bypassing any protocol layer.
    pub fn post(&self, target: WindowId, payload: impl Into<String>) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.live(target)?;
        let packet = PostedPacket {
            target,
            payload: payload.into(),
        };
        state.transcript.push(packet.clone());
        state.pending.push_back(packet);
        Ok(())
    }

    /// Number of posted packets not yet delivered.
    pub fn pending(&self) -> usize {
        self.state.borrow().pending.len()
    }

    /// Number of listeners currently registered on `window`.
    pub fn listener_count(&self, window: WindowId) -> usize {
        self.state
            .borrow()
            .windows
            .get(window.0)
            .map_or(0, |slot| slot.listeners.len())
    }

    /// Every packet posted so far, in posting order.
    pub fn transcript(&self) -> Vec<PostedPacket> {
        self.state.borrow().transcript.clone()
    }

    /// Deliver the oldest pending packet to every listener of its target.
    ///
    /// Returns `false` when nothing was pending.
    pub fn deliver_next(&self) -> bool {
        let (packet, listeners) = {
            let mut state = self.state.borrow_mut();
            let Some(packet) = state.pending.pop_front() else {
                return false;
            };
            let listeners: Vec<(ListenerId, ReceiveCallback)> = match state.live(packet.target) {
                Ok(slot) => slot.listeners.clone(),
                Err(_) => Vec::new(),
            };
            (packet, listeners)
        };

        tracing::trace!(
            target_window = %packet.target,
            listeners = listeners.len(),
            size = packet.payload.len(),
            "delivering packet"
        );

        for (id, callback) in listeners {
            // A listener removed by an earlier callback must not observe this packet.
            if self.is_registered(packet.target, id) {
                callback(&packet.payload);
            }
        }
        true
    }

    /// Deliver packets until none are pending, including packets posted by
    /// listeners along the way. Returns the number delivered.
    pub fn run_until_idle(&self) -> usize {
        let mut delivered = 0usize;
        while self.deliver_next() {
            delivered += 1;
        }
        delivered
    }

    fn is_registered(&self, window: WindowId, id: ListenerId) -> bool {
        self.state
            .borrow()
            .live(window)
            .map(|slot| slot.listeners.iter().any(|(existing, _)| *existing == id))
            .unwrap_or(false)
    }
}

impl fmt::Debug for MemoryBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("MemoryBus")
            .field("windows", &state.windows.len())
            .field("pending", &state.pending.len())
            .finish()
    }
}

/// Posts to one peer window and listens on the own window.
#[derive(Clone, Debug)]
pub struct MemoryTransport {
    bus: MemoryBus,
    own: WindowId,
    peer: WindowId,
}

impl MemoryTransport {
    /// The window this transport listens on.
    pub fn own(&self) -> WindowId {
        self.own
    }

    /// The window this transport posts to.
    pub fn peer(&self) -> WindowId {
        self.peer
    }
}

impl Transport for MemoryTransport {
    fn send(&self, payload: &str) -> Result<()> {
        self.bus.post(self.peer, payload)
    }

    fn on_receive(&self, callback: ReceiveCallback) -> Result<ListenerId> {
        let mut state = self.bus.state.borrow_mut();
        state.next_listener += 1;
        let id = ListenerId(state.next_listener);
        state.live_mut(self.own)?.listeners.push((id, callback));
        Ok(id)
    }

    fn detach(&self, id: ListenerId) {
        let mut state = self.bus.state.borrow_mut();
        if let Some(slot) = state.windows.get_mut(self.own.0) {
            slot.listeners.retain(|(existing, _)| *existing != id);
        }
    }
}

/// A frame element embedded in a parent window.
#[derive(Clone, Debug)]
pub struct MemoryFrame {
    bus: MemoryBus,
    parent: WindowId,
    window: WindowId,
}

impl MemoryFrame {
    /// The embedded document's window.
    pub fn window(&self) -> WindowId {
        self.window
    }

    /// The embedding document's window.
    pub fn parent(&self) -> WindowId {
        self.parent
    }

    /// Change (or clear) the frame element's identifier attribute.
    pub fn set_element_id(&self, element_id: Option<&str>) {
        if let Some(slot) = self.bus.state.borrow_mut().windows.get_mut(self.window.0) {
            slot.element_id = element_id.map(str::to_string);
        }
    }

    /// Parent-side transport: posts into the frame, listens on the parent.
    pub fn transport(&self) -> MemoryTransport {
        self.bus.transport(self.parent, self.window)
    }

    /// Child-side transport: posts to the parent, listens inside the frame.
    pub fn child_transport(&self) -> MemoryTransport {
        self.bus.transport(self.window, self.parent)
    }

    /// Host-document view from inside the frame.
    pub fn document(&self) -> MemoryDocument {
        self.bus.document(self.window)
    }
}

impl FrameElement for MemoryFrame {
    fn stable_id(&self) -> Option<String> {
        let state = self.bus.state.borrow();
        non_empty(
            state
                .windows
                .get(self.window.0)
                .and_then(|slot| slot.element_id.clone()),
        )
    }
}

/// View of the enclosing document from inside one window.
#[derive(Clone, Debug)]
pub struct MemoryDocument {
    bus: MemoryBus,
    window: WindowId,
}

impl HostDocument for MemoryDocument {
    fn enclosing_frames(&self) -> Option<Vec<FrameCandidate>> {
        let state = self.bus.state.borrow();
        let parent = state.live(self.window).ok()?.parent?;
        let frames = state
            .live(parent)
            .ok()?
            .frames
            .iter()
            .filter_map(|id| {
                let slot = state.windows.get(id.0)?;
                Some(FrameCandidate {
                    stable_id: non_empty(slot.element_id.clone()),
                    is_self: *id == self.window,
                })
            })
            .collect();
        Some(frames)
    }
}
