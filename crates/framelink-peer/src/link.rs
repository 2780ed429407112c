use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use framelink_transport::{FrameElement, HostDocument, ListenerId, ReceiveCallback, Transport};
use framelink_wire::{decode, encode, to_payload};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::config::LinkConfig;
use crate::error::{LinkError, Result};
use crate::handshake::{announce, Handshake, HandshakeState};
use crate::identity::{discover_child, resolve_parent, LinkIdentity, Role};
use crate::queue::{Gate, OutboundQueue, QueuedMessage};
use crate::router::{route, Route};

/// Caller-supplied handler for accepted application messages.
pub type MessageHandler<M> = Box<dyn FnMut(M, &Dispatcher<M>)>;

/// Which inbound messages reach a link's handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Traffic {
    /// Caller-defined messages; internally tagged traffic is withheld.
    Application,
    /// `set-state` broadcasts only.
    State,
}

/// Configures and starts a [`Link`].
///
/// Supplying a [`target`](Self::target) frame makes the link a parent;
/// otherwise it is a child and locates itself through its
/// [`document`](Self::document).
pub struct LinkBuilder<M> {
    transport: Rc<dyn Transport>,
    target: Option<Rc<dyn FrameElement>>,
    document: Option<Rc<dyn HostDocument>>,
    handler: Option<MessageHandler<M>>,
    config: LinkConfig,
    traffic: Traffic,
}

impl<M> LinkBuilder<M>
where
    M: Serialize + DeserializeOwned + 'static,
{
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Rc::new(transport),
            target: None,
            document: None,
            handler: None,
            config: LinkConfig::default(),
            traffic: Traffic::Application,
        }
    }

    /// Bind to an embedded frame (parent role).
    pub fn target(mut self, frame: impl FrameElement + 'static) -> Self {
        self.target = Some(Rc::new(frame));
        self
    }

    /// The enclosing-document view used to discover a child's identity.
    pub fn document(mut self, document: impl HostDocument + 'static) -> Self {
        self.document = Some(Rc::new(document));
        self
    }

    /// Handle accepted application messages. Replaces any previous handler.
    pub fn on_message<F>(mut self, handler: F) -> Self
    where
        F: FnMut(M, &Dispatcher<M>) + 'static,
    {
        self.handler = Some(Box::new(handler));
        self
    }

    /// Override link behavior config.
    pub fn with_config(mut self, config: LinkConfig) -> Self {
        self.config = config;
        self
    }

    /// Hand `set-state` broadcasts, and nothing else, to the handler.
    pub(crate) fn carrying_state(mut self) -> Self {
        self.traffic = Traffic::State;
        self
    }

    /// Role the link will take when started.
    pub fn role(&self) -> Role {
        Role::for_target(self.target.is_some())
    }

    /// Resolve identity, attach the channel listener, and (as a child)
    /// announce this document to its parent.
    ///
    /// Fails with [`LinkError::MissingFrameId`] if the target frame has no
    /// identifier and with [`LinkError::Unaddressable`] if a child cannot find
    /// its own frame element.
    pub fn start(self) -> Result<Link<M>> {
        let identity = match (&self.target, &self.document) {
            (Some(frame), _) => resolve_parent(frame.as_ref())?,
            (None, Some(document)) => discover_child(document.as_ref())?,
            (None, None) => return Err(LinkError::Unaddressable),
        };

        let shared = Rc::new_cyclic(|this| Shared {
            this: this.clone(),
            core: RefCell::new(LinkCore {
                identity: identity.clone(),
                target: self.target.clone(),
                traffic: self.traffic,
                handshake: Handshake::new(),
                queue: OutboundQueue::new(),
                transport: self.transport.clone(),
                listener: None,
                config: self.config,
                stopped: false,
            }),
            handler: RefCell::new(self.handler),
            stop_pending: Cell::new(false),
        });

        let weak = Rc::downgrade(&shared);
        let callback: ReceiveCallback = Rc::new(move |wire: &str| {
            if let Some(shared) = weak.upgrade() {
                shared.receive(wire);
            }
        });
        let listener = self.transport.on_receive(callback)?;
        shared.core.borrow_mut().listener = Some(listener);

        if let LinkIdentity::Child { local_id } = &identity {
            if let Err(err) = announce(self.transport.as_ref(), local_id) {
                tracing::warn!(error = %err, local_id = %local_id, "failed sending announcement");
            }
            shared.core.borrow_mut().handshake.mark_announced();
        }

        tracing::debug!(
            role = %identity.role(),
            expected_id = ?identity.expected_id(),
            local_id = ?identity.local_id(),
            %listener,
            "link started"
        );

        Ok(Link { shared })
    }
}

impl<M> fmt::Debug for LinkBuilder<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkBuilder")
            .field("role", &Role::for_target(self.target.is_some()))
            .field("has_document", &self.document.is_some())
            .field("has_handler", &self.handler.is_some())
            .field("config", &self.config)
            .field("traffic", &self.traffic)
            .finish()
    }
}

struct LinkCore {
    identity: LinkIdentity,
    target: Option<Rc<dyn FrameElement>>,
    traffic: Traffic,
    handshake: Handshake,
    queue: OutboundQueue,
    transport: Rc<dyn Transport>,
    listener: Option<ListenerId>,
    config: LinkConfig,
    stopped: bool,
}

impl LinkCore {
    /// Re-read a parent's expected identifier from its frame element, which
    /// may have been renamed since the link started.
    fn refresh_identity(&mut self) {
        let (Some(frame), LinkIdentity::Parent { expected_id }) = (&self.target, &mut self.identity)
        else {
            return;
        };
        match frame.stable_id() {
            Some(current) if current != *expected_id => {
                tracing::debug!(previous = %expected_id, %current, "target frame renamed");
                *expected_id = current;
            }
            Some(_) => {}
            None => tracing::warn!(
                expected_id = %expected_id,
                "target frame lost its identifier, keeping the last one seen"
            ),
        }
    }

    fn gate(&self) -> Gate {
        Gate::for_link(self.identity.role(), self.handshake.state())
    }

    fn submit(&mut self, payload: Value) -> Result<()> {
        if self.stopped {
            return Err(LinkError::Stopped);
        }
        let seq = self.queue.push(payload);
        if !self.gate().is_open() && self.queue.len() == self.config.queue_warn_depth {
            tracing::warn!(
                expected_id = ?self.identity.expected_id(),
                depth = self.queue.len(),
                "outbound queue growing while waiting for child announcement"
            );
        }
        tracing::trace!(seq, depth = self.queue.len(), "queued message");
        self.drain();
        Ok(())
    }

    /// Transmit head entries one at a time while the gate stays open.
    fn drain(&mut self) -> usize {
        let mut sent = 0usize;
        while let Some(entry) = self.queue.pop_ready(self.gate()) {
            self.transmit(&entry);
            sent += 1;
        }
        sent
    }

    fn transmit(&self, entry: &QueuedMessage) {
        let wire = match encode(&entry.payload, self.identity.sender_id()) {
            Ok(wire) => wire,
            Err(err) => {
                tracing::warn!(error = %err, seq = entry.seq, "dropping unencodable message");
                return;
            }
        };
        match self.transport.send(&wire) {
            Ok(()) => tracing::trace!(seq = entry.seq, size = wire.len(), "sent message"),
            Err(err) => tracing::warn!(error = %err, seq = entry.seq, "dropping message, send failed"),
        }
    }

    fn stop(&mut self) -> usize {
        if self.stopped {
            return 0;
        }
        self.stopped = true;
        if let Some(listener) = self.listener.take() {
            self.transport.detach(listener);
        }
        let discarded = self.queue.discard();
        tracing::debug!(
            role = %self.identity.role(),
            expected_id = ?self.identity.expected_id(),
            local_id = ?self.identity.local_id(),
            discarded,
            "link stopped"
        );
        discarded
    }
}

struct Shared<M> {
    this: Weak<Shared<M>>,
    core: RefCell<LinkCore>,
    handler: RefCell<Option<MessageHandler<M>>>,
    // Set when the link handle was dropped while its core was borrowed.
    stop_pending: Cell<bool>,
}

impl<M> Shared<M> {
    fn finish_pending_stop(&self) {
        if self.stop_pending.get() {
            if let Ok(mut core) = self.core.try_borrow_mut() {
                self.stop_pending.set(false);
                core.stop();
            }
        }
    }
}

impl<M> Shared<M>
where
    M: DeserializeOwned,
{
    fn receive(&self, wire: &str) {
        let Some(packet) = decode::<Value>(wire) else {
            return;
        };

        let (route, traffic) = {
            let Ok(mut core) = self.core.try_borrow_mut() else {
                tracing::warn!("transport delivered synchronously during a link update, dropping packet");
                return;
            };
            if core.stopped {
                return;
            }
            core.refresh_identity();
            (route(&core.identity, packet), core.traffic)
        };

        match (route, traffic) {
            (Route::Handshake { id }, _) => self.observe_mounted(&id),
            (Route::Deliver(value), Traffic::Application) | (Route::State(value), Traffic::State) => {
                self.accept(value)
            }
            (Route::Deliver(_), Traffic::State) => {
                tracing::trace!("state link ignoring application message")
            }
            (Route::State(_), Traffic::Application) => {
                tracing::trace!("withholding state broadcast from application handler")
            }
            (Route::Discard(reason), _) => tracing::trace!(?reason, "discarding packet"),
        }
    }

    fn accept(&self, value: Value) {
        match serde_json::from_value::<M>(value) {
            Ok(message) => self.deliver(message),
            Err(err) => tracing::trace!(error = %err, "ignoring message of unexpected shape"),
        }
    }

    fn observe_mounted(&self, announced_id: &str) {
        let mut guard = self.core.borrow_mut();
        let core = &mut *guard;
        if core.handshake.observe_mounted(&core.identity, announced_id) {
            tracing::debug!(
                expected_id = ?core.identity.expected_id(),
                queued = core.queue.len(),
                "handshake established"
            );
            core.drain();
        }
        drop(guard);
        self.finish_pending_stop();
    }

    fn deliver(&self, message: M) {
        let dispatcher = Dispatcher {
            shared: self.this.clone(),
        };
        match self.handler.try_borrow_mut() {
            Ok(mut handler) => match handler.as_mut() {
                Some(handler) => handler(message, &dispatcher),
                None => tracing::trace!("no message handler registered"),
            },
            Err(_) => tracing::warn!("re-entrant delivery dropped"),
        }
    }
}

/// Submits messages on one link. Cheap to clone; does not keep the link alive.
pub struct Dispatcher<M> {
    shared: Weak<Shared<M>>,
}

impl<M> Clone for Dispatcher<M> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<M: Serialize> Dispatcher<M> {
    /// Queue a message for the peer.
    ///
    /// Fails only if the message cannot be serialized or the link has been
    /// stopped; an unconfirmed peer never causes an error.
    pub fn dispatch(&self, message: &M) -> Result<()> {
        let shared = self.shared.upgrade().ok_or(LinkError::Stopped)?;
        let payload = to_payload(message)?;
        let result = shared.core.borrow_mut().submit(payload);
        shared.finish_pending_stop();
        result
    }
}

impl<M> fmt::Debug for Dispatcher<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("live", &(self.shared.strong_count() > 0))
            .finish()
    }
}

/// A running parent or child link.
///
/// Dropping the link stops it.
pub struct Link<M> {
    shared: Rc<Shared<M>>,
}

impl<M> Link<M>
where
    M: Serialize + DeserializeOwned + 'static,
{
    pub fn builder(transport: impl Transport + 'static) -> LinkBuilder<M> {
        LinkBuilder::new(transport)
    }

    /// Queue a message for the peer. See [`Dispatcher::dispatch`].
    pub fn dispatch(&self, message: &M) -> Result<()> {
        self.dispatcher().dispatch(message)
    }

    pub fn dispatcher(&self) -> Dispatcher<M> {
        Dispatcher {
            shared: Rc::downgrade(&self.shared),
        }
    }
}

impl<M> Link<M> {
    pub fn role(&self) -> Role {
        self.shared.core.borrow().identity.role()
    }

    pub fn state(&self) -> HandshakeState {
        self.shared.core.borrow().handshake.state()
    }

    /// Identifier of the child frame a parent link is bound to.
    ///
    /// Read from the frame element at the time of the call.
    pub fn expected_id(&self) -> Option<String> {
        let mut core = self.shared.core.borrow_mut();
        core.refresh_identity();
        core.identity.expected_id().map(str::to_string)
    }

    /// Identifier a child link announced for itself.
    pub fn local_id(&self) -> Option<String> {
        self.shared
            .core
            .borrow()
            .identity
            .local_id()
            .map(str::to_string)
    }

    /// Messages waiting for the handshake.
    pub fn queued(&self) -> usize {
        self.shared.core.borrow().queue.len()
    }

    pub fn is_stopped(&self) -> bool {
        self.shared.core.borrow().stopped
    }

    /// Detach from the channel and discard queued messages.
    ///
    /// Returns the number of messages discarded.
    pub fn stop(self) -> usize {
        self.shared.core.borrow_mut().stop()
    }
}

impl<M> Drop for Link<M> {
    fn drop(&mut self) {
        match self.shared.core.try_borrow_mut() {
            Ok(mut core) => {
                core.stop();
            }
            Err(_) => {
                tracing::warn!("link dropped during a link update, stopping once it completes");
                self.shared.stop_pending.set(true);
            }
        }
        if let Ok(mut handler) = self.shared.handler.try_borrow_mut() {
            handler.take();
        }
    }
}

impl<M> fmt::Debug for Link<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shared.core.try_borrow() {
            Ok(core) => f
                .debug_struct("Link")
                .field("identity", &core.identity)
                .field("state", &core.handshake.state())
                .field("queued", &core.queue.len())
                .field("stopped", &core.stopped)
                .finish(),
            Err(_) => f.debug_struct("Link").finish_non_exhaustive(),
        }
    }
}
