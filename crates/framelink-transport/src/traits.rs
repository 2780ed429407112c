use std::fmt;
use std::rc::Rc;

use crate::error::Result;

/// Callback invoked once per packet arriving on the own window.
pub type ReceiveCallback = Rc<dyn Fn(&str)>;

/// Handle for a registered receive callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

impl ListenerId {
    /// Raw numeric value, unique per transport host.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

/// A cross-document channel: posts strings to one peer window and observes
/// every string arriving on the own window.
///
/// The channel is shared with arbitrary unrelated traffic, so listeners see
/// every packet, not only protocol packets.
///
/// Delivery must be asynchronous: `send` only schedules the packet, and
/// listeners run later as discrete tasks on the host event loop. Callers rely
/// on this to mutate link state around `send` without re-entrancy.
pub trait Transport {
    /// Post a packet to the peer window. Never waits for delivery.
    fn send(&self, payload: &str) -> Result<()>;

    /// Register a callback for packets arriving on the own window.
    fn on_receive(&self, callback: ReceiveCallback) -> Result<ListenerId>;

    /// Remove a previously registered callback. Unknown ids are ignored.
    fn detach(&self, id: ListenerId);
}

impl<T: Transport + ?Sized> Transport for Rc<T> {
    fn send(&self, payload: &str) -> Result<()> {
        (**self).send(payload)
    }

    fn on_receive(&self, callback: ReceiveCallback) -> Result<ListenerId> {
        (**self).on_receive(callback)
    }

    fn detach(&self, id: ListenerId) {
        (**self).detach(id)
    }
}
