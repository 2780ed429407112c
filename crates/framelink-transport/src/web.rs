//! `window.postMessage` transport for browsers.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;

use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Document, HtmlIFrameElement, MessageEvent, Window};

use crate::error::{Result, TransportError};
use crate::host::{non_empty, FrameCandidate, FrameElement, HostDocument};
use crate::traits::{ListenerId, ReceiveCallback, Transport};

/// Target origin accepting any receiving document.
pub const WILDCARD_ORIGIN: &str = "*";

type MessageClosure = Closure<dyn FnMut(MessageEvent)>;

/// Posts strings to a peer window and listens for `message` events on the
/// own window.
///
/// Non-string event data is foreign traffic and never reaches listeners.
pub struct WindowTransport {
    own: Window,
    peer: Window,
    target_origin: String,
    listeners: RefCell<HashMap<u64, MessageClosure>>,
    next_listener: Cell<u64>,
}

impl WindowTransport {
    /// Create a transport between two explicit windows.
    pub fn new(own: Window, peer: Window) -> Self {
        Self {
            own,
            peer,
            target_origin: WILDCARD_ORIGIN.to_string(),
            listeners: RefCell::new(HashMap::new()),
            next_listener: Cell::new(0),
        }
    }

    /// Child-side transport: posts to the embedding window.
    pub fn to_parent() -> Result<Self> {
        let own = current_window()?;
        let parent = own
            .parent()
            .map_err(js_error)?
            .ok_or(TransportError::Detached)?;
        Ok(Self::new(own, parent))
    }

    /// Parent-side transport: posts into the given frame element.
    pub fn to_frame(frame: &HtmlIFrameElement) -> Result<Self> {
        let own = current_window()?;
        let peer = frame.content_window().ok_or(TransportError::Detached)?;
        Ok(Self::new(own, peer))
    }

    /// Restrict which origin may receive posted packets. Default: `*`.
    pub fn with_target_origin(mut self, origin: impl Into<String>) -> Self {
        self.target_origin = origin.into();
        self
    }

    /// Configured target origin.
    pub fn target_origin(&self) -> &str {
        &self.target_origin
    }
}

impl Transport for WindowTransport {
    fn send(&self, payload: &str) -> Result<()> {
        self.peer
            .post_message(&JsValue::from_str(payload), &self.target_origin)
            .map_err(js_error)
    }

    fn on_receive(&self, callback: ReceiveCallback) -> Result<ListenerId> {
        let closure = Closure::wrap(Box::new(move |event: MessageEvent| {
            if let Some(data) = event.data().as_string() {
                callback(&data);
            }
        }) as Box<dyn FnMut(MessageEvent)>);

        self.own
            .add_event_listener_with_callback("message", closure.as_ref().unchecked_ref())
            .map_err(js_error)?;

        let id = self.next_listener.get() + 1;
        self.next_listener.set(id);
        self.listeners.borrow_mut().insert(id, closure);
        Ok(ListenerId(id))
    }

    fn detach(&self, id: ListenerId) {
        let removed = self.listeners.borrow_mut().remove(&id.0);
        if let Some(closure) = removed {
            if let Err(err) = self
                .own
                .remove_event_listener_with_callback("message", closure.as_ref().unchecked_ref())
            {
                tracing::warn!(error = %js_error(err), %id, "failed removing message listener");
            }
        }
    }
}

impl Drop for WindowTransport {
    fn drop(&mut self) {
        let ids: Vec<u64> = self.listeners.borrow().keys().copied().collect();
        for id in ids {
            self.detach(ListenerId(id));
        }
    }
}

/// Parent-side handle on an `<iframe>` element.
#[derive(Clone, Debug)]
pub struct IframeHandle(pub HtmlIFrameElement);

impl FrameElement for IframeHandle {
    fn stable_id(&self) -> Option<String> {
        non_empty(Some(self.0.id()))
    }
}

/// Child-side view of the embedding document.
#[derive(Clone, Debug)]
pub struct WindowDocument {
    own: Window,
}

impl WindowDocument {
    /// View from the current global window.
    pub fn current() -> Result<Self> {
        Ok(Self {
            own: current_window()?,
        })
    }
}

impl HostDocument for WindowDocument {
    fn enclosing_frames(&self) -> Option<Vec<FrameCandidate>> {
        let own: &JsValue = self.own.as_ref();
        let parent = self.own.parent().ok().flatten()?;
        let parent_value: &JsValue = parent.as_ref();
        if parent_value == own {
            return None;
        }

        // Cross-origin parents throw on `document` access; treat as unreadable.
        let document: Document = js_sys::Reflect::get(parent_value, &JsValue::from_str("document"))
            .ok()?
            .dyn_into()
            .ok()?;

        let elements = document.get_elements_by_tag_name("iframe");
        let mut frames = Vec::with_capacity(elements.length() as usize);
        for index in 0..elements.length() {
            let Some(element) = elements.item(index) else {
                continue;
            };
            let Ok(frame) = element.dyn_into::<HtmlIFrameElement>() else {
                continue;
            };
            let is_self = frame
                .content_window()
                .map(|window| {
                    let window: &JsValue = window.as_ref();
                    window == own
                })
                .unwrap_or(false);
            frames.push(FrameCandidate {
                stable_id: non_empty(Some(frame.id())),
                is_self,
            });
        }
        Some(frames)
    }
}

fn current_window() -> Result<Window> {
    web_sys::window().ok_or(TransportError::Detached)
}

fn js_error(err: JsValue) -> TransportError {
    TransportError::Post(err.as_string().unwrap_or_else(|| format!("{err:?}")))
}
