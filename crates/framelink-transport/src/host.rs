//! Host document views used to resolve link identity.
//!
//! A parent addresses a child through a [`FrameElement`] (the embedding
//! element); a child locates itself through a [`HostDocument`] (a view of the
//! document that embeds it).

/// The element embedding a child document, seen from the parent side.
pub trait FrameElement {
    /// The element's stable identifier attribute, if set.
    ///
    /// Implementations return `None` for an empty identifier.
    fn stable_id(&self) -> Option<String>;
}

/// One frame element of the enclosing document, as seen from a child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameCandidate {
    /// The element's stable identifier attribute, if set.
    pub stable_id: Option<String>,
    /// True when the element's content window is the observing document.
    pub is_self: bool,
}

/// A child document's view of the document embedding it.
pub trait HostDocument {
    /// Frame elements of the enclosing document, in document order.
    ///
    /// Returns `None` when the observing document is the top-level document
    /// or the enclosing document cannot be inspected.
    fn enclosing_frames(&self) -> Option<Vec<FrameCandidate>>;
}

pub(crate) fn non_empty(id: Option<String>) -> Option<String> {
    id.filter(|id| !id.is_empty())
}
