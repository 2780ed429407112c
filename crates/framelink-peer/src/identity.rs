use std::fmt;

use framelink_transport::{FrameElement, HostDocument};

use crate::error::{LinkError, Result};

/// Which side of an embedding relationship a link runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// The document embedding (and addressing) a frame.
    Parent,
    /// The document running inside a frame.
    Child,
}

impl Role {
    /// Parent when the call site supplies a target frame, otherwise Child.
    pub fn for_target(has_target: bool) -> Self {
        if has_target {
            Role::Parent
        } else {
            Role::Child
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Parent => "parent",
            Role::Child => "child",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved addressing for one link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkIdentity {
    /// Parent bound to the frame whose identifier is `expected_id`.
    Parent { expected_id: String },
    /// Child that announces itself as `local_id`.
    Child { local_id: String },
}

impl LinkIdentity {
    pub fn role(&self) -> Role {
        match self {
            LinkIdentity::Parent { .. } => Role::Parent,
            LinkIdentity::Child { .. } => Role::Child,
        }
    }

    /// Identifier a parent expects its child to announce.
    pub fn expected_id(&self) -> Option<&str> {
        match self {
            LinkIdentity::Parent { expected_id } => Some(expected_id.as_str()),
            LinkIdentity::Child { .. } => None,
        }
    }

    /// Identifier a child announces for itself.
    pub fn local_id(&self) -> Option<&str> {
        match self {
            LinkIdentity::Parent { .. } => None,
            LinkIdentity::Child { local_id } => Some(local_id.as_str()),
        }
    }

    /// `fromId` stamped on outbound envelopes. Parents send none.
    pub fn sender_id(&self) -> Option<&str> {
        self.local_id()
    }
}

/// Resolve a parent link's expected child identifier from its frame element.
///
/// A frame without an identifier cannot be told apart from its siblings, so
/// this fails instead of guessing.
pub fn resolve_parent(frame: &dyn FrameElement) -> Result<LinkIdentity> {
    let expected_id = frame.stable_id().ok_or(LinkError::MissingFrameId)?;
    Ok(LinkIdentity::Parent { expected_id })
}

/// Find this document's own frame element in the enclosing document and adopt
/// its identifier.
pub fn discover_child(document: &dyn HostDocument) -> Result<LinkIdentity> {
    let frames = document
        .enclosing_frames()
        .ok_or(LinkError::Unaddressable)?;
    let local_id = frames
        .into_iter()
        .find(|candidate| candidate.is_self)
        .and_then(|candidate| candidate.stable_id)
        .ok_or(LinkError::Unaddressable)?;
    Ok(LinkIdentity::Child { local_id })
}
