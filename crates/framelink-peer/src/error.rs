/// Errors that can occur in link operations.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] framelink_transport::TransportError),

    /// Wire-level error (message not serializable).
    #[error("wire error: {0}")]
    Wire(#[from] framelink_wire::WireError),

    /// A parent addressed a frame element without a stable identifier.
    #[error("target frame has no stable identifier")]
    MissingFrameId,

    /// A child could not find the frame element embedding it.
    ///
    /// Not fatal: the document simply cannot take part in a link.
    #[error("no enclosing frame element refers to this document")]
    Unaddressable,

    /// The link was stopped.
    #[error("link stopped")]
    Stopped,
}

pub type Result<T> = std::result::Result<T, LinkError>;
