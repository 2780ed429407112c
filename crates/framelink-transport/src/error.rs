/// Errors that can occur in channel transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The target window no longer exists (frame removed or never created).
    #[error("unknown window {0}")]
    UnknownWindow(usize),

    /// The transport was detached from its host window.
    #[error("transport detached")]
    Detached,

    /// The host rejected a post or listener registration.
    #[error("post failed: {0}")]
    Post(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;
