/// Errors that can occur while framing outbound messages.
///
/// Inbound decoding never fails loudly; see [`crate::decode`].
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// The message could not be serialized to JSON.
    #[error("message is not serializable: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WireError>;
