/// Result alias that carries the custom [`ChopperError`] type.
pub type Result<T> = std::result::Result<T, ChopperError>;

/// Common error type for the core crate.
///
/// None of these are fatal to the surface: the bridge turns every error that
/// reaches it into a logged diagnostic and drops the offending message.
#[derive(Debug, thiserror::Error)]
pub enum ChopperError {
    /// Free-form error used for configuration and driver problems.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// JSON that could not be parsed or serialised.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    /// An inbound message was well-formed JSON but did not match the shape
    /// its channel requires.
    #[error("invalid `{channel}` payload: {reason}")]
    InvalidPayload { channel: String, reason: String },
    /// An invoke envelope named an action outside the protocol.
    #[error("unknown action `{0}`")]
    UnknownAction(String),
    #[error("protocol version {found} is not supported (expected {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
}

impl ChopperError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    pub fn invalid(channel: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            channel: channel.into(),
            reason: reason.into(),
        }
    }
}
