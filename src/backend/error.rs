//! Error types for backend requests.

use crate::model::ImageId;

/// Errors returned by the backend traits.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The request never reached the server or the connection dropped
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with an error status
    #[error("Server rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    /// The response body did not match the expected shape
    #[error("Malformed response: {0}")]
    Json(#[from] serde_json::Error),

    /// The streaming channel was closed
    #[error("Channel closed")]
    ChannelClosed,

    /// The server does not know the image
    #[error("Unknown image: {0}")]
    UnknownImage(ImageId),

    /// A background worker thread could not be started
    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl BackendError {
    /// Create a transport error with a message.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Create a rejection error from a status code and message.
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }
}

pub type BackendResult<T> = Result<T, BackendError>;
