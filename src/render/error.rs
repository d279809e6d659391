//! Error types for frame rendering and export.

use std::path::PathBuf;

/// Errors that can occur while building or exporting a frame.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The requested surface has a zero or oversized dimension
    #[error("Cannot create a {width}x{height} drawing surface")]
    InvalidSize { width: u32, height: u32 },

    /// Source image failed to decode or the PNG failed to encode
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Annotation file could not be parsed
    #[error("Failed to parse annotations: {0}")]
    Json(#[from] serde_json::Error),

    /// File system error
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Bad command line
    #[error("{0}")]
    Usage(String),
}

impl RenderError {
    /// Create an I/O error for a path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a usage error with a message.
    pub fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }
}

pub type RenderResult<T> = Result<T, RenderError>;
