//! seglabel - point and segmentation labeling engine
//!
//! The interactive core of an image labeling tool: an invertible zoom/pan
//! viewport, a pointer state machine that tells pan drags from annotation
//! clicks, a per-image annotation store, and software overlay passes that
//! draw masks, polygons and markers in registration with the image.
//! [`LabelSession`] wires them together; the server side sits behind the
//! traits in [`backend`].

pub mod annotation;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod constants;
pub mod input;
pub mod model;
pub mod notify;
pub mod render;
pub mod session;
pub mod zoom_math;

pub use annotation::{
    AnnotationMode, AnnotationPoint, AnnotationStore, ImageAnnotations, MergeIntent,
    SharedAnnotationStore,
};
pub use catalog::ImageCatalog;
pub use config::{AppConfig, ConfigError, LogLevel, ViewerConfig};
pub use input::{CursorHint, Intent, PointerEvent, PointerInputController};
pub use session::{AnnotateOutcome, LabelSession};
pub use zoom_math::{ViewportTransform, ZoomLimits};

#[cfg(test)]
mod tests;
