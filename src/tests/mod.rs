//! Cross-module scenario tests.
//!
//! These drive the controller, viewport, store and overlay passes together
//! the way a host does, without going through [`crate::LabelSession`].
