//! Application layer: session resolution, module lookup, procedure indexing and edits.

pub mod bridge;
pub mod editor;
pub mod guard;
pub mod index;
pub mod locator;
pub mod preprocess;
pub mod session;
