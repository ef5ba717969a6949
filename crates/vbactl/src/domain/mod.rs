//! Domain types shared by the core and the calling layer.

pub mod errors;
pub mod model;
pub mod status;
