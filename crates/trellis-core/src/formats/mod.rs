//! # Formats Module
//!
//! Binary serialization formats for durable wizard state.
//!
//! Pure byte transformations only; file I/O belongs to the app layer.

mod snapshot;

pub use snapshot::*;
