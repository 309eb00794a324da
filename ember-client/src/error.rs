//! Error types re-exported from the core crate

pub use ember_core::error::{EmberError, EmberResult};
