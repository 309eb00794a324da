//! Core types and utilities for the Ember+ protocol
//!
//! This crate provides fundamental types, error handling, and utilities
//! used throughout the Ember+ client implementation.

pub mod error;
pub mod path;
pub mod value;

pub use error::{EmberError, EmberResult};
pub use path::PathKey;
pub use value::{MinMax, Value};
