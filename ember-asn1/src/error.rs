pub use ember_core::error::{EmberError, EmberResult};
