//! Logging setup for the split diff worker.

mod logging;

pub use logging::*;
