//! Configuration management for the split diff worker.
//!
//! Provides environment detection, layered configuration loading from YAML
//! files and environment variables, and the shared worker configuration types.

mod environment;
mod load;
pub mod shared;

pub use environment::*;
pub use load::*;
