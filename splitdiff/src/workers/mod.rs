//! Worker lifecycle and the vertical split diff worker.

pub mod base;
pub mod vertical_split_diff;
