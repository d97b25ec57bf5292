pub mod cleanup;
pub mod concurrency;
pub mod diff;
pub mod error;
mod macros;
pub mod metrics;
pub mod replication;
pub mod schema;
pub mod topology;
pub mod types;
pub mod workers;
