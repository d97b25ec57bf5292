//! In-memory cluster used by the integration tests.
//!
//! [`cluster::FakeCluster`] plays the topology service, the tablet manager and the table
//! scanner at once, logs every call it receives and can be told to fail or slow down
//! specific calls.
#![allow(dead_code)]

pub mod cluster;
pub mod rows;
