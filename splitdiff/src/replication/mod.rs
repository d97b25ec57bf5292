//! Replication barrier bringing the source and destination worker tablets to
//! data-equivalent stopped snapshots.

pub mod barrier;
