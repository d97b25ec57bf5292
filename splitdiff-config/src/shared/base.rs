use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The keyspace of the destination shard is empty.
    #[error("`keyspace` cannot be empty")]
    EmptyKeyspace,
    /// The destination shard name is empty.
    #[error("`shard` cannot be empty")]
    EmptyShard,
    #[error("`remote_actions_timeout_ms` cannot be zero")]
    RemoteActionsTimeoutZero,
    #[error("`max_concurrent_table_diffs` cannot be zero")]
    MaxConcurrentTableDiffsZero,
}
