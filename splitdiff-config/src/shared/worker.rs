use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Config;
use crate::shared::ValidationError;

/// Default timeout applied to every remote tablet manager call, in milliseconds.
pub const DEFAULT_REMOTE_ACTIONS_TIMEOUT_MS: u64 = 60_000;

/// Default number of tables compared at the same time.
pub const DEFAULT_MAX_CONCURRENT_TABLE_DIFFS: usize = 8;

/// Default number of mismatching rows kept in a table diff report.
pub const DEFAULT_MAX_REPORTED_MISMATCHES: usize = 10;

/// Top-level configuration file layout for the split diff worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SplitDiffConfig {
    pub worker: WorkerConfig,
}

impl SplitDiffConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.worker.validate()
    }
}

impl Config for SplitDiffConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &["worker.exclude_tables"];
}

/// Settings of one vertical split diff run.
///
/// Identifies the destination shard whose content is verified against its
/// single source shard, and bounds how the run talks to the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkerConfig {
    /// Cell in which the worker tablets are picked.
    pub cell: String,
    /// Keyspace of the destination shard.
    pub keyspace: String,
    /// Name of the destination shard.
    pub shard: String,
    /// Tables left out of both schema fetches, and therefore out of the diff.
    #[serde(default)]
    pub exclude_tables: Vec<String>,
    /// Timeout of each remote call issued to a tablet.
    #[serde(default = "default_remote_actions_timeout_ms")]
    pub remote_actions_timeout_ms: u64,
    /// Maximum number of tables in their comparison phase at the same time.
    #[serde(default = "default_max_concurrent_table_diffs")]
    pub max_concurrent_table_diffs: usize,
    /// Whether source shard table filters must match the whole table name.
    ///
    /// When `false`, a filter matches if it matches anywhere in the name.
    #[serde(default)]
    pub anchor_table_filters: bool,
    /// Maximum number of mismatching rows sampled into each table report.
    #[serde(default = "default_max_reported_mismatches")]
    pub max_reported_mismatches: usize,
}

impl WorkerConfig {
    /// Creates a configuration targeting `keyspace/shard` in `cell` with default limits.
    pub fn new(
        cell: impl Into<String>,
        keyspace: impl Into<String>,
        shard: impl Into<String>,
    ) -> Self {
        Self {
            cell: cell.into(),
            keyspace: keyspace.into(),
            shard: shard.into(),
            exclude_tables: Vec::new(),
            remote_actions_timeout_ms: DEFAULT_REMOTE_ACTIONS_TIMEOUT_MS,
            max_concurrent_table_diffs: DEFAULT_MAX_CONCURRENT_TABLE_DIFFS,
            anchor_table_filters: false,
            max_reported_mismatches: DEFAULT_MAX_REPORTED_MISMATCHES,
        }
    }

    pub fn remote_actions_timeout(&self) -> Duration {
        Duration::from_millis(self.remote_actions_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.keyspace.is_empty() {
            return Err(ValidationError::EmptyKeyspace);
        }

        if self.shard.is_empty() {
            return Err(ValidationError::EmptyShard);
        }

        if self.remote_actions_timeout_ms == 0 {
            return Err(ValidationError::RemoteActionsTimeoutZero);
        }

        if self.max_concurrent_table_diffs == 0 {
            return Err(ValidationError::MaxConcurrentTableDiffsZero);
        }

        Ok(())
    }
}

fn default_remote_actions_timeout_ms() -> u64 {
    DEFAULT_REMOTE_ACTIONS_TIMEOUT_MS
}

fn default_max_concurrent_table_diffs() -> usize {
    DEFAULT_MAX_CONCURRENT_TABLE_DIFFS
}

fn default_max_reported_mismatches() -> usize {
    DEFAULT_MAX_REPORTED_MISMATCHES
}
