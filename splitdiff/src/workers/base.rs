use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::error::SplitDiffError;
use crate::metrics::MetricsSink;

/// Lifecycle state of a worker run.
///
/// A run moves strictly forward through `Init`, `FindTargets`, `SyncReplication`, `Diff`
/// and `CleanUp`, and ends in either `Done` or `Error`.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum WorkerState {
    #[default]
    NotStarted,
    Init,
    FindTargets,
    SyncReplication,
    Diff,
    CleanUp,
    Done,
    Error,
}

impl WorkerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }

    /// Numeric value reported to the metrics sink.
    pub fn as_gauge(&self) -> f64 {
        match self {
            Self::NotStarted => 0.0,
            Self::Init => 1.0,
            Self::FindTargets => 2.0,
            Self::SyncReplication => 3.0,
            Self::Diff => 4.0,
            Self::CleanUp => 5.0,
            Self::Done => 6.0,
            Self::Error => 7.0,
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotStarted => "not started",
            Self::Init => "initializing",
            Self::FindTargets => "finding target instances",
            Self::SyncReplication => "synchronizing replication",
            Self::Diff => "running the diff",
            Self::CleanUp => "cleaning up",
            Self::Done => "done",
            Self::Error => "error",
        };

        f.write_str(name)
    }
}

#[derive(Debug, Default)]
struct WorkerStatusInner {
    state: WorkerState,
    error: Option<SplitDiffError>,
}

/// State and outcome of a run, readable while the run progresses.
///
/// Guarded by its own lock so status can be rendered at any time without contending with
/// the structures the run mutates.
#[derive(Debug, Clone)]
pub struct WorkerStatus {
    inner: Arc<RwLock<WorkerStatusInner>>,
    metrics: Arc<dyn MetricsSink>,
}

impl WorkerStatus {
    pub fn new(metrics: Arc<dyn MetricsSink>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(WorkerStatusInner::default())),
            metrics,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.inner.read().state
    }

    pub fn set_state(&self, state: WorkerState) {
        let mut inner = self.inner.write();
        self.transition(&mut inner, state);
    }

    /// Moves to a terminal state, storing the error of a failed run.
    pub fn finish(&self, error: Option<SplitDiffError>) {
        let state = if error.is_some() {
            WorkerState::Error
        } else {
            WorkerState::Done
        };

        let mut inner = self.inner.write();
        self.transition(&mut inner, state);
        inner.error = error;
    }

    fn transition(&self, inner: &mut WorkerStatusInner, state: WorkerState) {
        info!("worker state changing from '{}' to '{}'", inner.state, state);

        inner.state = state;
        self.metrics.set_state(state);
    }

    pub fn error(&self) -> Option<SplitDiffError> {
        self.inner.read().error.clone()
    }

    pub fn metrics(&self) -> &Arc<dyn MetricsSink> {
        &self.metrics
    }
}
