use std::fmt;
use std::sync::Once;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use metrics::{Unit, describe_gauge, gauge};
use parking_lot::Mutex;

use crate::workers::base::WorkerState;

static REGISTER_METRICS: Once = Once::new();

pub const SPLITDIFF_WORKER_STATE: &str = "splitdiff_worker_state";
pub const SPLITDIFF_TABLES_TOTAL: &str = "splitdiff_tables_total";
pub const SPLITDIFF_TABLES_DIFFED: &str = "splitdiff_tables_diffed";
pub const SPLITDIFF_ROWS_PROCESSED: &str = "splitdiff_rows_processed";
pub const RESULT: &str = "result";
pub const MATCHED: &str = "matched";
pub const FAILED: &str = "failed";

/// Register the metrics emitted by the worker. Safe to call multiple times, the metrics
/// are only described once.
pub(crate) fn register_metrics() {
    REGISTER_METRICS.call_once(|| {
        describe_gauge!(
            SPLITDIFF_WORKER_STATE,
            Unit::Count,
            "Current state of the split diff worker"
        );

        describe_gauge!(
            SPLITDIFF_TABLES_TOTAL,
            Unit::Count,
            "Number of tables the current run diffs"
        );

        describe_gauge!(
            SPLITDIFF_TABLES_DIFFED,
            Unit::Count,
            "Number of tables diffed by the current run, by result"
        );

        describe_gauge!(
            SPLITDIFF_ROWS_PROCESSED,
            Unit::Count,
            "Number of rows compared by the current run"
        );
    });
}

/// Destination of the metrics of a worker run.
///
/// Values are scoped to a run: [`MetricsSink::reset`] is called when a run starts.
pub trait MetricsSink: fmt::Debug + Send + Sync {
    fn reset(&self);

    fn set_state(&self, state: WorkerState);

    fn set_tables_total(&self, total: usize);

    fn record_table_result(&self, table: &str, rows_processed: u64, matched: bool);
}

/// Forwards to the globally installed `metrics` recorder.
#[derive(Debug, Default, Clone, Copy)]
pub struct RecorderMetrics;

impl RecorderMetrics {
    pub fn new() -> Self {
        register_metrics();

        Self
    }
}

impl MetricsSink for RecorderMetrics {
    fn reset(&self) {
        gauge!(SPLITDIFF_WORKER_STATE).set(WorkerState::NotStarted.as_gauge());
        gauge!(SPLITDIFF_TABLES_TOTAL).set(0.0);
        gauge!(SPLITDIFF_TABLES_DIFFED, RESULT => MATCHED).set(0.0);
        gauge!(SPLITDIFF_TABLES_DIFFED, RESULT => FAILED).set(0.0);
        gauge!(SPLITDIFF_ROWS_PROCESSED).set(0.0);
    }

    fn set_state(&self, state: WorkerState) {
        gauge!(SPLITDIFF_WORKER_STATE).set(state.as_gauge());
    }

    fn set_tables_total(&self, total: usize) {
        gauge!(SPLITDIFF_TABLES_TOTAL).set(total as f64);
    }

    fn record_table_result(&self, _table: &str, rows_processed: u64, matched: bool) {
        let result = if matched { MATCHED } else { FAILED };
        gauge!(SPLITDIFF_TABLES_DIFFED, RESULT => result).increment(1.0);
        gauge!(SPLITDIFF_ROWS_PROCESSED).increment(rows_processed as f64);
    }
}

/// Keeps the metrics of the last run in memory.
#[derive(Debug, Default)]
pub struct MemoryMetrics {
    state: Mutex<WorkerState>,
    tables_total: AtomicUsize,
    tables_matched: AtomicUsize,
    tables_failed: AtomicUsize,
    rows_processed: AtomicU64,
    resets: AtomicUsize,
}

impl MemoryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    pub fn tables_total(&self) -> usize {
        self.tables_total.load(Ordering::Relaxed)
    }

    pub fn tables_matched(&self) -> usize {
        self.tables_matched.load(Ordering::Relaxed)
    }

    pub fn tables_failed(&self) -> usize {
        self.tables_failed.load(Ordering::Relaxed)
    }

    pub fn rows_processed(&self) -> u64 {
        self.rows_processed.load(Ordering::Relaxed)
    }

    /// Number of times the metrics were reset, one per started run.
    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::Relaxed)
    }
}

impl MetricsSink for MemoryMetrics {
    fn reset(&self) {
        *self.state.lock() = WorkerState::NotStarted;
        self.tables_total.store(0, Ordering::Relaxed);
        self.tables_matched.store(0, Ordering::Relaxed);
        self.tables_failed.store(0, Ordering::Relaxed);
        self.rows_processed.store(0, Ordering::Relaxed);
        self.resets.fetch_add(1, Ordering::Relaxed);
    }

    fn set_state(&self, state: WorkerState) {
        *self.state.lock() = state;
    }

    fn set_tables_total(&self, total: usize) {
        self.tables_total.store(total, Ordering::Relaxed);
    }

    fn record_table_result(&self, _table: &str, rows_processed: u64, matched: bool) {
        if matched {
            self.tables_matched.fetch_add(1, Ordering::Relaxed);
        } else {
            self.tables_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.rows_processed
            .fetch_add(rows_processed, Ordering::Relaxed);
    }
}
