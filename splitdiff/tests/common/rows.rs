use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use splitdiff::diff::row::{Row, Value};
use splitdiff::diff::scan::RowStream;
use splitdiff::error::{ErrorKind, SplitDiffResult};
use splitdiff::splitdiff_error;

/// Tracks how many scans are open at the same time.
#[derive(Debug, Clone, Default)]
pub struct ScanTracker {
    active: Arc<AtomicUsize>,
    max_active: Arc<AtomicUsize>,
}

impl ScanTracker {
    pub fn open(&self) -> ScanGuard {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        ScanGuard {
            active: self.active.clone(),
        }
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }
}

/// Decrements the open scan count when dropped.
#[derive(Debug)]
pub struct ScanGuard {
    active: Arc<AtomicUsize>,
}

impl Drop for ScanGuard {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Row stream over rows held in memory.
#[derive(Debug)]
pub struct FakeRowStream {
    fields: Vec<String>,
    rows: VecDeque<Row>,
    row_latency: Duration,
    fail_after: Option<usize>,
    read: usize,
    _guard: ScanGuard,
}

impl FakeRowStream {
    pub fn new(
        fields: Vec<String>,
        rows: Vec<Row>,
        row_latency: Duration,
        fail_after: Option<usize>,
        guard: ScanGuard,
    ) -> Self {
        Self {
            fields,
            rows: rows.into(),
            row_latency,
            fail_after,
            read: 0,
            _guard: guard,
        }
    }
}

impl RowStream for FakeRowStream {
    fn fields(&self) -> &[String] {
        &self.fields
    }

    async fn next_row(&mut self) -> SplitDiffResult<Option<Row>> {
        if !self.row_latency.is_zero() {
            tokio::time::sleep(self.row_latency).await;
        }

        if self.fail_after == Some(self.read) {
            return Err(splitdiff_error!(
                ErrorKind::RowReadFailed,
                "Row stream was interrupted",
                format!("after {} rows", self.read)
            ));
        }

        self.read += 1;

        Ok(self.rows.pop_front())
    }
}

/// Builds `count` rows `(id, name)` with ids starting at 1.
pub fn numbered_rows(count: i64) -> Vec<Row> {
    (1..=count)
        .map(|id| vec![Value::from(id), Value::from(format!("name-{id}"))])
        .collect()
}
