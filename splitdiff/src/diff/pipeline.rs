use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, info_span};

use crate::concurrency::errors::ErrorRecorder;
use crate::diff::differ::RowDiffer;
use crate::diff::report::DiffReport;
use crate::diff::scan::TableScanner;
use crate::error::{ErrorKind, SplitDiffError, SplitDiffResult};
use crate::metrics::MetricsSink;
use crate::schema::definition::TableDefinition;
use crate::topology::remote::remote_call;
use crate::types::TabletInfo;

/// Count of tables diffed so far by a pipeline, shared with status readers.
#[derive(Debug, Clone, Default)]
pub struct DiffProgress {
    total: Arc<AtomicUsize>,
    done: Arc<AtomicUsize>,
}

impl DiffProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    pub fn done(&self) -> usize {
        self.done.load(Ordering::Relaxed)
    }

    fn start(&self, total: usize) {
        self.total.store(total, Ordering::Relaxed);
        self.done.store(0, Ordering::Relaxed);
    }

    fn table_done(&self) {
        self.done.fetch_add(1, Ordering::Relaxed);
    }
}

/// Result of diffing one table.
#[derive(Debug, Clone)]
pub struct TableDiffOutcome {
    pub table: String,
    /// Absent if the table could not be read to the end.
    pub report: Option<DiffReport>,
    /// Read failure or difference found in the table.
    pub error: Option<SplitDiffError>,
}

impl TableDiffOutcome {
    pub fn is_match(&self) -> bool {
        self.error.is_none()
    }
}

/// Results of a pipeline run, one outcome per table in input order.
#[derive(Debug, Clone)]
pub struct DiffSummary {
    pub tables: Vec<TableDiffOutcome>,
    errors: ErrorRecorder,
}

impl DiffSummary {
    /// Returns every table error in table order, or `Ok(())` if all tables matched.
    pub fn result(&self) -> SplitDiffResult<()> {
        self.errors.result()
    }

    pub fn matching_tables(&self) -> Vec<&str> {
        self.tables
            .iter()
            .filter(|outcome| outcome.is_match())
            .map(|outcome| outcome.table.as_str())
            .collect()
    }

    pub fn failed_tables(&self) -> Vec<&str> {
        self.tables
            .iter()
            .filter(|outcome| !outcome.is_match())
            .map(|outcome| outcome.table.as_str())
            .collect()
    }
}

/// Diffs tables concurrently, with at most `max_concurrent_table_diffs` of them
/// comparing rows at any time.
///
/// Every table is attempted: a table failing or differing never stops the others. Opening a
/// scan and reading each row are remote calls bounded by `remote_actions_timeout`.
#[derive(Debug, Clone)]
pub struct DiffPipeline<S> {
    scanner: S,
    remote_actions_timeout: Duration,
    max_concurrent_table_diffs: usize,
    max_reported_mismatches: usize,
    metrics: Arc<dyn MetricsSink>,
    progress: DiffProgress,
}

impl<S> DiffPipeline<S>
where
    S: TableScanner + Clone + 'static,
{
    pub fn new(
        scanner: S,
        remote_actions_timeout: Duration,
        max_concurrent_table_diffs: usize,
        max_reported_mismatches: usize,
        metrics: Arc<dyn MetricsSink>,
        progress: DiffProgress,
    ) -> Self {
        Self {
            scanner,
            remote_actions_timeout,
            max_concurrent_table_diffs,
            max_reported_mismatches,
            metrics,
            progress,
        }
    }

    /// Diffs each of `tables` between `source` and `destination` and waits for all of them.
    pub async fn run(
        &self,
        source: &TabletInfo,
        destination: &TabletInfo,
        tables: &[TableDefinition],
    ) -> DiffSummary {
        info!(
            "diffing {} tables with at most {} concurrent diffs",
            tables.len(),
            self.max_concurrent_table_diffs
        );
        self.progress.start(tables.len());
        self.metrics.set_tables_total(tables.len());

        let permits = Arc::new(Semaphore::new(self.max_concurrent_table_diffs));
        let errors = ErrorRecorder::new();

        let handles: Vec<(String, JoinHandle<TableDiffOutcome>)> = tables
            .iter()
            .map(|table| {
                let task = TableDiffTask {
                    scanner: self.scanner.clone(),
                    source: source.clone(),
                    destination: destination.clone(),
                    table: table.clone(),
                    timeout: self.remote_actions_timeout,
                    max_reported_mismatches: self.max_reported_mismatches,
                };
                let permits = permits.clone();
                let metrics = self.metrics.clone();
                let progress = self.progress.clone();

                let span = info_span!("table_diff", table = %table.name);
                let handle = tokio::spawn(
                    async move {
                        let outcome = task.run(permits).await;

                        let rows_processed =
                            outcome.report.as_ref().map_or(0, |report| report.processed_rows);
                        metrics.record_table_result(
                            &outcome.table,
                            rows_processed,
                            outcome.is_match(),
                        );
                        if let Some(err) = &outcome.error {
                            error!("{err}");
                        }
                        progress.table_done();

                        outcome
                    }
                    .instrument(span),
                );

                (table.name.clone(), handle)
            })
            .collect();

        // Recorded while joining: the aggregate follows table order.
        let mut outcomes = Vec::with_capacity(handles.len());
        for (table, handle) in handles {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(err) => {
                    let err = SplitDiffError::from(err).context(format!("diffing table {table}"));
                    error!("{err}");

                    TableDiffOutcome {
                        table,
                        report: None,
                        error: Some(err),
                    }
                }
            };
            if let Some(err) = &outcome.error {
                errors.record_error(err.clone());
            }
            outcomes.push(outcome);
        }

        DiffSummary {
            tables: outcomes,
            errors,
        }
    }
}

struct TableDiffTask<S> {
    scanner: S,
    source: TabletInfo,
    destination: TabletInfo,
    table: TableDefinition,
    timeout: Duration,
    max_reported_mismatches: usize,
}

impl<S> TableDiffTask<S>
where
    S: TableScanner,
{
    async fn run(self, permits: Arc<Semaphore>) -> TableDiffOutcome {
        let result = match permits.acquire_owned().await {
            Ok(permit) => {
                let result = self.diff().await;
                drop(permit);

                result
            }
            Err(err) => Err(err.into()),
        };

        let (report, error) = match result {
            Ok(report) if report.has_differences() => {
                let err = SplitDiffError::from((
                    ErrorKind::TableHasDifferences,
                    "Table has differences",
                    report.to_string(),
                ));
                (Some(report), Some(err))
            }
            Ok(report) => {
                info!("table {} checks out ({report})", self.table.name);
                (Some(report), None)
            }
            Err(err) => (None, Some(err)),
        };

        TableDiffOutcome {
            error: error.map(|err| err.context(format!("diffing table {}", self.table.name))),
            table: self.table.name,
            report,
        }
    }

    async fn diff(&self) -> SplitDiffResult<DiffReport> {
        info!("starting the diff on table {}", self.table.name);

        let source_stream = remote_call(
            self.timeout,
            "opening the source table scan",
            &self.source.alias,
            self.scanner.table_scan(&self.source, &self.table),
        )
        .await?;
        let destination_stream = remote_call(
            self.timeout,
            "opening the destination table scan",
            &self.destination.alias,
            self.scanner.table_scan(&self.destination, &self.table),
        )
        .await?;

        let differ = RowDiffer::new(
            source_stream,
            destination_stream,
            &self.table,
            self.timeout,
            self.max_reported_mismatches,
        )?;

        differ.run().await
    }
}
