use std::cmp::Ordering;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::bail;
use crate::diff::report::{DiffReport, DiffSample, DifferenceKind};
use crate::diff::row::Row;
use crate::diff::scan::{RowStream, key_len};
use crate::error::{ErrorKind, SplitDiffResult};
use crate::schema::definition::TableDefinition;
use crate::topology::remote::remote_call;

/// Compares two primary key ordered row streams of the same table.
///
/// The left stream is read from the source tablet, the right one from the destination.
/// Each row read fails with [`ErrorKind::RemoteCallTimeout`] if it takes longer than
/// `read_timeout`.
#[derive(Debug)]
pub struct RowDiffer<L, R> {
    left: L,
    right: R,
    table: String,
    read_timeout: Duration,
    key_len: usize,
    max_samples: usize,
}

impl<L, R> RowDiffer<L, R>
where
    L: RowStream,
    R: RowStream,
{
    /// Fails if the two streams don't return the same columns.
    pub fn new(
        left: L,
        right: R,
        table: &TableDefinition,
        read_timeout: Duration,
        max_samples: usize,
    ) -> SplitDiffResult<Self> {
        if left.fields() != right.fields() {
            bail!(
                ErrorKind::IncompatibleRowStreams,
                "Row streams return different columns",
                format!(
                    "table {}: {:?} vs {:?}",
                    table.name,
                    left.fields(),
                    right.fields()
                )
            );
        }

        Ok(Self {
            left,
            right,
            table: table.name.clone(),
            read_timeout,
            key_len: key_len(table),
            max_samples,
        })
    }

    /// Reads both streams to the end and counts matching and differing rows.
    pub async fn run(mut self) -> SplitDiffResult<DiffReport> {
        let started_at = Instant::now();
        let mut report = DiffReport::default();

        let mut left_row = self.next_left().await?;
        let mut right_row = self.next_right().await?;

        loop {
            match (left_row.take(), right_row.take()) {
                (None, None) => break,
                (Some(left), None) => {
                    self.record(&mut report, DifferenceKind::ExtraLeft, Some(left), None);
                    left_row = self.next_left().await?;
                }
                (None, Some(right)) => {
                    self.record(&mut report, DifferenceKind::ExtraRight, None, Some(right));
                    right_row = self.next_right().await?;
                }
                (Some(left), Some(right)) => match self.compare_keys(&left, &right) {
                    Ordering::Equal => {
                        if left == right {
                            report.processed_rows += 1;
                            report.matching_rows += 1;
                        } else {
                            self.record(
                                &mut report,
                                DifferenceKind::Mismatched,
                                Some(left),
                                Some(right),
                            );
                        }
                        left_row = self.next_left().await?;
                        right_row = self.next_right().await?;
                    }
                    Ordering::Less => {
                        self.record(&mut report, DifferenceKind::ExtraLeft, Some(left), None);
                        left_row = self.next_left().await?;
                        right_row = Some(right);
                    }
                    Ordering::Greater => {
                        self.record(&mut report, DifferenceKind::ExtraRight, None, Some(right));
                        left_row = Some(left);
                        right_row = self.next_right().await?;
                    }
                },
            }
        }

        report.compute_qps(started_at.elapsed());

        Ok(report)
    }

    fn compare_keys(&self, left: &Row, right: &Row) -> Ordering {
        let left_key = &left[..self.key_len.min(left.len())];
        let right_key = &right[..self.key_len.min(right.len())];

        left_key.cmp(right_key)
    }

    fn record(
        &self,
        report: &mut DiffReport,
        kind: DifferenceKind,
        left: Option<Row>,
        right: Option<Row>,
    ) {
        report.processed_rows += 1;
        match kind {
            DifferenceKind::Mismatched => report.mismatched_rows += 1,
            DifferenceKind::ExtraLeft => report.extra_rows_left += 1,
            DifferenceKind::ExtraRight => report.extra_rows_right += 1,
        }

        if report.samples.len() < self.max_samples {
            let sample = DiffSample { kind, left, right };
            debug!("{sample}");
            report.samples.push(sample);
        }
    }

    async fn next_left(&mut self) -> SplitDiffResult<Option<Row>> {
        remote_call(
            self.read_timeout,
            "reading source rows",
            &self.table,
            self.left.next_row(),
        )
        .await
    }

    async fn next_right(&mut self) -> SplitDiffResult<Option<Row>> {
        remote_call(
            self.read_timeout,
            "reading destination rows",
            &self.table,
            self.right.next_row(),
        )
        .await
    }
}
