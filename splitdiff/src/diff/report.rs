use std::fmt;
use std::time::Duration;

use crate::diff::row::{DisplayRow, Row};

/// How the rows of a [`DiffSample`] disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DifferenceKind {
    /// Both sides hold the key with different contents.
    Mismatched,
    /// Only the left (source) side holds the key.
    ExtraLeft,
    /// Only the right (destination) side holds the key.
    ExtraRight,
}

/// One of the first differences found in a table, kept for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffSample {
    pub kind: DifferenceKind,
    pub left: Option<Row>,
    pub right: Option<Row>,
}

impl fmt::Display for DiffSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, &self.left, &self.right) {
            (DifferenceKind::Mismatched, Some(left), Some(right)) => {
                write!(f, "mismatched row: {} vs {}", DisplayRow(left), DisplayRow(right))
            }
            (DifferenceKind::ExtraLeft, Some(left), _) => {
                write!(f, "extra row on the left: {}", DisplayRow(left))
            }
            (DifferenceKind::ExtraRight, _, Some(right)) => {
                write!(f, "extra row on the right: {}", DisplayRow(right))
            }
            (kind, _, _) => write!(f, "{kind:?}"),
        }
    }
}

/// Outcome of diffing the rows of one table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffReport {
    pub processed_rows: u64,
    pub matching_rows: u64,
    pub mismatched_rows: u64,
    pub extra_rows_left: u64,
    pub extra_rows_right: u64,
    /// Rows processed per second.
    pub processing_qps: f64,
    pub samples: Vec<DiffSample>,
}

impl DiffReport {
    pub fn has_differences(&self) -> bool {
        self.mismatched_rows > 0 || self.extra_rows_left > 0 || self.extra_rows_right > 0
    }

    pub(crate) fn compute_qps(&mut self, elapsed: Duration) {
        let seconds = elapsed.as_secs_f64();
        self.processing_qps = if seconds > 0.0 {
            self.processed_rows as f64 / seconds
        } else {
            0.0
        };
    }
}

impl fmt::Display for DiffReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "DiffReport{{{} processed, {} matching, {} mismatched, {} extra left, {} extra right, {:.1} q/s}}",
            self.processed_rows,
            self.matching_rows,
            self.mismatched_rows,
            self.extra_rows_left,
            self.extra_rows_right,
            self.processing_qps
        )
    }
}
