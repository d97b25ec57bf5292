use std::future::Future;

use crate::diff::row::Row;
use crate::error::SplitDiffResult;
use crate::schema::definition::TableDefinition;
use crate::types::TabletInfo;

/// Rows of a table scan, delivered in primary key order.
pub trait RowStream: Send {
    /// Names of the columns of every row, in row order.
    fn fields(&self) -> &[String];

    /// Returns the next row, or `None` once the scan is exhausted.
    fn next_row(&mut self) -> impl Future<Output = SplitDiffResult<Option<Row>>> + Send;
}

/// Opens primary key ordered scans of tables on tablets.
pub trait TableScanner: Send + Sync {
    type Stream: RowStream + 'static;

    /// Opens a scan of `table` on `tablet` returning the columns in
    /// [`TableDefinition::ordered_columns`] order.
    fn table_scan(
        &self,
        tablet: &TabletInfo,
        table: &TableDefinition,
    ) -> impl Future<Output = SplitDiffResult<Self::Stream>> + Send;
}

/// Returns the query scanning `table` in primary key order.
///
/// Tables without a primary key are ordered by every column.
pub fn scan_query(table: &TableDefinition) -> String {
    let columns = table.ordered_columns();
    let order_by = if table.primary_key_columns.is_empty() {
        &columns
    } else {
        &table.primary_key_columns
    };

    format!(
        "SELECT {} FROM {} ORDER BY {}",
        columns.join(", "),
        table.name,
        order_by.join(", ")
    )
}

/// Number of leading columns of a scanned row forming its key.
pub fn key_len(table: &TableDefinition) -> usize {
    if table.primary_key_columns.is_empty() {
        table.columns.len()
    } else {
        table.primary_key_columns.len()
    }
}
