//! Row-oriented tabular storage behind a trait seam.
//!
//! Each tenant owns a storage partition (`store_id`) holding the typed sheets
//! in [`Sheet`]. The [`Store`] trait exposes append, snapshot reads, row/cell
//! updates and row deletion; services never mutate rows outside their own
//! locked sections. [`MemoryStore`] is the in-process engine used by the
//! runtime and the test suites.

pub mod error;
pub mod memory;
pub mod sheet;

use async_trait::async_trait;
use serde_json::Value;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use sheet::Sheet;

/// A single sheet row. Column order and width are fixed per [`Sheet`].
pub type Row = Vec<Value>;

#[async_trait]
pub trait Store: Send + Sync {
    /// Append one row to the end of a sheet.
    async fn append(&self, store_id: &str, sheet: Sheet, row: Row) -> Result<(), StoreError>;

    /// Read a consistent snapshot of every row in a sheet.
    async fn read_all(&self, store_id: &str, sheet: Sheet) -> Result<Vec<Row>, StoreError>;

    /// Replace a whole row in place.
    async fn update_row(
        &self,
        store_id: &str,
        sheet: Sheet,
        index: usize,
        row: Row,
    ) -> Result<(), StoreError>;

    /// Replace a single cell in place.
    async fn update_cell(
        &self,
        store_id: &str,
        sheet: Sheet,
        index: usize,
        column: usize,
        value: Value,
    ) -> Result<(), StoreError>;

    /// Delete the rows at `indices` (deduplicated). Returns how many were removed.
    async fn delete_rows(
        &self,
        store_id: &str,
        sheet: Sheet,
        indices: &[usize],
    ) -> Result<usize, StoreError>;

    /// Number of rows currently in a sheet.
    async fn row_count(&self, store_id: &str, sheet: Sheet) -> Result<usize, StoreError>;
}

/// Borrow a cell as `&str`, treating missing or non-string cells as empty.
pub fn cell_str(row: &Row, column: usize) -> &str {
    row.get(column).and_then(Value::as_str).unwrap_or("")
}

/// Read a cell as `f64`, accepting numbers and numeric strings.
pub fn cell_f64(row: &Row, column: usize) -> f64 {
    match row.get(column) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}
