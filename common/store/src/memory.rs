//! In-process store engine. Partitions are created lazily on first append;
//! reads of unknown partitions return empty snapshots rather than errors so
//! fresh tenants behave like tenants with empty sheets.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::sheet::Sheet;
use crate::{Row, Store};

#[derive(Default)]
pub struct MemoryStore {
    sheets: RwLock<HashMap<(String, Sheet), Vec<Row>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_width(sheet: Sheet, row: &Row) -> Result<(), StoreError> {
        if row.len() != sheet.width() {
            return Err(StoreError::WidthMismatch {
                sheet,
                expected: sheet.width(),
                actual: row.len(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn append(&self, store_id: &str, sheet: Sheet, row: Row) -> Result<(), StoreError> {
        Self::check_width(sheet, &row)?;
        let mut sheets = self.sheets.write().await;
        sheets
            .entry((store_id.to_string(), sheet))
            .or_default()
            .push(row);
        Ok(())
    }

    async fn read_all(&self, store_id: &str, sheet: Sheet) -> Result<Vec<Row>, StoreError> {
        let sheets = self.sheets.read().await;
        Ok(sheets
            .get(&(store_id.to_string(), sheet))
            .cloned()
            .unwrap_or_default())
    }

    async fn update_row(
        &self,
        store_id: &str,
        sheet: Sheet,
        index: usize,
        row: Row,
    ) -> Result<(), StoreError> {
        Self::check_width(sheet, &row)?;
        let mut sheets = self.sheets.write().await;
        let rows = sheets
            .get_mut(&(store_id.to_string(), sheet))
            .ok_or(StoreError::RowOutOfBounds { sheet, index, len: 0 })?;
        let len = rows.len();
        let slot = rows
            .get_mut(index)
            .ok_or(StoreError::RowOutOfBounds { sheet, index, len })?;
        *slot = row;
        Ok(())
    }

    async fn update_cell(
        &self,
        store_id: &str,
        sheet: Sheet,
        index: usize,
        column: usize,
        value: Value,
    ) -> Result<(), StoreError> {
        if column >= sheet.width() {
            return Err(StoreError::ColumnOutOfBounds { sheet, column });
        }
        let mut sheets = self.sheets.write().await;
        let rows = sheets
            .get_mut(&(store_id.to_string(), sheet))
            .ok_or(StoreError::RowOutOfBounds { sheet, index, len: 0 })?;
        let len = rows.len();
        let row = rows
            .get_mut(index)
            .ok_or(StoreError::RowOutOfBounds { sheet, index, len })?;
        row[column] = value;
        Ok(())
    }

    async fn delete_rows(
        &self,
        store_id: &str,
        sheet: Sheet,
        indices: &[usize],
    ) -> Result<usize, StoreError> {
        let mut sheets = self.sheets.write().await;
        let Some(rows) = sheets.get_mut(&(store_id.to_string(), sheet)) else {
            return Ok(0);
        };
        let mut sorted: Vec<usize> = indices.to_vec();
        sorted.sort_unstable();
        sorted.dedup();
        let mut removed = 0;
        // Descending order keeps earlier indices stable while removing.
        for index in sorted.into_iter().rev() {
            if index < rows.len() {
                rows.remove(index);
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn row_count(&self, store_id: &str, sheet: Sheet) -> Result<usize, StoreError> {
        let sheets = self.sheets.read().await;
        Ok(sheets
            .get(&(store_id.to_string(), sheet))
            .map(Vec::len)
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn diag_row(msg: &str) -> Row {
        vec![
            json!("2025-01-01T00:00:00Z"),
            json!("INFO"),
            json!("test"),
            json!(msg),
            json!("{}"),
        ]
    }

    #[tokio::test]
    async fn append_and_snapshot() {
        let store = MemoryStore::new();
        store
            .append("sheet-a", Sheet::Diagnostics, diag_row("one"))
            .await
            .unwrap();
        store
            .append("sheet-a", Sheet::Diagnostics, diag_row("two"))
            .await
            .unwrap();

        let rows = store.read_all("sheet-a", Sheet::Diagnostics).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][3], "one");
        assert_eq!(rows[1][3], "two");

        // Unknown partitions read as empty.
        assert!(store.read_all("sheet-b", Sheet::Diagnostics).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_width_mismatch() {
        let store = MemoryStore::new();
        let err = store
            .append("s", Sheet::Analytics, vec![json!("only-one-cell")])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::WidthMismatch { expected: 10, .. }));
    }

    #[tokio::test]
    async fn update_cell_in_place() {
        let store = MemoryStore::new();
        store.append("s", Sheet::Diagnostics, diag_row("before")).await.unwrap();
        store
            .update_cell("s", Sheet::Diagnostics, 0, 3, json!("after"))
            .await
            .unwrap();
        let rows = store.read_all("s", Sheet::Diagnostics).await.unwrap();
        assert_eq!(rows[0][3], "after");

        let err = store
            .update_cell("s", Sheet::Diagnostics, 9, 3, json!("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::RowOutOfBounds { index: 9, .. }));
    }

    #[tokio::test]
    async fn delete_rows_by_index() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store
                .append("s", Sheet::Diagnostics, diag_row(&format!("row-{i}")))
                .await
                .unwrap();
        }
        let removed = store
            .delete_rows("s", Sheet::Diagnostics, &[0, 2, 2, 99])
            .await
            .unwrap();
        assert_eq!(removed, 2);
        let rows = store.read_all("s", Sheet::Diagnostics).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][3], "row-1");
        assert_eq!(rows[1][3], "row-3");
    }

    #[tokio::test]
    async fn snapshot_is_isolated_from_later_writes() {
        let store = MemoryStore::new();
        store.append("s", Sheet::Diagnostics, diag_row("first")).await.unwrap();
        let snapshot = store.read_all("s", Sheet::Diagnostics).await.unwrap();
        store.append("s", Sheet::Diagnostics, diag_row("second")).await.unwrap();
        assert_eq!(snapshot.len(), 1);
    }
}
