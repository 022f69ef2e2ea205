use thiserror::Error;

use crate::sheet::Sheet;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("row width mismatch for {sheet:?}: expected {expected}, got {actual}")]
    WidthMismatch {
        sheet: Sheet,
        expected: usize,
        actual: usize,
    },
    #[error("row index {index} out of bounds for {sheet:?} (len {len})")]
    RowOutOfBounds {
        sheet: Sheet,
        index: usize,
        len: usize,
    },
    #[error("column index {column} out of bounds for {sheet:?}")]
    ColumnOutOfBounds { sheet: Sheet, column: usize },
    #[error("storage backend failure: {0}")]
    Backend(String),
}
