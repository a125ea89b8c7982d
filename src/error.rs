use thiserror::Error;

/// Errors that can occur while loading, changing or saving a table.
///
/// Every variant renders to the human-readable message that ends up in a
/// flash notice or in the `{message}` body of the cell-update endpoint.
#[derive(Error, Debug)]
pub enum SheetError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Read(#[from] calamine::XlsxError),

    #[error("{0}")]
    Write(#[from] rust_xlsxwriter::XlsxError),

    #[error("workbook has no sheets")]
    NoSheets,

    #[error("Missing columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("row {0} not found")]
    RowNotFound(String),

    #[error("column {0} not found")]
    ColumnNotFound(String),

    #[error("column {0} is reserved")]
    ReservedColumn(String),

    #[error("Invalid file name: {0}")]
    InvalidFileName(String),

    #[error("Row index overflow")]
    TooManyRows,

    #[error("Column index overflow")]
    TooManyColumns,
}

pub type Result<T> = std::result::Result<T, SheetError>;
