//! Error types for the tabclean pipeline.
//!
//! This module defines the error hierarchy used across the crate:
//!
//! - [`TableError`] - Table construction invariants
//! - [`ParseError`] - Unreadable or malformed input files
//! - [`SelectionError`] - Column projection failures
//! - [`SerializeError`] - Export failures
//! - [`PipelineError`] - One file's pipeline run
//! - [`ConfigError`] - Runtime settings
//! - [`ServerError`] - HTTP layer
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Table Errors
// =============================================================================

/// Violations of the table invariants (unique names, equal column length)
/// and failures of the underlying data frame.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TableError {
    /// Two columns share a name.
    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),

    /// A column does not have the table's row count.
    #[error("Column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    /// Data frame operation failed.
    #[error("Data frame error: {0}")]
    Frame(String),
}

impl From<polars::error::PolarsError> for TableError {
    fn from(err: polars::error::PolarsError) -> Self {
        TableError::Frame(err.to_string())
    }
}

// =============================================================================
// Parse Errors
// =============================================================================

/// Errors while turning uploaded bytes into a [`crate::models::Table`].
#[derive(Debug, Error)]
pub enum ParseError {
    /// File extension is not one of the recognized input formats.
    #[error("Unsupported file type '{0}' (expected .csv or .xlsx)")]
    UnsupportedFormat(String),

    /// Bytes are not text in the detected encoding.
    #[error("File is not valid {encoding} text")]
    Encoding { encoding: String },

    /// The file has no header row.
    #[error("No columns to parse from file")]
    Empty,

    /// Malformed delimited text.
    #[error("Invalid CSV at line {line}: {message}")]
    Csv { line: u64, message: String },

    /// Corrupt or unreadable workbook container.
    #[error("Invalid spreadsheet: {0}")]
    Workbook(String),

    /// Workbook opened but contains no worksheet.
    #[error("Spreadsheet has no worksheets")]
    NoSheets,

    /// Parsed columns could not form a valid table.
    #[error("Invalid table: {0}")]
    Table(#[from] TableError),
}

impl From<csv::Error> for ParseError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        ParseError::Csv {
            line,
            message: err.to_string(),
        }
    }
}

impl From<calamine::XlsxError> for ParseError {
    fn from(err: calamine::XlsxError) -> Self {
        ParseError::Workbook(err.to_string())
    }
}

// =============================================================================
// Selection Errors
// =============================================================================

/// Errors while projecting a table onto a column selection.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectionError {
    /// One or more requested columns do not exist.
    #[error("Unknown column(s): {}", .0.join(", "))]
    UnknownColumns(Vec<String>),

    /// Projection of the underlying frame failed.
    #[error("{0}")]
    Table(#[from] TableError),
}

// =============================================================================
// Serialize Errors
// =============================================================================

/// Errors while encoding a table into an output format.
#[derive(Debug, Error)]
pub enum SerializeError {
    /// A cell value cannot be represented by the target encoder.
    #[error("Cannot encode value in column '{column}', row {row}: {reason}")]
    UnsupportedValue {
        column: String,
        row: usize,
        reason: String,
    },

    /// Table exceeds the worksheet grid.
    #[error("Table of {rows} rows x {columns} columns exceeds spreadsheet limits")]
    SheetLimit { rows: usize, columns: usize },

    /// CSV writer failure.
    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    /// Workbook writer failure.
    #[error("Workbook write error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    /// Buffer flush failure.
    #[error("Output buffer error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Pipeline Errors (per file)
// =============================================================================

/// Failure of one file's pipeline run.
///
/// Never fatal to the process: other files in the same batch keep going.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input could not be parsed.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// A cleaning stage failed.
    #[error("Table error: {0}")]
    Table(#[from] TableError),

    /// Column selection failed.
    #[error("Selection error: {0}")]
    Selection(#[from] SelectionError),

    /// Export failed.
    #[error("Export error: {0}")]
    Serialize(#[from] SerializeError),
}

// =============================================================================
// Config Errors
// =============================================================================

/// Invalid runtime settings.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("Invalid value '{value}' for {key}: {message}")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Pipeline error.
    #[error("{0}")]
    Pipeline(#[from] PipelineError),

    /// Invalid request.
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Server internal error.
    #[error("Internal server error: {0}")]
    Internal(String),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for parsing.
pub type ParseResult<T> = Result<T, ParseError>;

/// Result type for export.
pub type SerializeResult<T> = Result<T, SerializeError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        // ParseError -> PipelineError
        let pipeline_err: PipelineError = ParseError::Empty.into();
        assert!(pipeline_err.to_string().contains("No columns"));

        // SelectionError -> PipelineError -> ServerError
        let selection_err = SelectionError::UnknownColumns(vec!["age".into(), "city".into()]);
        let pipeline_err: PipelineError = selection_err.into();
        let server_err: ServerError = pipeline_err.into();
        assert!(server_err.to_string().contains("age, city"));
    }

    #[test]
    fn test_table_error_format() {
        let err = TableError::LengthMismatch {
            column: "score".into(),
            expected: 3,
            actual: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("score"));
        assert!(msg.contains("expected 3"));
    }

    #[test]
    fn test_encoding_error_format() {
        let err: PipelineError = ParseError::Encoding { encoding: "UTF-8".into() }.into();
        assert!(err.to_string().contains("not valid UTF-8 text"));
    }

    #[test]
    fn test_unsupported_value_format() {
        let err = SerializeError::UnsupportedValue {
            column: "ratio".into(),
            row: 4,
            reason: "NaN".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("ratio"));
        assert!(msg.contains("row 4"));
    }
}
