//! # tabclean - CSV / Excel cleaning and conversion
//!
//! tabclean takes uploaded CSV or XLSX files, previews them, applies simple
//! cleaning (duplicate removal, mean imputation), keeps a chosen subset of
//! columns, extracts chart series and exports the result as CSV or XLSX.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ CSV / XLSX  │────▶│   Parser    │────▶│    Clean    │────▶│   Select    │────▶│   Export    │
//! │   (bytes)   │     │ (typed cols)│     │(dedup, fill)│     │  (+ chart)  │     │ (csv/xlsx)  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tabclean::{convert, ConversionRequest, PipelineOptions};
//!
//! let bytes = std::fs::read("input.csv")?;
//! let request = ConversionRequest { remove_duplicates: true, ..Default::default() };
//! let result = convert("input.csv", &bytes, &request, &PipelineOptions::default())?;
//! println!("{} rows -> {}", result.run.table.row_count(), result.export.file_name);
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Table, cells, formats and the conversion request
//! - [`parser`] - CSV / XLSX parsing with type detection
//! - [`transform`] - Cleaning, projection, chart extraction and the pipeline
//! - [`export`] - CSV / XLSX serialization
//! - [`config`] - Environment-driven settings
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Export
pub mod export;

// Settings
pub mod config;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError, ParseError, PipelineError, SelectionError, SerializeError, ServerError,
    TableError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    Cell, ChartData, ChartSeries, Column, ColumnSelection, ColumnType, ConversionRequest,
    InputFormat, OutputFormat, Table,
};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse, parse_named, parse_with_options,
    Delimiter, ParseOptions, ParsedFile,
};

// =============================================================================
// Re-exports - Transformation
// =============================================================================

pub use transform::{
    convert, convert_batch, extract_chart_series, fill_missing_numeric, remove_duplicates,
    run_batch, run_pipeline, select_columns, Conversion, PipelineOptions, PipelineRun, Stage,
    StagePreview, UploadedFile,
};

// =============================================================================
// Re-exports - Export
// =============================================================================

pub use export::{serialize, suggested_file_name, Export};

// =============================================================================
// Re-exports - Settings & API
// =============================================================================

pub use config::Settings;

pub use api::types::{error_response, FileReport, PreviewResponse};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
}
