//! Transformation module.
//!
//! - Clean: duplicate removal and mean imputation
//! - Project: column selection
//! - Chart: numeric series extraction
//! - Pipeline: fixed-order stage runner

pub mod chart;
pub mod clean;
pub mod pipeline;
pub mod project;

pub use chart::extract_chart_series;
pub use clean::{fill_missing_numeric, remove_duplicates};
pub use pipeline::*;
pub use project::select_columns;
