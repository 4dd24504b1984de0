//! Domain models for the tabclean pipeline.
//!
//! This module contains the core data structures used throughout the pipeline:
//!
//! - [`Cell`] - One typed cell value (number, text or missing)
//! - [`Column`] - A named, typed sequence of cells
//! - [`Table`] - Ordered, uniquely named, equal-length columns over a polars frame
//! - [`ColumnSelection`] - Which columns to keep, in which order
//! - [`InputFormat`] / [`OutputFormat`] - Recognized file formats
//! - [`ConversionRequest`] - Parameters of one pipeline run
//! - [`ChartData`] - Chart-ready numeric series

use polars::prelude::{Column as FrameColumn, DataFrame, DataType, NamedFrom, PlSmallStr, Series};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{ParseError, TableError};

// =============================================================================
// Cells
// =============================================================================

/// A single cell value.
///
/// Serializes untagged: numbers as JSON numbers, text as strings,
/// missing cells as `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    Missing,
}

impl Cell {
    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Number(n) => f.write_str(&format_number(*n)),
            Cell::Text(s) => f.write_str(s),
            Cell::Missing => Ok(()),
        }
    }
}

/// Render a number the way it is written to CSV.
///
/// Integral values drop the fractional part (`3.0` → `3`).
pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

// =============================================================================
// Columns
// =============================================================================

/// Column type, fixed at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    /// Holds only `Cell::Number` and `Cell::Missing`.
    Numeric,
    /// Holds only `Cell::Text` and `Cell::Missing`.
    Text,
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnType,
    pub cells: Vec<Cell>,
}

impl Column {
    /// Build a numeric column; `None` becomes a missing cell.
    pub fn numeric<I>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        Self {
            name: name.into(),
            kind: ColumnType::Numeric,
            cells: values
                .into_iter()
                .map(|v| v.map(Cell::Number).unwrap_or(Cell::Missing))
                .collect(),
        }
    }

    /// Build a text column; `None` becomes a missing cell.
    pub fn text<I, S>(name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            kind: ColumnType::Text,
            cells: values
                .into_iter()
                .map(|v| v.map(|s| Cell::Text(s.into())).unwrap_or(Cell::Missing))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn is_numeric(&self) -> bool {
        self.kind == ColumnType::Numeric
    }

    pub fn missing_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_missing()).count()
    }

    /// Numeric view of the column (`None` for missing and text cells).
    pub fn numbers(&self) -> Vec<Option<f64>> {
        self.cells.iter().map(Cell::as_number).collect()
    }
}

// =============================================================================
// Table
// =============================================================================

/// In-memory table: ordered, uniquely named columns of equal length.
///
/// Cells live in a polars [`DataFrame`]: numeric columns as `Float64`, text
/// columns as `String`, missing cells as nulls. `index` holds the source row
/// position of every row, so it survives row removal and keeps the row count
/// of a table with no columns.
#[derive(Debug, Clone)]
pub struct Table {
    frame: DataFrame,
    index: Vec<usize>,
}

impl Table {
    /// Build a table, checking name uniqueness and equal column length.
    pub fn new(columns: Vec<Column>) -> Result<Self, TableError> {
        let row_count = columns.first().map(Column::len).unwrap_or(0);
        let mut seen = HashSet::new();

        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(TableError::DuplicateColumn(column.name.clone()));
            }
            if column.len() != row_count {
                return Err(TableError::LengthMismatch {
                    column: column.name.clone(),
                    expected: row_count,
                    actual: column.len(),
                });
            }
        }

        let frame = DataFrame::new(columns.iter().map(to_series).map(Into::into).collect())?;
        Ok(Self { frame, index: (0..row_count).collect() })
    }

    /// Wrap a frame derived from a valid table; `index` labels its rows.
    pub(crate) fn from_parts(frame: DataFrame, index: Vec<usize>) -> Self {
        Self { frame, index }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Source row position of each row.
    pub fn index(&self) -> &[usize] {
        &self.index
    }

    /// Materialized copy of every column, in table order.
    pub fn columns(&self) -> Vec<Column> {
        self.frame.get_columns().iter().map(to_column).collect()
    }

    pub fn column(&self, name: &str) -> Option<Column> {
        self.frame.column(name).ok().map(to_column)
    }

    pub fn column_names(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .into_iter()
            .map(|n| n.to_string())
            .collect()
    }

    pub fn column_types(&self) -> Vec<ColumnType> {
        self.frame
            .get_columns()
            .iter()
            .map(|c| ColumnType::of(c.dtype()))
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.index.len()
    }

    pub fn column_count(&self) -> usize {
        self.frame.width()
    }

    /// Numeric columns in table order.
    pub fn numeric_columns(&self) -> Vec<Column> {
        self.frame
            .get_columns()
            .iter()
            .filter(|c| ColumnType::of(c.dtype()) == ColumnType::Numeric)
            .map(to_column)
            .collect()
    }

    /// Cells of one row, in column order.
    pub fn row(&self, index: usize) -> Option<Vec<Cell>> {
        if index >= self.row_count() {
            return None;
        }
        Some(self.columns().into_iter().map(|mut c| c.cells.swap_remove(index)).collect())
    }

    /// All rows as owned cell vectors.
    pub fn rows(&self) -> Vec<Vec<Cell>> {
        let columns = self.columns();
        (0..self.row_count())
            .map(|i| columns.iter().map(|c| c.cells[i].clone()).collect())
            .collect()
    }

    /// First `n` rows as a new table.
    pub fn head(&self, n: usize) -> Table {
        let take = n.min(self.row_count());
        Table {
            frame: self.frame.head(Some(take)),
            index: self.index[..take].to_vec(),
        }
    }
}

impl Default for Table {
    fn default() -> Self {
        Self { frame: DataFrame::empty(), index: Vec::new() }
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.columns() == other.columns()
    }
}

impl ColumnType {
    /// `Float64` columns are numeric, everything else is text.
    pub fn of(dtype: &DataType) -> Self {
        match dtype {
            DataType::Float64 => ColumnType::Numeric,
            _ => ColumnType::Text,
        }
    }
}

fn to_series(column: &Column) -> Series {
    let name = PlSmallStr::from(column.name.as_str());
    match column.kind {
        ColumnType::Numeric => {
            let values: Vec<Option<f64>> = column
                .cells
                .iter()
                .map(|c| match c.as_number() {
                    Some(n) if n.is_nan() => None,
                    // -0.0 and 0.0 are one value
                    Some(n) if n == 0.0 => Some(0.0),
                    other => other,
                })
                .collect();
            Series::new(name, values)
        }
        ColumnType::Text => {
            let values: Vec<Option<&str>> = column.cells.iter().map(Cell::as_text).collect();
            Series::new(name, values)
        }
    }
}

fn to_column(column: &FrameColumn) -> Column {
    let name = column.name().to_string();
    let series = column.as_materialized_series();
    if let Ok(values) = series.f64() {
        return Column::numeric(name, values.into_iter());
    }
    match series.str() {
        Ok(values) => Column::text(name, values.into_iter()),
        Err(_) => Column::text(name, vec![None::<String>; series.len()]),
    }
}

// =============================================================================
// Column Selection
// =============================================================================

/// Columns to keep, in output order.
///
/// Deserializes from a JSON array of names; `null` or an absent field means
/// every column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum ColumnSelection {
    Columns(Vec<String>),
    #[default]
    All,
}

impl ColumnSelection {
    /// Requested names with repeats removed, first occurrence wins.
    pub fn names(&self) -> Option<Vec<&str>> {
        match self {
            ColumnSelection::All => None,
            ColumnSelection::Columns(names) => {
                let mut seen = HashSet::new();
                Some(
                    names
                        .iter()
                        .map(String::as_str)
                        .filter(|n| seen.insert(*n))
                        .collect(),
                )
            }
        }
    }
}

impl From<Vec<String>> for ColumnSelection {
    fn from(names: Vec<String>) -> Self {
        ColumnSelection::Columns(names)
    }
}

impl From<Option<Vec<String>>> for ColumnSelection {
    fn from(names: Option<Vec<String>>) -> Self {
        names.map(ColumnSelection::Columns).unwrap_or_default()
    }
}

// =============================================================================
// Formats
// =============================================================================

/// Recognized upload formats, derived from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputFormat {
    #[serde(rename = "csv")]
    Delimited,
    #[serde(rename = "xlsx")]
    SpreadsheetBinary,
}

impl InputFormat {
    /// Detect the format from a file name such as `sales.CSV`.
    pub fn from_file_name(file_name: &str) -> Result<Self, ParseError> {
        let ext = file_extension(file_name).unwrap_or_default();
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Ok(InputFormat::Delimited),
            "xlsx" => Ok(InputFormat::SpreadsheetBinary),
            _ => Err(ParseError::UnsupportedFormat(ext.to_string())),
        }
    }
}

/// Export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum OutputFormat {
    #[default]
    #[serde(rename = "csv")]
    Delimited,
    #[serde(rename = "xlsx", alias = "excel")]
    SpreadsheetBinary,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Delimited => "csv",
            OutputFormat::SpreadsheetBinary => "xlsx",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Delimited => "text/csv",
            OutputFormat::SpreadsheetBinary => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Delimited),
            "xlsx" | "excel" => Ok(OutputFormat::SpreadsheetBinary),
            other => Err(format!("unknown output format '{}' (expected csv or xlsx)", other)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Extension after the last dot of the file name, if any.
pub fn file_extension(file_name: &str) -> Option<&str> {
    let base = file_name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(file_name);
    match base.rfind('.') {
        Some(0) | None => None,
        Some(idx) => Some(&base[idx + 1..]),
    }
}

// =============================================================================
// Conversion Request
// =============================================================================

/// Parameters of one pipeline run.
///
/// Every field has a default, so `{}` is a valid request: no cleaning,
/// all columns, no chart, CSV output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ConversionRequest {
    /// Overrides the format derived from the file name
    pub input_format: Option<InputFormat>,

    /// Drop exact duplicate rows
    pub remove_duplicates: bool,

    /// Fill missing numeric cells with the column mean
    pub fill_missing: bool,

    /// Columns to keep
    pub columns: ColumnSelection,

    /// Extract chart series
    pub chart: bool,

    /// Export format
    pub output_format: OutputFormat,
}

// =============================================================================
// Chart Data
// =============================================================================

/// One named numeric series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub name: String,
    /// `None` marks a gap (missing cell)
    pub values: Vec<Option<f64>>,
}

/// Up to two parallel numeric series plus their row labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub index: Vec<usize>,
    pub series: Vec<ChartSeries>,
}
