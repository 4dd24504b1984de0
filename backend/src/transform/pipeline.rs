//! High-level pipeline API: one uploaded file in, one cleaned table out.
//!
//! Stages always run in this order, bracketed ones only when requested:
//!
//! ```text
//! Parse → [RemoveDuplicates] → [FillMissingNumeric] → SelectColumns → [ExtractChartSeries] → Serialize
//! ```
//!
//! Each run owns its table outright; nothing is shared between files, so
//! a batch can be processed in any order or in parallel.
//!
//! # Example
//!
//! ```rust,ignore
//! use tabclean::{convert, ConversionRequest, OutputFormat, PipelineOptions};
//!
//! let request = ConversionRequest {
//!     fill_missing: true,
//!     output_format: OutputFormat::SpreadsheetBinary,
//!     ..Default::default()
//! };
//! let result = convert("sales.csv", &bytes, &request, &PipelineOptions::default())?;
//! std::fs::write(&result.export.file_name, &result.export.bytes)?;
//! ```

use serde::Serialize;

use super::chart::extract_chart_series;
use super::clean::{fill_missing_numeric, remove_duplicates};
use super::project::select_columns;
use crate::api::logs::FileLog;
use crate::error::PipelineError;
use crate::export::{serialize, Export};
use crate::models::{
    Cell, ChartData, ColumnType, ConversionRequest, InputFormat, OutputFormat, Table,
};
use crate::parser::{parse_with_options, ParseOptions};

/// Rows shown per stage preview by default.
pub const DEFAULT_PREVIEW_ROWS: usize = 5;

/// Options that are not part of a user's request.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Rows kept in each stage preview
    pub preview_rows: usize,
    pub parse: ParseOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            preview_rows: DEFAULT_PREVIEW_ROWS,
            parse: ParseOptions::default(),
        }
    }
}

/// A file as received from the caller.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self { name: name.into(), bytes: bytes.into() }
    }
}

// =============================================================================
// Previews
// =============================================================================

/// Pipeline stage a preview was taken after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Uploaded,
    Deduplicated,
    Filled,
    Selected,
}

/// Column header as shown in a preview.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ColumnType,
    pub missing: usize,
}

/// First rows of the table after one stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StagePreview {
    pub stage: Stage,
    pub row_count: usize,
    pub columns: Vec<ColumnInfo>,
    pub rows: Vec<Vec<Cell>>,
}

impl StagePreview {
    pub fn capture(stage: Stage, table: &Table, rows: usize) -> Self {
        Self {
            stage,
            row_count: table.row_count(),
            columns: table
                .columns()
                .iter()
                .map(|c| ColumnInfo {
                    name: c.name.clone(),
                    kind: c.kind,
                    missing: c.missing_count(),
                })
                .collect(),
            rows: table.head(rows).rows(),
        }
    }
}

/// What the parser detected about the upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub file_name: String,
    pub format: InputFormat,
    pub encoding: Option<String>,
    pub delimiter: Option<char>,
    pub sheet_name: Option<String>,
    pub row_count: usize,
    pub column_count: usize,
}

// =============================================================================
// Pipeline run
// =============================================================================

/// Result of running every stage except export.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub source: SourceInfo,
    /// Table after the last stage, ready for export
    pub table: Table,
    pub previews: Vec<StagePreview>,
    pub chart: Option<ChartData>,
    pub duplicates_removed: usize,
    pub cells_filled: usize,
}

impl PipelineRun {
    /// Serialize the final table, naming the output after the upload.
    pub fn export(&self, format: OutputFormat) -> Result<Export, PipelineError> {
        let log = FileLog::new(&self.source.file_name);
        log.info(format!("💾 Converting to {}...", format));
        let export = serialize(&self.table, format, &self.source.file_name)?;
        log.success(format!("{} ready ({} bytes)", export.file_name, export.bytes.len()));
        Ok(export)
    }

    /// Preview taken after `stage`, if that stage ran.
    pub fn preview(&self, stage: Stage) -> Option<&StagePreview> {
        self.previews.iter().find(|p| p.stage == stage)
    }
}

/// A run plus its export.
#[derive(Debug, Clone)]
pub struct Conversion {
    pub run: PipelineRun,
    pub export: Export,
}

/// Run parse, cleaning, projection and chart extraction on one file.
pub fn run_pipeline(
    file_name: &str,
    bytes: &[u8],
    request: &ConversionRequest,
    options: &PipelineOptions,
) -> Result<PipelineRun, PipelineError> {
    let log = FileLog::new(file_name);
    let result = run_stages(&log, file_name, bytes, request, options);
    if let Err(ref e) = result {
        log.error(e.to_string());
    }
    result
}

fn run_stages(
    log: &FileLog,
    file_name: &str,
    bytes: &[u8],
    request: &ConversionRequest,
    options: &PipelineOptions,
) -> Result<PipelineRun, PipelineError> {
    let format = match request.input_format {
        Some(format) => format,
        None => InputFormat::from_file_name(file_name)?,
    };

    log.info(format!("📖 Reading {} ({} bytes)...", file_name, bytes.len()));
    let parsed = parse_with_options(bytes, format, &options.parse)?;
    if let Some(ref encoding) = parsed.encoding {
        log.detail(format!("Encoding: {}", encoding));
    }
    if let Some(delimiter) = parsed.delimiter {
        log.detail(format!("Separator: '{}'", format_delimiter(delimiter)));
    }
    if let Some(ref sheet) = parsed.sheet_name {
        log.detail(format!("Sheet: {}", sheet));
    }

    let mut table = parsed.table;
    log.success(format!(
        "Read {} rows x {} columns",
        table.row_count(),
        table.column_count()
    ));

    let source = SourceInfo {
        file_name: file_name.to_string(),
        format,
        encoding: parsed.encoding,
        delimiter: parsed.delimiter,
        sheet_name: parsed.sheet_name,
        row_count: table.row_count(),
        column_count: table.column_count(),
    };

    let mut previews = vec![StagePreview::capture(Stage::Uploaded, &table, options.preview_rows)];

    let mut duplicates_removed = 0;
    if request.remove_duplicates {
        let before = table.row_count();
        table = remove_duplicates(table)?;
        duplicates_removed = before - table.row_count();
        log.success(format!("Duplicates removed: {}", duplicates_removed));
        previews.push(StagePreview::capture(Stage::Deduplicated, &table, options.preview_rows));
    }

    let mut cells_filled = 0;
    if request.fill_missing {
        let before = missing_numeric_cells(&table);
        table = fill_missing_numeric(table)?;
        cells_filled = before - missing_numeric_cells(&table);
        log.success(format!("Missing values filled: {}", cells_filled));
        previews.push(StagePreview::capture(Stage::Filled, &table, options.preview_rows));
    }

    let table = select_columns(&table, &request.columns)?;
    log.success(format!("Kept {} column(s)", table.column_count()));
    previews.push(StagePreview::capture(Stage::Selected, &table, options.preview_rows));

    let chart = if request.chart {
        let chart = extract_chart_series(&table);
        match chart {
            Some(ref data) => log.success(format!("📊 Chart: {} series", data.series.len())),
            None => log.warning("No numeric columns to chart"),
        }
        chart
    } else {
        None
    };

    Ok(PipelineRun {
        source,
        table,
        previews,
        chart,
        duplicates_removed,
        cells_filled,
    })
}

/// Run every stage including export in the requested format.
pub fn convert(
    file_name: &str,
    bytes: &[u8],
    request: &ConversionRequest,
    options: &PipelineOptions,
) -> Result<Conversion, PipelineError> {
    let run = run_pipeline(file_name, bytes, request, options)?;
    match run.export(request.output_format) {
        Ok(export) => Ok(Conversion { run, export }),
        Err(e) => {
            FileLog::new(file_name).error(e.to_string());
            Err(e)
        }
    }
}

/// Run the pipeline on each file independently.
///
/// One file failing never stops the others; results keep input order.
pub fn run_batch(
    files: &[UploadedFile],
    request: &ConversionRequest,
    options: &PipelineOptions,
) -> Vec<(String, Result<PipelineRun, PipelineError>)> {
    files
        .iter()
        .map(|f| (f.name.clone(), run_pipeline(&f.name, &f.bytes, request, options)))
        .collect()
}

/// [`convert`] for each file independently.
pub fn convert_batch(
    files: &[UploadedFile],
    request: &ConversionRequest,
    options: &PipelineOptions,
) -> Vec<(String, Result<Conversion, PipelineError>)> {
    files
        .iter()
        .map(|f| (f.name.clone(), convert(&f.name, &f.bytes, request, options)))
        .collect()
}

fn missing_numeric_cells(table: &Table) -> usize {
    table.numeric_columns().iter().map(|c| c.missing_count()).sum()
}

/// Format delimiter for display
fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        c => c.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ParseError, SelectionError};
    use crate::models::ColumnSelection;

    const SAMPLE: &[u8] = b"a,b\n1,\n1,3\n2,4";

    fn run(request: &ConversionRequest) -> PipelineRun {
        run_pipeline("sample.csv", SAMPLE, request, &PipelineOptions::default()).unwrap()
    }

    #[test]
    fn test_fill_scenario() {
        let request = ConversionRequest { fill_missing: true, ..Default::default() };
        let result = run(&request);

        assert_eq!(result.table.column("a").unwrap().numbers(), vec![Some(1.0), Some(1.0), Some(2.0)]);
        assert_eq!(result.table.column("b").unwrap().numbers(), vec![Some(3.5), Some(3.0), Some(4.0)]);
        assert_eq!(result.cells_filled, 1);
    }

    #[test]
    fn test_dedup_before_fill_keeps_distinct_rows() {
        let request = ConversionRequest {
            remove_duplicates: true,
            fill_missing: true,
            ..Default::default()
        };
        let result = run(&request);

        assert_eq!(result.duplicates_removed, 0);
        assert_eq!(result.table.row_count(), 3);
        assert_eq!(result.table.column("b").unwrap().numbers()[0], Some(3.5));
    }

    #[test]
    fn test_previews_follow_enabled_stages() {
        let request = ConversionRequest { remove_duplicates: true, ..Default::default() };
        let result = run(&request);

        let stages: Vec<Stage> = result.previews.iter().map(|p| p.stage).collect();
        assert_eq!(stages, vec![Stage::Uploaded, Stage::Deduplicated, Stage::Selected]);
        assert!(result.preview(Stage::Filled).is_none());
        assert_eq!(result.preview(Stage::Uploaded).unwrap().columns[1].missing, 1);
    }

    #[test]
    fn test_preview_row_limit() {
        let options = PipelineOptions { preview_rows: 2, ..Default::default() };
        let result =
            run_pipeline("sample.csv", SAMPLE, &ConversionRequest::default(), &options).unwrap();

        let preview = result.preview(Stage::Selected).unwrap();
        assert_eq!(preview.row_count, 3);
        assert_eq!(preview.rows.len(), 2);
    }

    #[test]
    fn test_selection_and_chart() {
        let request = ConversionRequest {
            columns: ColumnSelection::from(vec!["b".to_string()]),
            chart: true,
            ..Default::default()
        };
        let result = run(&request);

        assert_eq!(result.table.column_names(), vec!["b"]);
        let chart = result.chart.unwrap();
        assert_eq!(chart.series.len(), 1);
        assert_eq!(chart.series[0].values, vec![None, Some(3.0), Some(4.0)]);
    }

    #[test]
    fn test_chart_disabled() {
        assert!(run(&ConversionRequest::default()).chart.is_none());
    }

    #[test]
    fn test_unknown_column_is_selection_error() {
        let request = ConversionRequest {
            columns: ColumnSelection::from(vec!["zzz".to_string()]),
            ..Default::default()
        };
        let err = run_pipeline("sample.csv", SAMPLE, &request, &PipelineOptions::default())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Selection(SelectionError::UnknownColumns(_))));
    }

    #[test]
    fn test_input_format_override() {
        let request = ConversionRequest {
            input_format: Some(InputFormat::Delimited),
            ..Default::default()
        };
        let result =
            run_pipeline("upload.bin", SAMPLE, &request, &PipelineOptions::default()).unwrap();
        assert_eq!(result.source.format, InputFormat::Delimited);
    }

    #[test]
    fn test_convert_to_csv() {
        let request = ConversionRequest { fill_missing: true, ..Default::default() };
        let result = convert("sample.csv", SAMPLE, &request, &PipelineOptions::default()).unwrap();

        assert_eq!(result.export.file_name, "sample.csv");
        assert_eq!(result.export.mime_type, "text/csv");
        assert_eq!(result.export.bytes, b"a,b\n1,3.5\n1,3\n2,4\n");
    }

    #[test]
    fn test_empty_selection_keeps_rows() {
        let request = ConversionRequest {
            columns: ColumnSelection::Columns(vec![]),
            ..Default::default()
        };
        let result = convert("sample.csv", SAMPLE, &request, &PipelineOptions::default()).unwrap();

        assert_eq!(result.run.table.column_count(), 0);
        assert_eq!(result.run.table.row_count(), 3);
        assert_eq!(result.export.bytes, b"\n\n\n\n");
    }

    #[test]
    fn test_chart_index_after_dedup() {
        let request = ConversionRequest {
            remove_duplicates: true,
            chart: true,
            ..Default::default()
        };
        let result = run_pipeline(
            "dups.csv",
            b"x,y\n1,2\n3,4\n1,2\n5,6\n",
            &request,
            &PipelineOptions::default(),
        )
        .unwrap();

        assert_eq!(result.duplicates_removed, 1);
        assert_eq!(result.chart.unwrap().index, vec![0, 1, 3]);
    }

    #[test]
    fn test_batch_isolates_failures() {
        let files = vec![
            UploadedFile::new("good.csv", SAMPLE),
            UploadedFile::new("bad.txt", b"whatever".to_vec()),
            UploadedFile::new("also_good.csv", b"x\n1\n2".to_vec()),
        ];

        let results = run_batch(&files, &ConversionRequest::default(), &PipelineOptions::default());

        assert_eq!(results.len(), 3);
        assert!(results[0].1.is_ok());
        assert!(matches!(
            results[1].1,
            Err(PipelineError::Parse(ParseError::UnsupportedFormat(_)))
        ));
        assert_eq!(results[2].0, "also_good.csv");
        assert_eq!(results[2].1.as_ref().unwrap().table.row_count(), 2);
    }
}
