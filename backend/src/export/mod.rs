//! Table export to CSV and XLSX.
//!
//! Both encoders write a header row followed by one row per record and
//! never emit a row index column.

use rust_xlsxwriter::{Format, Workbook};
use std::path::{Path, PathBuf};

use crate::error::SerializeError;
use crate::models::{file_extension, Cell, OutputFormat, Table};

/// Worksheet name used for XLSX output.
pub const SHEET_NAME: &str = "Sheet1";

/// Excel grid limits (header row included).
pub const MAX_SHEET_ROWS: usize = 1_048_576;
pub const MAX_SHEET_COLUMNS: usize = 16_384;

/// An encoded file ready to be offered as a download.
#[derive(Debug, Clone)]
pub struct Export {
    pub bytes: Vec<u8>,
    pub format: OutputFormat,
    pub mime_type: &'static str,
    pub file_name: String,
}

/// Encode `table` in `format`, naming the result after `source_name`.
pub fn serialize(
    table: &Table,
    format: OutputFormat,
    source_name: &str,
) -> Result<Export, SerializeError> {
    let bytes = match format {
        OutputFormat::Delimited => to_csv(table)?,
        OutputFormat::SpreadsheetBinary => to_xlsx(table)?,
    };

    Ok(Export {
        bytes,
        format,
        mime_type: format.mime_type(),
        file_name: suggested_file_name(source_name, format),
    })
}

impl Export {
    /// Write the file into `dir` under its suggested name.
    pub fn write_to_dir(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let base = Path::new(&self.file_name)
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(&self.file_name));
        let path = dir.join(base);
        std::fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// Replace the final extension of `source_name` with the format's extension.
///
/// A name without extension gets one appended.
pub fn suggested_file_name(source_name: &str, format: OutputFormat) -> String {
    let stem = match file_extension(source_name) {
        Some(ext) => &source_name[..source_name.len() - ext.len() - 1],
        None => source_name,
    };
    format!("{}.{}", stem, format.extension())
}

/// Comma-separated text, LF line endings, missing cells as empty fields.
///
/// A table without columns becomes one empty line for the header and one
/// per row.
pub fn to_csv(table: &Table) -> Result<Vec<u8>, SerializeError> {
    let columns = table.columns();
    if columns.is_empty() {
        return Ok(vec![b'\n'; table.row_count() + 1]);
    }

    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(columns.iter().map(|c| c.name.as_str()))?;
    for row in 0..table.row_count() {
        writer.write_record(columns.iter().map(|c| c.cells[row].to_string()))?;
    }

    writer.into_inner().map_err(|e| SerializeError::Io(e.into_error()))
}

/// Single-sheet workbook with a bold header row. Missing cells stay blank.
pub fn to_xlsx(table: &Table) -> Result<Vec<u8>, SerializeError> {
    if table.row_count() + 1 > MAX_SHEET_ROWS || table.column_count() > MAX_SHEET_COLUMNS {
        return Err(SerializeError::SheetLimit {
            rows: table.row_count(),
            columns: table.column_count(),
        });
    }

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    let header_format = Format::new().set_bold();

    for (col_idx, column) in table.columns().iter().enumerate() {
        let col = col_idx as u16;
        worksheet.write_string_with_format(0, col, &column.name, &header_format)?;

        for (row_idx, cell) in column.cells.iter().enumerate() {
            let excel_row = (row_idx + 1) as u32;
            match cell {
                Cell::Number(n) if !n.is_finite() => {
                    return Err(SerializeError::UnsupportedValue {
                        column: column.name.clone(),
                        row: row_idx,
                        reason: format!("{} cannot be stored in a spreadsheet", n),
                    });
                }
                Cell::Number(n) => {
                    worksheet.write_number(excel_row, col, *n)?;
                }
                Cell::Text(s) => {
                    worksheet.write_string(excel_row, col, s)?;
                }
                Cell::Missing => {}
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Column;

    fn scores() -> Table {
        Table::new(vec![
            Column::text("name", [Some("Alice"), Some("Bob, Jr."), None]),
            Column::numeric("score", [Some(95.0), None, Some(7.25)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_csv_layout() {
        let bytes = to_csv(&scores()).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, "name,score\nAlice,95\n\"Bob, Jr.\",\n,7.25\n");
    }

    #[test]
    fn test_csv_header_only() {
        let table = Table::new(vec![
            Column::numeric("a", Vec::<Option<f64>>::new()),
            Column::numeric("b", Vec::<Option<f64>>::new()),
        ])
        .unwrap();
        assert_eq!(to_csv(&table).unwrap(), b"a,b\n");
    }

    #[test]
    fn test_csv_without_columns() {
        let selection = crate::models::ColumnSelection::Columns(vec![]);
        let table = crate::transform::select_columns(&scores(), &selection).unwrap();

        assert_eq!(to_csv(&table).unwrap(), b"\n\n\n\n");
        assert_eq!(&to_xlsx(&table).unwrap()[0..2], b"PK");
    }

    #[test]
    fn test_xlsx_is_zip() {
        let bytes = to_xlsx(&scores()).unwrap();
        assert!(bytes.len() > 100);
        assert_eq!(&bytes[0..2], b"PK");
    }

    #[test]
    fn test_xlsx_rejects_infinity() {
        let table = Table::new(vec![Column::numeric("ratio", [Some(1.0), Some(f64::INFINITY)])])
            .unwrap();

        let err = to_xlsx(&table).unwrap_err();
        assert!(matches!(
            err,
            SerializeError::UnsupportedValue { ref column, row: 1, .. } if column == "ratio"
        ));
    }

    #[test]
    fn test_serialize_metadata() {
        let export = serialize(&scores(), OutputFormat::SpreadsheetBinary, "grades.csv").unwrap();
        assert_eq!(export.file_name, "grades.xlsx");
        assert_eq!(
            export.mime_type,
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );

        let export = serialize(&scores(), OutputFormat::Delimited, "grades.xlsx").unwrap();
        assert_eq!(export.file_name, "grades.csv");
        assert_eq!(export.mime_type, "text/csv");
    }

    #[test]
    fn test_suggested_file_name() {
        assert_eq!(suggested_file_name("csv_report.xlsx", OutputFormat::Delimited), "csv_report.csv");
        assert_eq!(suggested_file_name("a.b.CSV", OutputFormat::Delimited), "a.b.csv");
        assert_eq!(suggested_file_name("data", OutputFormat::SpreadsheetBinary), "data.xlsx");
    }
}
