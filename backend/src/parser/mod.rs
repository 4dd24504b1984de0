//! Table parser for uploaded CSV and XLSX files.
//!
//! Turns raw bytes into a typed [`Table`]. The first row is always the
//! header. Each column is typed once, here, and never re-typed later:
//!
//! - every non-missing cell parses as a number → [`ColumnType::Numeric`](crate::models::ColumnType)
//! - anything else (mixed, all text, all missing) → [`ColumnType::Text`](crate::models::ColumnType)
//!
//! CSV fields are typed by a strict polars cast to `Float64`; a single field
//! that does not cast keeps the whole column as text.
//!
//! CSV input goes through encoding detection (`chardet` + `encoding_rs`)
//! before the `csv` reader sees it. XLSX input is read from memory with
//! `calamine`, first worksheet only.

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use encoding_rs::Encoding;
use polars::prelude::{DataType, NamedFrom, Series};
use std::collections::HashSet;
use std::io::Cursor;

use crate::error::ParseError;
use crate::models::{format_number, Column, InputFormat, Table};

/// Cell contents treated as missing, matched exactly.
pub const MISSING_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// How the CSV field separator is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Delimiter {
    /// Plain comma
    #[default]
    Comma,
    /// Guess from the header line
    Auto,
    /// Caller-provided separator
    Char(u8),
}

/// Parser settings.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    pub delimiter: Delimiter,
}

/// Parsed table plus what was detected along the way.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub table: Table,
    pub format: InputFormat,
    /// Detected text encoding (CSV only)
    pub encoding: Option<String>,
    /// Field separator used (CSV only)
    pub delimiter: Option<char>,
    /// Worksheet read (XLSX only)
    pub sheet_name: Option<String>,
}

/// Parse bytes in the given format with default options.
pub fn parse(bytes: &[u8], format: InputFormat) -> Result<Table, ParseError> {
    parse_with_options(bytes, format, &ParseOptions::default()).map(|p| p.table)
}

/// Parse bytes, deriving the format from the file name extension.
pub fn parse_named(bytes: &[u8], file_name: &str) -> Result<Table, ParseError> {
    parse(bytes, InputFormat::from_file_name(file_name)?)
}

/// Parse bytes and return detection metadata alongside the table.
pub fn parse_with_options(
    bytes: &[u8],
    format: InputFormat,
    options: &ParseOptions,
) -> Result<ParsedFile, ParseError> {
    match format {
        InputFormat::Delimited => {
            let encoding = detect_encoding(bytes);
            let content = decode_content(bytes, &encoding)?;
            let delimiter = match options.delimiter {
                Delimiter::Comma => b',',
                Delimiter::Char(c) => c,
                Delimiter::Auto => detect_delimiter(&content) as u8,
            };
            let table = parse_csv(&content, delimiter)?;
            Ok(ParsedFile {
                table,
                format,
                encoding: Some(encoding),
                delimiter: Some(delimiter as char),
                sheet_name: None,
            })
        }
        InputFormat::SpreadsheetBinary => {
            let (table, sheet_name) = parse_xlsx(bytes)?;
            Ok(ParsedFile {
                table,
                format,
                encoding: None,
                delimiter: None,
                sheet_name: Some(sheet_name),
            })
        }
    }
}

// =============================================================================
// Encoding & delimiter detection
// =============================================================================

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let charset = chardet::detect(bytes).0;

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "" | "ascii" | "utf-8" | "utf8" | "utf-8-sig" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to a string with the named encoding (UTF-8 when the label
/// is unknown).
///
/// Fails on malformed sequences and on control characters that never occur
/// in delimited text, which is how binary input decoded by a single-byte
/// encoding shows up.
pub fn decode_content(bytes: &[u8], encoding: &str) -> Result<String, ParseError> {
    let decoder = Encoding::for_label(encoding.as_bytes()).unwrap_or(encoding_rs::UTF_8);
    // `decode` sniffs and strips a BOM
    let (content, used, had_errors) = decoder.decode(bytes);
    if had_errors || content.chars().any(is_binary_control) {
        return Err(ParseError::Encoding {
            encoding: used.name().to_string(),
        });
    }
    Ok(content.into_owned())
}

fn is_binary_control(c: char) -> bool {
    matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{80}'..='\u{9f}')
}

/// Detect the delimiter by counting occurrences in the first line.
///
/// Falls back to `,` when the line contains none of the candidates.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

// =============================================================================
// CSV
// =============================================================================

/// Parse decoded CSV text.
pub fn parse_csv(content: &str, delimiter: u8) -> Result<Table, ParseError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() {
        return Err(ParseError::Empty);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.len() > headers.len() {
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            return Err(ParseError::Csv {
                line,
                message: format!("expected {} fields, saw {}", headers.len(), record.len()),
            });
        }
        rows.push(record.iter().map(|f| RawCell::Field(f.to_string())).collect());
    }

    build_table(headers, rows)
}

// =============================================================================
// XLSX
// =============================================================================

/// Parse an XLSX workbook held in memory. Returns the table and the sheet name.
pub fn parse_xlsx(bytes: &[u8]) -> Result<(Table, String), ParseError> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(ParseError::NoSheets)?;
    let range = workbook.worksheet_range(&sheet_name)?;

    let mut rows = range.rows();
    let header_row = rows.next().ok_or(ParseError::Empty)?;
    let headers: Vec<String> = header_row
        .iter()
        .map(|cell| match cell {
            Data::Empty => String::new(),
            Data::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect();

    let body = rows
        .map(|row| row.iter().map(raw_from_xlsx).collect())
        .collect();

    let table = build_table(headers, body)?;
    Ok((table, sheet_name))
}

fn raw_from_xlsx(cell: &Data) -> RawCell {
    match cell {
        Data::Empty | Data::Error(_) => RawCell::Missing,
        Data::Int(i) => RawCell::Number(*i as f64),
        Data::Float(f) => RawCell::Number(*f),
        Data::String(s) => RawCell::Text(s.clone()),
        Data::Bool(b) => RawCell::Text(b.to_string()),
        Data::DateTime(_) | Data::DateTimeIso(_) | Data::DurationIso(_) => {
            RawCell::Text(cell.to_string())
        }
    }
}

// =============================================================================
// Type inference
// =============================================================================

/// Untyped cell as read from the source.
enum RawCell {
    /// CSV field: may turn out numeric
    Field(String),
    /// Spreadsheet string: never numeric
    Text(String),
    /// Spreadsheet number
    Number(f64),
    Missing,
}

impl RawCell {
    /// Collapse missing tokens and NaN into `Missing`.
    fn normalize(self) -> Self {
        match self {
            RawCell::Field(s) | RawCell::Text(s) if is_missing_token(&s) => RawCell::Missing,
            RawCell::Number(n) if n.is_nan() => RawCell::Missing,
            other => other,
        }
    }
}

pub fn is_missing_token(value: &str) -> bool {
    MISSING_TOKENS.contains(&value)
}

/// Type each column and assemble the table. Short rows are padded with
/// missing cells.
fn build_table(headers: Vec<String>, rows: Vec<Vec<RawCell>>) -> Result<Table, ParseError> {
    let headers = normalize_headers(headers);
    let width = headers.len();

    let mut raw: Vec<Vec<RawCell>> = (0..width).map(|_| Vec::with_capacity(rows.len())).collect();
    for row in rows {
        let mut cells = row.into_iter();
        for column in raw.iter_mut() {
            column.push(cells.next().map(RawCell::normalize).unwrap_or(RawCell::Missing));
        }
    }

    let columns = headers
        .into_iter()
        .zip(raw)
        .map(|(name, cells)| type_column(name, cells))
        .collect();

    Ok(Table::new(columns)?)
}

fn type_column(name: String, cells: Vec<RawCell>) -> Column {
    let has_text = cells.iter().any(|c| matches!(c, RawCell::Text(_)));
    let numbers = if has_text { None } else { cast_numeric(&name, &cells) };

    match numbers {
        Some(values) if values.iter().any(Option::is_some) => Column::numeric(name, values),
        _ => {
            let values = cells.into_iter().map(|c| match c {
                RawCell::Field(s) | RawCell::Text(s) => Some(s),
                RawCell::Number(n) => Some(format_number(n)),
                RawCell::Missing => None,
            });
            Column::text(name, values)
        }
    }
}

/// Numeric values of a column, or `None` if any field fails to parse.
fn cast_numeric(name: &str, cells: &[RawCell]) -> Option<Vec<Option<f64>>> {
    let fields: Vec<Option<&str>> = cells
        .iter()
        .map(|c| match c {
            RawCell::Field(s) => Some(s.trim()),
            _ => None,
        })
        .collect();
    let parsed = Series::new(name.into(), fields)
        .strict_cast(&DataType::Float64)
        .ok()?;
    let parsed = parsed.f64().ok()?;

    let values = cells
        .iter()
        .zip(parsed)
        .map(|(cell, value)| match cell {
            RawCell::Number(n) => Some(*n),
            _ => value.filter(|v| !v.is_nan()),
        })
        .collect();
    Some(values)
}

/// Name empty headers `Unnamed: <index>` and suffix repeats with `.1`, `.2`, ...
pub fn normalize_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(headers.len());

    for (idx, header) in headers.into_iter().enumerate() {
        let base = if header.is_empty() {
            format!("Unnamed: {}", idx)
        } else {
            header
        };

        let mut name = base.clone();
        let mut suffix = 1;
        while seen.contains(&name) {
            name = format!("{}.{}", base, suffix);
            suffix += 1;
        }
        seen.insert(name.clone());
        out.push(name);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Cell, ColumnType};
    use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

    fn csv(content: &str) -> Table {
        parse(content.as_bytes(), InputFormat::Delimited).unwrap()
    }

    #[test]
    fn test_simple_csv() {
        let table = csv("name,age\nAlice,30\nBob,25");

        assert_eq!(table.column_names(), vec!["name", "age"]);
        assert_eq!(table.column_types(), vec![ColumnType::Text, ColumnType::Numeric]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.column("age").unwrap().numbers(), vec![Some(30.0), Some(25.0)]);
    }

    #[test]
    fn test_missing_cells_keep_numeric_type() {
        let table = csv("a,b\n1,\n1,3\n2,4");

        let b = table.column("b").unwrap();
        assert_eq!(b.kind, ColumnType::Numeric);
        assert_eq!(b.cells, vec![Cell::Missing, Cell::Number(3.0), Cell::Number(4.0)]);
    }

    #[test]
    fn test_missing_tokens() {
        let table = csv("x,y\nNA,a\nnull,N/A\n5,b");

        assert_eq!(table.column("x").unwrap().kind, ColumnType::Numeric);
        assert_eq!(table.column("x").unwrap().missing_count(), 2);
        assert_eq!(table.column("y").unwrap().cells[1], Cell::Missing);
    }

    #[test]
    fn test_mixed_column_is_text() {
        let table = csv("code\n12\nA7\n");

        let code = table.column("code").unwrap();
        assert_eq!(code.kind, ColumnType::Text);
        assert_eq!(code.cells[0], Cell::Text("12".into()));
    }

    #[test]
    fn test_all_missing_column_is_text() {
        let table = csv("a,b\n1,\n2,");
        assert_eq!(table.column("b").unwrap().kind, ColumnType::Text);
        assert_eq!(table.column("b").unwrap().missing_count(), 2);
    }

    #[test]
    fn test_quoted_values() {
        let table = csv("name,comment\n\"Doe, Jane\",\"said \"\"hi\"\"\"");

        assert_eq!(table.column("name").unwrap().cells[0], Cell::Text("Doe, Jane".into()));
        assert_eq!(table.column("comment").unwrap().cells[0], Cell::Text("said \"hi\"".into()));
    }

    #[test]
    fn test_empty_lines_skipped() {
        let table = csv("a,b\n1,2\n\n3,4\n");
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn test_short_rows_padded() {
        let table = csv("a,b,c\n1,2\n");
        assert_eq!(table.column("c").unwrap().cells, vec![Cell::Missing]);
    }

    #[test]
    fn test_long_rows_rejected() {
        let result = parse(b"a,b\n1,2,3\n", InputFormat::Delimited);
        assert!(matches!(result, Err(ParseError::Csv { line: 2, .. })));
    }

    #[test]
    fn test_empty_csv_error() {
        let result = parse(b"", InputFormat::Delimited);
        assert!(matches!(result, Err(ParseError::Empty)));
    }

    #[test]
    fn test_header_only() {
        let table = csv("a,b\n");
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn test_normalize_headers() {
        let headers = vec!["a".to_string(), "".into(), "a".into(), "a.1".into(), "a".into()];
        assert_eq!(
            normalize_headers(headers),
            vec!["a", "Unnamed: 1", "a.1", "a.1.1", "a.2"]
        );
    }

    #[test]
    fn test_unsupported_extension() {
        let result = parse_named(b"a,b\n1,2", "data.json");
        assert!(matches!(result, Err(ParseError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_auto_delimiter() {
        let options = ParseOptions { delimiter: Delimiter::Auto };
        let parsed =
            parse_with_options(b"name;age\nAlice;30", InputFormat::Delimited, &options).unwrap();

        assert_eq!(parsed.delimiter, Some(';'));
        assert_eq!(parsed.table.column_names(), vec!["name", "age"]);
    }

    #[test]
    fn test_detect_delimiter() {
        assert_eq!(detect_delimiter("a;b;c\n1;2;3"), ';');
        assert_eq!(detect_delimiter("a,b,c\n1,2,3"), ',');
        assert_eq!(detect_delimiter("a\tb\tc"), '\t');
        assert_eq!(detect_delimiter("a|b|c"), '|');
        assert_eq!(detect_delimiter("single"), ',');
    }

    #[test]
    fn test_latin1_decoding() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "iso-8859-1").unwrap();
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_invalid_bytes_rejected() {
        assert!(matches!(
            decode_content(&[0x61, 0xFF, 0x62], "utf-8"),
            Err(ParseError::Encoding { encoding }) if encoding == "UTF-8"
        ));

        let bytes = [b'a', b',', b'b', b'\n', 0xFF, 0xFE, 0x00, 0x9C, b',', 0x80, b'\n'];
        assert!(matches!(
            parse(&bytes, InputFormat::Delimited),
            Err(ParseError::Encoding { .. })
        ));
    }

    #[test]
    fn test_unusual_numbers() {
        let table = csv("v\n1e3\n -2.5 \n+4\n");
        assert_eq!(
            table.column("v").unwrap().numbers(),
            vec![Some(1000.0), Some(-2.5), Some(4.0)]
        );
    }

    #[test]
    fn test_utf8_bom_stripped() {
        let table = parse(b"\xEF\xBB\xBFid,v\n1,2", InputFormat::Delimited).unwrap();
        assert_eq!(table.column_names(), vec!["id", "v"]);
    }

    fn xlsx_bytes(build: impl FnOnce(&mut Workbook)) -> Vec<u8> {
        let mut workbook = Workbook::new();
        build(&mut workbook);
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn test_xlsx_cell_typing() {
        let bytes = xlsx_bytes(|workbook| {
            let date_format = Format::new().set_num_format("yyyy-mm-dd");
            let date = ExcelDateTime::from_ymd(2024, 1, 15).unwrap();
            let sheet = workbook.add_worksheet();

            for (col, header) in ["score", "code", "flag", "when"].iter().enumerate() {
                sheet.write_string(0, col as u16, *header).unwrap();
            }
            sheet.write_number(1, 0, 1.5).unwrap();
            sheet.write_string(2, 0, "NA").unwrap();
            sheet.write_string(1, 1, "12").unwrap();
            sheet.write_string(2, 1, "12").unwrap();
            sheet.write_boolean(1, 2, true).unwrap();
            sheet.write_boolean(2, 2, false).unwrap();
            sheet.write_datetime_with_format(1, 3, &date, &date_format).unwrap();
            sheet.write_datetime_with_format(2, 3, &date, &date_format).unwrap();
        });

        let (table, sheet_name) = parse_xlsx(&bytes).unwrap();
        assert_eq!(sheet_name, "Sheet1");
        assert_eq!(
            table.column_types(),
            vec![ColumnType::Numeric, ColumnType::Text, ColumnType::Text, ColumnType::Text]
        );
        assert_eq!(table.column("score").unwrap().numbers(), vec![Some(1.5), None]);
        assert_eq!(
            table.column("code").unwrap().cells,
            vec![Cell::Text("12".into()), Cell::Text("12".into())]
        );
        assert_eq!(
            table.column("flag").unwrap().cells,
            vec![Cell::Text("true".into()), Cell::Text("false".into())]
        );

        let when = table.column("when").unwrap();
        assert_eq!(when.missing_count(), 0);
        assert!(when.cells.iter().all(|c| c.as_text().is_some()));
    }

    #[test]
    fn test_xlsx_error_cells_are_missing() {
        assert!(matches!(
            raw_from_xlsx(&Data::Error(calamine::CellErrorType::Div0)),
            RawCell::Missing
        ));
        assert!(matches!(raw_from_xlsx(&Data::Bool(true)), RawCell::Text(s) if s == "true"));
    }

    #[test]
    fn test_xlsx_empty_first_sheet() {
        let bytes = xlsx_bytes(|workbook| {
            workbook.add_worksheet();
            workbook.add_worksheet().write_string(0, 0, "ignored").unwrap();
        });

        assert!(matches!(parse_xlsx(&bytes), Err(ParseError::Empty)));
    }

    #[test]
    fn test_corrupt_xlsx() {
        let result = parse(b"definitely not a zip archive", InputFormat::SpreadsheetBinary);
        assert!(matches!(result, Err(ParseError::Workbook(_))));
    }
}
