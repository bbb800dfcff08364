//! Upload decoding: raw bytes (or base64 transport payloads) into a [`Table`].
//!
//! The filename selects the decoder - a case-insensitive substring match on
//! "csv" picks the text decoder (encoding auto-detected), "xls" picks the
//! binary spreadsheet decoder (first worksheet, header row required). Anything
//! else is an unsupported format, reported per file and never fatal to a batch.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde_json::{Map, Value};
use std::io::Cursor;

use crate::error::{DecodeError, DecodeResult};
use crate::models::Table;

/// Decoder selected from the filename.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Comma-separated text.
    Csv,
    /// Binary spreadsheet container (xls/xlsx).
    Spreadsheet,
}

impl FileFormat {
    /// Select a decoder by case-insensitive substring match, mirroring how
    /// the upload collaborator names exported reports.
    pub fn from_filename(filename: &str) -> DecodeResult<Self> {
        let lower = filename.to_lowercase();
        if lower.contains("csv") {
            Ok(FileFormat::Csv)
        } else if lower.contains("xls") {
            Ok(FileFormat::Spreadsheet)
        } else {
            Err(DecodeError::UnsupportedFormat(filename.to_string()))
        }
    }
}

/// Decode a `<content-type>,<base64>` transport payload into raw bytes.
///
/// The part before the first comma (the content-type preamble) is ignored;
/// a payload without a preamble is accepted as-is.
pub fn decode_data_url(contents: &str) -> DecodeResult<Vec<u8>> {
    let payload = contents
        .split_once(',')
        .map(|(_, p)| p)
        .unwrap_or(contents);
    Ok(BASE64.decode(payload.trim())?)
}

/// Decode raw file bytes into a table, selecting the decoder from `filename`.
pub fn decode_table(bytes: &[u8], filename: &str) -> DecodeResult<Table> {
    match FileFormat::from_filename(filename)? {
        FileFormat::Csv => decode_csv(bytes),
        FileFormat::Spreadsheet => decode_workbook(bytes),
    }
}

// =============================================================================
// CSV
// =============================================================================

/// Detect the text encoding of raw bytes using chardet.
pub fn detect_encoding(bytes: &[u8]) -> String {
    let (charset, _, _) = chardet::detect(bytes);

    // Normalize charset names
    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "utf-8".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        other => other.to_string(),
    }
}

/// Decode bytes to a string using the detected encoding.
pub fn decode_text(bytes: &[u8], encoding: &str) -> String {
    match encoding {
        "iso-8859-1" => encoding_rs::ISO_8859_15.decode(bytes).0.into_owned(),
        "windows-1252" => encoding_rs::WINDOWS_1252.decode(bytes).0.into_owned(),
        // UTF-8 and anything unrecognized: lossy UTF-8
        _ => String::from_utf8_lossy(bytes).into_owned(),
    }
}

/// Decode comma-separated text into a table.
///
/// The first record is the header row; data rows shorter than the header are
/// padded with empty cells. All cells come out as strings - typing happens in
/// the sanitizer.
pub fn decode_csv(bytes: &[u8]) -> DecodeResult<Table> {
    if bytes.is_empty() {
        return Err(DecodeError::EmptyFile);
    }

    let encoding = detect_encoding(bytes);
    let text = decode_text(bytes, &encoding);

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
        return Err(DecodeError::NoHeaders);
    }

    let mut table = Table::new(headers.clone());
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|field| field.is_empty()) {
            continue;
        }
        let mut row = Map::new();
        for (i, header) in headers.iter().enumerate() {
            let cell = record.get(i).unwrap_or("");
            row.insert(header.clone(), Value::String(cell.to_string()));
        }
        table.rows.push(row);
    }

    Ok(table)
}

// =============================================================================
// Spreadsheet
// =============================================================================

/// Decode the first worksheet of a binary spreadsheet container.
///
/// Row 1 is the header row; every cell is stringified so the downstream
/// stages see the same shape as a CSV decode.
pub fn decode_workbook(bytes: &[u8]) -> DecodeResult<Table> {
    if bytes.is_empty() {
        return Err(DecodeError::EmptyFile);
    }

    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook =
        open_workbook_auto_from_rs(cursor).map_err(|e| DecodeError::Workbook(e.to_string()))?;

    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(DecodeError::NoWorksheet)?;
    let range = workbook
        .worksheet_range(&sheet)
        .map_err(|e| DecodeError::Workbook(e.to_string()))?;

    let mut rows = range.rows();
    let header_row = rows.next().ok_or(DecodeError::NoHeaders)?;

    // Unnamed columns are dropped; the rest keep their sheet position.
    let headers: Vec<(usize, String)> = header_row
        .iter()
        .map(cell_to_string)
        .enumerate()
        .filter(|(_, h)| !h.is_empty())
        .collect();
    if headers.is_empty() {
        return Err(DecodeError::NoHeaders);
    }

    let mut table = Table::new(headers.iter().map(|(_, h)| h.clone()).collect());
    for data_row in rows {
        if data_row.iter().all(|cell| matches!(cell, Data::Empty)) {
            continue;
        }
        let mut row = Map::new();
        for (i, header) in &headers {
            let cell = data_row.get(*i).map(cell_to_string).unwrap_or_default();
            row.insert(header.clone(), Value::String(cell));
        }
        table.rows.push(row);
    }

    Ok(table)
}

/// Stringify a worksheet cell the way the CSV decoder would read it.
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.trim().to_string(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_float(*f),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{e:?}"),
    }
}

/// Render whole floats without a trailing ".0" so "120" stays "120".
fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_filename() {
        assert_eq!(
            FileFormat::from_filename("report.csv").unwrap(),
            FileFormat::Csv
        );
        assert_eq!(
            FileFormat::from_filename("Export_2024.XLSX").unwrap(),
            FileFormat::Spreadsheet
        );
        assert_eq!(
            FileFormat::from_filename("legacy.xls").unwrap(),
            FileFormat::Spreadsheet
        );
        assert!(matches!(
            FileFormat::from_filename("report.pdf"),
            Err(DecodeError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_decode_data_url() {
        let encoded = BASE64.encode(b"a,b\n1,2");
        let with_preamble = format!("data:text/csv;base64,{encoded}");
        assert_eq!(decode_data_url(&with_preamble).unwrap(), b"a,b\n1,2");
        assert_eq!(decode_data_url(&encoded).unwrap(), b"a,b\n1,2");
    }

    #[test]
    fn test_decode_data_url_rejects_garbage() {
        assert!(matches!(
            decode_data_url("data:text/csv;base64,@@@@"),
            Err(DecodeError::Base64(_))
        ));
    }

    #[test]
    fn test_decode_csv_basic() {
        let table = decode_csv(b"name,hours\nAlice,12\nBob,7\n").unwrap();
        assert_eq!(table.columns, vec!["name", "hours"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.cell_str(0, "name"), Some("Alice"));
        assert_eq!(table.cell_str(1, "hours"), Some("7"));
    }

    #[test]
    fn test_decode_csv_quoted_header_with_comma() {
        // Fiscal column labels contain a comma and arrive quoted.
        let table = decode_csv(b"\"FY24, FM1\",\"FY24, FM2\"\n10h,20h\n").unwrap();
        assert_eq!(table.columns, vec!["FY24, FM1", "FY24, FM2"]);
        assert_eq!(table.cell_str(0, "FY24, FM2"), Some("20h"));
    }

    #[test]
    fn test_decode_csv_short_rows_padded() {
        let table = decode_csv(b"a,b,c\n1,2\n").unwrap();
        assert_eq!(table.cell_str(0, "c"), Some(""));
    }

    #[test]
    fn test_decode_csv_skips_blank_rows() {
        let table = decode_csv(b"a,b\n1,2\n,\n3,4\n").unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_decode_csv_empty_input() {
        assert!(matches!(decode_csv(b""), Err(DecodeError::EmptyFile)));
    }

    #[test]
    fn test_decode_text_latin1() {
        // "Société" in ISO-8859-1
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_text(bytes, "iso-8859-1");
        assert_eq!(decoded, "Soci\u{e9}t\u{e9}");
    }

    #[test]
    fn test_detect_encoding_utf8() {
        assert_eq!(detect_encoding("plain ascii text".as_bytes()), "utf-8");
    }

    #[test]
    fn test_decode_table_dispatch() {
        assert!(decode_table(b"a,b\n1,2\n", "data.csv").is_ok());
        assert!(matches!(
            decode_table(b"whatever", "report.pdf"),
            Err(DecodeError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_decode_workbook_rejects_non_workbook_bytes() {
        assert!(matches!(
            decode_workbook(b"not a spreadsheet"),
            Err(DecodeError::Workbook(_))
        ));
    }

    #[test]
    fn test_format_float() {
        assert_eq!(format_float(120.0), "120");
        assert_eq!(format_float(1.5), "1.5");
    }
}
