use crate::config::AnalysisConfig;
use crate::error::*;
use crate::schema::{normalize, INTERNAL_PATTERNS, PLATE_PATTERNS};
use crate::types::RawTable;
use crate::util::excel_serial_to_date;

use calamine::{open_workbook_auto, DataType, Reader};
use csv::ReaderBuilder;
use log::{debug, info};
use snafu::{OptionExt, ResultExt};
use std::collections::HashSet;
use std::path::Path;

type Grid = Vec<Vec<Option<String>>>;

#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub blank_rows: usize,
    pub parse_errors: usize,
    /// Index of the row used as header in the raw file.
    pub header_row: usize,
}

/// Loads the first worksheet of a workbook, or a delimited text file.
pub fn load_table(path: &str, config: &AnalysisConfig) -> NormsResult<(RawTable, LoadReport)> {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    let (grid, parse_errors) = match ext.as_str() {
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => (read_workbook(path)?, 0),
        "csv" | "txt" => read_delimited(path)?,
        _ => return UnsupportedFormatSnafu { path }.fail(),
    };
    let identity = [
        normalize(&config.internal_number_column),
        normalize(&config.plate_column),
    ];
    let (table, mut report) = build_table(grid, &identity);
    report.parse_errors = parse_errors;
    info!(
        "load_table: {} ({} rows, {} columns, header on row {})",
        path,
        report.loaded_rows,
        table.columns().len(),
        report.header_row
    );
    Ok((table, report))
}

fn read_workbook(path: &str) -> NormsResult<Grid> {
    let mut workbook = open_workbook_auto(path).context(OpeningWorkbookSnafu { path })?;
    let range = workbook
        .worksheet_range_at(0)
        .context(EmptyWorkbookSnafu { path })?
        .context(OpeningWorkbookSnafu { path })?;
    debug!("read_workbook: {:?} cells", range.get_size());
    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect())
}

fn read_delimited(path: &str) -> NormsResult<(Grid, usize)> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .context(ReadingCsvSnafu { path })?;
    let mut grid: Grid = Vec::new();
    let mut parse_errors = 0usize;
    for result in rdr.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                debug!("read_delimited: skipping record: {}", e);
                parse_errors += 1;
                continue;
            }
        };
        grid.push(
            record
                .iter()
                .map(|c| if c.is_empty() { None } else { Some(c.to_string()) })
                .collect(),
        );
    }
    Ok((grid, parse_errors))
}

/// Text of a workbook cell. Whole numbers lose their fractional part and
/// dates are rendered as `YYYY-MM-DD`.
pub fn cell_text(cell: &DataType) -> Option<String> {
    match cell {
        DataType::Empty | DataType::Error(_) => None,
        DataType::String(s) => {
            if s.is_empty() {
                None
            } else {
                Some(s.clone())
            }
        }
        DataType::Int(i) => Some(i.to_string()),
        DataType::Float(f) => Some(float_text(*f)),
        DataType::Bool(b) => Some(b.to_string()),
        DataType::DateTime(serial) => Some(
            excel_serial_to_date(*serial)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| float_text(*serial)),
        ),
    }
}

fn float_text(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        (f as i64).to_string()
    } else {
        f.to_string()
    }
}

fn is_blank(row: &[Option<String>]) -> bool {
    row.iter()
        .all(|c| c.as_deref().map(|s| s.trim().is_empty()).unwrap_or(true))
}

fn non_blank(row: &[Option<String>]) -> usize {
    row.iter()
        .flatten()
        .filter(|c| !c.trim().is_empty())
        .count()
}

fn names_identity_exactly(row: &[Option<String>], identity: &[String]) -> bool {
    row.iter().flatten().any(|c| identity.contains(&normalize(c)))
}

fn names_identity_loosely(row: &[Option<String>]) -> bool {
    row.iter().flatten().any(|c| {
        let n = normalize(c);
        INTERNAL_PATTERNS
            .iter()
            .chain(PLATE_PATTERNS.iter())
            .any(|p| n.contains(p))
    })
}

/// Index of the header row: 0 or 1.
///
/// An exact identity column name decides first. Otherwise a first row with
/// at most one filled cell above a wider row is a title, and failing that
/// the fuzzy identity patterns decide.
fn detect_header(grid: &Grid, identity: &[String]) -> usize {
    let (first, second) = match (grid.get(0), grid.get(1)) {
        (Some(first), Some(second)) => (first, second),
        _ => return 0,
    };
    if names_identity_exactly(first, identity) {
        return 0;
    }
    if names_identity_exactly(second, identity) {
        return 1;
    }
    if non_blank(first) <= 1 && non_blank(second) > 1 {
        return 1;
    }
    if !names_identity_loosely(first) && names_identity_loosely(second) {
        return 1;
    }
    0
}

/// Column names with blanks replaced by `Unnamed: {i}` and duplicates
/// suffixed `.1`, `.2`, ...
fn header_names(raw: &[Option<String>]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    raw.iter()
        .enumerate()
        .map(|(i, c)| {
            let base = match c.as_deref().map(|s| s.trim()) {
                Some(s) if !s.is_empty() => s.to_string(),
                _ => format!("Unnamed: {}", i),
            };
            let mut name = base.clone();
            let mut k = 1;
            while seen.contains(&name) {
                name = format!("{}.{}", base, k);
                k += 1;
            }
            seen.insert(name.clone());
            name
        })
        .collect()
}

fn build_table(grid: Grid, identity: &[String]) -> (RawTable, LoadReport) {
    let header_row = detect_header(&grid, identity);
    let width = grid.iter().map(|r| r.len()).max().unwrap_or(0);
    let mut iter = grid.into_iter().skip(header_row);
    let mut header = iter.next().unwrap_or_default();
    header.resize(width, None);
    let columns = header_names(&header);

    let mut total_rows = 0usize;
    let mut blank_rows = 0usize;
    let mut rows: Grid = Vec::new();
    for row in iter {
        total_rows += 1;
        if is_blank(&row) {
            blank_rows += 1;
            continue;
        }
        rows.push(row);
    }
    let report = LoadReport {
        total_rows,
        loaded_rows: rows.len(),
        blank_rows,
        parse_errors: 0,
        header_row,
    };
    (RawTable::new(columns, rows), report)
}
