//! Spreadsheet to text conversion.
//!
//! Rows of the first sheet become `|cell|cell|` lines, so a sheet whose
//! header starts with `Date` is readable by the pipe-table parser. Blank
//! cells are written as `-` to keep every value in its column.

use std::path::Path;

use anyhow::{Context, anyhow};
use calamine::{Data, DataType, Reader, open_workbook_auto};
use chrono::Timelike;
use tracing::debug;

/// Stands in for a blank cell; the normalizer reads it as `0.00` in money columns.
const BLANK_CELL: &str = "-";

/// Convert an xlsx/xls/xlsm/ods workbook or a CSV file to pipe-table text.
pub fn to_pipe_text(path: &Path) -> anyhow::Result<String> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));

    let rows = if is_csv {
        read_csv(path)?
    } else {
        read_workbook(path)?
    };

    debug!("Read {} rows from {}", rows.len(), path.display());
    Ok(render(&rows))
}

fn read_workbook(path: &Path) -> anyhow::Result<Vec<Vec<String>>> {
    let mut workbook = open_workbook_auto(path)
        .with_context(|| format!("failed to open spreadsheet '{}'", path.display()))?;
    let sheet = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| anyhow!("spreadsheet '{}' has no sheets", path.display()))?;
    let range = workbook
        .worksheet_range(&sheet)
        .with_context(|| format!("failed to read sheet '{}'", sheet))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_text).collect())
        .collect())
}

/// Cell text, with date cells as `YYYY-MM-DD` instead of Excel serials.
fn cell_text(cell: &Data) -> String {
    match cell {
        Data::DateTime(dt) if dt.is_duration() => cell.to_string(),
        Data::DateTime(_) | Data::DateTimeIso(_) => {
            if let Some(dt) = cell.as_datetime() {
                if dt.num_seconds_from_midnight() == 0 {
                    dt.format("%Y-%m-%d").to_string()
                } else {
                    dt.format("%Y-%m-%d %H:%M:%S").to_string()
                }
            } else if let Some(date) = cell.as_date() {
                date.format("%Y-%m-%d").to_string()
            } else {
                cell.to_string()
            }
        }
        _ => cell.to_string(),
    }
}

fn read_csv(path: &Path) -> anyhow::Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("failed to open '{}'", path.display()))?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

fn render(rows: &[Vec<String>]) -> String {
    let mut text = String::new();
    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .map(|cell| cell.trim().replace('|', "/"))
            .collect();
        if cells.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        let cells: Vec<&str> = cells
            .iter()
            .map(|cell| if cell.is_empty() { BLANK_CELL } else { cell.as_str() })
            .collect();
        text.push('|');
        text.push_str(&cells.join("|"));
        text.push_str("|\n");
    }
    text
}
