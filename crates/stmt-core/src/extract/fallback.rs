//! Rule-based parser for pipe-delimited transaction tables.
//!
//! Last resort when semantic extraction fails, so it never returns an error:
//! structural mismatches give an empty result and malformed rows are skipped.

use thiserror::Error;
use tracing::{debug, info};

use crate::models::transaction::{ParseResult, RecordSource, TransactionRecord};

use super::patterns::{DATE_HEADER, SEPARATOR_CELL};

/// Cells a data row must have, one per canonical column.
pub const MIN_COLUMNS: usize = 7;

/// Why a line after the header did not become a record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RowRejection {
    #[error("line does not start with '|'")]
    NotARow,

    #[error("row has {0} cells, need at least 7")]
    TooFewCells(usize),

    #[error("table separator row")]
    Separator,

    #[error("repeated table header")]
    Header,
}

/// Validate one line and map its first seven cells to a record.
///
/// Separator rows (`|---|:--|`) and header rows (first cell `Date`) are
/// rejected even when they have seven cells, so a table repeated on every
/// page contributes only its data rows.
pub fn parse_row(line: &str) -> Result<TransactionRecord, RowRejection> {
    if !line.starts_with('|') {
        return Err(RowRejection::NotARow);
    }

    let cells: Vec<&str> = line
        .split('|')
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .collect();

    if cells.len() < MIN_COLUMNS {
        return Err(RowRejection::TooFewCells(cells.len()));
    }
    if cells.iter().all(|cell| SEPARATOR_CELL.is_match(cell)) {
        return Err(RowRejection::Separator);
    }
    if cells[0].eq_ignore_ascii_case("date") {
        return Err(RowRejection::Header);
    }

    Ok(TransactionRecord::from_fields([
        cells[0], cells[1], cells[2], cells[3], cells[4], cells[5], cells[6],
    ]))
}

/// Parse the first `|Date` table in `text`.
pub fn parse_fallback(text: &str) -> ParseResult {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let Some(header) = lines.iter().position(|line| DATE_HEADER.is_match(line)) else {
        debug!("No |Date header line found");
        return ParseResult::empty(RecordSource::Fallback);
    };

    let mut records = Vec::new();
    for (offset, line) in lines[header + 1..].iter().enumerate() {
        match parse_row(line) {
            Ok(record) => records.push(record),
            Err(RowRejection::NotARow) => {}
            Err(reason) => debug!("Skipping row {} after header: {}", offset + 1, reason),
        }
    }

    info!("Fallback parser produced {} records", records.len());
    ParseResult::new(records, RecordSource::Fallback)
}
