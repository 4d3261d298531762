//! Schema normalization: records to the fixed seven-column table.

use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::{debug, trace};

use crate::extract::patterns::CURRENCY;
use crate::models::transaction::{
    Column, NormalizedRow, NormalizedTable, ParseResult, TransactionRecord,
};

/// Normalize extracted records into the output table.
///
/// Works the same for semantic, fallback and empty results. Absent fields
/// become empty strings and money columns are canonicalized.
pub fn normalize(result: ParseResult) -> NormalizedTable {
    debug!(
        "Normalizing {} records from {:?}",
        result.len(),
        result.source
    );
    NormalizedTable::from_rows(result.records.iter().map(normalize_record).collect())
}

fn normalize_record(record: &TransactionRecord) -> NormalizedRow {
    let [date, description, amount, debit, credit, closing_balance, category] =
        Column::ALL.map(|column| {
            let value = record.get(column).unwrap_or_default();
            if column.is_money() {
                canonical_money(value)
            } else {
                value.trim().to_string()
            }
        });

    NormalizedRow {
        date,
        description,
        amount,
        debit,
        credit,
        closing_balance,
        category,
    }
}

/// Rewrite a money string as a plain decimal with `.` and a leading minus.
///
/// Handles currency symbols and codes, thousands separators, comma decimals,
/// `(12.00)` and `12.00-` negatives, and a lone dash placeholder (`0.00`).
/// Values that still do not parse are returned trimmed but otherwise as found.
pub fn canonical_money(raw: &str) -> String {
    let value = raw.trim();
    if value.is_empty() {
        return String::new();
    }
    if matches!(value, "-" | "--" | "–" | "—") {
        return "0.00".to_string();
    }

    match parse_money(value) {
        Some(amount) => amount.to_string(),
        None => {
            trace!("Keeping unparseable money value {:?}", value);
            value.to_string()
        }
    }
}

fn parse_money(value: &str) -> Option<Decimal> {
    let mut body = value;
    let mut negative = false;

    if let Some(inner) = body.strip_prefix('(').and_then(|b| b.strip_suffix(')')) {
        body = inner;
        negative = true;
    }

    let stripped = CURRENCY.replace_all(body, "");
    let mut body = stripped.trim();

    if let Some(rest) = body.strip_suffix('-') {
        body = rest.trim_end();
        negative = true;
    }
    if let Some(rest) = body.strip_prefix(['-', '\u{2212}']) {
        body = rest.trim_start();
        negative = true;
    } else if let Some(rest) = body.strip_prefix('+') {
        body = rest.trim_start();
    }

    let digits: String = body
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\'')
        .collect();
    if !digits.chars().any(|c| c.is_ascii_digit())
        || !digits.chars().all(|c| c.is_ascii_digit() || c == ',' || c == '.')
    {
        return None;
    }

    let amount = Decimal::from_str(&decimal_point(&digits)).ok()?;
    Some(if negative && !amount.is_zero() { -amount } else { amount })
}

/// Decide which of `,` and `.` is the decimal separator and drop the other.
fn decimal_point(digits: &str) -> String {
    let comma = digits.rfind(',');
    let dot = digits.rfind('.');

    match (comma, dot) {
        (Some(c), Some(d)) if c > d => digits.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => digits.replace(',', ""),
        (Some(c), None) => {
            let decimals = digits.len() - c - 1;
            if digits.matches(',').count() == 1 && decimals <= 2 {
                digits.replace(',', ".")
            } else {
                digits.replace(',', "")
            }
        }
        (None, Some(_)) if digits.matches('.').count() > 1 => digits.replace('.', ""),
        _ => digits.to_string(),
    }
}
