//! Transaction records and the normalized output table.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Canonical output columns, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Date,
    Description,
    Amount,
    Debit,
    Credit,
    ClosingBalance,
    Category,
}

impl Column {
    /// All columns in canonical order.
    pub const ALL: [Column; 7] = [
        Column::Date,
        Column::Description,
        Column::Amount,
        Column::Debit,
        Column::Credit,
        Column::ClosingBalance,
        Column::Category,
    ];

    /// Header shown in the output table.
    pub fn header(&self) -> &'static str {
        match self {
            Column::Date => "Date",
            Column::Description => "Description",
            Column::Amount => "Amount",
            Column::Debit => "Debit",
            Column::Credit => "Credit",
            Column::ClosingBalance => "Closing Balance",
            Column::Category => "Category",
        }
    }

    /// Field name used in extracted records.
    pub fn field(&self) -> &'static str {
        match self {
            Column::Date => "date",
            Column::Description => "description",
            Column::Amount => "amount",
            Column::Debit => "debit",
            Column::Credit => "credit",
            Column::ClosingBalance => "closing_balance",
            Column::Category => "category",
        }
    }

    /// Whether the column holds a money value.
    pub fn is_money(&self) -> bool {
        matches!(
            self,
            Column::Amount | Column::Debit | Column::Credit | Column::ClosingBalance
        )
    }
}

/// One transaction as produced by an extractor.
///
/// Every field is an optional string; numeric values are never parsed into
/// numeric types. Absent fields are filled during normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(default, alias = "Date", deserialize_with = "lenient_string")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    #[serde(default, alias = "Description", deserialize_with = "lenient_string")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, alias = "Amount", deserialize_with = "lenient_string")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,

    #[serde(default, alias = "Debit", deserialize_with = "lenient_string")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debit: Option<String>,

    #[serde(default, alias = "Credit", deserialize_with = "lenient_string")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit: Option<String>,

    #[serde(
        default,
        alias = "Closing Balance",
        alias = "closing balance",
        alias = "closingBalance",
        alias = "balance",
        deserialize_with = "lenient_string"
    )]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closing_balance: Option<String>,

    #[serde(default, alias = "Category", deserialize_with = "lenient_string")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl TransactionRecord {
    /// Build a record with all seven fields set, in canonical order.
    pub fn from_fields(fields: [&str; 7]) -> Self {
        let [date, description, amount, debit, credit, closing_balance, category] =
            fields.map(|f| Some(f.to_string()));
        Self {
            date,
            description,
            amount,
            debit,
            credit,
            closing_balance,
            category,
        }
    }

    /// Value of a column, if present.
    pub fn get(&self, column: Column) -> Option<&str> {
        let value = match column {
            Column::Date => &self.date,
            Column::Description => &self.description,
            Column::Amount => &self.amount,
            Column::Debit => &self.debit,
            Column::Credit => &self.credit,
            Column::ClosingBalance => &self.closing_balance,
            Column::Category => &self.category,
        };
        value.as_deref()
    }
}

/// Accept strings, numbers and booleans as text; `null` means absent.
///
/// Numbers keep their source literal (serde_json `arbitrary_precision`), so
/// `8315.40` stays `8315.40` and large balances never go through `f64`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(other) => Some(other.to_string()),
    })
}

/// Which stage produced a set of records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    /// The language-model extractor.
    Semantic,
    /// The pipe-table fallback parser.
    Fallback,
}

/// Records in document order, tagged with the stage that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResult {
    pub records: Vec<TransactionRecord>,
    pub source: RecordSource,
}

impl ParseResult {
    pub fn new(records: Vec<TransactionRecord>, source: RecordSource) -> Self {
        Self { records, source }
    }

    pub fn empty(source: RecordSource) -> Self {
        Self::new(Vec::new(), source)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A row with all seven canonical fields present.
///
/// Field declaration order is the canonical column order, which is also the
/// key order when the row is serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedRow {
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Amount")]
    pub amount: String,
    #[serde(rename = "Debit")]
    pub debit: String,
    #[serde(rename = "Credit")]
    pub credit: String,
    #[serde(rename = "Closing Balance")]
    pub closing_balance: String,
    #[serde(rename = "Category")]
    pub category: String,
}

impl NormalizedRow {
    /// Values in canonical column order.
    pub fn values(&self) -> [&str; 7] {
        [
            &self.date,
            &self.description,
            &self.amount,
            &self.debit,
            &self.credit,
            &self.closing_balance,
            &self.category,
        ]
    }

    /// Value of a single column.
    pub fn get(&self, column: Column) -> &str {
        match column {
            Column::Date => &self.date,
            Column::Description => &self.description,
            Column::Amount => &self.amount,
            Column::Debit => &self.debit,
            Column::Credit => &self.credit,
            Column::ClosingBalance => &self.closing_balance,
            Column::Category => &self.category,
        }
    }
}

/// The pipeline's only externally observed output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NormalizedTable {
    rows: Vec<NormalizedRow>,
}

impl NormalizedTable {
    /// A table with the canonical columns and no rows.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<NormalizedRow>) -> Self {
        Self { rows }
    }

    /// Column headers in canonical order. Identical for every table.
    pub fn columns(&self) -> [&'static str; 7] {
        Column::ALL.map(|c| c.header())
    }

    pub fn rows(&self) -> &[NormalizedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_record_accepts_numbers_and_nulls() {
        let json =
            r#"{"date": "2025-05-08", "amount": 8315.4, "debit": null, "Category": "Salary"}"#;
        let record: TransactionRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.date.as_deref(), Some("2025-05-08"));
        assert_eq!(record.amount.as_deref(), Some("8315.4"));
        assert_eq!(record.debit, None);
        assert_eq!(record.credit, None);
        assert_eq!(record.category.as_deref(), Some("Salary"));
    }

    #[test]
    fn test_record_keeps_number_literals() {
        let json = r#"{"amount": 8315.40, "closing_balance": 12345678901234567890.12}"#;
        let record: TransactionRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.amount.as_deref(), Some("8315.40"));
        assert_eq!(record.closing_balance.as_deref(), Some("12345678901234567890.12"));
    }

    #[test]
    fn test_record_keeps_integers_above_f64_precision() {
        let json = r#"{"credit": 9007199254740993}"#;
        let record: TransactionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.credit.as_deref(), Some("9007199254740993"));
    }

    #[test]
    fn test_record_closing_balance_aliases() {
        let record: TransactionRecord =
            serde_json::from_str(r#"{"Closing Balance": "-2421.72"}"#).unwrap();
        assert_eq!(record.get(Column::ClosingBalance), Some("-2421.72"));
    }

    #[test]
    fn test_row_serializes_in_canonical_order() {
        let row = NormalizedRow {
            date: "2025-05-08".into(),
            category: "Salary".into(),
            ..NormalizedRow::default()
        };
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(
            json,
            r#"{"Date":"2025-05-08","Description":"","Amount":"","Debit":"","Credit":"","Closing Balance":"","Category":"Salary"}"#
        );
    }

    #[test]
    fn test_empty_table_has_columns() {
        let table = NormalizedTable::empty();
        assert!(table.is_empty());
        assert_eq!(
            table.columns(),
            ["Date", "Description", "Amount", "Debit", "Credit", "Closing Balance", "Category"]
        );
        assert_eq!(serde_json::to_string(&table).unwrap(), "[]");
    }
}
