//! Instruction prompt for the completion backend.

/// Category labels the model is asked to reuse instead of inventing new ones.
pub const CATEGORY_VOCABULARY: &[&str] = &[
    "Salary",
    "Groceries",
    "Medical",
    "Utilities",
    "Rent",
    "Transfer",
    "Shopping",
    "Dining",
    "Transport",
    "Fees",
    "Other",
];

const EXAMPLE_RECORD: &str = r#"{"transactions": [
  {"date": "2025-05-08", "description": "Company XYZ Payroll", "amount": "8315.40", "debit": "0.00", "credit": "8315.40", "closing_balance": "38315.40", "category": "Salary"}
]}"#;

/// Build the extraction prompt around already-cleaned statement text.
pub fn build_prompt(statement_text: &str) -> String {
    format!(
        "You are a financial data parser. Extract transactions from bank statements.\n\
         \n\
         Given this bank statement text:\n\
         \n\
         {statement}\n\
         \n\
         Extract all transactions with these fields:\n\
         - Date\n\
         - Description\n\
         - Amount\n\
         - Debit\n\
         - Credit\n\
         - Closing Balance\n\
         - Category\n\
         \n\
         Return only JSON with a \"transactions\" array containing these fields, in statement order.\n\
         \n\
         Example format:\n\
         {example}\n\
         \n\
         Rules:\n\
         1. Ensure numeric fields have valid numbers (e.g., \"0.00\" instead of \"-\")\n\
         2. Convert negative balances to standard format (e.g., \"-2421.72\")\n\
         3. Use \".\" as the decimal separator and no thousands separators\n\
         4. Map category names consistently, choosing from: {categories}\n",
        statement = statement_text.trim(),
        example = EXAMPLE_RECORD,
        categories = CATEGORY_VOCABULARY.join(", "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_text_and_rules() {
        let prompt = build_prompt("  |Date|Description|\n| 2025-05-08 | Payroll |  ");

        assert!(prompt.contains("|Date|Description|\n| 2025-05-08 | Payroll |"));
        assert!(prompt.contains("\"0.00\" instead of \"-\""));
        assert!(prompt.contains("\"-2421.72\""));
        assert!(prompt.contains("Salary, Groceries, Medical, Utilities"));
        assert!(prompt.contains("\"closing_balance\": \"38315.40\""));
    }

    #[test]
    fn test_example_record_is_valid_json() {
        let value: serde_json::Value = serde_json::from_str(EXAMPLE_RECORD).unwrap();
        assert_eq!(value["transactions"].as_array().map(Vec::len), Some(1));
    }
}
