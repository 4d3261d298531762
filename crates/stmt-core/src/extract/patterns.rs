//! Regex patterns shared by the extractors.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// C0 control characters except tab, LF and CR, plus DEL.
    pub static ref CONTROL_CHARS: Regex = Regex::new(
        r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]"
    ).unwrap();

    /// Header row of a pipe table: a cell starting with "Date".
    pub static ref DATE_HEADER: Regex = Regex::new(
        r"\|Date"
    ).unwrap();

    /// Separator row cells such as `---`, `:---:` or `===`.
    pub static ref SEPARATOR_CELL: Regex = Regex::new(
        r"^[\s:\-=+]+$"
    ).unwrap();

    /// Currency symbols and three-letter codes around a money value.
    pub static ref CURRENCY: Regex = Regex::new(
        r"[$€£¥₹]|zł|\b[A-Z]{3}\b"
    ).unwrap();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_chars_keep_whitespace() {
        assert!(CONTROL_CHARS.is_match("\u{0}"));
        assert!(CONTROL_CHARS.is_match("\u{7f}"));
        assert!(CONTROL_CHARS.is_match("\u{0b}"));
        assert!(!CONTROL_CHARS.is_match("\t\n\r"));
    }

    #[test]
    fn test_date_header_requires_pipe() {
        assert!(DATE_HEADER.is_match("|Date|Description|Amount"));
        assert!(!DATE_HEADER.is_match("| Date | Description"));
        assert!(!DATE_HEADER.is_match("Date Description"));
    }

    #[test]
    fn test_separator_cell() {
        assert!(SEPARATOR_CELL.is_match("---"));
        assert!(SEPARATOR_CELL.is_match(":---:"));
        assert!(!SEPARATOR_CELL.is_match("-2421.72"));
    }

    #[test]
    fn test_currency() {
        assert_eq!(CURRENCY.replace_all("USD 1,200.00", ""), " 1,200.00");
        assert_eq!(CURRENCY.replace_all("€12,50", ""), "12,50");
        assert_eq!(CURRENCY.replace_all("1 234,56 zł", ""), "1 234,56 ");
        assert!(!CURRENCY.is_match("Payroll"));
    }
}
