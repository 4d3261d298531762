//! Language-model extraction of transactions from statement text.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::SemanticExtractionError;
use crate::models::config::ExtractionConfig;
use crate::models::transaction::{ParseResult, RecordSource, TransactionRecord};

use super::backend::{CompletionBackend, CompletionRequest};
use super::patterns::CONTROL_CHARS;
use super::prompt::build_prompt;

type Result<T> = std::result::Result<T, SemanticExtractionError>;

/// Remove control characters that break prompts and JSON, keeping tab, LF and CR.
pub fn clean_text(text: &str) -> String {
    CONTROL_CHARS.replace_all(text, "").into_owned()
}

/// Sends statement text to a completion backend and parses the JSON it returns.
pub struct SemanticExtractor<B> {
    backend: B,
    max_new_tokens: u32,
    temperature: f32,
    timeout: Duration,
}

impl<B: CompletionBackend> SemanticExtractor<B> {
    pub fn new(backend: B, config: &ExtractionConfig) -> Self {
        Self {
            backend,
            max_new_tokens: config.max_new_tokens,
            temperature: config.temperature,
            timeout: config.timeout(),
        }
    }

    /// Override the timeout taken from the config.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Extract transactions from `text`.
    ///
    /// The backend call is bounded by the configured timeout. Every failure,
    /// from transport to response shape, comes back as a typed error so the
    /// caller can switch to the fallback parser.
    pub async fn extract(&self, text: &str) -> Result<ParseResult> {
        let cleaned = clean_text(text);
        let request = CompletionRequest {
            prompt: build_prompt(&cleaned),
            max_new_tokens: self.max_new_tokens,
            temperature: self.temperature,
        };

        debug!(
            "Requesting completion: {} characters of statement text",
            cleaned.len()
        );

        let raw = tokio::time::timeout(self.timeout, self.backend.complete(&request))
            .await
            .map_err(|_| SemanticExtractionError::Timeout(self.timeout.as_millis() as u64))??;

        let result = parse_response(&raw)?;
        info!("Semantic extraction produced {} records", result.len());
        Ok(result)
    }
}

/// Parse a raw backend response into records.
///
/// The response should be a JSON object with a `transactions` array. When the
/// whole response is not JSON, the outermost `{ ... }` span is tried instead,
/// which recovers answers wrapped in prose or code fences.
pub fn parse_response(raw: &str) -> Result<ParseResult> {
    let value = parse_json(raw)?;

    let transactions = value
        .get("transactions")
        .ok_or_else(|| {
            SemanticExtractionError::MissingTransactions("no `transactions` key".to_string())
        })?
        .as_array()
        .ok_or_else(|| {
            SemanticExtractionError::MissingTransactions(
                "`transactions` is not an array".to_string(),
            )
        })?;

    let records = transactions
        .iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value::<TransactionRecord>(item.clone()).map_err(|e| {
                SemanticExtractionError::MissingTransactions(format!("transaction {}: {}", i, e))
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ParseResult::new(records, RecordSource::Semantic))
}

fn parse_json(raw: &str) -> Result<Value> {
    let trimmed = raw.trim();
    let err = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(value) = serde_json::from_str::<Value>(&trimmed[start..=end]) {
                warn!("Recovered JSON object from a {} character response", trimmed.len());
                return Ok(value);
            }
        }
    }

    Err(SemanticExtractionError::MalformedResponse(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    struct ScriptedBackend {
        reply: std::result::Result<String, String>,
        delay: Option<Duration>,
        seen: Mutex<Vec<CompletionRequest>>,
    }

    impl ScriptedBackend {
        fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                delay: None,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl CompletionBackend for ScriptedBackend {
        async fn complete(&self, request: &CompletionRequest) -> Result<String> {
            self.seen.lock().unwrap().push(request.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.reply.clone().map_err(SemanticExtractionError::Backend)
        }
    }

    const REPLY: &str = r#"{"transactions": [
        {"date": "2025-05-08", "description": "Company XYZ Payroll", "amount": "8315.40",
         "debit": "0.00", "credit": "8315.40", "closing_balance": "38315.40", "category": "Salary"}
    ]}"#;

    #[test]
    fn test_clean_text_strips_control_chars() {
        assert_eq!(clean_text("a\u{0}b\u{7f}c\td\r\ne\u{1b}"), "abc\td\r\ne");
    }

    #[test]
    fn test_clean_text_keeps_payload() {
        let text = "|Date|Description|\n| 2025-05-08 | Payroll |";
        assert_eq!(clean_text(text), text);
    }

    #[test]
    fn test_parse_response() {
        let result = parse_response(REPLY).unwrap();
        assert_eq!(result.source, RecordSource::Semantic);
        assert_eq!(
            result.records,
            vec![TransactionRecord::from_fields([
                "2025-05-08",
                "Company XYZ Payroll",
                "8315.40",
                "0.00",
                "8315.40",
                "38315.40",
                "Salary",
            ])]
        );
    }

    #[test]
    fn test_parse_response_wrapped_in_prose() {
        let raw = format!("Here are the transactions:\n```json\n{}\n```\nLet me know!", REPLY);
        let result = parse_response(&raw).unwrap();
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_parse_response_not_json() {
        let err = parse_response("I could not find any transactions.").unwrap_err();
        assert!(matches!(err, SemanticExtractionError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_response_missing_key() {
        let err = parse_response(r#"{"rows": []}"#).unwrap_err();
        assert!(matches!(err, SemanticExtractionError::MissingTransactions(_)));

        let err = parse_response(r#"{"transactions": "none"}"#).unwrap_err();
        assert!(matches!(err, SemanticExtractionError::MissingTransactions(_)));
    }

    #[test]
    fn test_parse_response_rejects_non_object_entries() {
        let err = parse_response(r#"{"transactions": ["2025-05-08"]}"#).unwrap_err();
        assert!(matches!(err, SemanticExtractionError::MissingTransactions(_)));
    }

    #[test]
    fn test_parse_response_numbers_and_missing_fields() {
        let raw = r#"{"transactions": [{"date": "2025-05-09", "amount": -2421.72}]}"#;
        let result = parse_response(raw).unwrap();
        let record = &result.records[0];

        assert_eq!(record.amount.as_deref(), Some("-2421.72"));
        assert_eq!(record.category, None);
    }

    #[test]
    fn test_number_literals_survive_normalization() {
        let raw = r#"{"transactions": [
            {"amount": 8315.40, "closing_balance": 12345678901234567890.12}
        ]}"#;
        let table = crate::normalize::normalize(parse_response(raw).unwrap());
        let row = &table.rows()[0];

        assert_eq!(row.amount, "8315.40");
        assert_eq!(row.closing_balance, "12345678901234567890.12");
    }

    #[test]
    fn test_parse_response_empty_array() {
        let result = parse_response(r#"{"transactions": []}"#).unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_extract_sends_cleaned_prompt() {
        let config = ExtractionConfig::default();
        let extractor = SemanticExtractor::new(ScriptedBackend::replying(REPLY), &config);

        let result = extractor.extract("|Date|\u{0}Payroll").await.unwrap();
        assert_eq!(result.len(), 1);

        let seen = extractor.backend().seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].prompt.contains("|Date|Payroll"));
        assert!(!seen[0].prompt.contains('\u{0}'));
        assert_eq!(seen[0].max_new_tokens, 1000);
        assert_eq!(seen[0].temperature, 0.1);
    }

    #[tokio::test]
    async fn test_extract_backend_error() {
        let backend = ScriptedBackend {
            reply: Err("503 Service Unavailable".to_string()),
            delay: None,
            seen: Mutex::new(Vec::new()),
        };
        let extractor = SemanticExtractor::new(backend, &ExtractionConfig::default());

        let err = extractor.extract("text").await.unwrap_err();
        assert!(matches!(err, SemanticExtractionError::Backend(ref m) if m.contains("503")));
    }

    #[tokio::test]
    async fn test_extract_times_out() {
        let backend = ScriptedBackend {
            delay: Some(Duration::from_secs(5)),
            ..ScriptedBackend::replying(REPLY)
        };
        let extractor = SemanticExtractor::new(backend, &ExtractionConfig::default())
            .with_timeout(Duration::from_millis(20));

        let err = extractor.extract("text").await.unwrap_err();
        assert!(matches!(err, SemanticExtractionError::Timeout(20)));
    }
}
