//! Text-completion backend used by the semantic extractor.

use std::future::Future;
use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SemanticExtractionError;
use crate::models::config::ExtractionConfig;

/// One completion call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub prompt: String,
    pub max_new_tokens: u32,
    pub temperature: f32,
}

/// A text-completion service: prompt in, raw generated text out.
pub trait CompletionBackend {
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<String, SemanticExtractionError>> + Send;
}

/// Backend speaking the Hugging Face text-generation inference protocol.
#[derive(Debug, Clone)]
pub struct HttpCompletionBackend {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
    timeout: Duration,
}

impl HttpCompletionBackend {
    /// Build a client for the configured endpoint and model.
    ///
    /// The bearer token is read from the configured environment variable;
    /// without one the request is sent unauthenticated.
    pub fn from_config(config: &ExtractionConfig) -> Result<Self, SemanticExtractionError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| SemanticExtractionError::Backend(format!("build http client: {}", e)))?;

        Ok(Self {
            client,
            url: config.model_url(),
            token: config.api_token(),
            timeout: config.timeout(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Serialize)]
struct Parameters {
    max_new_tokens: u32,
    temperature: f32,
    return_full_text: bool,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    inputs: &'a str,
    parameters: Parameters,
}

#[derive(Deserialize)]
struct Generated {
    generated_text: String,
}

/// Hosted inference answers with a list, self-hosted TGI with a single object.
#[derive(Deserialize)]
#[serde(untagged)]
enum GenerateResponse {
    Many(Vec<Generated>),
    One(Generated),
}

impl CompletionBackend for HttpCompletionBackend {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<String, SemanticExtractionError> {
        let body = GenerateRequest {
            inputs: &request.prompt,
            parameters: Parameters {
                max_new_tokens: request.max_new_tokens,
                temperature: request.temperature,
                return_full_text: false,
            },
        };

        let mut builder = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .json(&body);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        debug!("POST {} ({} prompt chars)", self.url, request.prompt.len());

        let resp = builder.send().await.map_err(|e| self.request_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            return Err(SemanticExtractionError::Backend(format!("{} {}", status, txt.trim())));
        }

        let out: GenerateResponse = resp.json().await.map_err(|e| self.request_error(e))?;
        let text = match out {
            GenerateResponse::Many(items) => items
                .into_iter()
                .next()
                .map(|g| g.generated_text)
                .ok_or_else(|| {
                    SemanticExtractionError::Backend("empty generation list".to_string())
                })?,
            GenerateResponse::One(g) => g.generated_text,
        };

        Ok(text)
    }
}

impl HttpCompletionBackend {
    fn request_error(&self, e: reqwest::Error) -> SemanticExtractionError {
        if e.is_timeout() {
            SemanticExtractionError::Timeout(self.timeout.as_millis() as u64)
        } else {
            SemanticExtractionError::Backend(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = GenerateRequest {
            inputs: "prompt",
            parameters: Parameters {
                max_new_tokens: 1000,
                temperature: 0.5,
                return_full_text: false,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["inputs"], "prompt");
        assert_eq!(json["parameters"]["max_new_tokens"], 1000);
        assert_eq!(json["parameters"]["temperature"], 0.5);
        assert_eq!(json["parameters"]["return_full_text"], false);
    }

    #[test]
    fn test_response_shapes() {
        let many: GenerateResponse =
            serde_json::from_str(r#"[{"generated_text": "{\"transactions\": []}"}]"#).unwrap();
        assert!(matches!(many, GenerateResponse::Many(ref v) if v.len() == 1));

        let one: GenerateResponse = serde_json::from_str(r#"{"generated_text": "hi"}"#).unwrap();
        assert!(matches!(one, GenerateResponse::One(ref g) if g.generated_text == "hi"));
    }

    #[test]
    fn test_from_config_uses_model_url() {
        let config = ExtractionConfig {
            endpoint: "http://127.0.0.1:9/models".to_string(),
            model: "test-model".to_string(),
            api_token_env: "STMT_TEST_TOKEN_THAT_IS_NOT_SET".to_string(),
            ..ExtractionConfig::default()
        };
        let backend = HttpCompletionBackend::from_config(&config).unwrap();
        assert_eq!(backend.url(), "http://127.0.0.1:9/models/test-model");
        assert!(backend.token.is_none());
    }
}
