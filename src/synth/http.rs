//! OpenAI-compatible chat completions generator
//!
//! Sends the rendered group prompt to `{api_base}/chat/completions` and
//! returns the first choice as the page body. Failures are classified so
//! the adapter's retry loop can tell rate limits and outages from bad
//! requests.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

use super::generator::{ContentGenerator, GenerationRequest};
use crate::config::GeneratorConfig;
use crate::constants::network;
use crate::types::{ErrorCategory, ErrorClassifier, ExternalError, Result, SyncError};

const SOURCE: &str = "generator";
const API_KEY_ENV: &str = "WIKISYNC_API_KEY";

const SYSTEM_PROMPT: &str = "You are a code documentation writer. Respond with the page body \
     as GitHub-flavored markdown, starting with a level-one heading. Describe only the entities \
     you are given.";

/// Chat completions client with secure API key handling
pub struct HttpGenerator {
    /// Never exposed in logs or debug output
    api_key: Option<SecretString>,
    endpoint: String,
    model: String,
    temperature: f32,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpGenerator")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl HttpGenerator {
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        let api_base = config.api_base.as_deref().ok_or_else(|| {
            SyncError::Config("generator.api_base is required for the http generator".to_string())
        })?;

        let api_key = config
            .api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|key| !key.trim().is_empty())
            .map(SecretString::from);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(network::CONNECTION_TIMEOUT_SECS))
            .build()
            .map_err(|e| SyncError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            endpoint: format!("{}/chat/completions", api_base.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
            client,
        })
    }

    fn build_request(&self, request: &GenerationRequest) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: request.prompt(),
                },
            ],
            temperature: self.temperature,
        }
    }
}

#[async_trait]
impl ContentGenerator for HttpGenerator {
    fn name(&self) -> &str {
        "http"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String> {
        let start = Instant::now();
        let body = self.build_request(request);

        let mut call = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            call = call.bearer_auth(key.expose_secret());
        }

        let response = call
            .send()
            .await
            .map_err(|e| ErrorClassifier::classify_reqwest(&e, SOURCE))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ErrorClassifier::classify_http_status(
                status.as_u16(),
                &format!("chat completions returned {}: {}", status, text),
                SOURCE,
            )
            .into());
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ErrorClassifier::classify_reqwest(&e, SOURCE))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                ExternalError::with_source(
                    ErrorCategory::Transient,
                    "no content in chat completions response",
                    SOURCE,
                )
            })?;

        debug!(
            page_key = %request.page_key,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Generated page body"
        );

        Ok(content)
    }
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeneratorKind;

    fn config() -> GeneratorConfig {
        GeneratorConfig {
            kind: GeneratorKind::Http,
            model: "doc-model".into(),
            api_base: Some("https://llm.example.com/v1/".into()),
            api_key: Some("sk-secret".into()),
            ..GeneratorConfig::default()
        }
    }

    #[test]
    fn test_debug_redacts_key() {
        let generator = HttpGenerator::new(&config()).unwrap();
        let debug = format!("{:?}", generator);

        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
        assert!(debug.contains("https://llm.example.com/v1/chat/completions"));
    }

    #[test]
    fn test_requires_api_base() {
        let mut config = config();
        config.api_base = None;
        assert!(matches!(HttpGenerator::new(&config), Err(SyncError::Config(_))));
    }

    #[test]
    fn test_response_parsing_tolerates_missing_content() {
        let parsed: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant"}}]}"#).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }
}
