use std::env;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ai::gate::RequestGate;
use crate::error::AiError;
use crate::retry::{self, RetryOptions};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection settings for the hosted generation API.
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl AiConfig {
    /// Read the configuration from the environment.
    ///
    /// Returns `None` when `SPARK_AI_API_KEY` is unset or empty, which
    /// disables the AI surface without failing startup. `SPARK_AI_BASE_URL`
    /// and `SPARK_AI_MODEL` override the defaults.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = env::var("SPARK_AI_API_KEY").ok()?;
        if api_key.trim().is_empty() {
            return None;
        }
        Some(Self {
            api_key,
            base_url: env::var("SPARK_AI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned()),
            model: env::var("SPARK_AI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_owned()),
        })
    }
}

//
// ─── WIRE TYPES ────────────────────────────────────────────────────────────────
//

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

//
// ─── CLIENT ────────────────────────────────────────────────────────────────────
//

/// Thin client for the generation endpoint.
///
/// Holds an optional configuration so the rest of the system composes the
/// same way with AI disabled, and a shared [`RequestGate`] so every caller
/// observes the same request spacing.
#[derive(Clone)]
pub struct AiClient {
    http: reqwest::Client,
    config: Option<AiConfig>,
    gate: Arc<RequestGate>,
    retry: RetryOptions,
}

impl AiClient {
    #[must_use]
    pub fn new(config: Option<AiConfig>, gate: Arc<RequestGate>) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            gate,
            retry: RetryOptions::default(),
        }
    }

    /// Client configured from the environment, with a fresh gate.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(AiConfig::from_env(), Arc::new(RequestGate::default()))
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.config.is_some()
    }

    /// Send one prompt and return the raw text of the first candidate.
    ///
    /// Waits its turn at the request gate before dispatching.
    ///
    /// # Errors
    ///
    /// Returns `AiError::Disabled` when no API key is configured,
    /// `AiError::HttpStatus` for non-success responses, and
    /// `AiError::EmptyResponse` when the payload carries no text.
    pub async fn generate(&self, prompt: &str) -> Result<String, AiError> {
        let config = self.config.as_ref().ok_or(AiError::Disabled)?;

        self.gate.acquire().await;

        let url = format!(
            "{}/models/{}:generateContent",
            config.base_url.trim_end_matches('/'),
            config.model
        );
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        debug!(model = %config.model, "dispatching generation request");
        let response = self
            .http
            .post(&url)
            .timeout(HTTP_TIMEOUT)
            .header("x-goog-api-key", &config.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AiError::HttpStatus(status));
        }

        let payload: GenerateResponse = response.json().await?;
        extract_text(payload)
    }

    /// [`generate`](Self::generate) wrapped in the transient-failure retry
    /// policy.
    ///
    /// # Errors
    ///
    /// Returns the last `AiError` once attempts are exhausted, or the first
    /// non-retryable one.
    pub async fn generate_with_retry(&self, prompt: &str) -> Result<String, AiError> {
        retry::retry_classified(self.retry, || self.generate(prompt)).await
    }
}

fn extract_text(payload: GenerateResponse) -> Result<String, AiError> {
    let text = payload
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default();
    if text.trim().is_empty() {
        return Err(AiError::EmptyResponse);
    }
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_client_rejects_without_dispatch() {
        let client = AiClient::new(None, Arc::new(RequestGate::default()));
        assert!(!client.is_enabled());
        let err = client.generate("anything").await.unwrap_err();
        assert!(matches!(err, AiError::Disabled));
    }

    #[test]
    fn extracts_first_candidate_text() {
        let payload: GenerateResponse = serde_json::from_str(
            r#"{"candidates": [{"content": {"parts": [{"text": "hello "}, {"text": "world"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(payload).unwrap(), "hello world");
    }

    #[test]
    fn empty_candidates_are_an_empty_response() {
        let payload: GenerateResponse = serde_json::from_str(r#"{"candidates": []}"#).unwrap();
        assert!(matches!(extract_text(payload), Err(AiError::EmptyResponse)));

        let payload: GenerateResponse =
            serde_json::from_str(r#"{"candidates": [{"content": null}]}"#).unwrap();
        assert!(matches!(extract_text(payload), Err(AiError::EmptyResponse)));
    }
}
