//! HTTP client for the Gemini `generateContent` endpoint.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use super::{AiClient, AiError, AiResponse, DocumentPart, Usage};
use crate::config::AiConfig;
use crate::secrets::resolve_secret;

/// Maximum length of an error body kept in [`AiError::Http`].
const MAX_ERROR_BODY_LENGTH: usize = 200;

fn truncate_body(body: &str) -> String {
    if body.len() > MAX_ERROR_BODY_LENGTH {
        let mut cut = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}... (truncated)", &body[..cut])
    } else {
        body.to_string()
    }
}

pub struct GeminiClient {
    client: Client,
    endpoint: String,
    model: String,
    api_key: SecretString,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: SecretString,
        timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, AiError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| AiError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        })
    }

    /// Builds a client from configuration, resolving the API key from its
    /// inline value, key file, or environment variable.
    pub fn from_config(config: &AiConfig) -> Result<Self, AiError> {
        let api_key = resolve_secret(
            config.api_key.as_deref(),
            config.api_key_file.as_deref(),
            config.api_key_env.as_deref(),
        )
        .map_err(|e| AiError::Configuration(e.to_string()))?;

        Self::new(
            &config.endpoint,
            &config.model,
            api_key,
            Duration::from_secs(config.timeout_secs),
            Duration::from_secs(config.connect_timeout_secs),
        )
    }

    fn url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint, self.model
        )
    }
}

#[async_trait]
impl AiClient for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        document: Option<DocumentPart<'_>>,
    ) -> Result<AiResponse, AiError> {
        debug!("Sending prompt to {} ({} chars)", self.model, prompt.len());
        let body = build_request_body(prompt, document);

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());
            warn!("AI service quota exhausted (retry after {:?}s)", retry_after);
            return Err(AiError::Quota { retry_after });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AiError::Http {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let value: Value = response.json().await?;
        parse_response(&value)
    }
}

/// Request payload with the document attached as base64 inline data.
pub fn build_request_body(prompt: &str, document: Option<DocumentPart<'_>>) -> Value {
    let mut parts = vec![json!({ "text": prompt })];
    if let Some(doc) = document {
        parts.push(json!({
            "inline_data": {
                "mime_type": doc.mime_type,
                "data": BASE64.encode(doc.bytes),
            }
        }));
    }
    json!({ "contents": [{ "role": "user", "parts": parts }] })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
    #[serde(default)]
    total_token_count: u64,
}

/// Concatenates the text parts of the first candidate.
pub fn parse_response(value: &Value) -> Result<AiResponse, AiError> {
    let response: GenerateContentResponse =
        serde_json::from_value(value.clone()).map_err(|e| AiError::Decode(e.to_string()))?;

    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(AiError::EmptyResponse);
    }

    Ok(AiResponse {
        text,
        usage: response.usage_metadata.map(|u| Usage {
            prompt_units: u.prompt_token_count,
            output_units: u.candidates_token_count,
            total_units: u.total_token_count,
        }),
    })
}
