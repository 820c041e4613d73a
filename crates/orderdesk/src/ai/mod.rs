//! Client seam for the AI text-generation service.
//!
//! The service is a black box: a prompt and optionally one document go in,
//! text and usage metadata come out. Every call is a single attempt; retrying
//! is left to callers.

pub mod error;
pub mod gemini;
pub mod prompt;
pub mod response;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use error::AiError;
pub use gemini::GeminiClient;
pub use prompt::sanitize_for_prompt;
pub use response::{extract_json_object, ClassificationReply};

/// A document passed inline with a prompt.
#[derive(Debug, Clone, Copy)]
pub struct DocumentPart<'a> {
    pub mime_type: &'a str,
    pub bytes: &'a [u8],
}

/// Token accounting reported by the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub prompt_units: u64,
    pub output_units: u64,
    pub total_units: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiResponse {
    pub text: String,
    pub usage: Option<Usage>,
}

impl AiResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: None,
        }
    }
}

#[async_trait]
pub trait AiClient: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        document: Option<DocumentPart<'_>>,
    ) -> Result<AiResponse, AiError>;
}
