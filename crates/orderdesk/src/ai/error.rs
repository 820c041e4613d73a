use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("AI service unreachable: {0}")]
    Transport(String),

    #[error("AI service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("AI service quota exhausted{}", retry_hint(.retry_after))]
    Quota { retry_after: Option<u64> },

    #[error("AI service returned an empty response")]
    EmptyResponse,

    #[error("Failed to decode AI service response: {0}")]
    Decode(String),

    #[error("AI client misconfigured: {0}")]
    Configuration(String),
}

fn retry_hint(retry_after: &Option<u64>) -> String {
    match retry_after {
        Some(secs) => format!(", retry after {}s", secs),
        None => String::new(),
    }
}

impl AiError {
    /// Whether a later attempt could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            AiError::Transport(_) | AiError::Quota { .. } => true,
            AiError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for AiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            AiError::Decode(e.to_string())
        } else {
            AiError::Transport(e.to_string())
        }
    }
}
