use thiserror::Error;

use crate::ai::AiError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Ai(#[from] AiError),

    #[error("Company could not be detected: {reasoning}")]
    CompanyNotDetected { reasoning: String },

    #[error("Unknown company '{0}'")]
    UnknownCompany(String),

    #[error("File '{0}' is empty")]
    EmptyDocument(String),

    #[error("Cancelled")]
    Cancelled,
}
