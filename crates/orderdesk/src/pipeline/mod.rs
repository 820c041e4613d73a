//! The two-stage document pipeline: classify, then generate.

pub mod error;
pub mod processor;
pub mod source;
pub mod stages;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::ai::Usage;
use crate::detection::DetectionResult;

pub use error::PipelineError;
pub use processor::SingleFileProcessor;
pub use source::SourceFile;
pub use stages::{run_stages, StageOutcome, StagePlan};

/// Result of Stage 2.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedWorkOrder {
    pub work_order_id: String,
    pub company_id: String,
    pub content: String,
    pub usage: Option<Usage>,
}

/// Seam between the orchestrator and whatever runs the two stages.
#[async_trait]
pub trait DocumentPipeline: Send + Sync {
    /// Stage 1: which company issued the document.
    async fn classify(&self, file: &SourceFile) -> Result<DetectionResult, PipelineError>;

    /// Stage 2: the work order for a document from `company_id`.
    async fn generate(
        &self,
        file: &SourceFile,
        company_id: &str,
    ) -> Result<GeneratedWorkOrder, PipelineError>;
}
