use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};

use super::stages::{run_stages, StageOutcome, StagePlan};
use super::{DocumentPipeline, GeneratedWorkOrder, PipelineError, SourceFile};
use crate::ai::prompt::work_order_prompt;
use crate::ai::AiClient;
use crate::detection::{CompanyDetector, DetectionResult};
use crate::store::{work_order_status, Store, WorkOrderRecord};

/// Runs classification and work-order generation for one file and persists
/// the resulting record.
///
/// Store writes are best effort: a failed write is logged and never turns a
/// successful generation into an error.
pub struct SingleFileProcessor {
    detector: Arc<CompanyDetector>,
    ai: Arc<dyn AiClient>,
    store: Arc<dyn Store>,
}

impl SingleFileProcessor {
    pub fn new(detector: Arc<CompanyDetector>, ai: Arc<dyn AiClient>, store: Arc<dyn Store>) -> Self {
        Self {
            detector,
            ai,
            store,
        }
    }

    pub fn detector(&self) -> &CompanyDetector {
        &self.detector
    }

    /// Both stages for a single file, outside any batch.
    pub async fn process(&self, file: &SourceFile, plan: &StagePlan) -> StageOutcome {
        run_stages(self, file, plan, None).await
    }

    async fn mark(&self, id: &str, status: &str, content: Option<&str>, error: Option<&str>) {
        if let Err(e) = self
            .store
            .update_work_order_status(id, status, content, error)
            .await
        {
            warn!("Failed to mark work order {} as {}: {}", id, status, e);
        }
    }
}

#[async_trait]
impl DocumentPipeline for SingleFileProcessor {
    async fn classify(&self, file: &SourceFile) -> Result<DetectionResult, PipelineError> {
        if file.is_empty() {
            return Err(PipelineError::EmptyDocument(file.file_name.clone()));
        }
        Ok(self
            .detector
            .detect_document(Some(&file.file_name), &file.bytes, &file.mime_type)
            .await)
    }

    async fn generate(
        &self,
        file: &SourceFile,
        company_id: &str,
    ) -> Result<GeneratedWorkOrder, PipelineError> {
        if file.is_empty() {
            return Err(PipelineError::EmptyDocument(file.file_name.clone()));
        }
        let directory = self.detector.directory();
        if !directory.is_empty() && !directory.contains(company_id) {
            return Err(PipelineError::UnknownCompany(company_id.to_string()));
        }

        let work_order_id = uuid::Uuid::new_v4().to_string();
        let record = WorkOrderRecord::new(
            &work_order_id,
            &file.file_name,
            company_id,
            work_order_status::GENERATING,
        );
        if let Err(e) = self.store.create_work_order(&record).await {
            warn!(
                "Failed to persist work order for {}: {}",
                file.file_name, e
            );
        }

        let prompt = work_order_prompt(company_id, directory.display_name(company_id));
        let response = match self.ai.generate(&prompt, Some(file.part())).await {
            Ok(response) => response,
            Err(e) => {
                let message = e.to_string();
                self.mark(
                    &work_order_id,
                    work_order_status::FAILED,
                    None,
                    Some(&message),
                )
                .await;
                return Err(e.into());
            }
        };

        self.mark(
            &work_order_id,
            work_order_status::COMPLETED,
            Some(&response.text),
            None,
        )
        .await;
        info!(
            "Generated work order {} for {} ({})",
            work_order_id, file.file_name, company_id
        );

        Ok(GeneratedWorkOrder {
            work_order_id,
            company_id: company_id.to_string(),
            content: response.text,
            usage: response.usage,
        })
    }
}
