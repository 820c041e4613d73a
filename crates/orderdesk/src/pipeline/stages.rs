use log::debug;
use tracing::Instrument;

use super::{DocumentPipeline, GeneratedWorkOrder, PipelineError, SourceFile};
use crate::detection::DetectionResult;
use crate::tracker::ProcessStatusTracker;

/// How the stages are run for one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagePlan {
    /// Run Stage 1 to find the company.
    pub auto_detect: bool,
    /// Used when auto-detection is off, or finds nothing.
    pub company_id: Option<String>,
}

#[derive(Debug)]
pub struct StageOutcome {
    pub company_id: Option<String>,
    pub detection: Option<DetectionResult>,
    pub result: Result<GeneratedWorkOrder, PipelineError>,
}

impl StageOutcome {
    fn failed(
        company_id: Option<String>,
        detection: Option<DetectionResult>,
        error: PipelineError,
    ) -> Self {
        Self {
            company_id,
            detection,
            result: Err(error),
        }
    }
}

/// Runs Stage 1 (when enabled) and Stage 2 for one file, moving `tracker`
/// through `ocr_processing` and `document_creating`.
///
/// A detection without a company falls back to the plan's company; a null
/// result is never applied on its own.
pub async fn run_stages(
    pipeline: &dyn DocumentPipeline,
    file: &SourceFile,
    plan: &StagePlan,
    tracker: Option<&ProcessStatusTracker>,
) -> StageOutcome {
    if let Some(tracker) = tracker {
        if let Err(e) = tracker.start_process_without_id() {
            debug!("Tracker for {}: {}", file.file_name, e);
        }
    }

    let mut detection = None;
    let company_id = if plan.auto_detect {
        let classified = pipeline
            .classify(file)
            .instrument(tracing::info_span!("classify", file_name = %file.file_name))
            .await;
        match classified {
            Ok(result) => {
                let detected = result.detected_company_id.clone();
                let reasoning = result.details.reasoning.clone().unwrap_or_default();
                detection = Some(result);
                match detected.or_else(|| plan.company_id.clone()) {
                    Some(id) => id,
                    None => {
                        return StageOutcome::failed(
                            None,
                            detection,
                            PipelineError::CompanyNotDetected { reasoning },
                        );
                    }
                }
            }
            Err(e) => return StageOutcome::failed(None, None, e),
        }
    } else {
        match plan.company_id.clone() {
            Some(id) => id,
            None => {
                return StageOutcome::failed(
                    None,
                    None,
                    PipelineError::CompanyNotDetected {
                        reasoning: "No company selected".to_string(),
                    },
                );
            }
        }
    };

    if let Some(tracker) = tracker {
        if let Err(e) = tracker.set_document_creating() {
            debug!("Tracker for {}: {}", file.file_name, e);
        }
    }

    let result = pipeline
        .generate(file, &company_id)
        .instrument(tracing::info_span!(
            "generate",
            file_name = %file.file_name,
            company = %company_id
        ))
        .await;

    if let (Some(tracker), Ok(order)) = (tracker, &result) {
        tracker.update_work_order_id(&order.work_order_id);
    }

    StageOutcome {
        company_id: Some(company_id),
        detection,
        result,
    }
}
