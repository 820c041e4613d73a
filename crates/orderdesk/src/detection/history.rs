use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::result::{DetectionDetails, DetectionMethod, DetectionResult};

/// Audit record of one detection, optionally corrected by a reviewer later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionHistoryEntry {
    pub id: String,
    pub document_id: String,
    pub detected_company_id: Option<String>,
    pub confidence: f64,
    pub method: DetectionMethod,
    pub details: DetectionDetails,
    pub corrected_company_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DetectionHistoryEntry {
    pub fn from_result(document_id: impl Into<String>, result: &DetectionResult) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            document_id: document_id.into(),
            detected_company_id: result.detected_company_id.clone(),
            confidence: result.confidence,
            method: result.method,
            details: result.details.clone(),
            corrected_company_id: None,
            created_at: Utc::now(),
        }
    }

    /// Company a reviewer settled on, or the detected one.
    pub fn effective_company_id(&self) -> Option<&str> {
        self.corrected_company_id
            .as_deref()
            .or(self.detected_company_id.as_deref())
    }
}
