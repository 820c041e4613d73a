use serde::{Deserialize, Serialize};

/// Which signal produced a [`DetectionResult`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    /// AI classification of the document itself.
    GeminiAnalysis,
    RuleBased,
    Unknown,
}

impl DetectionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionMethod::GeminiAnalysis => "gemini_analysis",
            DetectionMethod::RuleBased => "rule_based",
            DetectionMethod::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "gemini_analysis" => Some(DetectionMethod::GeminiAnalysis),
            "rule_based" => Some(DetectionMethod::RuleBased),
            "unknown" => Some(DetectionMethod::Unknown),
            _ => None,
        }
    }
}

/// One rule's outcome in the rule-based pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleApplication {
    pub rule_id: String,
    pub rule_type: String,
    pub rule_value: String,
    pub matched: bool,
}

/// Explanation trail attached to a detection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub found_keywords: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_patterns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_applied: Option<Vec<RuleApplication>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    /// `None` means no company could be attributed; never auto-apply it.
    pub detected_company_id: Option<String>,
    pub confidence: f64,
    pub method: DetectionMethod,
    pub details: DetectionDetails,
}

impl DetectionResult {
    /// A failed or inconclusive detection.
    pub fn unknown(reasoning: impl Into<String>) -> Self {
        Self {
            detected_company_id: None,
            confidence: 0.0,
            method: DetectionMethod::Unknown,
            details: DetectionDetails {
                reasoning: Some(reasoning.into()),
                ..Default::default()
            },
        }
    }

    pub fn is_detected(&self) -> bool {
        self.detected_company_id.is_some()
    }
}

/// Picks the more confident of two detections.
///
/// Ties go to the AI-based result; if neither or both are AI-based, the
/// first argument wins.
pub fn pick_better(a: DetectionResult, b: DetectionResult) -> DetectionResult {
    if a.confidence > b.confidence {
        return a;
    }
    if b.confidence > a.confidence {
        return b;
    }
    if b.method == DetectionMethod::GeminiAnalysis && a.method != DetectionMethod::GeminiAnalysis {
        b
    } else {
        a
    }
}
