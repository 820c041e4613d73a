use std::sync::Arc;

use log::{debug, info, warn};
use tracing::Instrument;

use crate::ai::prompt::{classification_prompt, extraction_prompt};
use crate::ai::{AiClient, ClassificationReply, DocumentPart};
use crate::config::{DetectionConfig, ExtractionMode};
use crate::store::Store;

use super::company::CompanyDirectory;
use super::history::DetectionHistoryEntry;
use super::result::{pick_better, DetectionDetails, DetectionMethod, DetectionResult};
use super::rules::RuleSet;
use super::scorer::score_rules;

/// Attributes a document to one of the known companies.
///
/// The AI classifier runs first. A confident, non-null answer is returned as
/// is; otherwise the document text is extracted and scored against the rule
/// set, and the more confident of the two results wins.
pub struct CompanyDetector {
    ai: Arc<dyn AiClient>,
    rules: RuleSet,
    directory: CompanyDirectory,
    config: DetectionConfig,
    history: Option<Arc<dyn Store>>,
}

impl CompanyDetector {
    pub fn new(
        ai: Arc<dyn AiClient>,
        rules: RuleSet,
        directory: CompanyDirectory,
        config: DetectionConfig,
    ) -> Self {
        Self {
            ai,
            rules,
            directory,
            config,
            history: None,
        }
    }

    /// Persists each detection with a document id to `store`.
    pub fn with_history(mut self, store: Arc<dyn Store>) -> Self {
        self.history = Some(store);
        self
    }

    /// Loads the rule set from `store` (or the built-in fallback) and records
    /// history there when enabled.
    pub async fn load(
        ai: Arc<dyn AiClient>,
        store: Arc<dyn Store>,
        directory: CompanyDirectory,
        config: DetectionConfig,
    ) -> Self {
        let rules = RuleSet::load(store.as_ref(), &directory).await;
        let record_history = config.record_history;
        let detector = Self::new(ai, rules, directory, config);
        if record_history {
            detector.with_history(store)
        } else {
            detector
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn directory(&self) -> &CompanyDirectory {
        &self.directory
    }

    /// Detects the issuing company. Never fails; internal failures come back
    /// as an `unknown` result with confidence 0.
    pub async fn detect(&self, document: &[u8], mime_type: &str) -> DetectionResult {
        self.detect_document(None, document, mime_type).await
    }

    /// Like [`detect`](Self::detect), recording the outcome in the detection
    /// history under `document_id`.
    pub async fn detect_document(
        &self,
        document_id: Option<&str>,
        document: &[u8],
        mime_type: &str,
    ) -> DetectionResult {
        let span = tracing::info_span!(
            "detect_company",
            document = document_id.unwrap_or("-"),
            bytes = document.len()
        );
        let result = self.run(document, mime_type).instrument(span).await;

        info!(
            "Detected company {:?} with confidence {:.2} via {}",
            result.detected_company_id,
            result.confidence,
            result.method.as_str()
        );

        if let Some(id) = document_id {
            self.record_history(id, &result);
        }
        result
    }

    async fn run(&self, document: &[u8], mime_type: &str) -> DetectionResult {
        if document.is_empty() {
            return DetectionResult::unknown("Document is empty");
        }
        let part = DocumentPart {
            mime_type,
            bytes: document,
        };

        match self.config.extraction {
            ExtractionMode::Lazy => {
                let ai_result = self.classify(part).await;
                if self.is_conclusive(&ai_result) {
                    debug!("AI classification conclusive, skipping rule pass");
                    return ai_result;
                }
                let rule_result = self.rule_pass(part).await;
                pick_better(ai_result, rule_result)
            }
            ExtractionMode::Parallel => {
                let (ai_result, rule_result) =
                    tokio::join!(self.classify(part), self.rule_pass(part));
                if self.is_conclusive(&ai_result) {
                    return ai_result;
                }
                pick_better(ai_result, rule_result)
            }
        }
    }

    fn is_conclusive(&self, result: &DetectionResult) -> bool {
        result.detected_company_id.is_some()
            && result.confidence >= self.config.short_circuit_confidence
    }

    async fn classify(&self, part: DocumentPart<'_>) -> DetectionResult {
        let prompt = classification_prompt(&self.directory);
        match self.ai.generate(&prompt, Some(part)).await {
            Ok(response) => self.interpret_classification(&response.text),
            Err(e) => {
                warn!("AI classification failed: {}", e);
                DetectionResult::unknown(format!("AI classification failed: {}", e))
            }
        }
    }

    /// Turns the classifier's free-text reply into a result. Unparseable
    /// replies keep the raw text as reasoning.
    fn interpret_classification(&self, text: &str) -> DetectionResult {
        let reply = match ClassificationReply::parse(text) {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Could not parse classification reply: {}", e);
                return DetectionResult::unknown(text);
            }
        };

        let mut reasoning = reply.reasoning.clone();
        let company = match reply.company_id.as_deref() {
            Some(reported) if self.directory.is_empty() => Some(reported.to_string()),
            Some(reported) => match self.directory.resolve(reported) {
                Some(company) => Some(company.id.clone()),
                None => {
                    warn!("Classifier reported unknown company '{}'", reported);
                    reasoning = Some(format!(
                        "Reported company '{}' is not known. {}",
                        reported,
                        reply.reasoning.as_deref().unwrap_or_default()
                    ));
                    None
                }
            },
            None => None,
        };
        let confidence = if company.is_some() {
            reply.confidence
        } else {
            0.0
        };

        DetectionResult {
            detected_company_id: company,
            confidence,
            method: DetectionMethod::GeminiAnalysis,
            details: DetectionDetails {
                found_keywords: Some(reply.found_keywords),
                reasoning,
                ..Default::default()
            },
        }
    }

    async fn rule_pass(&self, part: DocumentPart<'_>) -> DetectionResult {
        if self.rules.is_empty() {
            return DetectionResult::unknown("No detection rules available");
        }
        let text = match self.ai.generate(extraction_prompt(), Some(part)).await {
            Ok(response) => response.text,
            Err(e) => {
                warn!("Text extraction failed: {}", e);
                return DetectionResult::unknown(format!("Text extraction failed: {}", e));
            }
        };
        score_rules(
            &self.rules,
            &text,
            self.config.score_normalization,
            self.config.max_rule_confidence,
        )
    }

    fn record_history(&self, document_id: &str, result: &DetectionResult) {
        let Some(store) = self.history.clone() else {
            return;
        };
        let entry = DetectionHistoryEntry::from_result(document_id, result);
        tokio::spawn(async move {
            if let Err(e) = store.record_detection(&entry).await {
                warn!(
                    "Failed to record detection history for '{}': {}",
                    entry.document_id, e
                );
            }
        });
    }
}
