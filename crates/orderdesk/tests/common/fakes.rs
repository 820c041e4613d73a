//! Scripted stand-ins for the AI service and the document pipeline.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use orderdesk::ai::prompt::extraction_prompt;
use orderdesk::{
    AiClient, AiError, AiResponse, DetectionMethod, DetectionResult, DocumentPart,
    DocumentPipeline, GeneratedWorkOrder, PipelineError, SourceFile,
};
use orderdesk::detection::DetectionDetails;

/// Answers classification prompts with one reply and extraction prompts
/// with the document text.
pub struct FakeAiClient {
    classification: Result<String, AiError>,
    extracted_text: String,
    calls: AtomicUsize,
    extraction_calls: AtomicUsize,
}

impl FakeAiClient {
    pub fn new(classification: &str, extracted_text: &str) -> Self {
        Self {
            classification: Ok(classification.to_string()),
            extracted_text: extracted_text.to_string(),
            calls: AtomicUsize::new(0),
            extraction_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(extracted_text: &str) -> Self {
        Self {
            classification: Err(AiError::Transport("connection reset".to_string())),
            extracted_text: extracted_text.to_string(),
            calls: AtomicUsize::new(0),
            extraction_calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn extraction_calls(&self) -> usize {
        self.extraction_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AiClient for FakeAiClient {
    async fn generate(
        &self,
        prompt: &str,
        _document: Option<DocumentPart<'_>>,
    ) -> Result<AiResponse, AiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if prompt == extraction_prompt() {
            self.extraction_calls.fetch_add(1, Ordering::SeqCst);
            return Ok(AiResponse::text(self.extracted_text.clone()));
        }
        match &self.classification {
            Ok(text) => Ok(AiResponse::text(text.clone())),
            Err(AiError::Transport(msg)) => Err(AiError::Transport(msg.clone())),
            Err(_) => Err(AiError::EmptyResponse),
        }
    }
}

/// A pipeline that detects a fixed company and fails chosen files.
pub struct FakePipeline {
    company_id: Option<String>,
    latency: Duration,
    always_fail: HashSet<String>,
    /// Remaining failures per file before it succeeds.
    fail_times: Mutex<HashMap<String, usize>>,
    classify_calls: AtomicUsize,
    generate_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakePipeline {
    pub fn new() -> Self {
        Self {
            company_id: Some("ACME".to_string()),
            latency: Duration::from_millis(5),
            always_fail: HashSet::new(),
            fail_times: Mutex::new(HashMap::new()),
            classify_calls: AtomicUsize::new(0),
            generate_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Classification finds no company.
    pub fn detecting_nothing(mut self) -> Self {
        self.company_id = None;
        self
    }

    pub fn failing(mut self, file_name: &str) -> Self {
        self.always_fail.insert(file_name.to_string());
        self
    }

    /// `file_name` fails `times` times, then succeeds.
    pub fn failing_times(self, file_name: &str, times: usize) -> Self {
        self.fail_times
            .lock()
            .unwrap()
            .insert(file_name.to_string(), times);
        self
    }

    pub fn classify_calls(&self) -> usize {
        self.classify_calls.load(Ordering::SeqCst)
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn should_fail(&self, file_name: &str) -> bool {
        if self.always_fail.contains(file_name) {
            return true;
        }
        let mut remaining = self.fail_times.lock().unwrap();
        match remaining.get_mut(file_name) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        }
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentPipeline for FakePipeline {
    async fn classify(&self, _file: &SourceFile) -> Result<DetectionResult, PipelineError> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        Ok(match &self.company_id {
            Some(id) => DetectionResult {
                detected_company_id: Some(id.clone()),
                confidence: 0.9,
                method: DetectionMethod::GeminiAnalysis,
                details: DetectionDetails::default(),
            },
            None => DetectionResult::unknown("nothing recognisable"),
        })
    }

    async fn generate(
        &self,
        file: &SourceFile,
        company_id: &str,
    ) -> Result<GeneratedWorkOrder, PipelineError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(&self.in_flight);

        tokio::time::sleep(self.latency).await;

        if self.should_fail(&file.file_name) {
            return Err(PipelineError::Ai(AiError::Http {
                status: 500,
                body: format!("generation failed for {}", file.file_name),
            }));
        }
        Ok(GeneratedWorkOrder {
            work_order_id: format!("wo-{}", file.file_name),
            company_id: company_id.to_string(),
            content: format!("Work order for {}", file.file_name),
            usage: None,
        })
    }
}
