//! Builders for test data.

#![allow(dead_code)]

use orderdesk::config::{BatchConfig, CompanyConfig, DetectionConfig, TrackerConfig};
use orderdesk::SourceFile;

/// Batch settings with the waits shortened for tests.
pub fn fast_batch_config() -> BatchConfig {
    BatchConfig {
        pause_poll_ms: 5,
        inter_chunk_delay_ms: 0,
        ..Default::default()
    }
}

/// Tracker settings without the `document_creating` dwell.
pub fn fast_tracker_config() -> TrackerConfig {
    TrackerConfig {
        poll_interval_ms: 10,
        min_document_creating_ms: 0,
    }
}

pub fn detection_config() -> DetectionConfig {
    DetectionConfig {
        record_history: false,
        ..Default::default()
    }
}

/// `count` small PDFs named `doc-00.pdf`, `doc-01.pdf`, ...
pub fn source_files(count: usize) -> Vec<SourceFile> {
    (0..count)
        .map(|i| source_file(&format!("doc-{:02}.pdf", i)))
        .collect()
}

pub fn source_file(name: &str) -> SourceFile {
    SourceFile::new(name, format!("%PDF-1.4 {}", name).into_bytes())
}

/// Builder for `CompanyConfig`.
pub struct CompanyBuilder {
    company: CompanyConfig,
}

impl CompanyBuilder {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            company: CompanyConfig {
                id: id.to_string(),
                name: name.to_string(),
                aliases: Vec::new(),
                unique_identifiers: Vec::new(),
            },
        }
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.company.aliases.push(alias.to_string());
        self
    }

    pub fn unique_identifier(mut self, identifier: &str) -> Self {
        self.company.unique_identifiers.push(identifier.to_string());
        self
    }

    pub fn build(self) -> CompanyConfig {
        self.company
    }
}

/// Two companies that share no names or identifiers.
pub fn sample_companies() -> Vec<CompanyConfig> {
    vec![
        CompanyBuilder::new("ACME", "Acme Industries")
            .alias("Acme")
            .unique_identifier("ACME Industries GmbH")
            .unique_identifier("HRB 12345")
            .build(),
        CompanyBuilder::new("GLOBEX", "Globex Corporation")
            .alias("Globex")
            .unique_identifier("Globex Corp. Ltd.")
            .build(),
    ]
}
