use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::config::BatchConfig;
use crate::error::ValidationError;

/// Hard upper bound on files processed at once, whatever the caller asks for.
pub const MAX_CONCURRENT_FILES: usize = 3;

/// Hard upper bound on files in one batch. Larger selections are split by the caller.
pub const MAX_BATCH_FILES: usize = 50;

/// Caller-selected options for one batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOptions {
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
    #[serde(default = "default_auto_detect")]
    pub auto_detect_enabled: bool,
    #[serde(default)]
    pub retry_failed_files: bool,
    #[serde(default)]
    pub pause_on_error: bool,
    /// Company used when auto-detection is off, or when it finds nothing.
    #[serde(default)]
    pub company_id: Option<String>,
}

fn default_concurrency_limit() -> usize {
    1
}

fn default_auto_detect() -> bool {
    true
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            concurrency_limit: default_concurrency_limit(),
            auto_detect_enabled: default_auto_detect(),
            retry_failed_files: false,
            pause_on_error: false,
            company_id: None,
        }
    }
}

impl BatchOptions {
    /// Requested concurrency clamped to `1..=min(config max, MAX_CONCURRENT_FILES)`.
    pub fn effective_concurrency(&self, config: &BatchConfig) -> usize {
        let cap = config.max_concurrency.clamp(1, MAX_CONCURRENT_FILES);
        self.concurrency_limit.clamp(1, cap)
    }

    /// The selected company id, trimmed; blank counts as none.
    pub fn selected_company(&self) -> Option<&str> {
        self.company_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Checks a batch before any work starts.
pub fn validate_batch<'a, I>(
    file_names: I,
    options: &BatchOptions,
    config: &BatchConfig,
) -> Result<(), ValidationError>
where
    I: IntoIterator<Item = &'a str>,
{
    let names: Vec<&str> = file_names.into_iter().collect();
    if names.is_empty() {
        return Err(ValidationError::EmptyBatch);
    }
    let max = config.max_files.clamp(1, MAX_BATCH_FILES);
    if names.len() > max {
        return Err(ValidationError::BatchTooLarge {
            count: names.len(),
            max,
        });
    }
    if !options.auto_detect_enabled && options.selected_company().is_none() {
        return Err(ValidationError::MissingCompany);
    }

    let mut seen = HashSet::with_capacity(names.len());
    for name in names {
        if !seen.insert(name) {
            return Err(ValidationError::DuplicateFileName(name.to_string()));
        }
    }
    Ok(())
}
