use regex::{Regex, RegexBuilder};
use std::collections::HashMap;

use crate::store::Store;

use super::company::CompanyDirectory;
use super::rule::{DetectionRule, RuleType};

/// Where a [`RuleSet`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleSource {
    Store,
    Fallback,
}

/// Immutable set of active detection rules, sorted by priority (descending).
///
/// Pattern rules are compiled once here; a rule whose regex does not compile
/// is skipped with a warning instead of failing the whole set.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<DetectionRule>,
    compiled_patterns: HashMap<String, Regex>,
    source: RuleSource,
}

impl RuleSet {
    pub fn new(rules: Vec<DetectionRule>) -> Self {
        Self::with_source(rules, RuleSource::Store)
    }

    fn with_source(rules: Vec<DetectionRule>, source: RuleSource) -> Self {
        let mut rules: Vec<DetectionRule> = rules.into_iter().filter(|r| r.is_active).collect();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));

        let mut compiled_patterns = HashMap::new();
        rules.retain(|rule| {
            if rule.rule_type != RuleType::Pattern {
                return true;
            }
            if compiled_patterns.contains_key(&rule.rule_value) {
                return true;
            }
            match RegexBuilder::new(&rule.rule_value)
                .case_insensitive(true)
                .build()
            {
                Ok(regex) => {
                    compiled_patterns.insert(rule.rule_value.clone(), regex);
                    true
                }
                Err(e) => {
                    log::warn!("Skipping rule '{}': invalid pattern: {}", rule.id, e);
                    false
                }
            }
        });

        Self {
            rules,
            compiled_patterns,
            source,
        }
    }

    /// Rule set derived from the company directory alone.
    pub fn fallback(directory: &CompanyDirectory) -> Self {
        Self::with_source(directory.fallback_rules(), RuleSource::Fallback)
    }

    /// Loads active rules from the store, substituting the built-in set when
    /// the store fails or holds no rules.
    pub async fn load(store: &dyn Store, directory: &CompanyDirectory) -> Self {
        match store.list_active_rules().await {
            Ok(rules) if !rules.is_empty() => {
                log::debug!("Loaded {} detection rules from store", rules.len());
                Self::new(rules)
            }
            Ok(_) => {
                log::info!("No detection rules stored, using built-in rules");
                Self::fallback(directory)
            }
            Err(e) => {
                log::warn!("Failed to load detection rules, using built-in rules: {}", e);
                Self::fallback(directory)
            }
        }
    }

    pub fn rules(&self) -> &[DetectionRule] {
        &self.rules
    }

    pub fn source(&self) -> RuleSource {
        self.source
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn matches(&self, rule: &DetectionRule, text: &str) -> bool {
        match rule.rule_type {
            RuleType::Keyword | RuleType::LogoText => {
                !rule.rule_value.is_empty() && text.contains(&rule.rule_value)
            }
            RuleType::Pattern => self
                .compiled_patterns
                .get(&rule.rule_value)
                .map(|re| re.is_match(text))
                .unwrap_or(false),
            RuleType::Address => {
                let needle = normalize_whitespace(&rule.rule_value).to_lowercase();
                !needle.is_empty() && normalize_whitespace(text).to_lowercase().contains(&needle)
            }
        }
    }
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
