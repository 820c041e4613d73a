use crate::config::CompanyConfig;

use super::rule::DetectionRule;

/// Priority of a built-in rule for a company's unique identifier.
pub const UNIQUE_IDENTIFIER_PRIORITY: i32 = 200;
/// Priority of a built-in rule for a company's display name.
pub const NAME_PRIORITY: i32 = 100;
/// Priority of a built-in rule for a company alias.
pub const ALIAS_PRIORITY: i32 = 50;

/// The organizations a document can be attributed to.
#[derive(Debug, Clone, Default)]
pub struct CompanyDirectory {
    companies: Vec<CompanyConfig>,
}

impl CompanyDirectory {
    pub fn new(companies: Vec<CompanyConfig>) -> Self {
        Self { companies }
    }

    pub fn companies(&self) -> &[CompanyConfig] {
        &self.companies
    }

    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CompanyConfig> {
        self.companies.iter().find(|c| c.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Display name for a company id, falling back to the id itself.
    pub fn display_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.get(id).map(|c| c.name.as_str()).unwrap_or(id)
    }

    /// Maps an identifier reported by the AI classifier onto a known company.
    ///
    /// The classifier is asked for ids but sometimes answers with a name or
    /// alias, so all three are accepted, case-insensitively.
    pub fn resolve(&self, reported: &str) -> Option<&CompanyConfig> {
        let reported = reported.trim();
        if reported.is_empty() {
            return None;
        }
        self.companies
            .iter()
            .find(|c| c.id.eq_ignore_ascii_case(reported))
            .or_else(|| {
                self.companies.iter().find(|c| {
                    c.name.eq_ignore_ascii_case(reported)
                        || c.aliases.iter().any(|a| a.eq_ignore_ascii_case(reported))
                })
            })
    }

    /// Built-in rules used when the rule store cannot be read.
    ///
    /// Every unique identifier, name and alias becomes a keyword rule, so the
    /// scoring pass still works without any administrator-defined rules.
    pub fn fallback_rules(&self) -> Vec<DetectionRule> {
        let mut rules = Vec::new();
        for company in &self.companies {
            for (i, value) in company.unique_identifiers.iter().enumerate() {
                rules.push(DetectionRule::keyword(
                    format!("builtin-{}-uid-{}", company.id, i),
                    &company.id,
                    value,
                    UNIQUE_IDENTIFIER_PRIORITY,
                ));
            }
            rules.push(DetectionRule::keyword(
                format!("builtin-{}-name", company.id),
                &company.id,
                &company.name,
                NAME_PRIORITY,
            ));
            for (i, alias) in company.aliases.iter().enumerate() {
                rules.push(DetectionRule::keyword(
                    format!("builtin-{}-alias-{}", company.id, i),
                    &company.id,
                    alias,
                    ALIAS_PRIORITY,
                ));
            }
        }
        rules
    }
}
