use serde::{Deserialize, Serialize};

/// How a rule's value is matched against document text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    /// Case-sensitive literal containment.
    Keyword,
    /// Case-insensitive regular expression.
    Pattern,
    /// Case-insensitive literal, whitespace-normalized.
    Address,
    /// Case-sensitive literal printed in a letterhead or logo.
    LogoText,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Keyword => "keyword",
            RuleType::Pattern => "pattern",
            RuleType::Address => "address",
            RuleType::LogoText => "logo_text",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "keyword" => Some(RuleType::Keyword),
            "pattern" => Some(RuleType::Pattern),
            "address" => Some(RuleType::Address),
            "logo_text" => Some(RuleType::LogoText),
            _ => None,
        }
    }
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One classification heuristic. Read-only to the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRule {
    pub id: String,
    pub company_id: String,
    pub rule_type: RuleType,
    pub rule_value: String,
    /// Added to the company's score when the rule matches. Higher wins ties.
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl DetectionRule {
    pub fn new(
        id: impl Into<String>,
        company_id: impl Into<String>,
        rule_type: RuleType,
        rule_value: impl Into<String>,
        priority: i32,
    ) -> Self {
        Self {
            id: id.into(),
            company_id: company_id.into(),
            rule_type,
            rule_value: rule_value.into(),
            priority,
            is_active: true,
        }
    }

    pub fn keyword(
        id: impl Into<String>,
        company_id: impl Into<String>,
        value: impl Into<String>,
        priority: i32,
    ) -> Self {
        Self::new(id, company_id, RuleType::Keyword, value, priority)
    }

    pub fn pattern(
        id: impl Into<String>,
        company_id: impl Into<String>,
        value: impl Into<String>,
        priority: i32,
    ) -> Self {
        Self::new(id, company_id, RuleType::Pattern, value, priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_type_round_trips_through_str() {
        for rule_type in [
            RuleType::Keyword,
            RuleType::Pattern,
            RuleType::Address,
            RuleType::LogoText,
        ] {
            assert_eq!(RuleType::parse(rule_type.as_str()), Some(rule_type));
        }
        assert_eq!(RuleType::parse("barcode"), None);
    }

    #[test]
    fn test_rule_deserializes_with_defaults() {
        let rule: DetectionRule = serde_json::from_str(
            r#"{"id": "r1", "company_id": "ACME", "rule_type": "logo_text", "rule_value": "ACME"}"#,
        )
        .unwrap();
        assert_eq!(rule.rule_type, RuleType::LogoText);
        assert_eq!(rule.priority, 0);
        assert!(rule.is_active);
    }
}
