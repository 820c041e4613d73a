use std::collections::BTreeMap;

use super::result::{DetectionDetails, DetectionMethod, DetectionResult, RuleApplication};
use super::rule::RuleType;
use super::rules::RuleSet;

/// Accumulated score for one company.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuleScoreCard {
    pub score: i64,
    pub best_priority: i32,
}

/// Scores extracted text against every rule in the set.
///
/// Each matching rule adds its priority to its company's score. The highest
/// score wins; ties go to the company with the highest single matching
/// priority, then to the lexicographically smaller company id.
pub fn score_rules(
    rules: &RuleSet,
    text: &str,
    normalization: f64,
    max_confidence: f64,
) -> DetectionResult {
    let mut cards: BTreeMap<&str, RuleScoreCard> = BTreeMap::new();
    let mut found_keywords = Vec::new();
    let mut matched_patterns = Vec::new();
    let mut applied = Vec::with_capacity(rules.len());

    for rule in rules.rules() {
        let matched = rules.matches(rule, text);
        applied.push(RuleApplication {
            rule_id: rule.id.clone(),
            rule_type: rule.rule_type.as_str().to_string(),
            rule_value: rule.rule_value.clone(),
            matched,
        });
        if !matched {
            continue;
        }

        match rule.rule_type {
            RuleType::Pattern => matched_patterns.push(rule.rule_value.clone()),
            _ => found_keywords.push(rule.rule_value.clone()),
        }

        let card = cards.entry(rule.company_id.as_str()).or_insert(RuleScoreCard {
            score: 0,
            best_priority: i32::MIN,
        });
        card.score += i64::from(rule.priority);
        card.best_priority = card.best_priority.max(rule.priority);
    }

    // BTreeMap iterates ids in order, so strict comparison keeps the smaller id on ties.
    let mut winner: Option<(&str, &RuleScoreCard)> = None;
    for (company, card) in &cards {
        let better = match winner {
            None => true,
            Some((_, best)) => (card.score, card.best_priority) > (best.score, best.best_priority),
        };
        if better {
            winner = Some((company, card));
        }
    }

    let details = DetectionDetails {
        found_keywords: Some(found_keywords),
        matched_patterns: Some(matched_patterns),
        reasoning: None,
        rules_applied: Some(applied),
    };

    match winner {
        Some((company, card)) if card.score > 0 => {
            let confidence = (card.score as f64 / normalization).min(max_confidence);
            DetectionResult {
                detected_company_id: Some(company.to_string()),
                confidence,
                method: DetectionMethod::RuleBased,
                details: DetectionDetails {
                    reasoning: Some(format!(
                        "Matched rules scored {} for {}",
                        card.score, company
                    )),
                    ..details
                },
            }
        }
        _ => DetectionResult {
            detected_company_id: None,
            confidence: 0.0,
            method: DetectionMethod::RuleBased,
            details: DetectionDetails {
                reasoning: Some("No detection rule matched".to_string()),
                ..details
            },
        },
    }
}
