//! Company detection: which client organization issued a document.
//!
//! Two independent signals are combined. The AI classifier reads the document
//! directly; the rule pass scores extracted text against administrator
//! defined keyword and pattern rules. [`pick_better`] reconciles the two.

pub mod company;
pub mod detector;
pub mod history;
pub mod result;
pub mod rule;
pub mod rules;
pub mod scorer;

pub use company::CompanyDirectory;
pub use detector::CompanyDetector;
pub use history::DetectionHistoryEntry;
pub use result::{pick_better, DetectionDetails, DetectionMethod, DetectionResult, RuleApplication};
pub use rule::{DetectionRule, RuleType};
pub use rules::{RuleSet, RuleSource};
pub use scorer::{score_rules, RuleScoreCard};
