//! Keyword-tier severity heuristics.
//!
//! Tiers are checked in order and the first tier with any substring hit wins.
//! Hits are not counted or weighted.

use super::ClassificationResult;
use crate::models::Severity;

pub const KEYWORD_REASONING: &str = "Keyword-based classification (fallback mode)";
pub const DEFAULT_REASONING: &str = "Default classification (fallback mode)";

#[derive(Debug, Clone)]
pub struct KeywordTier {
    pub severity: Severity,
    pub confidence: f64,
    pub impact_area: &'static str,
    pub keywords: Vec<&'static str>,
}

#[derive(Debug, Clone)]
pub struct KeywordClassifier {
    tiers: Vec<KeywordTier>,
    default: KeywordTier,
}

const CRITICAL_KEYWORDS: &[&str] = &[
    "crash",
    "security",
    "data loss",
    "critical",
    "urgent",
    "vulnerability",
    "exploit",
    "breach",
    "sql injection",
    "authentication bypass",
    "production down",
];

const HIGH_KEYWORDS: &[&str] = &[
    "error",
    "bug",
    "broken",
    "not working",
    "fails",
    "failure",
    "cannot",
    "unable",
    "doesn't work",
    "500 error",
    "timeout",
    "database",
    "api down",
    "login failed",
];

const LOW_KEYWORDS: &[&str] = &[
    "typo",
    "cosmetic",
    "minor",
    "suggestion",
    "improvement",
    "enhancement",
    "ui",
    "text",
    "color",
    "spacing",
    "alignment",
];

impl Default for KeywordClassifier {
    fn default() -> Self {
        Self::new(
            vec![
                KeywordTier {
                    severity: Severity::Critical,
                    confidence: 0.75,
                    impact_area: "system",
                    keywords: CRITICAL_KEYWORDS.to_vec(),
                },
                KeywordTier {
                    severity: Severity::High,
                    confidence: 0.70,
                    impact_area: "functionality",
                    keywords: HIGH_KEYWORDS.to_vec(),
                },
                KeywordTier {
                    severity: Severity::Low,
                    confidence: 0.65,
                    impact_area: "ui",
                    keywords: LOW_KEYWORDS.to_vec(),
                },
            ],
            KeywordTier {
                severity: Severity::Medium,
                confidence: 0.60,
                impact_area: "general",
                keywords: Vec::new(),
            },
        )
    }
}

impl KeywordClassifier {
    /// `tiers` are in priority order; `default` applies when nothing matches.
    pub fn new(tiers: Vec<KeywordTier>, default: KeywordTier) -> Self {
        Self { tiers, default }
    }

    fn matching_tier(&self, title: &str, description: &str) -> Option<&KeywordTier> {
        let text = format!("{title} {description}").to_lowercase();
        self.tiers
            .iter()
            .find(|tier| tier.keywords.iter().any(|kw| text.contains(kw)))
    }

    pub fn score(&self, title: &str, description: &str) -> (Severity, f64) {
        let tier = self
            .matching_tier(title, description)
            .unwrap_or(&self.default);
        (tier.severity, tier.confidence.clamp(0.0, 1.0))
    }

    pub fn classify(&self, title: &str, description: &str) -> ClassificationResult {
        let (tier, reasoning) = match self.matching_tier(title, description) {
            Some(tier) => (tier, KEYWORD_REASONING),
            None => (&self.default, DEFAULT_REASONING),
        };
        ClassificationResult {
            severity: tier.severity,
            confidence: tier.confidence.clamp(0.0, 1.0),
            reasoning: reasoning.to_string(),
            impact_areas: vec![tier.impact_area.to_string()],
        }
    }
}
