//! Score aggregation: normalized text in, risk report out.

use std::sync::{Arc, LazyLock};

use serde::{Deserialize, Serialize};

use crate::extract::{ExtractedEntities, Extraction};
use crate::keywords::contains_any;
use crate::normalize::NormalizedText;
use crate::risk::{RiskLevel, RuleName, Tactic};
use crate::rules::{RuleSet, DEFAULT_RULES};

/// Confidence is capped here.
pub const MAX_CONFIDENCE: u32 = 100;

/// Risk report for one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub scam_detected: bool,
    pub risk_level: RiskLevel,
    pub confidence: f64,
    /// Deduplicated, in first-seen order.
    pub tactics: Vec<Tactic>,
    /// One label per triggered rule, in evaluation order.
    pub confidence_factors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_reply: Option<String>,
    pub extracted_entities: ExtractedEntities,
}

/// Stateless scorer over an immutable [`RuleSet`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Scorer {
    rules: Arc<RuleSet>,
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(DEFAULT_RULES.clone())
    }
}

static DEFAULT_SCORER: LazyLock<Scorer> = LazyLock::new(Scorer::default);

/// Score `text` against the built-in rule tables.
pub fn analyze(text: &str) -> AnalysisResult {
    DEFAULT_SCORER.analyze(text)
}

impl Scorer {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules: Arc::new(rules),
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn analyze(&self, text: &str) -> AnalysisResult {
        let normalized = NormalizedText::new(text);
        let extraction = Extraction::from_text(&normalized.clean);

        let mut raw_score: u32 = 0;
        let mut factors = Vec::new();
        let mut tactics: Vec<Tactic> = Vec::new();

        for rule in self.rules.rules.iter().filter(|r| r.enabled) {
            let fired = match rule.name {
                RuleName::Authority | RuleName::Urgency | RuleName::Reward => {
                    contains_any(&normalized.lower, &rule.keywords)
                }
                RuleName::Otp => !extraction.otps.is_empty(),
                RuleName::Upi => !extraction.upi_ids.is_empty(),
                RuleName::Url => !extraction.urls.is_empty(),
            };
            if !fired {
                continue;
            }

            raw_score = raw_score.saturating_add(rule.weight);
            factors.push(rule.name.factor_label().to_string());
            if let Some(tactic) = rule.name.tactic() {
                if !tactics.contains(&tactic) {
                    tactics.push(tactic);
                }
            }
        }

        let confidence = raw_score.min(MAX_CONFIDENCE);
        let thresholds = &self.rules.thresholds;
        let risk_level = thresholds.classify(confidence);
        let response = self.rules.response;

        tracing::debug!(
            raw_score,
            confidence,
            risk_level = %risk_level,
            factors = factors.len(),
            "scored message"
        );

        AnalysisResult {
            scam_detected: thresholds.is_detected(confidence),
            risk_level,
            confidence: f64::from(confidence),
            tactics,
            confidence_factors: factors,
            agent_reply: response
                .include_agent_reply
                .then(|| risk_level.agent_reply().to_string()),
            extracted_entities: extraction.into_entities(response.include_phone_numbers),
        }
    }
}
