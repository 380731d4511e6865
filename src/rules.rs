//! Rule and weight tables, compiled once from optional config overrides.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::keywords::default_keywords;
use crate::risk::{RuleName, Thresholds};

// ---------------------------------------------------------------------------
// Config parsing
// ---------------------------------------------------------------------------

/// `[scoring]` section of the config file.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct ScoringConfig {
    /// Per-rule weight overrides, keyed by rule name.
    pub weights: Option<BTreeMap<String, u32>>,
    /// Rules that contribute neither weight nor factor.
    pub disabled: Option<Vec<String>>,
    /// Replacement keyword lists, keyed by category name.
    pub keywords: Option<BTreeMap<String, Vec<String>>>,
    pub thresholds: Option<ThresholdsConfig>,
}

#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct ThresholdsConfig {
    pub critical: Option<u32>,
    pub high: Option<u32>,
    pub medium: Option<u32>,
    pub detection: Option<u32>,
}

/// `[response]` section of the config file.
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct ResponseConfig {
    pub include_agent_reply: Option<bool>,
    pub include_phone_numbers: Option<bool>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RuleError {
    #[error("unknown rule '{0}', expected one of authority/urgency/reward/otp/upi/url")]
    UnknownRule(String),

    #[error("'{0}' is not a keyword category, expected authority/urgency/reward")]
    UnknownCategory(String),

    #[error("keyword list for '{0}' is empty")]
    EmptyKeywords(String),

    #[error("keyword list for '{0}' contains a blank entry, which would match every message")]
    BlankKeyword(String),

    #[error("thresholds must satisfy medium <= high <= critical <= 100, got medium={medium} high={high} critical={critical}")]
    InvalidThresholds { medium: u32, high: u32, critical: u32 },
}

// ---------------------------------------------------------------------------
// Compiled rule set
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub name: RuleName,
    pub weight: u32,
    pub enabled: bool,
    /// Lowercase substrings; empty for entity rules.
    pub keywords: Vec<String>,
}

impl Rule {
    fn builtin(name: RuleName) -> Self {
        Self {
            name,
            weight: name.default_weight(),
            enabled: true,
            keywords: default_keywords(name)
                .unwrap_or_default()
                .iter()
                .map(|k| k.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResponseOptions {
    pub include_agent_reply: bool,
    pub include_phone_numbers: bool,
}

impl Default for ResponseOptions {
    fn default() -> Self {
        Self {
            include_agent_reply: true,
            include_phone_numbers: false,
        }
    }
}

/// Immutable scoring tables. `rules` is always in evaluation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
    pub thresholds: Thresholds,
    pub response: ResponseOptions,
}

impl Default for RuleSet {
    fn default() -> Self {
        Self {
            rules: RuleName::ALL.iter().map(|n| Rule::builtin(*n)).collect(),
            thresholds: Thresholds::default(),
            response: ResponseOptions::default(),
        }
    }
}

/// Built-in tables, shared process-wide.
pub static DEFAULT_RULES: LazyLock<RuleSet> = LazyLock::new(RuleSet::default);

impl RuleSet {
    pub fn from_config(
        scoring: Option<&ScoringConfig>,
        response: Option<&ResponseConfig>,
    ) -> Result<Self, RuleError> {
        let mut set = Self::default();

        if let Some(scoring) = scoring {
            if let Some(weights) = &scoring.weights {
                for (name, weight) in weights {
                    set.rule_mut(name)?.weight = *weight;
                }
            }
            if let Some(disabled) = &scoring.disabled {
                for name in disabled {
                    set.rule_mut(name)?.enabled = false;
                }
            }
            if let Some(keywords) = &scoring.keywords {
                for (name, list) in keywords {
                    let rule = set.rule_mut(name)?;
                    if !rule.name.is_keyword_category() {
                        return Err(RuleError::UnknownCategory(name.clone()));
                    }
                    if list.is_empty() {
                        return Err(RuleError::EmptyKeywords(name.clone()));
                    }
                    let lowered: Vec<String> = list.iter().map(|k| k.to_lowercase()).collect();
                    if lowered.iter().any(|k| k.trim().is_empty()) {
                        return Err(RuleError::BlankKeyword(name.clone()));
                    }
                    rule.keywords = lowered;
                }
            }
            if let Some(t) = &scoring.thresholds {
                let defaults = Thresholds::default();
                set.thresholds = Thresholds {
                    critical: t.critical.unwrap_or(defaults.critical),
                    high: t.high.unwrap_or(defaults.high),
                    medium: t.medium.unwrap_or(defaults.medium),
                    detection: t.detection.unwrap_or(defaults.detection),
                };
            }
        }

        let t = set.thresholds;
        if !(t.medium <= t.high && t.high <= t.critical && t.critical <= 100) {
            return Err(RuleError::InvalidThresholds {
                medium: t.medium,
                high: t.high,
                critical: t.critical,
            });
        }

        if let Some(response) = response {
            let defaults = ResponseOptions::default();
            set.response = ResponseOptions {
                include_agent_reply: response
                    .include_agent_reply
                    .unwrap_or(defaults.include_agent_reply),
                include_phone_numbers: response
                    .include_phone_numbers
                    .unwrap_or(defaults.include_phone_numbers),
            };
        }

        Ok(set)
    }

    pub fn rule(&self, name: RuleName) -> Option<&Rule> {
        self.rules.iter().find(|r| r.name == name)
    }

    fn rule_mut(&mut self, name: &str) -> Result<&mut Rule, RuleError> {
        let parsed = RuleName::from_str_opt(name)
            .ok_or_else(|| RuleError::UnknownRule(name.to_string()))?;
        self.rules
            .iter_mut()
            .find(|r| r.name == parsed)
            .ok_or_else(|| RuleError::UnknownRule(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_builtin_tables() {
        let set = RuleSet::default();
        let names: Vec<RuleName> = set.rules.iter().map(|r| r.name).collect();
        assert_eq!(names, RuleName::ALL);
        assert_eq!(set.rule(RuleName::Otp).unwrap().weight, 35);
        assert_eq!(set.rule(RuleName::Authority).unwrap().keywords.len(), 8);
        assert!(set.rule(RuleName::Url).unwrap().keywords.is_empty());
        assert_eq!(*DEFAULT_RULES, set);
    }

    #[test]
    fn test_no_config_is_default() {
        assert_eq!(RuleSet::from_config(None, None).unwrap(), RuleSet::default());
    }

    #[test]
    fn test_overrides_apply() {
        let scoring = ScoringConfig {
            weights: Some(BTreeMap::from([("otp".to_string(), 50)])),
            disabled: Some(vec!["url".to_string()]),
            keywords: Some(BTreeMap::from([(
                "reward".to_string(),
                vec!["Cashback".to_string()],
            )])),
            thresholds: Some(ThresholdsConfig {
                detection: Some(30),
                ..Default::default()
            }),
        };
        let response = ResponseConfig {
            include_agent_reply: Some(false),
            include_phone_numbers: Some(true),
        };
        let set = RuleSet::from_config(Some(&scoring), Some(&response)).unwrap();

        assert_eq!(set.rule(RuleName::Otp).unwrap().weight, 50);
        assert!(!set.rule(RuleName::Url).unwrap().enabled);
        assert_eq!(set.rule(RuleName::Reward).unwrap().keywords, vec!["cashback"]);
        assert_eq!(set.thresholds.detection, 30);
        assert_eq!(set.thresholds.critical, 80);
        assert!(!set.response.include_agent_reply);
        assert!(set.response.include_phone_numbers);
    }

    #[test]
    fn test_unknown_rule_rejected() {
        let scoring = ScoringConfig {
            disabled: Some(vec!["phone".to_string()]),
            ..Default::default()
        };
        assert_eq!(
            RuleSet::from_config(Some(&scoring), None),
            Err(RuleError::UnknownRule("phone".to_string()))
        );
    }

    #[test]
    fn test_keywords_on_entity_rule_rejected() {
        let scoring = ScoringConfig {
            keywords: Some(BTreeMap::from([("otp".to_string(), vec!["x".to_string()])])),
            ..Default::default()
        };
        assert_eq!(
            RuleSet::from_config(Some(&scoring), None),
            Err(RuleError::UnknownCategory("otp".to_string()))
        );
    }

    #[test]
    fn test_empty_keywords_rejected() {
        let scoring = ScoringConfig {
            keywords: Some(BTreeMap::from([("urgency".to_string(), vec![])])),
            ..Default::default()
        };
        assert_eq!(
            RuleSet::from_config(Some(&scoring), None),
            Err(RuleError::EmptyKeywords("urgency".to_string()))
        );
    }

    #[test]
    fn test_blank_keyword_rejected() {
        for blank in ["", "   ", "\t"] {
            let scoring = ScoringConfig {
                keywords: Some(BTreeMap::from([(
                    "reward".to_string(),
                    vec!["prize".to_string(), blank.to_string()],
                )])),
                ..Default::default()
            };
            assert_eq!(
                RuleSet::from_config(Some(&scoring), None),
                Err(RuleError::BlankKeyword("reward".to_string()))
            );
        }
    }

    #[test]
    fn test_misordered_thresholds_rejected() {
        let scoring = ScoringConfig {
            thresholds: Some(ThresholdsConfig {
                high: Some(90),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(matches!(
            RuleSet::from_config(Some(&scoring), None),
            Err(RuleError::InvalidThresholds { high: 90, .. })
        ));
    }

    #[test]
    fn test_parse_from_toml() {
        let scoring: ScoringConfig = toml::from_str(
            r#"
            disabled = ["upi"]
            [weights]
            authority = 30
            [thresholds]
            medium = 20
            "#,
        )
        .unwrap();
        let set = RuleSet::from_config(Some(&scoring), None).unwrap();
        assert!(!set.rule(RuleName::Upi).unwrap().enabled);
        assert_eq!(set.rule(RuleName::Authority).unwrap().weight, 30);
        assert_eq!(set.thresholds.medium, 20);
    }
}
