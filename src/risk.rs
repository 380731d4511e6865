//! Strongly-typed rule names, risk tiers and tactics.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Rule names
// ---------------------------------------------------------------------------

/// The six scoring rules, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleName {
    Authority,
    Urgency,
    Reward,
    Otp,
    Upi,
    Url,
}

impl RuleName {
    /// Evaluation order: keyword categories first, then entity rules.
    pub const ALL: &'static [RuleName] = &[
        RuleName::Authority,
        RuleName::Urgency,
        RuleName::Reward,
        RuleName::Otp,
        RuleName::Upi,
        RuleName::Url,
    ];

    pub const KEYWORD_CATEGORIES: &'static [RuleName] =
        &[RuleName::Authority, RuleName::Urgency, RuleName::Reward];

    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "authority" => Some(Self::Authority),
            "urgency" => Some(Self::Urgency),
            "reward" => Some(Self::Reward),
            "otp" => Some(Self::Otp),
            "upi" => Some(Self::Upi),
            "url" => Some(Self::Url),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authority => "authority",
            Self::Urgency => "urgency",
            Self::Reward => "reward",
            Self::Otp => "otp",
            Self::Upi => "upi",
            Self::Url => "url",
        }
    }

    pub fn is_keyword_category(&self) -> bool {
        Self::KEYWORD_CATEGORIES.contains(self)
    }

    /// Built-in weight.
    pub fn default_weight(&self) -> u32 {
        match self {
            Self::Authority | Self::Urgency | Self::Reward => 25,
            Self::Otp => 35,
            Self::Upi => 15,
            Self::Url => 20,
        }
    }

    /// Label appended to `confidence_factors` when the rule fires.
    pub fn factor_label(&self) -> &'static str {
        match self {
            Self::Authority => "Authority Impersonation",
            Self::Urgency => "Urgency/Fear",
            Self::Reward => "Reward Lure",
            Self::Otp => "OTP Detected",
            Self::Upi => "UPI Detected",
            Self::Url => "Phishing Link",
        }
    }

    /// Tactic inferred when the rule fires. Entity rules carry none.
    pub fn tactic(&self) -> Option<Tactic> {
        match self {
            Self::Authority => Some(Tactic::AuthorityAbuse),
            Self::Urgency => Some(Tactic::Fear),
            Self::Reward => Some(Tactic::Greed),
            Self::Otp | Self::Upi | Self::Url => None,
        }
    }
}

impl fmt::Display for RuleName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RuleName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_opt(s).ok_or_else(|| {
            format!(
                "unknown rule '{}'. Valid rules: authority, urgency, reward, otp, upi, url",
                s
            )
        })
    }
}

// ---------------------------------------------------------------------------
// Tactics
// ---------------------------------------------------------------------------

/// Social-engineering technique inferred from keyword categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tactic {
    #[serde(rename = "Authority Abuse")]
    AuthorityAbuse,
    Fear,
    Greed,
}

impl Tactic {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorityAbuse => "Authority Abuse",
            Self::Fear => "Fear",
            Self::Greed => "Greed",
        }
    }
}

impl fmt::Display for Tactic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Risk tiers
// ---------------------------------------------------------------------------

/// Severity tier derived from confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub const ALL: &'static [RiskLevel] = &[
        RiskLevel::Low,
        RiskLevel::Medium,
        RiskLevel::High,
        RiskLevel::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }

    /// Human-facing label shown alongside the report.
    pub fn agent_reply(&self) -> &'static str {
        match self {
            Self::Critical => "⚠️ HIGH SCAM RISK",
            Self::High => "🚩 Likely Scam",
            Self::Medium => "Be Careful",
            Self::Low => "Looks Safe",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RiskLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "MEDIUM" => Ok(Self::Medium),
            "HIGH" => Ok(Self::High),
            "CRITICAL" => Ok(Self::Critical),
            other => Err(format!(
                "unknown risk level '{other}', expected low/medium/high/critical"
            )),
        }
    }
}

/// Lower bounds for each tier plus the independent detection cut-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    /// `scam_detected` is set at or above this. Does not line up with any
    /// tier boundary, so MEDIUM spans both outcomes.
    pub detection: u32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            critical: 80,
            high: 50,
            medium: 30,
            detection: 40,
        }
    }
}

impl Thresholds {
    /// Highest tier whose lower bound `confidence` meets.
    pub fn classify(&self, confidence: u32) -> RiskLevel {
        if confidence >= self.critical {
            RiskLevel::Critical
        } else if confidence >= self.high {
            RiskLevel::High
        } else if confidence >= self.medium {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn is_detected(&self, confidence: u32) -> bool {
        confidence >= self.detection
    }
}
