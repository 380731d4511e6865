//! Keyword categories matched as literal substrings of the lowercased text.

use crate::risk::RuleName;

pub const AUTHORITY_KEYWORDS: &[&str] = &[
    "rbi",
    "sbi",
    "bank",
    "kyc",
    "police",
    "income tax",
    "aadhaar",
    "pan",
];

pub const URGENCY_KEYWORDS: &[&str] = &["urgent", "blocked", "immediately", "deadline", "penalty"];

pub const REWARD_KEYWORDS: &[&str] = &["lottery", "won", "reward", "gift", "bonus", "prize"];

/// Built-in keyword list for a category, `None` for entity rules.
pub fn default_keywords(rule: RuleName) -> Option<&'static [&'static str]> {
    match rule {
        RuleName::Authority => Some(AUTHORITY_KEYWORDS),
        RuleName::Urgency => Some(URGENCY_KEYWORDS),
        RuleName::Reward => Some(REWARD_KEYWORDS),
        RuleName::Otp | RuleName::Upi | RuleName::Url => None,
    }
}

/// True if any keyword occurs anywhere in `lower`. Not word-bounded, so
/// "urgently" hits "urgent" and "company" hits "pan".
pub fn contains_any<S: AsRef<str>>(lower: &str, keywords: &[S]) -> bool {
    keywords.iter().any(|k| lower.contains(k.as_ref()))
}
