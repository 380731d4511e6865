//! Shared regex patterns for entity extraction.
//!
//! Every pattern is compiled once per process and matched against the
//! newline-stripped, original-case message text.

use regex::Regex;
use std::sync::LazyLock;

// ---------------------------------------------------------------------------
// Entity patterns (used by extract.rs)
// ---------------------------------------------------------------------------

/// One-time passcode: a standalone run of 4 to 8 digits.
pub static OTP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4,8}\b").unwrap());

/// Payment handle (`local@label`). The domain part is a single word label,
/// so plain email addresses match up to their first dot.
pub static UPI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[\w.-]+@\w+\b").unwrap());

/// Link: `http://` or `https://` followed by every non-whitespace character.
pub static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").unwrap());

/// Indian mobile number: 10 digits starting with 6-9.
pub static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[6-9]\d{9}\b").unwrap());

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

/// All non-overlapping matches, left to right, duplicates kept.
pub fn find_all(text: &str, pattern: &Regex) -> Vec<String> {
    pattern
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_pattern() {
        assert!(OTP_RE.is_match("code 4839"));
        assert!(OTP_RE.is_match("12345678"));
        assert!(!OTP_RE.is_match("123"));
        assert!(!OTP_RE.is_match("123456789"));
        assert!(!OTP_RE.is_match("abc1234"));
    }

    #[test]
    fn test_upi_pattern() {
        assert!(UPI_RE.is_match("pay to rahul.k-99@okaxis"));
        assert!(UPI_RE.is_match("test@upi"));
        assert!(!UPI_RE.is_match("@upi"));
        assert!(!UPI_RE.is_match("rahul@"));
    }

    #[test]
    fn test_url_pattern() {
        assert!(URL_RE.is_match("go to https://x.example/login now"));
        assert!(URL_RE.is_match("http://a"));
        assert!(!URL_RE.is_match("www.example.com"));
        assert!(!URL_RE.is_match("HTTP://shouting.example"));
    }

    #[test]
    fn test_phone_pattern() {
        assert!(PHONE_RE.is_match("call 9876543210"));
        assert!(!PHONE_RE.is_match("call 5876543210"));
        assert!(!PHONE_RE.is_match("98765432101"));
    }

    #[test]
    fn test_find_all_keeps_order_and_duplicates() {
        let found = find_all("1111 then 2222 then 1111", &OTP_RE);
        assert_eq!(found, vec!["1111", "2222", "1111"]);
    }

    #[test]
    fn test_email_truncated_at_first_dot() {
        let found = find_all("mail me at john.doe@example.com", &UPI_RE);
        assert_eq!(found, vec!["john.doe@example"]);
    }
}
