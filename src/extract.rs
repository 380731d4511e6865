//! Entity extraction over normalized message text.

use serde::{Deserialize, Serialize};

use crate::patterns::{find_all, OTP_RE, PHONE_RE, UPI_RE, URL_RE};

/// Entities pulled out of a message, each in order of appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedEntities {
    pub upi_ids: Vec<String>,
    pub phishing_links: Vec<String>,
    pub otps: Vec<String>,
    /// Reserved: always extracted, never scored. Only serialized when the
    /// response options ask for it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_numbers: Option<Vec<String>>,
}

/// Raw extraction output before response shaping.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub otps: Vec<String>,
    pub upi_ids: Vec<String>,
    pub urls: Vec<String>,
    pub phones: Vec<String>,
}

impl Extraction {
    /// Run every entity pattern over `clean` (newline-stripped, original case).
    pub fn from_text(clean: &str) -> Self {
        Self {
            otps: find_all(clean, &OTP_RE),
            upi_ids: find_all(clean, &UPI_RE),
            urls: find_all(clean, &URL_RE),
            phones: find_all(clean, &PHONE_RE),
        }
    }

    pub fn into_entities(self, include_phone_numbers: bool) -> ExtractedEntities {
        ExtractedEntities {
            upi_ids: self.upi_ids,
            phishing_links: self.urls,
            otps: self.otps,
            phone_numbers: include_phone_numbers.then_some(self.phones),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_all_kinds() {
        let e = Extraction::from_text(
            "Pay Ravi.K@okaxis, OTP 4821, link HTTPS://x.io no, https://Bit.ly/AbC call 9123456789",
        );
        assert_eq!(e.upi_ids, vec!["Ravi.K@okaxis"]);
        assert_eq!(e.otps, vec!["4821"]);
        assert_eq!(e.urls, vec!["https://Bit.ly/AbC"]);
        assert_eq!(e.phones, vec!["9123456789"]);
    }

    #[test]
    fn test_url_runs_to_whitespace() {
        let e = Extraction::from_text("visit http://phish.example/a?b=1, now");
        assert_eq!(e.urls, vec!["http://phish.example/a?b=1,"]);
    }

    #[test]
    fn test_nothing_found() {
        let e = Extraction::from_text("Let's meet for coffee tomorrow");
        assert_eq!(e, Extraction::default());
    }

    #[test]
    fn test_phone_numbers_hidden_by_default() {
        let e = Extraction::from_text("call 9123456789");
        assert!(e.clone().into_entities(false).phone_numbers.is_none());
        assert_eq!(
            e.into_entities(true).phone_numbers,
            Some(vec!["9123456789".to_string()])
        );
    }

    #[test]
    fn test_serialized_shape() {
        let entities = Extraction::from_text("otp 1234").into_entities(false);
        let json = serde_json::to_value(&entities).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"upi_ids": [], "phishing_links": [], "otps": ["1234"]})
        );
    }
}
