//! Message normalization ahead of matching.

/// The two views of a message the scorer matches against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    /// Original casing with every `\r` and `\n` replaced by one space.
    pub clean: String,
    /// Lowercase form of `clean`, used for keyword lookups.
    pub lower: String,
}

impl NormalizedText {
    pub fn new(raw: &str) -> Self {
        let clean: String = raw
            .chars()
            .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
            .collect();
        let lower = clean.to_lowercase();
        Self { clean, lower }
    }
}
