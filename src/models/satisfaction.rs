use serde::{Deserialize, Serialize};

/// Verdict returned by the comparison endpoint. Kept verbatim; display code
/// decides how to colour it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SatisfactionResult {
    pub satisfaction: String,
    pub delta: String,
}

impl SatisfactionResult {
    pub fn new(satisfaction: impl Into<String>, delta: impl Into<String>) -> Self {
        Self {
            satisfaction: satisfaction.into(),
            delta: delta.into(),
        }
    }

    /// Placeholder for a comparison response that arrived without content.
    pub fn unknown() -> Self {
        Self::new("Unknown", "N/A")
    }
}
