use serde::{Deserialize, Serialize};

/// Emotions the heatmap has a column for, in display order.
pub const TRACKED_EMOTIONS: [&str; 8] = [
    "happy", "neutral", "sad", "angry", "fear", "disgust", "surprise", "contempt",
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HourRow {
    /// Zero-padded, "00" through "23".
    pub hour: String,
    /// Parallel to `TRACKED_EMOTIONS`.
    pub counts: [u32; TRACKED_EMOTIONS.len()],
}

impl HourRow {
    pub(crate) fn empty(hour: u32) -> Self {
        Self {
            hour: format!("{hour:02}"),
            counts: [0; TRACKED_EMOTIONS.len()],
        }
    }

    pub fn count(&self, emotion: &str) -> u32 {
        TRACKED_EMOTIONS
            .iter()
            .position(|tracked| tracked.eq_ignore_ascii_case(emotion))
            .map(|idx| self.counts[idx])
            .unwrap_or(0)
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmotionShare {
    pub emotion: String,
    pub count: usize,
    /// 0..=100.
    pub percent: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmotionDistribution {
    pub total: usize,
    /// Most frequent first; ties keep alphabetical order.
    pub shares: Vec<EmotionShare>,
    pub happy_percent: f64,
    pub entry_count: usize,
    pub exit_count: usize,
    pub unhappy_exits: usize,
}

impl EmotionDistribution {
    pub fn share(&self, emotion: &str) -> Option<&EmotionShare> {
        self.shares
            .iter()
            .find(|share| share.emotion.eq_ignore_ascii_case(emotion))
    }
}
