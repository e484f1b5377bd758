//! Emotion observation data model.
//!
//! An observation is one completed inference pass: face crop plus emotion
//! classification, tagged with the checkpoint it was taken at.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Emotions that mark an exit as an unhappy departure.
pub const NEGATIVE_EMOTIONS: [&str; 4] = ["angry", "sad", "disgust", "fear"];

/// Confidence assumed when the classifier does not report one.
pub const DEFAULT_CONFIDENCE: f64 = 0.85;

/// Per-label percentages as reported by the classifier.
pub type EmotionScores = BTreeMap<String, f64>;

pub fn is_negative_emotion(emotion: &str) -> bool {
    let emotion = emotion.trim();
    NEGATIVE_EMOTIONS
        .iter()
        .any(|negative| negative.eq_ignore_ascii_case(emotion))
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ObservationType {
    Entry,
    Exit,
    Ambient,
}

impl ObservationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationType::Entry => "entry",
            ObservationType::Exit => "exit",
            ObservationType::Ambient => "ambient",
        }
    }

    /// Entry and exit captures take part in the customer journey; ambient
    /// samples only refresh the live display.
    pub fn is_checkpoint(&self) -> bool {
        matches!(self, ObservationType::Entry | ObservationType::Exit)
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "entry" => Some(ObservationType::Entry),
            "exit" => Some(ObservationType::Exit),
            "ambient" => Some(ObservationType::Ambient),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmotionObservation {
    pub timestamp: DateTime<Utc>,
    pub emotion: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion_scores: Option<EmotionScores>,
    #[serde(rename = "type")]
    pub kind: ObservationType,
}

impl EmotionObservation {
    pub fn new(
        emotion: impl Into<String>,
        confidence: Option<f64>,
        emotion_scores: Option<EmotionScores>,
        kind: ObservationType,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp,
            emotion: emotion.into(),
            confidence: normalize_confidence(confidence),
            emotion_scores,
            kind,
        }
    }

    /// True for an exit whose emotion is in the negative set.
    pub fn is_unhappy_exit(&self) -> bool {
        self.kind == ObservationType::Exit && is_negative_emotion(&self.emotion)
    }
}

/// Missing, zero or non-finite confidences fall back to the default; anything
/// else is clamped into `[0, 1]`.
pub fn normalize_confidence(confidence: Option<f64>) -> f64 {
    match confidence {
        Some(value) if value.is_finite() && value > 0.0 => value.min(1.0),
        _ => DEFAULT_CONFIDENCE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_set_is_case_insensitive() {
        assert!(is_negative_emotion("Angry"));
        assert!(is_negative_emotion(" fear "));
        assert!(!is_negative_emotion("happy"));
        assert!(!is_negative_emotion("surprise"));
    }

    #[test]
    fn confidence_defaults_when_absent_or_zero() {
        assert_eq!(normalize_confidence(None), DEFAULT_CONFIDENCE);
        assert_eq!(normalize_confidence(Some(0.0)), DEFAULT_CONFIDENCE);
        assert_eq!(normalize_confidence(Some(f64::NAN)), DEFAULT_CONFIDENCE);
        assert_eq!(normalize_confidence(Some(0.92)), 0.92);
        assert_eq!(normalize_confidence(Some(3.0)), 1.0);
    }

    #[test]
    fn only_negative_exits_are_unhappy() {
        let now = Utc::now();
        let exit = EmotionObservation::new("sad", Some(0.7), None, ObservationType::Exit, now);
        let entry = EmotionObservation::new("sad", Some(0.7), None, ObservationType::Entry, now);
        let happy_exit =
            EmotionObservation::new("happy", Some(0.7), None, ObservationType::Exit, now);

        assert!(exit.is_unhappy_exit());
        assert!(!entry.is_unhappy_exit());
        assert!(!happy_exit.is_unhappy_exit());
    }

    #[test]
    fn serializes_kind_as_type() {
        let obs = EmotionObservation::new(
            "happy",
            Some(0.92),
            None,
            ObservationType::Entry,
            Utc::now(),
        );
        let value = serde_json::to_value(&obs).unwrap();
        assert_eq!(value["type"], "entry");
        assert!(value.get("emotionScores").is_none());
    }
}
