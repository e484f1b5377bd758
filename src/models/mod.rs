pub mod demographics;
pub mod observation;
pub mod satisfaction;

pub use demographics::{extract_demographics, Demographics};
pub use observation::{
    is_negative_emotion, EmotionObservation, EmotionScores, ObservationType, DEFAULT_CONFIDENCE,
    NEGATIVE_EMOTIONS,
};
pub use satisfaction::SatisfactionResult;
