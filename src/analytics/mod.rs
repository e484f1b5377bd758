//! Aggregates over the observation history for dashboards and reports.

mod distribution;
mod heatmap;
mod types;

pub use distribution::emotion_distribution;
pub use heatmap::hourly_heatmap;
pub use types::{EmotionDistribution, EmotionShare, HourRow, TRACKED_EMOTIONS};
