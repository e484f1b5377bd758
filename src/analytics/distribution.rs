use std::collections::BTreeMap;

use super::types::{EmotionDistribution, EmotionShare};
use crate::models::{EmotionObservation, ObservationType};

fn percent(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 * 100.0 / total as f64
    }
}

/// Per-emotion counts and shares plus journey tallies. Labels are lowercased
/// before counting.
pub fn emotion_distribution(history: &[EmotionObservation]) -> EmotionDistribution {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut entry_count = 0;
    let mut exit_count = 0;
    let mut unhappy_exits = 0;

    for observation in history {
        *counts
            .entry(observation.emotion.trim().to_lowercase())
            .or_default() += 1;
        match observation.kind {
            ObservationType::Entry => entry_count += 1,
            ObservationType::Exit => exit_count += 1,
            ObservationType::Ambient => {}
        }
        if observation.is_unhappy_exit() {
            unhappy_exits += 1;
        }
    }

    let total = history.len();
    let happy_percent = percent(counts.get("happy").copied().unwrap_or(0), total);

    let mut shares: Vec<EmotionShare> = counts
        .into_iter()
        .map(|(emotion, count)| EmotionShare {
            emotion,
            count,
            percent: percent(count, total),
        })
        .collect();
    // stable sort keeps the BTreeMap's alphabetical order among ties
    shares.sort_by(|a, b| b.count.cmp(&a.count));

    EmotionDistribution {
        total,
        shares,
        happy_percent,
        entry_count,
        exit_count,
        unhappy_exits,
    }
}
