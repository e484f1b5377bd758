use chrono::{TimeZone, Timelike};

use super::types::{HourRow, TRACKED_EMOTIONS};
use crate::models::EmotionObservation;

/// Counts observations per local hour of day and tracked emotion.
///
/// Always returns 24 rows. Labels outside `TRACKED_EMOTIONS` are ignored and
/// matching is case-insensitive.
pub fn hourly_heatmap<Tz: TimeZone>(history: &[EmotionObservation], tz: &Tz) -> Vec<HourRow> {
    let mut rows: Vec<HourRow> = (0..24).map(HourRow::empty).collect();

    for observation in history {
        let Some(column) = TRACKED_EMOTIONS
            .iter()
            .position(|tracked| tracked.eq_ignore_ascii_case(observation.emotion.trim()))
        else {
            continue;
        };
        let hour = observation.timestamp.with_timezone(tz).hour() as usize;
        rows[hour].counts[column] += 1;
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ObservationType;
    use chrono::{FixedOffset, TimeZone, Utc};

    fn at(hour: u32, emotion: &str) -> EmotionObservation {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, hour, 15, 0).unwrap();
        EmotionObservation::new(emotion, Some(0.9), None, ObservationType::Exit, ts)
    }

    #[test]
    fn buckets_by_hour_and_emotion() {
        let history = vec![
            at(9, "happy"),
            at(9, "Happy"),
            at(9, "sad"),
            at(17, "contempt"),
            at(17, "bored"),
        ];
        let rows = hourly_heatmap(&history, &Utc);

        assert_eq!(rows.len(), 24);
        assert_eq!(rows[0].hour, "00");
        assert_eq!(rows[23].hour, "23");
        assert_eq!(rows[9].count("happy"), 2);
        assert_eq!(rows[9].count("sad"), 1);
        assert_eq!(rows[17].count("contempt"), 1);
        assert_eq!(rows[17].total(), 1);
        assert_eq!(rows.iter().map(HourRow::total).sum::<u32>(), 4);
    }

    #[test]
    fn hours_follow_the_given_zone() {
        let history = vec![at(23, "neutral")];
        let plus_two = FixedOffset::east_opt(2 * 3600).unwrap();
        let rows = hourly_heatmap(&history, &plus_two);

        assert_eq!(rows[1].count("neutral"), 1);
        assert_eq!(rows[23].total(), 0);
    }
}
