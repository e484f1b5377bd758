//! Request and response bodies exchanged with the inference service.
//!
//! Field names follow the service's snake_case JSON, not the camelCase used
//! for snapshots handed to the presentation layer.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{EmotionObservation, EmotionScores, ObservationType, SatisfactionResult};

pub const PROBE_PATH: &str = "/docs";
pub const DETECT_FACE_PATH: &str = "/detect-face";
pub const ANALYZE_EMOTION_PATH: &str = "/analyze_emotion";
pub const COMPARE_EMOTION_PATH: &str = "/compare-emotion";
pub const EMOTION_LOG_PATH: &str = "/emotion-log";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImagePayload {
    pub image_base64: String,
    pub method: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FaceDetectResponse {
    #[serde(default)]
    pub face_crop_base64: Option<String>,
}

impl FaceDetectResponse {
    pub fn with_crop(crop: impl Into<String>) -> Self {
        Self {
            face_crop_base64: Some(crop.into()),
        }
    }

    /// The crop, if the service found a face. Empty strings count as "no face".
    pub fn crop(&self) -> Option<&str> {
        self.face_crop_base64
            .as_deref()
            .map(str::trim)
            .filter(|crop| !crop.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmotionAnalysisResponse {
    pub emotion: String,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub emotion_scores: Option<EmotionScores>,
    /// Everything else the classifier sent (demographics live here).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EmotionAnalysisResponse {
    pub fn new(emotion: impl Into<String>, confidence: Option<f64>) -> Self {
        Self {
            emotion: emotion.into(),
            confidence,
            emotion_scores: None,
            extra: Map::new(),
        }
    }

    /// The whole response as untyped JSON, for demographic lookup.
    pub fn as_value(&self) -> Value {
        let mut map = self.extra.clone();
        map.insert("emotion".into(), Value::String(self.emotion.clone()));
        if let Some(confidence) = self.confidence {
            map.insert("confidence".into(), Value::from(confidence));
        }
        Value::Object(map)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompareRequest {
    pub entry: String,
    pub exit: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompareResponse {
    #[serde(default)]
    pub satisfaction: Option<String>,
    #[serde(default)]
    pub delta: Option<String>,
}

impl From<CompareResponse> for SatisfactionResult {
    fn from(response: CompareResponse) -> Self {
        let fallback = SatisfactionResult::unknown();
        SatisfactionResult {
            satisfaction: response
                .satisfaction
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(fallback.satisfaction),
            delta: response
                .delta
                .filter(|d| !d.trim().is_empty())
                .unwrap_or(fallback.delta),
        }
    }
}

/// One row of the remote emotion log. Fields are optional so a single bad
/// row does not reject the whole log.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LogRecord {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub emotion: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub emotion_scores: Option<EmotionScores>,
}

impl LogRecord {
    /// Decodes one untyped log row. Wrongly typed fields or missing values
    /// reject only this row.
    pub fn parse_row(row: Value) -> Option<EmotionObservation> {
        serde_json::from_value::<LogRecord>(row)
            .ok()?
            .into_observation()
    }

    pub fn into_observation(self) -> Option<EmotionObservation> {
        let emotion = self.emotion.filter(|e| !e.trim().is_empty())?;
        let kind = ObservationType::parse(self.kind.as_deref()?)?;
        let timestamp = parse_timestamp(self.timestamp.as_deref()?)?;
        Some(EmotionObservation::new(
            emotion,
            self.confidence,
            self.emotion_scores,
            kind,
            timestamp,
        ))
    }
}

impl From<&EmotionObservation> for LogRecord {
    fn from(obs: &EmotionObservation) -> Self {
        Self {
            timestamp: Some(obs.timestamp.to_rfc3339()),
            emotion: Some(obs.emotion.clone()),
            confidence: Some(obs.confidence),
            kind: Some(obs.kind.as_str().to_string()),
            emotion_scores: obs.emotion_scores.clone(),
        }
    }
}

/// RFC 3339 first; naive timestamps (as written by Python's `isoformat()`)
/// are read as UTC.
fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|naive| naive.and_utc())
}
