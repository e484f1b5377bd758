//! Local stand-in for the inference service.
//!
//! Useful for demos and UI work without a running model server: the face
//! stage echoes the frame, the emotion stage draws a plausible label, and the
//! comparison applies a simple positive/negative rule.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use serde_json::Value;

use super::{
    BackendError, CompareRequest, CompareResponse, EmotionAnalysisResponse, FaceDetectResponse,
    ImagePayload, InferenceBackend, LogRecord,
};
use crate::models::{EmotionObservation, EmotionScores};

const SIMULATED_EMOTIONS: [&str; 5] = ["happy", "neutral", "surprise", "sad", "angry"];
const POSITIVE_EMOTIONS: [&str; 4] = ["happy", "surprise", "surprised", "neutral"];
const LOG_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy)]
struct Latency {
    detect: Duration,
    analyze: Duration,
    compare: Duration,
}

impl Latency {
    fn none() -> Self {
        Self {
            detect: Duration::ZERO,
            analyze: Duration::ZERO,
            compare: Duration::ZERO,
        }
    }

    fn realistic() -> Self {
        Self {
            detect: Duration::from_millis(500),
            analyze: Duration::from_millis(800),
            compare: Duration::from_millis(300),
        }
    }
}

pub struct OfflineBackend {
    latency: Latency,
    log: Mutex<Vec<LogRecord>>,
}

impl OfflineBackend {
    pub fn new() -> Self {
        Self {
            latency: Latency::none(),
            log: Mutex::new(Vec::new()),
        }
    }

    /// Adds the response delays a real model server typically shows.
    pub fn with_realistic_latency(mut self) -> Self {
        self.latency = Latency::realistic();
        self
    }

    /// Records an observation in the simulated remote log, newest first.
    pub fn record(&self, observation: &EmotionObservation) {
        let mut log = match self.log.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        log.insert(0, LogRecord::from(observation));
        log.truncate(LOG_CAPACITY);
    }

    pub fn verdict(entry: &str, exit: &str) -> CompareResponse {
        let entry_positive = is_positive(entry);
        let exit_positive = is_positive(exit);

        let satisfaction = match (entry_positive, exit_positive) {
            (false, true) => "Improved Experience",
            (true, true) => "Satisfied",
            (_, false) => "Unhappy Exit",
        };

        CompareResponse {
            satisfaction: Some(satisfaction.to_string()),
            delta: Some(format!("{entry} → {exit}")),
        }
    }
}

impl Default for OfflineBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn is_positive(emotion: &str) -> bool {
    let emotion = emotion.trim();
    POSITIVE_EMOTIONS
        .iter()
        .any(|positive| positive.eq_ignore_ascii_case(emotion))
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[async_trait]
impl InferenceBackend for OfflineBackend {
    async fn probe(&self, _base_url: &str) -> Result<(), BackendError> {
        Ok(())
    }

    async fn detect_face(
        &self,
        _base_url: &str,
        payload: &ImagePayload,
    ) -> Result<FaceDetectResponse, BackendError> {
        pause(self.latency.detect).await;
        Ok(FaceDetectResponse::with_crop(payload.image_base64.clone()))
    }

    async fn analyze_emotion(
        &self,
        _base_url: &str,
        _payload: &ImagePayload,
    ) -> Result<EmotionAnalysisResponse, BackendError> {
        pause(self.latency.analyze).await;

        let (emotion, confidence) = {
            let mut rng = rand::thread_rng();
            let emotion = SIMULATED_EMOTIONS[rng.gen_range(0..SIMULATED_EMOTIONS.len())];
            (emotion, rng.gen_range(0.75..0.95))
        };

        let mut scores = EmotionScores::new();
        let remainder = (1.0 - confidence) * 100.0 / (SIMULATED_EMOTIONS.len() - 1) as f64;
        for label in SIMULATED_EMOTIONS {
            let score = if label == emotion {
                confidence * 100.0
            } else {
                remainder
            };
            scores.insert(label.to_string(), score);
        }

        let mut response = EmotionAnalysisResponse::new(emotion, Some(confidence));
        response.emotion_scores = Some(scores);
        Ok(response)
    }

    async fn compare_emotion(
        &self,
        _base_url: &str,
        request: &CompareRequest,
    ) -> Result<CompareResponse, BackendError> {
        pause(self.latency.compare).await;
        Ok(Self::verdict(&request.entry, &request.exit))
    }

    async fn emotion_log(&self, _base_url: &str) -> Result<Vec<Value>, BackendError> {
        let log = match self.log.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        log.iter()
            .map(|record| {
                serde_json::to_value(record).map_err(|err| BackendError::Decode(err.to_string()))
            })
            .collect()
    }
}
