use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    Demographics, EmotionObservation, EmotionScores, ObservationType, SatisfactionResult,
};

/// Maximum number of observations kept in memory.
pub const HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Connectivity {
    Connected,
    Disconnected,
    Checking,
}

impl Default for Connectivity {
    fn default() -> Self {
        Connectivity::Checking
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub journey_id: String,
    pub current_emotion: Option<String>,
    pub current_confidence: f64,
    pub current_scores: Option<EmotionScores>,
    pub entry_emotion: Option<String>,
    pub exit_emotion: Option<String>,
    pub satisfaction: Option<SatisfactionResult>,
    pub demographics: Demographics,
    /// Newest first, never longer than `HISTORY_LIMIT`.
    pub history: Vec<EmotionObservation>,
    pub unhappy_count: u32,
    pub connectivity: Connectivity,
    pub backend_url: Option<String>,
    pub auto_capture_enabled: bool,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            journey_id: Uuid::new_v4().to_string(),
            current_emotion: None,
            current_confidence: 0.0,
            current_scores: None,
            entry_emotion: None,
            exit_emotion: None,
            satisfaction: None,
            demographics: Demographics::default(),
            history: Vec::with_capacity(HISTORY_LIMIT),
            unhappy_count: 0,
            connectivity: Connectivity::Checking,
            backend_url: None,
            auto_capture_enabled: false,
        }
    }
}

/// What an applied observation changed beyond the live display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservationOutcome {
    pub recorded: bool,
    pub unhappy_exit: bool,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.connectivity == Connectivity::Connected
    }

    pub fn append_observation(&mut self, observation: EmotionObservation) {
        self.history.insert(0, observation);
        self.history.truncate(HISTORY_LIMIT);
    }

    /// Full resync: the remote log replaces local history.
    pub fn replace_history(&mut self, mut observations: Vec<EmotionObservation>) {
        observations.truncate(HISTORY_LIMIT);
        self.history = observations;
    }

    /// Applies a successful inference pass.
    pub fn apply_observation(
        &mut self,
        observation: &EmotionObservation,
        demographics: Demographics,
    ) -> ObservationOutcome {
        self.current_emotion = Some(observation.emotion.clone());
        self.current_confidence = observation.confidence;
        self.current_scores = observation.emotion_scores.clone();
        if !demographics.is_empty() {
            self.demographics = demographics;
        }

        match observation.kind {
            ObservationType::Entry => self.entry_emotion = Some(observation.emotion.clone()),
            ObservationType::Exit => self.exit_emotion = Some(observation.emotion.clone()),
            ObservationType::Ambient => {
                return ObservationOutcome {
                    recorded: false,
                    unhappy_exit: false,
                }
            }
        }
        self.append_observation(observation.clone());

        let unhappy_exit = observation.is_unhappy_exit();
        if unhappy_exit {
            self.unhappy_count = self.unhappy_count.saturating_add(1);
        }

        ObservationOutcome {
            recorded: true,
            unhappy_exit,
        }
    }

    /// Returns true if connectivity actually changed.
    pub fn set_connectivity(&mut self, connectivity: Connectivity, backend_url: Option<String>) -> bool {
        let changed = self.connectivity != connectivity;
        self.connectivity = connectivity;
        match connectivity {
            Connectivity::Connected => self.backend_url = backend_url,
            Connectivity::Disconnected => self.backend_url = None,
            Connectivity::Checking => {}
        }
        if connectivity == Connectivity::Disconnected {
            self.auto_capture_enabled = false;
        }
        changed
    }

    /// Clears the customer journey. History, the unhappy counter and
    /// connectivity survive.
    pub fn reset(&mut self) {
        self.journey_id = Uuid::new_v4().to_string();
        self.current_emotion = None;
        self.current_confidence = 0.0;
        self.current_scores = None;
        self.entry_emotion = None;
        self.exit_emotion = None;
        self.satisfaction = None;
        self.auto_capture_enabled = false;
    }

    pub fn snapshot(&self, busy: bool) -> SessionSnapshot {
        SessionSnapshot {
            state: self.clone(),
            busy,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    #[serde(flatten)]
    pub state: SessionState,
    pub busy: bool,
}
