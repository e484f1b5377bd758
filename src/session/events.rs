//! Notifications pushed to whoever renders the session.
//!
//! Mirrors a toast + state-sync model: `StateChanged` carries a full snapshot
//! after every mutation, `Notice` carries one user-facing message.

use serde::Serialize;
use tokio::sync::broadcast;

use super::state::{Connectivity, SessionSnapshot};

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum NoticeKind {
    BackendUnavailable,
    BackendConnected,
    ConnectionFailed,
    BackendDisconnected,
    DetectionFailed,
    EmotionCaptured,
    PhotoDetected,
    DemographicsUnavailable,
    SatisfactionComplete,
    IncompleteJourney,
    ComparisonFailed,
    SessionReset,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub description: String,
    pub destructive: bool,
}

impl Notice {
    pub fn info(kind: NoticeKind, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            description: description.into(),
            destructive: false,
        }
    }

    pub fn destructive(
        kind: NoticeKind,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            destructive: true,
            ..Self::info(kind, title, description)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum SessionEvent {
    StateChanged(SessionSnapshot),
    ConnectivityChanged(Connectivity),
    Notice(Notice),
    /// An exit with a negative emotion; needs staff attention.
    UnhappyExit { emotion: String },
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Fire and forget; nobody listening is not an error.
    pub fn emit(&self, event: SessionEvent) {
        let _ = self.sender.send(event);
    }

    pub fn notify(&self, notice: Notice) {
        self.emit(SessionEvent::Notice(notice));
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
