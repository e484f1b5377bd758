use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};

use crate::{
    backend::{BackendError, CompareRequest, ImagePayload, InferenceBackend, LogRecord},
    frame::{CaptureFrame, FrameSlot, FrameSource},
    models::{extract_demographics, Demographics, EmotionObservation, ObservationType, SatisfactionResult},
    settings::{InferenceMethod, PipelineSettings},
};

use super::{
    auto_capture::AutoCaptureController,
    error::SessionError,
    events::{EventBus, Notice, NoticeKind, SessionEvent},
    state::{Connectivity, SessionSnapshot, SessionState},
};

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "session";

use crate::{log_debug, log_error, log_info, log_warn};

/// Marks one inference as in flight; the flag drops back on every exit path.
struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl BusyGuard {
    fn try_acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag: flag.clone() })
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Handle to one capture session. Clones share the same state.
///
/// A running auto-capture task holds its own clone, so dropping every handle
/// does not stop it. Call [`SessionController::shutdown`] when done.
#[derive(Clone)]
pub struct SessionController {
    state: Arc<Mutex<SessionState>>,
    busy: Arc<AtomicBool>,
    backend: Arc<dyn InferenceBackend>,
    frames: FrameSlot,
    auto_capture: Arc<Mutex<AutoCaptureController>>,
    events: EventBus,
    candidates: Arc<Vec<String>>,
    method: Arc<std::sync::RwLock<InferenceMethod>>,
    auto_capture_interval: Duration,
}

impl SessionController {
    pub fn new(backend: Arc<dyn InferenceBackend>, settings: &PipelineSettings) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState::new())),
            busy: Arc::new(AtomicBool::new(false)),
            backend,
            frames: FrameSlot::new(),
            auto_capture: Arc::new(Mutex::new(AutoCaptureController::new())),
            events: EventBus::new(),
            candidates: Arc::new(settings.backend_urls.clone()),
            method: Arc::new(std::sync::RwLock::new(settings.method)),
            auto_capture_interval: settings.auto_capture_interval(),
        }
    }

    /// Probes the backend and, when reachable, pulls the remote history.
    pub async fn start(&self) -> bool {
        let connected = self.check_connection().await;
        if connected {
            self.load_history().await;
        }
        connected
    }

    /// Stops the auto-capture task and releases the frame source. Required
    /// before the last handle is dropped while auto-capture is on.
    pub async fn shutdown(&self) {
        self.state.lock().await.auto_capture_enabled = false;
        self.stop_auto_capture_task().await;
        self.frames.release().await;
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.state.lock().await.snapshot(self.is_busy())
    }

    pub fn method(&self) -> InferenceMethod {
        *self
            .method
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_method(&self, method: InferenceMethod) {
        *self
            .method
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = method;
        log_info!("inference method set to {method}");
    }

    pub async fn select_frame_source(&self, source: Arc<dyn FrameSource>) {
        self.frames.select(source).await;
    }

    pub async fn release_frame_source(&self) {
        self.frames.release().await;
    }

    // ---- connectivity ----

    /// Probes each candidate URL in order; the first 2xx wins.
    pub async fn check_connection(&self) -> bool {
        let previous = {
            let mut state = self.state.lock().await;
            let previous = state.connectivity;
            let url = state.backend_url.clone();
            state.set_connectivity(Connectivity::Checking, url);
            previous
        };
        self.events
            .emit(SessionEvent::ConnectivityChanged(Connectivity::Checking));

        let mut reachable = None;
        for url in self.candidates.iter() {
            match self.backend.probe(url).await {
                Ok(()) => {
                    reachable = Some(url.clone());
                    break;
                }
                Err(err) => log_warn!("probe {url} failed: {err}"),
            }
        }

        let connectivity = if reachable.is_some() {
            Connectivity::Connected
        } else {
            Connectivity::Disconnected
        };

        {
            let mut state = self.state.lock().await;
            state.set_connectivity(connectivity, reachable.clone());
        }

        match (&reachable, previous) {
            (Some(url), Connectivity::Connected) => log_debug!("backend still reachable at {url}"),
            (Some(url), _) => log_info!("backend connected at {url}"),
            (None, _) => {
                log_warn!("no backend reachable among {} candidates", self.candidates.len());
                self.stop_auto_capture_task().await;
            }
        }

        self.events
            .emit(SessionEvent::ConnectivityChanged(connectivity));
        self.emit_state().await;
        reachable.is_some()
    }

    /// Manual retry. A successful reconnect resyncs history.
    pub async fn retry_connection(&self) -> bool {
        let connected = self.check_connection().await;
        if connected {
            self.events.notify(Notice::info(
                NoticeKind::BackendConnected,
                "Backend Connected",
                "Successfully connected to emotion detection server",
            ));
            self.load_history().await;
        } else {
            self.events.notify(Notice::destructive(
                NoticeKind::ConnectionFailed,
                "Connection Failed",
                format!(
                    "Make sure the inference server is running at {}",
                    self.candidates.join(" or ")
                ),
            ));
        }
        connected
    }

    // ---- history ----

    /// Replaces local history with the remote log. Returns false when skipped.
    pub async fn load_history(&self) -> bool {
        let url = {
            let state = self.state.lock().await;
            match (state.is_connected(), state.backend_url.clone()) {
                (true, Some(url)) => url,
                _ => return false,
            }
        };

        let rows = match self.backend.emotion_log(&url).await {
            Ok(rows) => rows,
            Err(err) => {
                log_warn!("history sync skipped: {err}");
                return false;
            }
        };

        let total = rows.len();
        let observations: Vec<EmotionObservation> = rows
            .into_iter()
            .filter_map(LogRecord::parse_row)
            .collect();
        if observations.len() < total {
            log_warn!(
                "skipped {} malformed history records",
                total - observations.len()
            );
        }

        self.state.lock().await.replace_history(observations);
        log_info!("history resynced from {url} ({total} records)");
        self.emit_state().await;
        true
    }

    // ---- capture & inference ----

    pub async fn capture_entry(&self) -> Result<Option<EmotionObservation>, SessionError> {
        self.capture(ObservationType::Entry).await
    }

    pub async fn capture_exit(&self) -> Result<Option<EmotionObservation>, SessionError> {
        self.capture(ObservationType::Exit).await
    }

    /// Ambient sample for the live display; what each auto-capture tick runs.
    pub async fn detect_current(&self) -> Result<Option<EmotionObservation>, SessionError> {
        self.capture(ObservationType::Ambient).await
    }

    /// Runs an uploaded photo through the pipeline with ambient semantics.
    pub async fn detect_photo(
        &self,
        frame: CaptureFrame,
    ) -> Result<Option<EmotionObservation>, SessionError> {
        let result = self.run_inference(frame, ObservationType::Ambient).await;
        if let Ok(Some(observation)) = &result {
            self.events.notify(Notice::info(
                NoticeKind::PhotoDetected,
                "Photo Emotion Detected",
                format!(
                    "Detected: {} ({:.1}%)",
                    observation.emotion,
                    observation.confidence * 100.0
                ),
            ));
        }
        result
    }

    async fn capture(
        &self,
        kind: ObservationType,
    ) -> Result<Option<EmotionObservation>, SessionError> {
        if !self.state.lock().await.is_connected() {
            return Err(self.backend_unavailable(kind).await);
        }
        if self.is_busy() {
            log_debug!("{} capture ignored, inference in flight", kind.as_str());
            return Ok(None);
        }

        let frame = match self.frames.capture().await {
            Some(Ok(frame)) => frame,
            Some(Err(err)) => {
                let err = SessionError::FrameCapture(err);
                self.report_local_failure(&err, kind).await;
                return Err(err);
            }
            None => {
                let err = SessionError::NoFrameSource;
                self.report_local_failure(&err, kind).await;
                return Err(err);
            }
        };

        self.run_inference(frame, kind).await
    }

    /// Face crop then emotion classification for one frame.
    ///
    /// Fails fast with `BackendUnavailable` (no network) when not connected
    /// and returns `Ok(None)` without doing anything while another inference
    /// is in flight. State is only touched after both stages succeed.
    pub async fn run_inference(
        &self,
        frame: CaptureFrame,
        kind: ObservationType,
    ) -> Result<Option<EmotionObservation>, SessionError> {
        let url = {
            let state = self.state.lock().await;
            match (state.is_connected(), state.backend_url.clone()) {
                (true, Some(url)) => Some(url),
                _ => None,
            }
        };
        let Some(url) = url else {
            return Err(self.backend_unavailable(kind).await);
        };

        let Some(busy) = BusyGuard::try_acquire(&self.busy) else {
            log_debug!("{} inference dropped, another is in flight", kind.as_str());
            return Ok(None);
        };
        self.emit_state().await;

        let result = match self.sequence(&url, frame, kind).await {
            Ok((observation, demographics)) => {
                self.apply_success(&observation, demographics).await;
                Ok(Some(observation))
            }
            Err(err) => {
                self.handle_failure(&err, kind).await;
                Err(err)
            }
        };

        drop(busy);
        self.emit_state().await;
        result
    }

    async fn sequence(
        &self,
        url: &str,
        frame: CaptureFrame,
        kind: ObservationType,
    ) -> Result<(EmotionObservation, Demographics), SessionError> {
        let method = self.method().as_str().to_string();
        let captured_at = frame.captured_at();
        let payload = ImagePayload {
            image_base64: frame.to_base64(),
            method: method.clone(),
        };
        drop(frame);

        let face = self
            .backend
            .detect_face(url, &payload)
            .await
            .map_err(SessionError::FaceDetectionFailed)?;
        let crop = face.crop().ok_or(SessionError::NoFaceDetected)?;

        let analysis = self
            .backend
            .analyze_emotion(
                url,
                &ImagePayload {
                    image_base64: crop.to_string(),
                    method,
                },
            )
            .await
            .map_err(SessionError::EmotionAnalysisFailed)?;

        if analysis.emotion.trim().is_empty() {
            return Err(SessionError::EmotionAnalysisFailed(BackendError::Decode(
                "response carried an empty emotion".into(),
            )));
        }

        let demographics = extract_demographics(&analysis.as_value());
        let observation = EmotionObservation::new(
            analysis.emotion,
            analysis.confidence,
            analysis.emotion_scores,
            kind,
            captured_at,
        );
        Ok((observation, demographics))
    }

    async fn apply_success(&self, observation: &EmotionObservation, demographics: Demographics) {
        let no_demographics = demographics.is_empty();
        let (outcome, quiet) = {
            let mut state = self.state.lock().await;
            let outcome = state.apply_observation(observation, demographics);
            (outcome, state.auto_capture_enabled)
        };

        log_info!(
            "{} emotion: {} ({:.1}% confidence)",
            observation.kind.as_str(),
            observation.emotion,
            observation.confidence * 100.0
        );

        if outcome.recorded {
            let title = match observation.kind {
                ObservationType::Entry => "Entry Emotion Captured",
                _ => "Exit Emotion Captured",
            };
            self.events.notify(Notice::info(
                NoticeKind::EmotionCaptured,
                title,
                format!(
                    "Customer appears {} ({:.1}% confidence)",
                    observation.emotion.to_lowercase(),
                    observation.confidence * 100.0
                ),
            ));
        } else if no_demographics && !quiet {
            self.events.notify(Notice::info(
                NoticeKind::DemographicsUnavailable,
                "No Demographic Data",
                "Could not extract age/gender from backend response.",
            ));
        }

        if outcome.unhappy_exit {
            log_warn!("unhappy departure: {}", observation.emotion);
            self.events.emit(SessionEvent::UnhappyExit {
                emotion: observation.emotion.clone(),
            });
        }
    }

    /// A failed pass can mean a dead backend or a bad frame; re-probe to tell
    /// them apart.
    async fn handle_failure(&self, err: &SessionError, kind: ObservationType) {
        log_warn!("{} inference failed: {err}", kind.as_str());

        if !self.check_connection().await {
            self.events.notify(Notice::destructive(
                NoticeKind::BackendDisconnected,
                "Backend Disconnected",
                "Backend connection lost. Please check the inference server.",
            ));
        } else if !self.state.lock().await.auto_capture_enabled {
            self.events.notify(Notice::destructive(
                NoticeKind::DetectionFailed,
                "Detection Failed",
                err.to_string(),
            ));
        }
    }

    async fn report_local_failure(&self, err: &SessionError, kind: ObservationType) {
        log_warn!("{} capture failed: {err}", kind.as_str());
        if !self.state.lock().await.auto_capture_enabled {
            self.events.notify(Notice::destructive(
                NoticeKind::DetectionFailed,
                "Detection Failed",
                err.to_string(),
            ));
        }
    }

    async fn backend_unavailable(&self, kind: ObservationType) -> SessionError {
        log_debug!("{} capture refused, backend not connected", kind.as_str());
        self.events.notify(Notice::destructive(
            NoticeKind::BackendUnavailable,
            "Backend Not Available",
            "Please start the inference server.",
        ));
        SessionError::BackendUnavailable
    }

    // ---- satisfaction ----

    /// Compares the journey's entry and exit emotions.
    pub async fn compare_satisfaction(&self) -> Result<SatisfactionResult, SessionError> {
        let (entry, exit) = {
            let state = self.state.lock().await;
            (
                state.entry_emotion.clone().unwrap_or_default(),
                state.exit_emotion.clone().unwrap_or_default(),
            )
        };
        self.compare(&entry, &exit).await
    }

    /// The backend's verdict is stored and returned verbatim.
    pub async fn compare(&self, entry: &str, exit: &str) -> Result<SatisfactionResult, SessionError> {
        if entry.trim().is_empty() || exit.trim().is_empty() {
            self.events.notify(Notice::destructive(
                NoticeKind::IncompleteJourney,
                "Incomplete Data",
                "Please capture both entry and exit emotions first.",
            ));
            return Err(SessionError::IncompleteJourney);
        }

        let url = {
            let state = self.state.lock().await;
            match (state.is_connected(), state.backend_url.clone()) {
                (true, Some(url)) => Some(url),
                _ => None,
            }
        };
        let Some(url) = url else {
            self.events.notify(Notice::destructive(
                NoticeKind::BackendUnavailable,
                "Backend Not Available",
                "Please start the inference server.",
            ));
            return Err(SessionError::BackendUnavailable);
        };

        let request = CompareRequest {
            entry: entry.to_string(),
            exit: exit.to_string(),
        };
        let result: SatisfactionResult = match self.backend.compare_emotion(&url, &request).await {
            Ok(response) => response.into(),
            Err(err) => {
                log_error!("comparison {entry} -> {exit} failed: {err}");
                self.events.notify(Notice::destructive(
                    NoticeKind::ComparisonFailed,
                    "Comparison Failed",
                    err.to_string(),
                ));
                return Err(SessionError::BackendComparisonFailed(err));
            }
        };

        self.state.lock().await.satisfaction = Some(result.clone());
        log_info!(
            "satisfaction {entry} -> {exit}: {} ({})",
            result.satisfaction,
            result.delta
        );
        self.events.notify(Notice::info(
            NoticeKind::SatisfactionComplete,
            "Satisfaction Analysis Complete",
            "Customer journey analyzed successfully",
        ));
        self.emit_state().await;
        Ok(result)
    }

    // ---- reset & auto-capture ----

    /// Starts a fresh journey. History and the unhappy counter are kept.
    pub async fn reset(&self) {
        self.state.lock().await.reset();
        self.stop_auto_capture_task().await;
        self.events.notify(Notice::info(
            NoticeKind::SessionReset,
            "Session Reset",
            "Ready for new customer analysis",
        ));
        self.emit_state().await;
    }

    pub async fn clear_demographics(&self) {
        self.state.lock().await.demographics = Demographics::default();
        self.emit_state().await;
    }

    pub async fn set_auto_capture(&self, enabled: bool) -> Result<bool, SessionError> {
        if enabled {
            {
                let mut state = self.state.lock().await;
                if !state.is_connected() {
                    return Err(SessionError::BackendUnavailable);
                }
                state.auto_capture_enabled = true;
            }
            self.auto_capture
                .lock()
                .await
                .start(self.clone(), self.auto_capture_interval);
        } else {
            self.state.lock().await.auto_capture_enabled = false;
            self.stop_auto_capture_task().await;
        }
        self.emit_state().await;
        Ok(enabled)
    }

    pub async fn toggle_auto_capture(&self) -> Result<bool, SessionError> {
        let enabled = self.state.lock().await.auto_capture_enabled;
        self.set_auto_capture(!enabled).await
    }

    async fn stop_auto_capture_task(&self) {
        if let Err(err) = self.auto_capture.lock().await.stop().await {
            log_error!("failed to stop auto-capture: {err:#}");
        }
    }

    async fn emit_state(&self) {
        let snapshot = self.snapshot().await;
        self.events.emit(SessionEvent::StateChanged(snapshot));
    }
}
