//! Test double with queued responses and per-endpoint call counters.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{
    BackendError, CompareRequest, CompareResponse, EmotionAnalysisResponse, FaceDetectResponse,
    ImagePayload, InferenceBackend,
};

#[derive(Default)]
pub struct Calls {
    pub probe: AtomicUsize,
    pub detect: AtomicUsize,
    pub analyze: AtomicUsize,
    pub compare: AtomicUsize,
    pub log: AtomicUsize,
}

impl Calls {
    pub fn detect(&self) -> usize {
        self.detect.load(Ordering::SeqCst)
    }
    pub fn analyze(&self) -> usize {
        self.analyze.load(Ordering::SeqCst)
    }
    pub fn compare(&self) -> usize {
        self.compare.load(Ordering::SeqCst)
    }
    pub fn probe(&self) -> usize {
        self.probe.load(Ordering::SeqCst)
    }
    pub fn log(&self) -> usize {
        self.log.load(Ordering::SeqCst)
    }
    pub fn network(&self) -> usize {
        self.probe() + self.detect() + self.analyze() + self.compare() + self.log()
    }
}

#[derive(Default)]
pub struct ScriptedBackend {
    pub calls: Calls,
    reachable: Mutex<HashSet<String>>,
    faces: Mutex<VecDeque<Result<FaceDetectResponse, BackendError>>>,
    emotions: Mutex<VecDeque<Result<EmotionAnalysisResponse, BackendError>>>,
    comparisons: Mutex<VecDeque<Result<CompareResponse, BackendError>>>,
    log: Mutex<Option<Result<Vec<Value>, BackendError>>>,
    detect_delay: Mutex<Option<Duration>>,
    payloads: Mutex<Vec<ImagePayload>>,
}

impl ScriptedBackend {
    pub fn reachable(urls: &[&str]) -> Self {
        let backend = Self::default();
        backend.set_reachable(urls);
        backend
    }

    pub fn set_reachable(&self, urls: &[&str]) {
        *self.reachable.lock().unwrap() = urls.iter().map(|u| u.to_string()).collect();
    }

    pub fn push_face(&self, response: Result<FaceDetectResponse, BackendError>) {
        self.faces.lock().unwrap().push_back(response);
    }

    pub fn push_emotion(&self, response: Result<EmotionAnalysisResponse, BackendError>) {
        self.emotions.lock().unwrap().push_back(response);
    }

    pub fn push_comparison(&self, response: Result<CompareResponse, BackendError>) {
        self.comparisons.lock().unwrap().push_back(response);
    }

    pub fn set_log(&self, response: Result<Vec<Value>, BackendError>) {
        *self.log.lock().unwrap() = Some(response);
    }

    pub fn set_detect_delay(&self, delay: Duration) {
        *self.detect_delay.lock().unwrap() = Some(delay);
    }

    pub fn payloads(&self) -> Vec<ImagePayload> {
        self.payloads.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceBackend for ScriptedBackend {
    async fn probe(&self, base_url: &str) -> Result<(), BackendError> {
        self.calls.probe.fetch_add(1, Ordering::SeqCst);
        if self.reachable.lock().unwrap().contains(base_url) {
            Ok(())
        } else {
            Err(BackendError::Transport("connection refused".into()))
        }
    }

    async fn detect_face(
        &self,
        _base_url: &str,
        payload: &ImagePayload,
    ) -> Result<FaceDetectResponse, BackendError> {
        self.calls.detect.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().unwrap().push(payload.clone());
        let delay = *self.detect_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let next = self.faces.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(FaceDetectResponse::with_crop("crop")))
    }

    async fn analyze_emotion(
        &self,
        _base_url: &str,
        payload: &ImagePayload,
    ) -> Result<EmotionAnalysisResponse, BackendError> {
        self.calls.analyze.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().unwrap().push(payload.clone());
        let next = self.emotions.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(EmotionAnalysisResponse::new("neutral", Some(0.6))))
    }

    async fn compare_emotion(
        &self,
        _base_url: &str,
        _request: &CompareRequest,
    ) -> Result<CompareResponse, BackendError> {
        self.calls.compare.fetch_add(1, Ordering::SeqCst);
        let next = self.comparisons.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(CompareResponse::default()))
    }

    async fn emotion_log(&self, _base_url: &str) -> Result<Vec<Value>, BackendError> {
        self.calls.log.fetch_add(1, Ordering::SeqCst);
        self.log
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Ok(Vec::new()))
    }
}
