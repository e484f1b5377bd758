//! Client side of the remote inference service.
//!
//! `InferenceBackend` is the seam between the session pipeline and the
//! network. Every call takes the base URL explicitly because the connectivity
//! monitor decides at runtime which candidate is reachable.

pub mod error;
pub mod http;
pub mod offline;
#[cfg(test)]
pub(crate) mod scripted;
pub mod wire;

use async_trait::async_trait;
use serde_json::Value;

pub use error::BackendError;
pub use http::HttpBackend;
pub use offline::OfflineBackend;
pub use wire::{
    CompareRequest, CompareResponse, EmotionAnalysisResponse, FaceDetectResponse, ImagePayload,
    LogRecord,
};

#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Lightweight reachability check against a known-present endpoint.
    async fn probe(&self, base_url: &str) -> Result<(), BackendError>;

    async fn detect_face(
        &self,
        base_url: &str,
        payload: &ImagePayload,
    ) -> Result<FaceDetectResponse, BackendError>;

    async fn analyze_emotion(
        &self,
        base_url: &str,
        payload: &ImagePayload,
    ) -> Result<EmotionAnalysisResponse, BackendError>;

    async fn compare_emotion(
        &self,
        base_url: &str,
        request: &CompareRequest,
    ) -> Result<CompareResponse, BackendError>;

    /// Raw log rows. Rows are validated one by one with `LogRecord::parse_row`
    /// so a single malformed row never rejects the whole log.
    async fn emotion_log(&self, base_url: &str) -> Result<Vec<Value>, BackendError>;
}

pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

#[cfg(test)]
mod tests {
    use super::endpoint;

    #[test]
    fn endpoint_joins_without_double_slash() {
        assert_eq!(
            endpoint("http://localhost:8000/", "/docs"),
            "http://localhost:8000/docs"
        );
        assert_eq!(
            endpoint("http://127.0.0.1:8000", "/emotion-log"),
            "http://127.0.0.1:8000/emotion-log"
        );
    }
}
