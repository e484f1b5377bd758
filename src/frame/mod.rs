//! Frame capture: still images handed to the inference pipeline.

pub mod photo;

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

pub use photo::{PhotoSource, StillFileSource};

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "frame";

use crate::log_info;

/// One still image, encoded (JPEG after normalisation). Owned by the capture
/// that produced it and dropped once its inference request settles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureFrame {
    bytes: Vec<u8>,
    captured_at: DateTime<Utc>,
}

impl CaptureFrame {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            captured_at: Utc::now(),
        }
    }

    /// Accepts raw base64 or a `data:<mime>;base64,<payload>` URL.
    pub fn from_data_url(data: &str) -> Result<Self> {
        let payload = strip_data_url(data);
        let bytes = STANDARD
            .decode(payload.trim())
            .context("frame is not valid base64")?;
        if bytes.is_empty() {
            return Err(anyhow!("frame is empty"));
        }
        Ok(Self::new(bytes))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

/// Drops everything up to the first comma of a data URL. Plain base64 passes
/// through untouched.
pub fn strip_data_url(data: &str) -> &str {
    if data.starts_with("data:") {
        data.split_once(',').map(|(_, payload)| payload).unwrap_or("")
    } else {
        data
    }
}

#[async_trait]
pub trait FrameSource: Send + Sync {
    async fn current_frame(&self) -> Result<CaptureFrame>;

    fn describe(&self) -> String;
}

/// Holds the active frame source. Selecting a new one drops the previous
/// source, which releases whatever device or file it held.
#[derive(Clone, Default)]
pub struct FrameSlot {
    active: Arc<Mutex<Option<Arc<dyn FrameSource>>>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn select(&self, source: Arc<dyn FrameSource>) {
        let mut guard = self.active.lock().await;
        if let Some(previous) = guard.replace(source.clone()) {
            log_info!(
                "released {} in favour of {}",
                previous.describe(),
                source.describe()
            );
        } else {
            log_info!("selected {}", source.describe());
        }
    }

    pub async fn release(&self) {
        if let Some(previous) = self.active.lock().await.take() {
            log_info!("released {}", previous.describe());
        }
    }

    pub async fn is_selected(&self) -> bool {
        self.active.lock().await.is_some()
    }

    /// Captures from the active source, or `None` when nothing is selected.
    pub async fn capture(&self) -> Option<Result<CaptureFrame>> {
        let source = self.active.lock().await.clone()?;
        Some(source.current_frame().await)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Fixed-bytes source for pipeline tests.
    pub struct StaticSource(pub Vec<u8>);

    #[async_trait]
    impl FrameSource for StaticSource {
        async fn current_frame(&self) -> Result<CaptureFrame> {
            Ok(CaptureFrame::new(self.0.clone()))
        }

        fn describe(&self) -> String {
            "static frame".into()
        }
    }
}
