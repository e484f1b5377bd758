use thiserror::Error;

use crate::backend::BackendError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("inference backend is not connected")]
    BackendUnavailable,
    #[error("no face detected in image")]
    NoFaceDetected,
    #[error("face detection failed: {0}")]
    FaceDetectionFailed(#[source] BackendError),
    #[error("emotion analysis failed: {0}")]
    EmotionAnalysisFailed(#[source] BackendError),
    #[error("backend comparison failed: {0}")]
    BackendComparisonFailed(#[source] BackendError),
    #[error("capture both entry and exit emotions first")]
    IncompleteJourney,
    #[error("no frame source selected")]
    NoFrameSource,
    #[error("frame capture failed: {0:#}")]
    FrameCapture(anyhow::Error),
}
