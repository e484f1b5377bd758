use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header, Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{
    endpoint,
    wire::{
        ANALYZE_EMOTION_PATH, COMPARE_EMOTION_PATH, DETECT_FACE_PATH, EMOTION_LOG_PATH, PROBE_PATH,
    },
    BackendError, CompareRequest, CompareResponse, EmotionAnalysisResponse, FaceDetectResponse,
    ImagePayload, InferenceBackend,
};

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "http";

use crate::log_debug;

/// `InferenceBackend` over HTTP/JSON.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    probe_timeout: Duration,
}

impl HttpBackend {
    pub fn new(request_timeout: Duration, probe_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self::with_client(client, probe_timeout))
    }

    fn with_client(client: Client, probe_timeout: Duration) -> Self {
        Self {
            client,
            probe_timeout,
        }
    }

    async fn post_json<B, T>(&self, url: String, body: &B) -> Result<T, BackendError>
    where
        B: serde::Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        log_debug!("POST {url}");
        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await?;
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let status = response.status();
    if !status.is_success() {
        return Err(BackendError::Status(status.as_u16()));
    }
    let bytes = response.bytes().await?;
    // An empty 2xx body decodes like `{}` so optional-only shapes still succeed.
    let body: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        &bytes
    };
    serde_json::from_slice(body).map_err(|err| BackendError::Decode(err.to_string()))
}

#[async_trait]
impl InferenceBackend for HttpBackend {
    async fn probe(&self, base_url: &str) -> Result<(), BackendError> {
        let url = endpoint(base_url, PROBE_PATH);
        log_debug!("GET {url}");
        let response = self
            .client
            .get(&url)
            .timeout(self.probe_timeout)
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(BackendError::Status(response.status().as_u16()))
        }
    }

    async fn detect_face(
        &self,
        base_url: &str,
        payload: &ImagePayload,
    ) -> Result<FaceDetectResponse, BackendError> {
        self.post_json(endpoint(base_url, DETECT_FACE_PATH), payload)
            .await
    }

    async fn analyze_emotion(
        &self,
        base_url: &str,
        payload: &ImagePayload,
    ) -> Result<EmotionAnalysisResponse, BackendError> {
        self.post_json(endpoint(base_url, ANALYZE_EMOTION_PATH), payload)
            .await
    }

    async fn compare_emotion(
        &self,
        base_url: &str,
        request: &CompareRequest,
    ) -> Result<CompareResponse, BackendError> {
        self.post_json(endpoint(base_url, COMPARE_EMOTION_PATH), request)
            .await
    }

    async fn emotion_log(&self, base_url: &str) -> Result<Vec<Value>, BackendError> {
        let url = endpoint(base_url, EMOTION_LOG_PATH);
        log_debug!("GET {url}");
        let response = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;
        decode(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LogRecord;
    use crate::models::SatisfactionResult;
    use crate::session::{Connectivity, SessionController};
    use crate::settings::PipelineSettings;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn backend() -> HttpBackend {
        let client = Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        HttpBackend::with_client(client, Duration::from_secs(2))
    }

    fn payload() -> ImagePayload {
        ImagePayload {
            image_base64: "QUJD".into(),
            method: "deepface".into(),
        }
    }

    /// Reads one request (headers plus any Content-Length body).
    async fn read_request(socket: &mut TcpStream) -> String {
        let mut raw = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&raw).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let body_len = text[..end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if raw.len() >= end + 4 + body_len {
                    return text;
                }
            }
        }
        String::from_utf8_lossy(&raw).to_string()
    }

    /// Answers a single request with a canned response. Yields the base URL
    /// and the request line that was received.
    async fn serve_once(
        status: &'static str,
        body: &'static str,
    ) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            request.lines().next().unwrap_or_default().to_string()
        });
        (format!("http://{addr}"), handle)
    }

    #[tokio::test]
    async fn empty_comparison_body_becomes_unknown() {
        let (url, server) = serve_once("200 OK", "").await;
        let request = CompareRequest {
            entry: "happy".into(),
            exit: "sad".into(),
        };

        let response = backend().compare_emotion(&url, &request).await.unwrap();
        let result: SatisfactionResult = response.into();

        assert_eq!(result, SatisfactionResult::unknown());
        assert_eq!(server.await.unwrap(), "POST /compare-emotion HTTP/1.1");
    }

    #[tokio::test]
    async fn server_error_maps_to_status() {
        let (url, server) = serve_once("500 Internal Server Error", r#"{"detail":"boom"}"#).await;

        let result = backend().detect_face(&url, &payload()).await;

        assert_eq!(result, Err(BackendError::Status(500)));
        assert_eq!(server.await.unwrap(), "POST /detect-face HTTP/1.1");
    }

    #[tokio::test]
    async fn face_crop_is_decoded() {
        let (url, _server) = serve_once("200 OK", r#"{"face_crop_base64":"Q1JPUA=="}"#).await;

        let face = backend().detect_face(&url, &payload()).await.unwrap();
        assert_eq!(face.crop(), Some("Q1JPUA=="));
    }

    #[tokio::test]
    async fn probe_needs_success_status() {
        let (url, server) = serve_once("404 Not Found", "").await;
        assert_eq!(backend().probe(&url).await, Err(BackendError::Status(404)));
        assert_eq!(server.await.unwrap(), "GET /docs HTTP/1.1");

        let (url, _server) = serve_once("200 OK", "<html></html>").await;
        assert!(backend().probe(&url).await.is_ok());
    }

    #[tokio::test]
    async fn failed_probe_leaves_session_disconnected() {
        let (url, _server) = serve_once("503 Service Unavailable", "").await;
        let settings = PipelineSettings {
            backend_urls: vec![url],
            ..PipelineSettings::default()
        };
        let controller = SessionController::new(Arc::new(backend()), &settings);

        assert!(!controller.check_connection().await);
        let state = controller.snapshot().await.state;
        assert_eq!(state.connectivity, Connectivity::Disconnected);
        assert!(state.backend_url.is_none());
    }

    #[tokio::test]
    async fn log_rows_survive_a_bad_neighbour() {
        let body = r#"[
            {"timestamp":"2024-05-01T10:00:00Z","emotion":"happy","confidence":0.9,"type":"entry"},
            {"timestamp":1714557600,"emotion":"sad","confidence":"high","type":"exit"}
        ]"#;
        let (url, server) = serve_once("200 OK", body).await;

        let rows = backend().emotion_log(&url).await.unwrap();
        assert_eq!(rows.len(), 2);
        let parsed: Vec<_> = rows.into_iter().filter_map(LogRecord::parse_row).collect();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].emotion, "happy");
        assert_eq!(server.await.unwrap(), "GET /emotion-log HTTP/1.1");
    }
}
