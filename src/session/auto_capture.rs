use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::controller::SessionController;

const ENABLE_LOGS: bool = true;
const LOG_TAG: &str = "auto-capture";

use crate::{log_debug, log_info};

/// Owns the periodic ambient-capture task. At most one task runs at a time;
/// stopping cancels its token and waits for it to exit.
///
/// The task keeps a `SessionController` clone alive until stopped, so the
/// owning session must be shut down explicitly.
pub struct AutoCaptureController {
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl AutoCaptureController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Returns false if a task is already running.
    pub fn start(&mut self, session: SessionController, period: Duration) -> bool {
        if self.handle.is_some() {
            return false;
        }

        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(auto_capture_loop(session, period, cancel_token.clone()));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        log_info!("started, period {}ms", period.as_millis());
        true
    }

    /// In-flight inference spawned by an earlier tick is left to finish.
    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("auto-capture task failed to join")?;
            log_info!("stopped");
        }
        Ok(())
    }
}

impl Default for AutoCaptureController {
    fn default() -> Self {
        Self::new()
    }
}

async fn auto_capture_loop(
    session: SessionController,
    period: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if session.is_busy() {
                    log_debug!("tick dropped, inference still in flight");
                    continue;
                }
                // Detached so a slow backend never stalls the timer.
                let session = session.clone();
                tokio::spawn(async move {
                    if let Err(err) = session.detect_current().await {
                        log_debug!("ambient capture failed: {err}");
                    }
                });
            }
            _ = cancel_token.cancelled() => {
                log_debug!("loop shutting down");
                break;
            }
        }
    }
}
