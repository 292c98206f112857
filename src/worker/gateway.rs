//! The Strategos worker-service client.
//!
//! Spawn retries transient failures with exponential backoff; validation
//! rejections fail immediately. `wait_for_done` polls until a terminal
//! status word or the caller's timeout, whichever comes first. Delete is
//! idempotent on the service side, so errors there are swallowed.

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::GatewayConfig;
use crate::error::{Error, Result};

use super::types::{SpawnRequest, WorkerId, WorkerStatus};

/// Default `wait_for_done` timeout when the caller has no phase-specific
/// budget. Pipeline phases pass 15, 30, or 45 minutes instead.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Fixed pattern matching validation rejections the service will never
/// accept on retry.
static VALIDATION_PATTERN: OnceLock<Regex> = OnceLock::new();

fn validation_pattern() -> &'static Regex {
    VALIDATION_PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(label too long|invalid template|control char|validation)")
            .expect("valid regex")
    })
}

/// Gateway to the remote worker fleet.
#[async_trait]
pub trait WorkerGateway: Send + Sync {
    /// Spawn a worker from a template. Retries transient failures.
    async fn spawn(&self, request: SpawnRequest) -> Result<WorkerId>;

    /// One status poll.
    async fn status(&self, id: &WorkerId) -> Result<WorkerStatus>;

    /// Fetch worker output, optionally limited to the last `lines` lines.
    async fn output(&self, id: &WorkerId, lines: Option<u32>) -> Result<String>;

    /// Block until the worker reaches a terminal status or the timeout
    /// elapses. Timeout is fatal; a deleted-externally worker counts as done.
    async fn wait_for_done(&self, id: &WorkerId, timeout: Duration) -> Result<WorkerStatus>;

    /// Nudge a stalled worker.
    async fn signal(&self, id: &WorkerId) -> Result<()>;

    /// Best-effort delete; errors are ignored.
    async fn delete(&self, id: &WorkerId);
}

#[derive(Debug, Deserialize)]
struct SpawnResponse {
    #[serde(default)]
    id: Option<String>,
}

/// HTTP implementation of [`WorkerGateway`].
pub struct StrategosGateway {
    config: GatewayConfig,
    http: Client,
}

impl StrategosGateway {
    pub fn new(config: GatewayConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_default();
        Self { config, http }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// One spawn attempt, with failures classified for the retry loop.
    async fn spawn_once(&self, request: &SpawnRequest) -> Result<WorkerId> {
        let response = self
            .http
            .post(self.url("/spawn-from-template"))
            .json(request)
            .send()
            .await
            .map_err(|e| Error::http(format!("spawn request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::http(format!("spawn response unreadable: {}", e)))?;

        if !status.is_success() {
            if validation_pattern().is_match(&body) {
                return Err(Error::spawn_rejected(body));
            }
            return Err(Error::http(format!("spawn returned {}: {}", status, body)));
        }

        let parsed: SpawnResponse = serde_json::from_str(&body)
            .map_err(|e| Error::http(format!("spawn response unparsable: {}", e)))?;
        match parsed.id {
            Some(id) if !id.is_empty() => Ok(WorkerId(id)),
            // Missing id is treated as transient: the service sometimes
            // acknowledges before registration completes.
            _ => Err(Error::http("spawn response missing worker id".to_string())),
        }
    }
}

#[async_trait]
impl WorkerGateway for StrategosGateway {
    async fn spawn(&self, request: SpawnRequest) -> Result<WorkerId> {
        let mut attempt = 0;
        loop {
            match self.spawn_once(&request).await {
                Ok(id) => {
                    debug!(worker = %id, label = %request.label, "worker spawned");
                    return Ok(id);
                }
                Err(err) if err.is_transient() && attempt < self.config.spawn_retries => {
                    let delay = self.config.spawn_delay_for_attempt(attempt);
                    warn!(
                        attempt = attempt + 1,
                        delay_secs = delay.as_secs(),
                        "transient spawn failure, retrying: {}",
                        err
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn status(&self, id: &WorkerId) -> Result<WorkerStatus> {
        let response = self
            .http
            .get(self.url(&format!("/status/{}", id)))
            .send()
            .await
            .map_err(|e| Error::http(format!("status request failed: {}", e)))?;
        let text = response
            .text()
            .await
            .map_err(|e| Error::http(format!("status response unreadable: {}", e)))?;
        Ok(WorkerStatus::parse(&text))
    }

    async fn output(&self, id: &WorkerId, lines: Option<u32>) -> Result<String> {
        let mut url = self.url(&format!("/output/{}?strip_ansi=true", id));
        if let Some(n) = lines {
            url.push_str(&format!("&lines={}", n));
        }
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| Error::http(format!("output request failed: {}", e)))?;
        response
            .text()
            .await
            .map_err(|e| Error::http(format!("output response unreadable: {}", e)))
    }

    async fn wait_for_done(&self, id: &WorkerId, timeout: Duration) -> Result<WorkerStatus> {
        let started = Instant::now();
        let poll_interval = Duration::from_secs(self.config.poll_interval_secs);

        loop {
            if started.elapsed() >= timeout {
                return Err(Error::timeout(timeout.as_millis() as u64));
            }

            match self.status(id).await {
                Ok(status) if status.is_terminal() => return Ok(status),
                Ok(status) => {
                    debug!(worker = %id, status = %status.status_word, "worker still running");
                }
                // Network blips re-poll without counting as failure.
                Err(err) => {
                    debug!(worker = %id, "status poll failed, re-polling: {}", err);
                }
            }

            sleep(poll_interval).await;
        }
    }

    async fn signal(&self, id: &WorkerId) -> Result<()> {
        self.http
            .post(self.url(&format!("/ralph/signal/by-worker/{}", id)))
            .send()
            .await
            .map_err(|e| Error::http(format!("signal request failed: {}", e)))?;
        Ok(())
    }

    async fn delete(&self, id: &WorkerId) {
        match self
            .http
            .delete(self.url(&format!("/workers/{}", id)))
            .send()
            .await
        {
            Ok(_) => debug!(worker = %id, "worker deleted"),
            Err(err) => debug!(worker = %id, "worker delete failed (ignored): {}", err),
        }
    }
}
