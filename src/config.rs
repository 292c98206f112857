//! Engine and gateway configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the Strategos worker-service client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Base URL of the worker service
    pub base_url: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Interval between status polls in seconds
    pub poll_interval_secs: u64,
    /// Max retries for a transient spawn failure
    pub spawn_retries: u32,
    /// Base delay for spawn backoff in seconds (doubles per attempt)
    pub spawn_backoff_base_secs: u64,
}

impl GatewayConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout_secs: 30,
            poll_interval_secs: 5,
            spawn_retries: 3,
            spawn_backoff_base_secs: 3,
        }
    }

    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    pub fn with_poll_interval(mut self, secs: u64) -> Self {
        self.poll_interval_secs = secs;
        self
    }

    pub fn with_spawn_retries(mut self, retries: u32) -> Self {
        self.spawn_retries = retries;
        self
    }

    /// Backoff delay before the given retry attempt (0-based).
    pub fn spawn_delay_for_attempt(&self, attempt: u32) -> Duration {
        Duration::from_secs(self.spawn_backoff_base_secs * 2u64.pow(attempt))
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new("http://localhost:8420")
    }
}

/// Configuration for the investigation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Directory holding pathway definition JSON files
    pub pathways_dir: PathBuf,
    /// Directory under which project directories are created
    pub projects_dir: PathBuf,
    /// Maximum pathways in flight at once (default: 5)
    pub max_parallel_pathways: usize,
    /// Pause between pathway batches in milliseconds (default: 2000)
    pub batch_delay_ms: u64,
    /// Per-level worker timeout in minutes (default: 15)
    pub level_timeout_mins: u64,
    /// Planning-phase worker timeout in minutes (default: 45)
    pub planning_timeout_mins: u64,
    /// Classification-phase worker timeout in minutes (default: 30)
    pub classification_timeout_mins: u64,
    /// Synthesis-phase worker timeout in minutes (default: 45)
    pub synthesis_timeout_mins: u64,
}

impl EngineConfig {
    pub fn new(pathways_dir: impl Into<PathBuf>, projects_dir: impl Into<PathBuf>) -> Self {
        Self {
            pathways_dir: pathways_dir.into(),
            projects_dir: projects_dir.into(),
            max_parallel_pathways: 5,
            batch_delay_ms: 2_000,
            level_timeout_mins: 15,
            planning_timeout_mins: 45,
            classification_timeout_mins: 30,
            synthesis_timeout_mins: 45,
        }
    }

    pub fn with_max_parallel_pathways(mut self, n: usize) -> Self {
        self.max_parallel_pathways = n.max(1);
        self
    }

    pub fn with_batch_delay_ms(mut self, ms: u64) -> Self {
        self.batch_delay_ms = ms;
        self
    }

    pub fn with_level_timeout_mins(mut self, mins: u64) -> Self {
        self.level_timeout_mins = mins;
        self
    }

    pub fn level_timeout(&self) -> Duration {
        Duration::from_secs(self.level_timeout_mins * 60)
    }

    pub fn planning_timeout(&self) -> Duration {
        Duration::from_secs(self.planning_timeout_mins * 60)
    }

    pub fn classification_timeout(&self) -> Duration {
        Duration::from_secs(self.classification_timeout_mins * 60)
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout_mins * 60)
    }
}
