//! Engine event stream for observable pipeline execution.
//!
//! The engine pushes events into an [`EventSink`] and never observes the
//! return value. Hosts adapt the sink to whatever transport they run:
//! server-sent events, log lines, or a test recorder.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Mutex;

/// Types of events emitted during pipeline execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Pipeline lifecycle (created, resumed)
    Pipeline,
    /// Phase transitions (started, done, partial_failure)
    Phase,
    /// Per-worker lifecycle (spawned, done, failed)
    Worker,
    /// A pathway began executing
    PathwayStarted,
    /// A pathway level changed state
    PathwayLevel,
    /// A branch condition terminated a pathway
    PathwayBranch,
    /// A pathway finished all levels
    PathwayComplete,
    /// The confidence engine classified an evidence item
    ConfidenceComputed,
    /// Graph validation produced a report
    Validation,
    /// The pipeline finished successfully
    Complete,
    /// The pipeline failed
    ErrorEvent,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pipeline => "pipeline",
            Self::Phase => "phase",
            Self::Worker => "worker",
            Self::PathwayStarted => "pathway_started",
            Self::PathwayLevel => "pathway_level",
            Self::PathwayBranch => "pathway_branch",
            Self::PathwayComplete => "pathway_complete",
            Self::ConfidenceComputed => "confidence_computed",
            Self::Validation => "validation",
            Self::Complete => "complete",
            Self::ErrorEvent => "error_event",
        };
        write!(f, "{}", s)
    }
}

/// A single event pushed to the sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    pub kind: EventKind,
    pub payload: Value,
    pub timestamp: DateTime<Utc>,
}

impl EngineEvent {
    pub fn new(kind: EventKind, payload: Value) -> Self {
        Self {
            kind,
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Create a phase event with a status field.
    pub fn phase(phase: &str, status: &str) -> Self {
        Self::new(
            EventKind::Phase,
            serde_json::json!({ "phase": phase, "status": status }),
        )
    }

    /// Create a worker lifecycle event.
    pub fn worker(phase: &str, worker_id: &str, status: &str) -> Self {
        Self::new(
            EventKind::Worker,
            serde_json::json!({ "phase": phase, "workerId": worker_id, "status": status }),
        )
    }

    /// Create a pathway-level event.
    pub fn pathway_level(pathway_id: &str, evidence_id: &str, depth: u32, status: &str) -> Self {
        Self::new(
            EventKind::PathwayLevel,
            serde_json::json!({
                "pathwayId": pathway_id,
                "evidenceId": evidence_id,
                "depth": depth,
                "status": status,
            }),
        )
    }

    /// Format as a single-line log entry.
    pub fn as_log_line(&self) -> String {
        format!(
            "[{}] {}: {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.kind,
            self.payload
        )
    }
}

/// Push-only event sink.
///
/// Implementations must be task-safe; the engine shares one sink across all
/// concurrently executing pathways.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Sink that drops every event.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: EngineEvent) {}
}

/// Sink that records events in memory for later inspection.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<EngineEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all recorded events.
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Events of one kind, in emission order.
    pub fn of_kind(&self, kind: EventKind) -> Vec<EngineEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.kind == kind)
            .collect()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: EngineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Sink that forwards events to the `tracing` log.
#[derive(Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: EngineEvent) {
        match event.kind {
            EventKind::ErrorEvent => tracing::warn!(kind = %event.kind, payload = %event.payload, "engine event"),
            _ => tracing::info!(kind = %event.kind, payload = %event.payload, "engine event"),
        }
    }
}
