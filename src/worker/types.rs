//! Worker gateway wire types and status parsing.

use serde::{Deserialize, Serialize};

/// Opaque id of a spawned worker. Lives only between spawn and delete.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerId(pub String);

impl WorkerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A spawn request, serialized to the `POST /spawn-from-template` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpawnRequest {
    pub template: String,
    pub label: String,
    pub project_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_worker_id: Option<String>,
    pub task: SpawnTask,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnTask {
    pub description: String,
}

impl SpawnRequest {
    pub fn new(
        template: impl Into<String>,
        label: impl Into<String>,
        project_path: impl Into<String>,
        task_description: impl Into<String>,
    ) -> Self {
        Self {
            template: template.into(),
            label: label.into(),
            project_path: project_path.into(),
            parent_worker_id: None,
            task: SpawnTask {
                description: task_description.into(),
            },
        }
    }

    pub fn with_parent(mut self, parent_worker_id: impl Into<String>) -> Self {
        self.parent_worker_id = Some(parent_worker_id.into());
        self
    }
}

/// Coarse classification of a worker's reported state word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerState {
    /// Terminal success: `done`, `completed`, `awaiting_review`, or
    /// `not_found` (deleted externally counts as success)
    Done,
    /// Terminal failure: `error`, `failed`, `blocked`
    Failed,
    /// Anything else: still running
    Running,
}

/// A parsed `status health progress% step` line.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerStatus {
    pub state: WorkerState,
    pub status_word: String,
    pub health: Option<String>,
    pub progress: Option<u32>,
    pub step: Option<String>,
    pub raw: String,
}

impl WorkerStatus {
    /// Parse the plain-text status line returned by `GET /status/{id}`.
    pub fn parse(line: &str) -> Self {
        let raw = line.trim().to_string();
        let mut parts = raw.split_whitespace();

        let status_word = parts.next().unwrap_or("").to_lowercase();
        let health = parts.next().map(str::to_string);
        let progress = parts
            .next()
            .and_then(|p| p.trim_end_matches('%').parse::<u32>().ok());
        let step = {
            let rest: Vec<&str> = parts.collect();
            if rest.is_empty() {
                None
            } else {
                Some(rest.join(" "))
            }
        };

        let state = match status_word.as_str() {
            "done" | "completed" | "awaiting_review" | "not_found" => WorkerState::Done,
            "error" | "failed" | "blocked" => WorkerState::Failed,
            _ => WorkerState::Running,
        };

        Self {
            state,
            status_word,
            health,
            progress,
            step,
            raw,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state != WorkerState::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_spawn_request_wire_shape() {
        let request = SpawnRequest::new("investigator", "ev-1-L1", "/projects/p1", "do the thing")
            .with_parent("w-root");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["template"], "investigator");
        assert_eq!(json["projectPath"], "/projects/p1");
        assert_eq!(json["parentWorkerId"], "w-root");
        assert_eq!(json["task"]["description"], "do the thing");
    }

    #[test]
    fn test_parent_omitted_when_absent() {
        let request = SpawnRequest::new("t", "l", "/p", "d");
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("parentWorkerId").is_none());
    }

    #[test]
    fn test_status_line_parsing() {
        let status = WorkerStatus::parse("running healthy 42% searching literature");
        assert_eq!(status.state, WorkerState::Running);
        assert_eq!(status.health.as_deref(), Some("healthy"));
        assert_eq!(status.progress, Some(42));
        assert_eq!(status.step.as_deref(), Some("searching literature"));
    }

    #[test]
    fn test_terminal_words() {
        for word in ["done", "completed", "awaiting_review", "not_found"] {
            assert_eq!(WorkerStatus::parse(word).state, WorkerState::Done, "{}", word);
        }
        for word in ["error", "failed", "blocked"] {
            assert_eq!(WorkerStatus::parse(word).state, WorkerState::Failed, "{}", word);
        }
        assert_eq!(WorkerStatus::parse("spawning").state, WorkerState::Running);
    }

    #[test]
    fn test_sparse_status_line() {
        let status = WorkerStatus::parse("done");
        assert!(status.is_terminal());
        assert_eq!(status.health, None);
        assert_eq!(status.progress, None);
        assert_eq!(status.step, None);
    }
}
