//! Scripted in-memory gateway for executor and pipeline tests.
//!
//! Each scripted entry plays one spawned worker: it "writes" its output to
//! the path named in the task description (the same contract real workers
//! follow) and then reports the scripted terminal status.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::error::Result;

use super::gateway::WorkerGateway;
use super::types::{SpawnRequest, WorkerId, WorkerStatus};

const OUTPUT_MARKER: &str = "Write the JSON result to ";

#[derive(Debug, Clone)]
struct ScriptedWorker {
    output: Option<Value>,
    final_status: String,
}

#[derive(Debug, Default)]
pub(crate) struct ScriptedGateway {
    scripts: Mutex<VecDeque<ScriptedWorker>>,
    spawned: Mutex<Vec<SpawnRequest>>,
    statuses: Mutex<HashMap<String, String>>,
    deleted: Mutex<Vec<WorkerId>>,
    counter: AtomicU32,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the next worker to finish `done` after writing `output`.
    pub fn script_output(&self, output: Value) {
        self.push(ScriptedWorker {
            output: Some(output),
            final_status: "done".to_string(),
        });
    }

    /// Script the next worker to finish `done` without producing a file.
    pub fn script_done_no_output(&self) {
        self.push(ScriptedWorker {
            output: None,
            final_status: "done".to_string(),
        });
    }

    /// Script the next worker to end in a terminal failure status.
    pub fn script_failure(&self, status: &str) {
        self.push(ScriptedWorker {
            output: None,
            final_status: status.to_string(),
        });
    }

    fn push(&self, worker: ScriptedWorker) {
        self.scripts.lock().unwrap().push_back(worker);
    }

    pub fn spawned_requests(&self) -> Vec<SpawnRequest> {
        self.spawned.lock().unwrap().clone()
    }

    pub fn spawned_labels(&self) -> Vec<String> {
        self.spawned_requests()
            .into_iter()
            .map(|r| r.label)
            .collect()
    }

    pub fn deleted_count(&self) -> usize {
        self.deleted.lock().unwrap().len()
    }

    fn output_path(description: &str) -> Option<String> {
        description
            .rfind(OUTPUT_MARKER)
            .map(|idx| description[idx + OUTPUT_MARKER.len()..].trim().to_string())
    }
}

#[async_trait]
impl WorkerGateway for ScriptedGateway {
    async fn spawn(&self, request: SpawnRequest) -> Result<WorkerId> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ScriptedWorker {
                output: None,
                final_status: "done".to_string(),
            });

        if let (Some(output), Some(path)) = (
            &script.output,
            Self::output_path(&request.task.description),
        ) {
            if let Some(parent) = std::path::Path::new(&path).parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            std::fs::write(&path, serde_json::to_string_pretty(output).unwrap()).unwrap();
        }

        let id = WorkerId(format!("w-{}", self.counter.fetch_add(1, Ordering::SeqCst)));
        self.statuses
            .lock()
            .unwrap()
            .insert(id.0.clone(), script.final_status);
        self.spawned.lock().unwrap().push(request);
        Ok(id)
    }

    async fn status(&self, id: &WorkerId) -> Result<WorkerStatus> {
        let word = self
            .statuses
            .lock()
            .unwrap()
            .get(&id.0)
            .cloned()
            .unwrap_or_else(|| "not_found".to_string());
        Ok(WorkerStatus::parse(&word))
    }

    async fn output(&self, _id: &WorkerId, _lines: Option<u32>) -> Result<String> {
        Ok(String::new())
    }

    async fn wait_for_done(&self, id: &WorkerId, _timeout: Duration) -> Result<WorkerStatus> {
        self.status(id).await
    }

    async fn signal(&self, _id: &WorkerId) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, id: &WorkerId) {
        self.deleted.lock().unwrap().push(id.clone());
    }
}
