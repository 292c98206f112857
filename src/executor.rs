//! The investigation tree executor: one pathway for one evidence item.
//!
//! Levels run strictly sequentially in depth order. A level's branches are
//! evaluated against the previous output's signals before it spawns: a
//! satisfied TERMINATE branch ends the pathway, and a level whose declared
//! branches never target its own depth is skipped. Worker failures, missing
//! output files, and parse failures all degrade the level to a gap; the
//! pathway keeps going and the confidence engine treats gaps as silence.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::confidence::{self, ConfidenceAssessment};
use crate::error::Result;
use crate::event::{EngineEvent, EventKind, EventSink};
use crate::model::EvidenceItem;
use crate::pathway::condition::evaluate;
use crate::pathway::task::TaskBuilder;
use crate::pathway::types::{LevelDef, LevelOutput};
use crate::pathway::PathwayCatalog;
use crate::project::ProjectStore;
use crate::worker::{SpawnRequest, WorkerGateway, WorkerState};

/// Pathways never descend past this depth.
pub const MAX_DEPTH: u32 = 4;

/// A new evidence type discovered mid-pathway, to be investigated in the
/// orchestrator's second wave.
#[derive(Debug, Clone, PartialEq)]
pub struct CrossPathwayDiscovery {
    pub origin_evidence_id: String,
    pub type_code: String,
    pub pathway_id: String,
    pub discovered_at_depth: u32,
}

/// The executor's result for one evidence item.
#[derive(Debug, Clone)]
pub struct PathwayRun {
    pub evidence_id: String,
    pub pathway_id: String,
    pub results: Vec<Option<LevelOutput>>,
    pub confidence: ConfidenceAssessment,
    pub cross_pathways: Vec<CrossPathwayDiscovery>,
}

/// Runs investigation pathways level-by-level against the worker fleet.
pub struct InvestigationExecutor {
    gateway: Arc<dyn WorkerGateway>,
    catalog: Arc<PathwayCatalog>,
    sink: Arc<dyn EventSink>,
    level_timeout: Duration,
}

impl InvestigationExecutor {
    pub fn new(
        gateway: Arc<dyn WorkerGateway>,
        catalog: Arc<PathwayCatalog>,
        sink: Arc<dyn EventSink>,
        level_timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            catalog,
            sink,
            level_timeout,
        }
    }

    /// Execute the evidence item's triggered pathway to completion.
    pub async fn run(
        &self,
        evidence: &EvidenceItem,
        store: &ProjectStore,
        inherited_flags: &[String],
    ) -> Result<PathwayRun> {
        let pathway = self.catalog.get(&evidence.triggered_pathway)?;
        info!(pathway = %pathway.id, evidence = %evidence.id, "pathway started");
        self.sink.emit(EngineEvent::new(
            EventKind::PathwayStarted,
            json!({ "pathwayId": pathway.id, "evidenceId": evidence.id }),
        ));

        let mut current: Option<LevelOutput> = None;
        let mut results: Vec<Option<LevelOutput>> = Vec::new();
        let mut cross_pathways: Vec<CrossPathwayDiscovery> = Vec::new();
        let mut terminated = false;

        for level in pathway.levels_through(MAX_DEPTH) {
            if level.depth > 1 {
                let signals = current.as_ref().map(|o| o.signals().clone()).unwrap_or(json!({}));

                if let Some(branch) = level
                    .branches
                    .iter()
                    .find(|b| b.is_terminate() && evaluate(&b.condition, &signals))
                {
                    debug!(
                        pathway = %pathway.id,
                        depth = level.depth,
                        field = %branch.condition.field,
                        "terminate branch satisfied"
                    );
                    self.sink.emit(EngineEvent::new(
                        EventKind::PathwayBranch,
                        json!({
                            "pathwayId": pathway.id,
                            "evidenceId": evidence.id,
                            "depth": level.depth,
                            "status": "terminated",
                        }),
                    ));
                    terminated = true;
                    break;
                }

                let entry_satisfied = level
                    .branches
                    .iter()
                    .any(|b| b.next_level == level.depth as i32 && evaluate(&b.condition, &signals));
                if !level.branches.is_empty() && !entry_satisfied {
                    self.emit_level(&pathway.id, &evidence.id, level.depth, "gap");
                    continue;
                }
            }

            match self.run_level(evidence, &pathway.id, level, current.as_ref(), store).await {
                Some(output) => {
                    for type_code in &output.next_evidence_types {
                        if let Some(pathway_id) = PathwayCatalog::pathway_for_type(type_code) {
                            if pathway_id != pathway.id {
                                cross_pathways.push(CrossPathwayDiscovery {
                                    origin_evidence_id: evidence.id.clone(),
                                    type_code: type_code.clone(),
                                    pathway_id,
                                    discovered_at_depth: level.depth,
                                });
                            }
                        }
                    }
                    results.push(Some(output.clone()));
                    current = Some(output);
                }
                None => results.push(None),
            }
        }

        let confidence = confidence::assess(&results, inherited_flags);
        self.sink.emit(EngineEvent::new(
            EventKind::ConfidenceComputed,
            json!({
                "evidenceId": evidence.id,
                "confidence": confidence.confidence,
                "label": confidence.label,
                "rationale": confidence.rationale,
            }),
        ));
        self.sink.emit(EngineEvent::new(
            EventKind::PathwayComplete,
            json!({
                "pathwayId": pathway.id,
                "evidenceId": evidence.id,
                "levelsCompleted": results.iter().filter(|r| r.is_some()).count(),
                "terminated": terminated,
            }),
        ));

        Ok(PathwayRun {
            evidence_id: evidence.id.clone(),
            pathway_id: pathway.id.clone(),
            results,
            confidence,
            cross_pathways,
        })
    }

    /// Spawn one level worker and collect its output. `None` is a gap.
    async fn run_level(
        &self,
        evidence: &EvidenceItem,
        pathway_id: &str,
        level: &LevelDef,
        parent: Option<&LevelOutput>,
        store: &ProjectStore,
    ) -> Option<LevelOutput> {
        let output_path = store.level_output_file(&evidence.id, level.depth);
        let output_path_str = output_path.display().to_string();
        let task = TaskBuilder::build(level, evidence, parent, &output_path_str);

        self.emit_level(pathway_id, &evidence.id, level.depth, "spawning");

        let request = SpawnRequest::new(
            task.worker_template.clone(),
            format!("{}-L{}", evidence.id, level.depth),
            store.root().display().to_string(),
            task.description(&output_path_str),
        );

        let worker_id = match self.gateway.spawn(request).await {
            Ok(id) => id,
            Err(err) => {
                warn!(pathway = pathway_id, depth = level.depth, "level spawn failed: {}", err);
                self.emit_level(pathway_id, &evidence.id, level.depth, "spawn_failed");
                return None;
            }
        };
        self.emit_level(pathway_id, &evidence.id, level.depth, "spawned");

        let wait_result = self.gateway.wait_for_done(&worker_id, self.level_timeout).await;
        self.gateway.delete(&worker_id).await;

        match wait_result {
            Ok(status) if status.state == WorkerState::Done => {}
            Ok(status) => {
                warn!(
                    worker = %worker_id,
                    status = %status.status_word,
                    "level worker failed"
                );
                self.emit_level(pathway_id, &evidence.id, level.depth, "failed");
                return None;
            }
            Err(err) => {
                warn!(worker = %worker_id, "level wait failed: {}", err);
                self.emit_level(pathway_id, &evidence.id, level.depth, "failed");
                return None;
            }
        }

        let raw = match std::fs::read_to_string(&output_path) {
            Ok(raw) => raw,
            Err(_) => {
                self.emit_level(pathway_id, &evidence.id, level.depth, "no_output");
                return None;
            }
        };
        match serde_json::from_str::<LevelOutput>(&raw) {
            Ok(output) => {
                self.emit_level(pathway_id, &evidence.id, level.depth, "done");
                Some(output)
            }
            Err(err) => {
                warn!(path = %output_path.display(), "level output unparsable: {}", err);
                self.emit_level(pathway_id, &evidence.id, level.depth, "parse_error");
                None
            }
        }
    }

    fn emit_level(&self, pathway_id: &str, evidence_id: &str, depth: u32, status: &str) {
        self.sink
            .emit(EngineEvent::pathway_level(pathway_id, evidence_id, depth, status));
    }
}
