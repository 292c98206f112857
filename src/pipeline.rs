//! The five-phase research pipeline.
//!
//! Phases run in strict succession: planning, classification,
//! investigation, adjudication, synthesis. Planning and synthesis failures
//! are fatal; classification tolerates partial failure; investigation
//! degrades per pathway. The project status progresses monotonically until
//! `complete` or `error`, and the event stream is the user-visible source
//! of truth throughout.

use futures::future::join_all;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::adjudicator::Adjudicator;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::event::{EngineEvent, EventKind, EventSink};
use crate::executor::{InvestigationExecutor, PathwayRun};
use crate::graph::validator;
use crate::index::ProjectIndex;
use crate::investigation::InvestigationOrchestrator;
use crate::model::{EvidenceManifest, Plan, SubQuestion};
use crate::pathway::PathwayCatalog;
use crate::project::{Project, ProjectStatus, ProjectStore};
use crate::worker::{SpawnRequest, WorkerGateway, WorkerState};

/// Worker template for the planning phase.
pub const PLANNING_TEMPLATE: &str = "research-planner";
/// Worker template for classification workers.
pub const CLASSIFIER_TEMPLATE: &str = "evidence-classifier";
/// Worker template for the synthesis phase.
pub const SYNTHESIS_TEMPLATE: &str = "synthesis-writer";

/// Drives one project from topic to validated knowledge graph.
pub struct ResearchPipeline {
    gateway: Arc<dyn WorkerGateway>,
    catalog: Arc<PathwayCatalog>,
    sink: Arc<dyn EventSink>,
    index: Arc<dyn ProjectIndex>,
    config: EngineConfig,
}

impl ResearchPipeline {
    pub fn new(
        gateway: Arc<dyn WorkerGateway>,
        catalog: Arc<PathwayCatalog>,
        sink: Arc<dyn EventSink>,
        index: Arc<dyn ProjectIndex>,
        config: EngineConfig,
    ) -> Self {
        Self {
            gateway,
            catalog,
            sink,
            index,
            config,
        }
    }

    /// Run the full pipeline. On any fatal error the project transitions to
    /// `error` with the message, an `error_event` is emitted, and the error
    /// re-raises.
    pub async fn run(&self, project: &mut Project) -> Result<()> {
        let store = ProjectStore::open(&self.config.projects_dir, &project.id)?;
        self.sink.emit(EngineEvent::new(
            EventKind::Pipeline,
            json!({ "projectId": project.id, "topic": project.topic, "status": "started" }),
        ));

        match self.run_phases(project, &store).await {
            Ok(()) => Ok(()),
            Err(err) => {
                project.status = ProjectStatus::Error;
                project.status_detail = Some(err.to_string());
                let _ = store.save_project(project);
                self.sink.emit(EngineEvent::new(
                    EventKind::ErrorEvent,
                    json!({ "projectId": project.id, "message": err.to_string() }),
                ));
                Err(err)
            }
        }
    }

    async fn run_phases(&self, project: &mut Project, store: &ProjectStore) -> Result<()> {
        let plan = self.planning(project, store).await?;
        let manifests = self.classification(project, store, &plan).await?;
        let runs = self.investigation(project, store).await?;
        self.adjudication(project, store, &plan, &manifests, &runs).await?;
        let graph = self.synthesis(project, store).await?;

        project.status = ProjectStatus::Complete;
        project.status_detail = None;
        store.save_project(project)?;

        // Recording in the external index is best-effort; the source
        // behavior records even when validation failed.
        if let Err(err) = self.index.record(project, &graph).await {
            warn!(project = %project.id, "project index record failed: {}", err);
        }

        self.sink.emit(EngineEvent::new(
            EventKind::Complete,
            json!({ "projectId": project.id }),
        ));
        Ok(())
    }

    fn executor(&self) -> Arc<InvestigationExecutor> {
        Arc::new(InvestigationExecutor::new(
            Arc::clone(&self.gateway),
            Arc::clone(&self.catalog),
            Arc::clone(&self.sink),
            self.config.level_timeout(),
        ))
    }

    fn set_status(
        &self,
        project: &mut Project,
        store: &ProjectStore,
        status: ProjectStatus,
        detail: &str,
    ) -> Result<()> {
        project.status = status;
        project.status_detail = Some(detail.to_string());
        store.save_project(project)?;
        self.sink
            .emit(EngineEvent::phase(&status.to_string(), "started"));
        Ok(())
    }

    /// Spawn one phase worker and wait for it. Fatal on any failure.
    async fn run_phase_worker(
        &self,
        phase: &str,
        request: SpawnRequest,
        timeout: Duration,
    ) -> Result<()> {
        let worker_id = self.gateway.spawn(request).await?;
        self.sink
            .emit(EngineEvent::worker(phase, worker_id.as_str(), "spawned"));

        let waited = self.gateway.wait_for_done(&worker_id, timeout).await;
        self.gateway.delete(&worker_id).await;

        match waited {
            Ok(status) if status.state == WorkerState::Done => {
                self.sink
                    .emit(EngineEvent::worker(phase, worker_id.as_str(), "done"));
                Ok(())
            }
            Ok(status) => {
                self.sink
                    .emit(EngineEvent::worker(phase, worker_id.as_str(), "failed"));
                Err(Error::worker_failed(worker_id.as_str(), status.status_word))
            }
            Err(err) => {
                self.sink
                    .emit(EngineEvent::worker(phase, worker_id.as_str(), "failed"));
                Err(err)
            }
        }
    }

    async fn planning(&self, project: &mut Project, store: &ProjectStore) -> Result<Plan> {
        self.set_status(
            project,
            store,
            ProjectStatus::Planning,
            "Decomposing topic into sub-questions",
        )?;

        let plan_path = store.plan_file().display().to_string();
        let description = format!(
            "Decompose the research topic into 5-8 sub-questions.\n\n\
             Topic: {}\n\n\
             Each sub-question needs an id, the question text, a scope note, and the \
             evidence types you expect to find. At least one sub-question must concern \
             actionable recommendations.\n\n\
             Write the JSON result to {}",
            project.topic, plan_path
        );
        let request = SpawnRequest::new(
            PLANNING_TEMPLATE,
            format!("plan-{}", project.id),
            store.root().display().to_string(),
            description,
        );

        self.run_phase_worker("planning", request, self.config.planning_timeout())
            .await?;

        let plan: Plan = store.read_json(&store.plan_file())?;
        if plan.sub_questions.is_empty() {
            return Err(Error::contract("plan has no sub-questions"));
        }
        if !plan.meets_contract() {
            warn!(
                sub_questions = plan.sub_questions.len(),
                "plan falls short of the 5-8 / recommendations contract"
            );
        }

        info!(sub_questions = plan.sub_questions.len(), "planning done");
        self.sink.emit(EngineEvent::phase("planning", "done"));
        Ok(plan)
    }

    async fn classification(
        &self,
        project: &mut Project,
        store: &ProjectStore,
        plan: &Plan,
    ) -> Result<Vec<EvidenceManifest>> {
        self.set_status(
            project,
            store,
            ProjectStatus::Classifying,
            "Classifying evidence across sub-questions",
        )?;

        let questions = &plan.sub_questions;
        let worker_count = questions.len().div_ceil(2).clamp(3, 5);
        let chunk_size = questions.len().div_ceil(worker_count);

        let topic = project.topic.clone();
        let batches: Vec<&[SubQuestion]> = questions.chunks(chunk_size).collect();
        let outcomes = join_all(
            batches
                .iter()
                .enumerate()
                .map(|(index, batch)| self.run_classifier(&topic, store, index, batch)),
        )
        .await;

        let mut manifests = Vec::new();
        let mut failures = 0usize;
        for outcome in outcomes {
            match outcome {
                Ok(manifest) => manifests.push(manifest),
                Err(err) => {
                    warn!("classification worker failed: {}", err);
                    failures += 1;
                }
            }
        }

        if manifests.is_empty() {
            return Err(Error::contract(
                "all classification workers failed; no evidence manifests",
            ));
        }
        if failures > 0 {
            project.status_detail = Some("partial_failure".to_string());
            store.save_project(project)?;
            self.sink.emit(EngineEvent::new(
                EventKind::Phase,
                json!({ "phase": "classifying", "status": "partial_failure", "failed": failures }),
            ));
        }

        info!(
            manifests = manifests.len(),
            failed = failures,
            "classification done"
        );
        self.sink.emit(EngineEvent::phase("classifying", "done"));
        Ok(manifests)
    }

    async fn run_classifier(
        &self,
        topic: &str,
        store: &ProjectStore,
        index: usize,
        batch: &[SubQuestion],
    ) -> Result<EvidenceManifest> {
        let manifest_path = store.manifest_file(index).display().to_string();
        let question_list = batch
            .iter()
            .map(|q| format!("- {}: {}", q.id, q.question))
            .collect::<Vec<_>>()
            .join("\n");
        let description = format!(
            "Classify the evidence relevant to these sub-questions of the topic \"{}\".\n\n\
             {}\n\n\
             Produce an evidence manifest: the sub-question ids covered plus every \
             evidence item found, each with its type, source rating (A-F), information \
             rating (1-6), description, citation, and triggered pathway.\n\n\
             Write the JSON result to {}",
            topic, question_list, manifest_path
        );

        let request = SpawnRequest::new(
            CLASSIFIER_TEMPLATE,
            format!("classify-{}", index),
            store.root().display().to_string(),
            description,
        );
        self.run_phase_worker("classifying", request, self.config.classification_timeout())
            .await?;

        store.read_json(&store.manifest_file(index))
    }

    async fn investigation(
        &self,
        project: &mut Project,
        store: &ProjectStore,
    ) -> Result<Vec<PathwayRun>> {
        self.set_status(
            project,
            store,
            ProjectStatus::Investigating,
            "Running investigation pathways",
        )?;

        let manifests = store.read_manifests()?;
        let orchestrator = InvestigationOrchestrator::new(
            self.executor(),
            Arc::clone(&self.sink),
            self.config.max_parallel_pathways,
            Duration::from_millis(self.config.batch_delay_ms),
        );
        orchestrator.run(&manifests, store).await
    }

    async fn adjudication(
        &self,
        project: &mut Project,
        store: &ProjectStore,
        plan: &Plan,
        manifests: &[EvidenceManifest],
        runs: &[PathwayRun],
    ) -> Result<()> {
        self.set_status(
            project,
            store,
            ProjectStatus::Adjudicating,
            "Adjudicating evidence per sub-question",
        )?;

        let adjudicator = Adjudicator::new(
            self.executor(),
            Arc::clone(&self.index),
            Arc::clone(&self.sink),
        );
        let adjudications = adjudicator
            .adjudicate(project, plan, manifests, runs, store)
            .await?;

        info!(sub_questions = adjudications.len(), "adjudication done");
        self.sink.emit(EngineEvent::phase("adjudicating", "done"));
        Ok(())
    }

    async fn synthesis(&self, project: &mut Project, store: &ProjectStore) -> Result<Value> {
        self.set_status(
            project,
            store,
            ProjectStatus::Synthesizing,
            "Assembling the knowledge graph",
        )?;

        let graph_path = store.graph_file().display().to_string();
        let description = format!(
            "Synthesize the validated knowledge graph for the topic \"{}\" from the \
             adjudicated evidence in this project directory.\n\n\
             The graph needs nodes (kebab-case ids, uppercase labels), typed edges, \
             and a topics entry for every non-domain node. Include a recommendations \
             domain with at least three recommendation children. Exclude retracted \
             evidence entirely and surface unverified or disputed confidence in the \
             topic text.\n\n\
             Write the JSON result to {}",
            project.topic, graph_path
        );
        let request = SpawnRequest::new(
            SYNTHESIS_TEMPLATE,
            format!("synth-{}", project.id),
            store.root().display().to_string(),
            description,
        );
        self.run_phase_worker("synthesizing", request, self.config.synthesis_timeout())
            .await?;

        let graph: Value = store.read_json(&store.graph_file())?;

        // Validation failure is observed, recorded, and non-fatal.
        let report = validator::validate(&graph);
        self.sink.emit(EngineEvent::new(
            EventKind::Validation,
            json!({
                "valid": report.valid,
                "errorCount": report.errors.len(),
                "warningCount": report.warnings.len(),
            }),
        ));
        if !report.valid {
            warn!(errors = report.errors.len(), "graph validation failed");
            store.write_json(&store.validation_errors_file(), &report)?;
        }

        self.sink.emit(EngineEvent::phase("synthesizing", "done"));
        Ok(graph)
    }
}
