//! Investigation orchestrator: bounded fan-out of pathways over the
//! evidence list, plus the second wave for cross-pathway discoveries.
//!
//! Batches of at most five pathways run concurrently with a two-second
//! pause between batches for rate-limit courtesy. A pathway that fails
//! outright degrades to a synthetic UNVERIFIED result rather than sinking
//! the phase.

use futures::future::join_all;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::confidence::ConfidenceAssessment;
use crate::error::Result;
use crate::event::{EngineEvent, EventKind, EventSink};
use crate::executor::{InvestigationExecutor, PathwayRun};
use crate::model::{EvidenceItem, EvidenceManifest, EvidenceType};
use crate::project::ProjectStore;

/// Fans evidence items out through the executor with bounded concurrency.
pub struct InvestigationOrchestrator {
    executor: Arc<InvestigationExecutor>,
    sink: Arc<dyn EventSink>,
    max_parallel: usize,
    batch_delay: Duration,
}

impl InvestigationOrchestrator {
    pub fn new(
        executor: Arc<InvestigationExecutor>,
        sink: Arc<dyn EventSink>,
        max_parallel: usize,
        batch_delay: Duration,
    ) -> Self {
        Self {
            executor,
            sink,
            max_parallel: max_parallel.max(1),
            batch_delay,
        }
    }

    /// Run every evidence item in the manifests, then the second wave of
    /// cross-pathway discoveries. Results preserve submission order within
    /// each wave.
    pub async fn run(
        &self,
        manifests: &[EvidenceManifest],
        store: &ProjectStore,
    ) -> Result<Vec<PathwayRun>> {
        let items: Vec<EvidenceItem> = manifests
            .iter()
            .flat_map(|m| m.evidence_items.iter().cloned())
            .collect();

        // The pipeline already announced the phase; this narrates progress.
        info!(evidence = items.len(), "investigation started");

        let mut runs = self.run_batches(&items, store).await;

        // Second wave: one synthetic item per cross-pathway discovery.
        let cross_items: Vec<EvidenceItem> = runs
            .iter()
            .flat_map(|run| run.cross_pathways.iter())
            .filter_map(|discovery| {
                let origin = items.iter().find(|i| i.id == discovery.origin_evidence_id)?;
                let evidence_type: EvidenceType = discovery.type_code.parse().ok()?;
                Some(origin.cross_pathway(evidence_type))
            })
            .collect();

        if !cross_items.is_empty() {
            self.sink.emit(EngineEvent::new(
                EventKind::Phase,
                json!({
                    "phase": "investigating",
                    "status": "second_wave",
                    "evidenceCount": cross_items.len(),
                }),
            ));
            info!(derived = cross_items.len(), "cross-pathway second wave");
            runs.extend(self.run_batches(&cross_items, store).await);
        }

        self.write_summary(&items, &cross_items, &runs, store)?;
        self.sink.emit(EngineEvent::new(
            EventKind::Phase,
            json!({ "phase": "investigating", "status": "done", "pathways": runs.len() }),
        ));

        Ok(runs)
    }

    async fn run_batches(&self, items: &[EvidenceItem], store: &ProjectStore) -> Vec<PathwayRun> {
        let mut runs = Vec::with_capacity(items.len());
        let batch_count = items.len().div_ceil(self.max_parallel);

        for (batch_index, batch) in items.chunks(self.max_parallel).enumerate() {
            self.sink.emit(EngineEvent::new(
                EventKind::Phase,
                json!({
                    "phase": "investigating",
                    "status": "batch",
                    "batch": batch_index,
                    "size": batch.len(),
                }),
            ));

            let outcomes = join_all(
                batch
                    .iter()
                    .map(|item| self.executor.run(item, store, &[])),
            )
            .await;

            for (item, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    Ok(run) => runs.push(run),
                    Err(err) => {
                        warn!(evidence = %item.id, "pathway failed: {}", err);
                        runs.push(PathwayRun {
                            evidence_id: item.id.clone(),
                            pathway_id: item.triggered_pathway.clone(),
                            results: Vec::new(),
                            confidence: ConfidenceAssessment::pathway_failed(&err.to_string()),
                            cross_pathways: Vec::new(),
                        });
                    }
                }
            }

            if batch_index + 1 < batch_count {
                sleep(self.batch_delay).await;
            }
        }

        runs
    }

    fn write_summary(
        &self,
        items: &[EvidenceItem],
        cross_items: &[EvidenceItem],
        runs: &[PathwayRun],
        store: &ProjectStore,
    ) -> Result<()> {
        let mut by_type: BTreeMap<String, u32> = BTreeMap::new();
        for item in items.iter().chain(cross_items) {
            *by_type.entry(item.evidence_type.code().to_string()).or_default() += 1;
        }

        let mut by_confidence: BTreeMap<String, u32> = BTreeMap::new();
        for run in runs {
            *by_confidence
                .entry(run.confidence.label.clone())
                .or_default() += 1;
        }

        store.write_json(
            &store.summary_file(),
            &json!({
                "totalPathways": runs.len(),
                "secondWavePathways": cross_items.len(),
                "byType": by_type,
                "byConfidence": by_confidence,
            }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::confidence::Confidence;
    use crate::event::MemorySink;
    use crate::model::SourceRating;
    use crate::pathway::PathwayCatalog;
    use crate::worker::testing::ScriptedGateway;
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use tempfile::TempDir;

    struct Fixture {
        gateway: Arc<ScriptedGateway>,
        sink: Arc<MemorySink>,
        orchestrator: InvestigationOrchestrator,
        store: ProjectStore,
        _dirs: (TempDir, TempDir),
    }

    fn single_level_pathway(id: &str) -> Value {
        json!({
            "id": id,
            "levels": [{
                "depth": 1,
                "name": "initial assessment",
                "workerTemplate": "investigator",
                "task": {"purpose": "p", "keyTasks": [], "endState": "e"},
                "requiredOutputs": [],
                "branches": []
            }]
        })
    }

    fn fixture(pathway_ids: &[&str]) -> Fixture {
        let pathways_dir = TempDir::new().unwrap();
        for id in pathway_ids {
            std::fs::write(
                pathways_dir.path().join(format!("{}.json", id)),
                serde_json::to_string(&single_level_pathway(id)).unwrap(),
            )
            .unwrap();
        }
        let projects_dir = TempDir::new().unwrap();
        let store = ProjectStore::open(projects_dir.path(), "proj-1").unwrap();

        let gateway = Arc::new(ScriptedGateway::new());
        let sink = Arc::new(MemorySink::new());
        let executor = Arc::new(InvestigationExecutor::new(
            gateway.clone(),
            Arc::new(PathwayCatalog::new(pathways_dir.path())),
            sink.clone(),
            Duration::from_secs(60),
        ));
        let orchestrator =
            InvestigationOrchestrator::new(executor, sink.clone(), 5, Duration::from_secs(2));

        Fixture {
            gateway,
            sink,
            orchestrator,
            store,
            _dirs: (pathways_dir, projects_dir),
        }
    }

    fn item(id: &str, evidence_type: EvidenceType) -> EvidenceItem {
        EvidenceItem {
            id: id.to_string(),
            evidence_type,
            source_rating: SourceRating::B,
            info_rating: 2,
            description: "sample evidence".to_string(),
            citation: None,
            triggered_pathway: evidence_type.pathway_id(),
        }
    }

    fn manifest(items: Vec<EvidenceItem>) -> EvidenceManifest {
        EvidenceManifest {
            sub_question_id: Some("q1".to_string()),
            sub_questions: vec!["q1".to_string()],
            evidence_items: items,
        }
    }

    fn simple_output(pathway: &str) -> Value {
        json!({
            "pathwayId": pathway,
            "depth": 1,
            "evidenceFound": true,
            "sourceRating": "B",
            "findings": {},
            "citations": [],
            "nextEvidenceTypes": []
        })
    }

    // Boundary: 11 items at batch size 5 produce 3 batches of 5, 5, 1.
    #[tokio::test(start_paused = true)]
    async fn test_batching_5_5_1() {
        let f = fixture(&["P-SCI"]);
        let items: Vec<EvidenceItem> = (0..11)
            .map(|i| item(&format!("ev-{}", i), EvidenceType::Scientific))
            .collect();
        for _ in 0..11 {
            f.gateway.script_output(simple_output("P-SCI"));
        }

        let runs = f
            .orchestrator
            .run(&[manifest(items)], &f.store)
            .await
            .unwrap();
        assert_eq!(runs.len(), 11);

        let batch_sizes: Vec<u64> = f
            .sink
            .of_kind(EventKind::Phase)
            .into_iter()
            .filter(|e| e.payload["status"] == "batch")
            .filter_map(|e| e.payload["size"].as_u64())
            .collect();
        assert_eq!(batch_sizes, vec![5, 5, 1]);
    }

    // Scenario: cross-pathway discovery produces a derived second-wave run.
    #[tokio::test(start_paused = true)]
    async fn test_second_wave() {
        let f = fixture(&["P-SCI", "P-GOV"]);

        let mut first = simple_output("P-SCI");
        first["nextEvidenceTypes"] = json!(["GOV"]);
        f.gateway.script_output(first);
        f.gateway.script_output(simple_output("P-GOV"));

        let runs = f
            .orchestrator
            .run(
                &[manifest(vec![item("ev-1", EvidenceType::Scientific)])],
                &f.store,
            )
            .await
            .unwrap();

        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].pathway_id, "P-SCI");
        assert_eq!(runs[1].pathway_id, "P-GOV");
        assert_eq!(runs[1].evidence_id, "ev-1-cross-GOV");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_pathway_degrades_to_unverified() {
        // P-GOV is never written to the catalog dir, so the second item's
        // pathway load fails and must degrade, not abort.
        let f = fixture(&["P-SCI"]);
        f.gateway.script_output(simple_output("P-SCI"));

        let runs = f
            .orchestrator
            .run(
                &[manifest(vec![
                    item("ev-1", EvidenceType::Scientific),
                    item("ev-2", EvidenceType::Government),
                ])],
                &f.store,
            )
            .await
            .unwrap();

        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].confidence.confidence, Confidence::Unverified);
        assert!(runs[1].confidence.rationale.starts_with("Pathway failed:"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_summary_written() {
        let f = fixture(&["P-SCI"]);
        f.gateway.script_output(simple_output("P-SCI"));

        f.orchestrator
            .run(
                &[manifest(vec![item("ev-1", EvidenceType::Scientific)])],
                &f.store,
            )
            .await
            .unwrap();

        let summary: Value = f.store.read_json(&f.store.summary_file()).unwrap();
        assert_eq!(summary["totalPathways"], 1);
        assert_eq!(summary["byType"]["SCI"], 1);
        assert_eq!(summary["byConfidence"]["PLAUSIBLE"], 1);
    }
}
