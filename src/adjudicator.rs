//! Per-sub-question adjudication: aggregation, consensus checking, and
//! cross-project reconciliation.
//!
//! When a sub-question's evidence is overwhelmingly verified-or-plausible,
//! a single contrarian pathway (`P-CON`) probes the consensus; a credible
//! downgrade recommendation rewrites the VERIFIED records one step. Both
//! the contrarian run and the look at prior projects are best-effort:
//! their failures never fail adjudication.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::confidence::Confidence;
use crate::error::Result;
use crate::event::{EngineEvent, EventKind, EventSink};
use crate::executor::{InvestigationExecutor, PathwayRun};
use crate::index::ProjectIndex;
use crate::model::{AdjudicatedEvidence, EvidenceItem, EvidenceManifest, Plan};
use crate::project::{Project, ProjectStore};

/// Flag added to rewritten records when the contrarian check lands.
pub const FLAG_CONTRARIAN_DOWNGRADE: &str = "contrarian-downgrade";

/// Consensus triggers when at least this many records exist...
const CONSENSUS_MIN_TOTAL: usize = 3;
/// ...and the verified-or-plausible fraction exceeds this.
const CONSENSUS_FRACTION: f64 = 0.8;

/// How many related prior projects reconciliation examines.
const RECONCILIATION_LIMIT: usize = 3;

/// The adjudicated file written per sub-question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubQuestionAdjudication {
    pub sub_question_id: String,
    pub records: Vec<AdjudicatedEvidence>,
}

/// Aggregates pathway results per sub-question and applies the consensus
/// and reconciliation passes.
pub struct Adjudicator {
    executor: Arc<InvestigationExecutor>,
    index: Arc<dyn ProjectIndex>,
    sink: Arc<dyn EventSink>,
}

impl Adjudicator {
    pub fn new(
        executor: Arc<InvestigationExecutor>,
        index: Arc<dyn ProjectIndex>,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            executor,
            index,
            sink,
        }
    }

    /// Adjudicate every sub-question, writing one file each.
    pub async fn adjudicate(
        &self,
        project: &Project,
        plan: &Plan,
        manifests: &[EvidenceManifest],
        runs: &[PathwayRun],
        store: &ProjectStore,
    ) -> Result<Vec<SubQuestionAdjudication>> {
        let disputes = self.prior_disputes(&project.topic).await;

        let mut adjudications = Vec::with_capacity(plan.sub_questions.len());
        for sub_question in &plan.sub_questions {
            let mut records = self.gather_records(&sub_question.id, manifests, runs);

            self.consensus_pass(&sub_question.id, manifests, &mut records, store)
                .await;

            // Cross-project disputes annotate every record.
            for dispute in &disputes {
                for record in &mut records {
                    record.flags.push(dispute.clone());
                }
            }

            let adjudication = SubQuestionAdjudication {
                sub_question_id: sub_question.id.clone(),
                records,
            };
            store.write_json(&store.adjudicated_file(&sub_question.id), &adjudication)?;
            adjudications.push(adjudication);
        }

        Ok(adjudications)
    }

    /// Pair each covered evidence item with its pathway result.
    fn gather_records(
        &self,
        sub_question_id: &str,
        manifests: &[EvidenceManifest],
        runs: &[PathwayRun],
    ) -> Vec<AdjudicatedEvidence> {
        manifests
            .iter()
            .filter(|m| m.covers(sub_question_id))
            .flat_map(|m| m.evidence_items.iter())
            .filter_map(|item| {
                let run = runs.iter().find(|r| r.evidence_id == item.id)?;
                Some(AdjudicatedEvidence {
                    evidence_id: item.id.clone(),
                    confidence: run.confidence.confidence,
                    label: run.confidence.label.clone(),
                    rationale: run.confidence.rationale.clone(),
                    pathway_id: run.pathway_id.clone(),
                    levels_completed: run.results.iter().filter(|r| r.is_some()).count(),
                    flags: run.confidence.flags.clone(),
                })
            })
            .collect()
    }

    /// Spawn the contrarian pathway when consensus is suspiciously strong,
    /// and apply its downgrade recommendation if it makes one.
    async fn consensus_pass(
        &self,
        sub_question_id: &str,
        manifests: &[EvidenceManifest],
        records: &mut [AdjudicatedEvidence],
        store: &ProjectStore,
    ) {
        let total = records.len();
        if total < CONSENSUS_MIN_TOTAL {
            return;
        }
        let verified_or_plausible = records
            .iter()
            .filter(|r| r.confidence >= Confidence::Plausible)
            .count();
        let fraction = verified_or_plausible as f64 / total as f64;
        if fraction <= CONSENSUS_FRACTION {
            return;
        }

        info!(
            sub_question = sub_question_id,
            fraction, "consensus detected, spawning contrarian pathway"
        );

        let Some(consensus_item) = self.consensus_item(sub_question_id, manifests) else {
            return;
        };

        // Best-effort: a failed contrarian run leaves the records alone.
        let run = match self.executor.run(&consensus_item, store, &[]).await {
            Ok(run) => run,
            Err(err) => {
                warn!(sub_question = sub_question_id, "contrarian pathway failed: {}", err);
                return;
            }
        };

        if !recommends_downgrade(&run) {
            debug!(sub_question = sub_question_id, "contrarian check found no adjustment");
            return;
        }

        let mut rewritten = 0;
        for record in records.iter_mut() {
            if record.confidence == Confidence::Verified {
                record.confidence = Confidence::Plausible;
                record.label = Confidence::Plausible.label().to_string();
                record.flags.push(FLAG_CONTRARIAN_DOWNGRADE.to_string());
                rewritten += 1;
            }
        }

        self.sink.emit(EngineEvent::new(
            EventKind::Phase,
            serde_json::json!({
                "phase": "adjudicating",
                "status": "contrarian_downgrade",
                "subQuestionId": sub_question_id,
                "rewritten": rewritten,
            }),
        ));
    }

    /// Synthetic evidence item driving the P-CON pathway.
    fn consensus_item(
        &self,
        sub_question_id: &str,
        manifests: &[EvidenceManifest],
    ) -> Option<EvidenceItem> {
        let first = manifests
            .iter()
            .filter(|m| m.covers(sub_question_id))
            .flat_map(|m| m.evidence_items.iter())
            .next()?;

        Some(EvidenceItem {
            id: format!("consensus-{}", sub_question_id),
            evidence_type: first.evidence_type,
            source_rating: crate::model::SourceRating::A,
            info_rating: 1,
            description: format!(
                "Contrarian review of the consensus for sub-question {}",
                sub_question_id
            ),
            citation: None,
            triggered_pathway: "P-CON".to_string(),
        })
    }

    /// Dispute annotations from related prior projects, bounded to the
    /// first few matches. Failures degrade to no annotations.
    async fn prior_disputes(&self, topic: &str) -> Vec<String> {
        let related = match self.index.related(topic, RECONCILIATION_LIMIT).await {
            Ok(related) => related,
            Err(err) => {
                warn!("cross-project reconciliation unavailable: {}", err);
                return Vec::new();
            }
        };

        related
            .iter()
            .filter_map(|prior| {
                let disputed = prior
                    .graph
                    .get("nodes")
                    .and_then(Value::as_array)
                    .map(|nodes| {
                        nodes
                            .iter()
                            .filter(|n| n.get("confidence").and_then(Value::as_str) == Some("disputed"))
                            .count()
                    })
                    .unwrap_or(0);
                if disputed == 0 {
                    return None;
                }
                Some(format!(
                    "cross-project-dispute: {} has {} disputed nodes",
                    prior.topic, disputed
                ))
            })
            .collect()
    }
}

/// Whether the contrarian run's last completed level recommends dropping
/// the consensus one level.
fn recommends_downgrade(run: &PathwayRun) -> bool {
    let Some(last) = run.results.iter().flatten().last() else {
        return false;
    };
    last.findings
        .get("adjustmentRecommendation")
        .and_then(Value::as_str)
        .is_some_and(|r| r.starts_with("downgrade"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::MemorySink;
    use crate::index::{NullIndex, RelatedProject};
    use crate::model::{EvidenceType, SourceRating, SubQuestion};
    use crate::pathway::PathwayCatalog;
    use crate::worker::testing::ScriptedGateway;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        gateway: Arc<ScriptedGateway>,
        adjudicator: Adjudicator,
        store: ProjectStore,
        _dirs: (TempDir, TempDir),
    }

    fn fixture_with_index(index: Arc<dyn ProjectIndex>) -> Fixture {
        let pathways_dir = TempDir::new().unwrap();
        std::fs::write(
            pathways_dir.path().join("P-CON.json"),
            serde_json::to_string(&json!({
                "id": "P-CON",
                "levels": [{
                    "depth": 1,
                    "name": "contrarian sweep",
                    "workerTemplate": "contrarian",
                    "task": {"purpose": "p", "keyTasks": [], "endState": "e"},
                    "requiredOutputs": [],
                    "branches": []
                }]
            }))
            .unwrap(),
        )
        .unwrap();

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

        Fixture {
            gateway,
            adjudicator: Adjudicator::new(executor, index, sink),
            store,
            _dirs: (pathways_dir, projects_dir),
        }
    }

    fn fixture() -> Fixture {
        fixture_with_index(Arc::new(NullIndex))
    }

    fn plan_one(id: &str) -> Plan {
        Plan {
            sub_questions: vec![SubQuestion {
                id: id.to_string(),
                question: "What does the evidence show?".to_string(),
                scope: None,
                expected_evidence_types: vec![],
            }],
        }
    }

    fn item(id: &str) -> EvidenceItem {
        EvidenceItem {
            id: id.to_string(),
            evidence_type: EvidenceType::Scientific,
            source_rating: SourceRating::A,
            info_rating: 1,
            description: "evidence".to_string(),
            citation: None,
            triggered_pathway: "P-SCI".to_string(),
        }
    }

    fn run_with(evidence_id: &str, confidence: Confidence) -> PathwayRun {
        PathwayRun {
            evidence_id: evidence_id.to_string(),
            pathway_id: "P-SCI".to_string(),
            results: vec![],
            confidence: crate::confidence::ConfidenceAssessment {
                confidence,
                label: confidence.label().to_string(),
                rationale: "test".to_string(),
                flags: vec![],
            },
            cross_pathways: vec![],
        }
    }

    fn manifest_covering(q: &str, items: Vec<EvidenceItem>) -> EvidenceManifest {
        EvidenceManifest {
            sub_question_id: None,
            sub_questions: vec![q.to_string()],
            evidence_items: items,
        }
    }

    // Scenario: 4 V + 1 P, contrarian recommends a one-level downgrade;
    // every V record rewrites to P and gains the flag.
    #[tokio::test]
    async fn test_consensus_contrarian_downgrade() {
        let f = fixture();
        f.gateway.script_output(json!({
            "pathwayId": "P-CON",
            "depth": 1,
            "evidenceFound": true,
            "findings": {"adjustmentRecommendation": "downgrade-one-level"},
            "citations": [],
            "nextEvidenceTypes": []
        }));

        let items: Vec<EvidenceItem> = (0..5).map(|i| item(&format!("ev-{}", i))).collect();
        let runs: Vec<PathwayRun> = (0..5)
            .map(|i| {
                run_with(
                    &format!("ev-{}", i),
                    if i < 4 { Confidence::Verified } else { Confidence::Plausible },
                )
            })
            .collect();

        let project = Project::new("proj-1", "topic");
        let adjudications = f
            .adjudicator
            .adjudicate(
                &project,
                &plan_one("q1"),
                &[manifest_covering("q1", items)],
                &runs,
                &f.store,
            )
            .await
            .unwrap();

        let records = &adjudications[0].records;
        assert_eq!(records.len(), 5);
        assert!(records.iter().all(|r| r.confidence == Confidence::Plausible));
        let downgraded = records
            .iter()
            .filter(|r| r.flags.iter().any(|f| f == FLAG_CONTRARIAN_DOWNGRADE))
            .count();
        assert_eq!(downgraded, 4);

        // One adjudicated file per sub-question.
        let written: SubQuestionAdjudication =
            f.store.read_json(&f.store.adjudicated_file("q1")).unwrap();
        assert_eq!(written.records.len(), 5);
    }

    #[tokio::test]
    async fn test_no_consensus_below_threshold() {
        let f = fixture();
        // 2 of 5 verified-or-plausible: fraction 0.4, no contrarian spawn.
        let items: Vec<EvidenceItem> = (0..5).map(|i| item(&format!("ev-{}", i))).collect();
        let runs: Vec<PathwayRun> = (0..5)
            .map(|i| {
                run_with(
                    &format!("ev-{}", i),
                    if i < 2 { Confidence::Verified } else { Confidence::Unverified },
                )
            })
            .collect();

        let project = Project::new("proj-1", "topic");
        f.adjudicator
            .adjudicate(
                &project,
                &plan_one("q1"),
                &[manifest_covering("q1", items)],
                &runs,
                &f.store,
            )
            .await
            .unwrap();

        assert!(f.gateway.spawned_labels().is_empty());
    }

    #[tokio::test]
    async fn test_small_groups_skip_consensus() {
        let f = fixture();
        // Fraction 1.0 but only 2 records: below the minimum total.
        let items = vec![item("ev-0"), item("ev-1")];
        let runs = vec![
            run_with("ev-0", Confidence::Verified),
            run_with("ev-1", Confidence::Verified),
        ];

        let project = Project::new("proj-1", "topic");
        let adjudications = f
            .adjudicator
            .adjudicate(
                &project,
                &plan_one("q1"),
                &[manifest_covering("q1", items)],
                &runs,
                &f.store,
            )
            .await
            .unwrap();

        assert!(f.gateway.spawned_labels().is_empty());
        assert!(adjudications[0]
            .records
            .iter()
            .all(|r| r.confidence == Confidence::Verified));
    }

    #[tokio::test]
    async fn test_advisory_recommendation_is_ignored() {
        let f = fixture();
        f.gateway.script_output(json!({
            "pathwayId": "P-CON",
            "depth": 1,
            "evidenceFound": true,
            "findings": {"adjustmentRecommendation": "note-minority-view"},
            "citations": [],
            "nextEvidenceTypes": []
        }));

        let items: Vec<EvidenceItem> = (0..4).map(|i| item(&format!("ev-{}", i))).collect();
        let runs: Vec<PathwayRun> = (0..4)
            .map(|i| run_with(&format!("ev-{}", i), Confidence::Verified))
            .collect();

        let project = Project::new("proj-1", "topic");
        let adjudications = f
            .adjudicator
            .adjudicate(
                &project,
                &plan_one("q1"),
                &[manifest_covering("q1", items)],
                &runs,
                &f.store,
            )
            .await
            .unwrap();

        assert!(adjudications[0]
            .records
            .iter()
            .all(|r| r.confidence == Confidence::Verified));
    }

    struct DisputedIndex;

    #[async_trait]
    impl ProjectIndex for DisputedIndex {
        async fn record(&self, _p: &Project, _g: &Value) -> Result<()> {
            Ok(())
        }

        async fn related(&self, _topic: &str, _limit: usize) -> Result<Vec<RelatedProject>> {
            Ok(vec![RelatedProject {
                project_id: "prior-1".to_string(),
                topic: "arsenic in rice".to_string(),
                graph: json!({"nodes": [
                    {"id": "a", "confidence": "disputed"},
                    {"id": "b", "confidence": "verified"},
                    {"id": "c", "confidence": "disputed"},
                ]}),
            }])
        }
    }

    #[tokio::test]
    async fn test_cross_project_dispute_flags_per_record() {
        let f = fixture_with_index(Arc::new(DisputedIndex));
        let items = vec![item("ev-0"), item("ev-1")];
        let runs = vec![
            run_with("ev-0", Confidence::Plausible),
            run_with("ev-1", Confidence::Unverified),
        ];

        let project = Project::new("proj-1", "arsenic in drinking water");
        let adjudications = f
            .adjudicator
            .adjudicate(
                &project,
                &plan_one("q1"),
                &[manifest_covering("q1", items)],
                &runs,
                &f.store,
            )
            .await
            .unwrap();

        for record in &adjudications[0].records {
            assert!(record
                .flags
                .iter()
                .any(|f| f == "cross-project-dispute: arsenic in rice has 2 disputed nodes"));
        }
    }
}
