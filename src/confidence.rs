//! Deterministic confidence calculus over a pathway's level outputs.
//!
//! Classification runs in two passes: a strict-order base-rule match
//! (retraction, contradiction, verified, plausible, unverified), then a
//! modifier pass over the ordered ladder (caps to PLAUSIBLE, a single
//! downgrade, per-flag upgrades). Retraction is terminal and skips
//! modifiers entirely. Every signal is a count or a disjunction, so the
//! result is stable under permutation of the level outputs.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::pathway::types::LevelOutput;

/// Pipeline flag: industry-funded findings with no confirming replication.
pub const FLAG_INDUSTRY_FUNDING: &str = "industry-funding-no-replication";
/// Pipeline flag: testimonial evidence only.
pub const FLAG_TESTIMONIAL_ONLY: &str = "testimonial-only";
/// Pipeline flag: case report / animal / in-vitro evidence only.
pub const FLAG_LOW_HIERARCHY: &str = "low-hierarchy-only";
/// Pipeline flag: smallest reported sample below 30.
pub const FLAG_SMALL_SAMPLE: &str = "small-sample";

/// Categorical confidence, totally ordered R < D < U < P < V.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Confidence {
    #[serde(rename = "R")]
    Retracted,
    #[serde(rename = "D")]
    Disputed,
    #[serde(rename = "U")]
    Unverified,
    #[serde(rename = "P")]
    Plausible,
    #[serde(rename = "V")]
    Verified,
}

impl Confidence {
    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Retracted => "RETRACTED",
            Self::Disputed => "DISPUTED",
            Self::Unverified => "UNVERIFIED",
            Self::Plausible => "PLAUSIBLE",
            Self::Verified => "VERIFIED",
        }
    }

    /// Lowercase form used in graph nodes.
    pub fn graph_label(&self) -> &'static str {
        match self {
            Self::Retracted => "retracted",
            Self::Disputed => "disputed",
            Self::Unverified => "unverified",
            Self::Plausible => "plausible",
            Self::Verified => "verified",
        }
    }

    /// Midpoint of the categorical range, rounded to 2 decimals.
    pub fn score(&self) -> f64 {
        match self {
            Self::Retracted => 0.0,
            Self::Disputed => 0.12,
            Self::Unverified => 0.345,
            Self::Plausible => 0.67,
            Self::Verified => 0.925,
        }
    }

    /// One step down the ladder, saturating at RETRACTED.
    pub fn downgraded(&self) -> Self {
        match self {
            Self::Verified => Self::Plausible,
            Self::Plausible => Self::Unverified,
            Self::Unverified => Self::Disputed,
            Self::Disputed | Self::Retracted => Self::Retracted,
        }
    }

    /// One step up the ladder, saturating at VERIFIED.
    pub fn upgraded(&self) -> Self {
        match self {
            Self::Retracted => Self::Disputed,
            Self::Disputed => Self::Unverified,
            Self::Unverified => Self::Plausible,
            Self::Plausible | Self::Verified => Self::Verified,
        }
    }

    /// Parse the lowercase graph form.
    pub fn from_graph_label(s: &str) -> Option<Self> {
        match s {
            "retracted" => Some(Self::Retracted),
            "disputed" => Some(Self::Disputed),
            "unverified" => Some(Self::Unverified),
            "plausible" => Some(Self::Plausible),
            "verified" => Some(Self::Verified),
            _ => None,
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// The engine's verdict for one evidence item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceAssessment {
    pub confidence: Confidence,
    pub label: String,
    pub rationale: String,
    /// Pipeline flags: inherited ones plus those harvested from findings
    pub flags: Vec<String>,
}

impl ConfidenceAssessment {
    /// Synthetic assessment for a pathway that failed outright.
    pub fn pathway_failed(reason: &str) -> Self {
        Self {
            confidence: Confidence::Unverified,
            label: Confidence::Unverified.label().to_string(),
            rationale: format!("Pathway failed: {}", reason),
            flags: Vec::new(),
        }
    }
}

/// Signals accumulated across all completed levels of a pathway.
#[derive(Debug, Default, Clone)]
struct FindingsSummary {
    retraction: bool,
    contradiction: bool,
    confirmations: u32,
    unresolved_bias: bool,
    methodology_unsound: bool,
    high_quality_ratings: u32,
    other_ratings: u32,
    high_analysis_risk: bool,
    contrarian_credible: bool,
    large_effect: bool,
    dose_response: bool,
    industry_funding: bool,
    replication_confirmed: bool,
    testimonial_only: bool,
    low_hierarchy_only: bool,
    min_sample_size: Option<f64>,
}

impl FindingsSummary {
    fn scan(results: &[Option<LevelOutput>]) -> Self {
        let mut summary = Self::default();

        for output in results.iter().flatten() {
            let findings = &output.findings;

            // Retraction may surface in findings or only in the branch
            // signals a level published for its downstream conditions.
            if truthy(findings.get("retracted"))
                || truthy(output.signals().get("retracted"))
                || reports_retracted_confidence(findings)
            {
                summary.retraction = true;
            }
            if findings
                .get("contradictoryEvidence")
                .and_then(Value::as_array)
                .is_some_and(|list| !list.is_empty())
            {
                summary.contradiction = true;
            }

            if truthy(findings.get("replicationExists"))
                && truthy(findings.get("replicationConfirms"))
            {
                summary.confirmations += 1;
                summary.replication_confirmed = true;
            }
            for list_field in [
                "independentSources",
                "independentReports",
                "independentEvaluations",
                "additionalTestimonials",
            ] {
                if let Some(list) = findings.get(list_field).and_then(Value::as_array) {
                    summary.confirmations += list.len() as u32;
                }
            }
            if truthy(findings.get("valuesMatch")) {
                summary.confirmations += 1;
            }
            if truthy(findings.get("convergence")) {
                summary.confirmations += 1;
            }

            if string_is(findings, "overallBias", "high")
                || truthy(findings.get("conflictsFound"))
                || truthy(findings.get("fundingBiasPattern"))
            {
                summary.unresolved_bias = true;
            }

            if findings.get("methodsAppropriate") == Some(&Value::Bool(false))
                || string_is(findings, "pHackingRisk", "high")
                || string_is(findings, "cherryPickingRisk", "high")
            {
                summary.methodology_unsound = true;
            }
            if string_is(findings, "pHackingRisk", "high")
                || string_is(findings, "cherryPickingRisk", "high")
            {
                summary.high_analysis_risk = true;
            }

            match output.source_rating {
                Some(rating) if rating.is_high_quality() => summary.high_quality_ratings += 1,
                Some(_) => summary.other_ratings += 1,
                None => {}
            }

            if truthy(findings.get("contrarianCredible")) {
                summary.contrarian_credible = true;
            }
            if truthy(findings.get("largeEffect")) {
                summary.large_effect = true;
            }
            if truthy(findings.get("doseResponse")) {
                summary.dose_response = true;
            }

            if truthy(findings.get("industryFunded"))
                || findings
                    .get("fundingSource")
                    .and_then(Value::as_str)
                    .is_some_and(|s| s.to_lowercase().contains("industry"))
            {
                summary.industry_funding = true;
            }
            if truthy(findings.get("testimonialOnly")) {
                summary.testimonial_only = true;
            }
            if truthy(findings.get("lowHierarchyOnly"))
                || (is_low_hierarchy_study(findings) && !truthy(findings.get("higherEvidenceExists")))
            {
                summary.low_hierarchy_only = true;
            }

            if let Some(size) = findings.get("sampleSize").and_then(as_number) {
                summary.min_sample_size = Some(match summary.min_sample_size {
                    Some(current) => current.min(size),
                    None => size,
                });
            }
        }

        summary
    }

    fn small_sample(&self) -> bool {
        self.min_sample_size.is_some_and(|n| n < 30.0)
    }

    /// Flags this pathway contributes back to the pipeline, in fixed order.
    fn harvest_flags(&self) -> Vec<&'static str> {
        let mut flags = Vec::new();
        if self.industry_funding && !self.replication_confirmed {
            flags.push(FLAG_INDUSTRY_FUNDING);
        }
        if self.testimonial_only {
            flags.push(FLAG_TESTIMONIAL_ONLY);
        }
        if self.low_hierarchy_only {
            flags.push(FLAG_LOW_HIERARCHY);
        }
        if self.small_sample() {
            flags.push(FLAG_SMALL_SAMPLE);
        }
        flags
    }
}

/// Classify one evidence item from its level outputs and inherited flags.
///
/// Total: every input maps to exactly one confidence. Gaps (`None` results)
/// contribute no signals.
pub fn assess(results: &[Option<LevelOutput>], inherited_flags: &[String]) -> ConfidenceAssessment {
    let summary = FindingsSummary::scan(results);

    let mut flags: Vec<String> = inherited_flags.to_vec();
    for flag in summary.harvest_flags() {
        if !flags.iter().any(|f| f == flag) {
            flags.push(flag.to_string());
        }
    }

    // Base rules, strict order, first match wins.
    if summary.retraction {
        // R1 is terminal: no modifier pass.
        return ConfidenceAssessment {
            confidence: Confidence::Retracted,
            label: Confidence::Retracted.label().to_string(),
            rationale: "Retraction detected in the evidence trail".to_string(),
            flags,
        };
    }

    let (mut confidence, base_rationale) = if summary.contradiction {
        (
            Confidence::Disputed,
            "Contradictory evidence of comparable quality".to_string(),
        )
    } else if summary.confirmations >= 3
        && summary.high_quality_ratings >= 3
        && !summary.unresolved_bias
        && !summary.methodology_unsound
    {
        (
            Confidence::Verified,
            format!(
                "{} independent confirmations across {} A/B-rated sources, no unresolved bias, sound methodology",
                summary.confirmations, summary.high_quality_ratings
            ),
        )
    } else if summary.confirmations >= 1
        || summary.high_quality_ratings >= 1
        || summary.other_ratings >= 3
        || (summary.unresolved_bias && summary.confirmations > 0)
    {
        (
            Confidence::Plausible,
            "Partial corroboration or credible sourcing".to_string(),
        )
    } else {
        (
            Confidence::Unverified,
            "Insufficient corroboration".to_string(),
        )
    };

    let mut rationale = vec![base_rationale];

    // Caps to PLAUSIBLE.
    let has_flag = |flag: &str| flags.iter().any(|f| f == flag);
    let mut cap_reasons = Vec::new();
    if has_flag(FLAG_INDUSTRY_FUNDING) {
        cap_reasons.push("industry funding without replication");
    }
    if has_flag(FLAG_TESTIMONIAL_ONLY) {
        cap_reasons.push("testimonial evidence only");
    }
    if has_flag(FLAG_LOW_HIERARCHY) {
        cap_reasons.push("low-hierarchy evidence only");
    }
    if has_flag(FLAG_SMALL_SAMPLE) {
        cap_reasons.push("sample size < 30");
    }
    let capped = !cap_reasons.is_empty();
    if capped && confidence > Confidence::Plausible {
        confidence = Confidence::Plausible;
    }
    for reason in &cap_reasons {
        rationale.push(format!("capped at PLAUSIBLE: {}", reason));
    }

    // Downgrade by one, at most once.
    if summary.high_analysis_risk || summary.contrarian_credible {
        confidence = confidence.downgraded();
        rationale.push(if summary.high_analysis_risk {
            "downgraded: elevated p-hacking or cherry-picking risk".to_string()
        } else {
            "downgraded: credible contrarian evidence".to_string()
        });
    }

    // Upgrades, one step per flag.
    if summary.large_effect {
        confidence = confidence.upgraded();
        rationale.push("upgraded: large effect size".to_string());
    }
    if summary.dose_response {
        confidence = confidence.upgraded();
        rationale.push("upgraded: dose-response relationship".to_string());
    }

    // A cap holds against later upgrades.
    if capped && confidence > Confidence::Plausible {
        confidence = Confidence::Plausible;
    }

    ConfidenceAssessment {
        confidence,
        label: confidence.label().to_string(),
        rationale: rationale.join("; "),
        flags,
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(_)) => true,
    }
}

fn string_is(findings: &Value, field: &str, expected: &str) -> bool {
    findings
        .get(field)
        .and_then(Value::as_str)
        .is_some_and(|s| s.eq_ignore_ascii_case(expected))
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn reports_retracted_confidence(findings: &Value) -> bool {
    findings
        .get("confidence")
        .and_then(Value::as_str)
        .is_some_and(|s| s == "R" || s.eq_ignore_ascii_case("retracted"))
}

fn is_low_hierarchy_study(findings: &Value) -> bool {
    for field in ["studyType", "evidenceHierarchy"] {
        if let Some(kind) = findings.get(field).and_then(Value::as_str) {
            let kind = kind.to_lowercase();
            if kind.contains("case report")
                || kind.contains("case-report")
                || kind.contains("animal")
                || kind.contains("in vitro")
                || kind.contains("in-vitro")
            {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SourceRating;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn level(depth: u32, rating: Option<SourceRating>, findings: Value) -> Option<LevelOutput> {
        Some(LevelOutput {
            pathway_id: "P-SCI".to_string(),
            depth,
            evidence_found: true,
            source_rating: rating,
            info_rating: Some(2),
            findings,
            branch_signals: None,
            citations: vec![],
            next_evidence_types: vec![],
        })
    }

    #[test]
    fn test_ordering() {
        assert!(Confidence::Retracted < Confidence::Disputed);
        assert!(Confidence::Disputed < Confidence::Unverified);
        assert!(Confidence::Unverified < Confidence::Plausible);
        assert!(Confidence::Plausible < Confidence::Verified);
    }

    #[test]
    fn test_wire_form_and_labels() {
        assert_eq!(serde_json::to_string(&Confidence::Retracted).unwrap(), "\"R\"");
        assert_eq!(Confidence::Verified.label(), "VERIFIED");
        assert_eq!(Confidence::Plausible.score(), 0.67);
    }

    // Scenario: retraction short-circuit. A single retracted level wins over
    // everything, and modifier flags are ignored.
    #[test]
    fn test_retraction_short_circuit() {
        let results = vec![
            level(
                1,
                Some(SourceRating::A),
                json!({"retracted": true, "largeEffect": true, "sampleSize": 10}),
            ),
            level(
                2,
                Some(SourceRating::A),
                json!({"independentSources": ["a", "b", "c"]}),
            ),
        ];

        let assessment = assess(&results, &[]);
        assert_eq!(assessment.confidence, Confidence::Retracted);
        assert_eq!(assessment.label, "RETRACTED");
        assert!(!assessment.rationale.contains("upgraded"));
    }

    #[test]
    fn test_retracted_confidence_string_detected() {
        let results = vec![level(1, None, json!({"confidence": "retracted"}))];
        assert_eq!(assess(&results, &[]).confidence, Confidence::Retracted);
    }

    #[test]
    fn test_contradiction_yields_disputed() {
        let results = vec![level(
            1,
            Some(SourceRating::A),
            json!({"contradictoryEvidence": [{"source": "other lab"}]}),
        )];
        assert_eq!(assess(&results, &[]).confidence, Confidence::Disputed);
    }

    #[test]
    fn test_verified_path() {
        let results = vec![
            level(
                1,
                Some(SourceRating::A),
                json!({"replicationExists": true, "replicationConfirms": true}),
            ),
            level(
                2,
                Some(SourceRating::A),
                json!({"independentSources": ["x", "y"]}),
            ),
            level(3, Some(SourceRating::B), json!({"methodsAppropriate": true})),
        ];

        let assessment = assess(&results, &[]);
        assert_eq!(assessment.confidence, Confidence::Verified);
    }

    // Scenario: verified path with a small-sample cap.
    #[test]
    fn test_small_sample_caps_verified_to_plausible() {
        let results = vec![
            level(
                1,
                Some(SourceRating::A),
                json!({"replicationExists": true, "replicationConfirms": true, "sampleSize": 20}),
            ),
            level(
                2,
                Some(SourceRating::A),
                json!({"independentSources": ["x", "y"]}),
            ),
            level(3, Some(SourceRating::A), json!({"methodsAppropriate": true})),
        ];

        let assessment = assess(&results, &[]);
        assert_eq!(assessment.confidence, Confidence::Plausible);
        assert!(assessment.rationale.contains("sample size < 30"));
        assert!(assessment.flags.iter().any(|f| f == FLAG_SMALL_SAMPLE));
    }

    #[test]
    fn test_cap_holds_against_upgrades() {
        // Base V via three independent sources; the industry flag caps to P
        // and the two upgrades may not lift the result back past it.
        let results = vec![
            level(
                1,
                Some(SourceRating::A),
                json!({
                    "industryFunded": true,
                    "largeEffect": true,
                    "doseResponse": true
                }),
            ),
            level(
                2,
                Some(SourceRating::A),
                json!({"independentSources": ["x", "y", "z"]}),
            ),
            level(3, Some(SourceRating::A), json!({})),
        ];

        let assessment = assess(&results, &[]);
        assert_eq!(assessment.confidence, Confidence::Plausible);
        assert!(assessment.flags.iter().any(|f| f == FLAG_INDUSTRY_FUNDING));
    }

    #[test]
    fn test_industry_with_replication_is_not_flagged() {
        let results = vec![level(
            1,
            Some(SourceRating::A),
            json!({"industryFunded": true, "replicationExists": true, "replicationConfirms": true}),
        )];
        let assessment = assess(&results, &[]);
        assert!(!assessment.flags.iter().any(|f| f == FLAG_INDUSTRY_FUNDING));
    }

    #[test]
    fn test_downgrade_applies_once() {
        // Two levels with high risk still downgrade a single step.
        let results = vec![
            level(
                1,
                Some(SourceRating::A),
                json!({"independentSources": ["x"], "pHackingRisk": "high"}),
            ),
            level(2, Some(SourceRating::B), json!({"cherryPickingRisk": "high"})),
        ];

        // Base would be P (confirmations >= 1); one downgrade lands on U.
        let assessment = assess(&results, &[]);
        assert_eq!(assessment.confidence, Confidence::Unverified);
    }

    #[test]
    fn test_upgrades_stack() {
        let results = vec![level(
            1,
            Some(SourceRating::C),
            json!({"largeEffect": true, "doseResponse": true}),
        )];

        // Base U (one C rating, no confirmations), +2 upgrades = V.
        let assessment = assess(&results, &[]);
        assert_eq!(assessment.confidence, Confidence::Verified);
    }

    #[test]
    fn test_unverified_default() {
        let results = vec![level(1, Some(SourceRating::D), json!({}))];
        let assessment = assess(&results, &[]);
        assert_eq!(assessment.confidence, Confidence::Unverified);
        assert_eq!(assessment.rationale, "Insufficient corroboration");
    }

    #[test]
    fn test_gaps_contribute_nothing() {
        let results = vec![None, level(1, Some(SourceRating::A), json!({})), None];
        let assessment = assess(&results, &[]);
        assert_eq!(assessment.confidence, Confidence::Plausible);
    }

    #[test]
    fn test_inherited_flags_cap() {
        let results = vec![
            level(1, Some(SourceRating::A), json!({"replicationExists": true, "replicationConfirms": true})),
            level(2, Some(SourceRating::A), json!({"independentSources": ["x", "y"]})),
            level(3, Some(SourceRating::A), json!({})),
        ];

        let flags = vec![FLAG_TESTIMONIAL_ONLY.to_string()];
        let assessment = assess(&results, &flags);
        assert_eq!(assessment.confidence, Confidence::Plausible);
        assert!(assessment.rationale.contains("testimonial evidence only"));
    }

    #[test]
    fn test_stable_under_permutation() {
        let a = level(
            1,
            Some(SourceRating::A),
            json!({"replicationExists": true, "replicationConfirms": true}),
        );
        let b = level(2, Some(SourceRating::B), json!({"independentSources": ["x"]}));
        let c = level(3, Some(SourceRating::C), json!({"valuesMatch": true}));

        let forward = assess(&[a.clone(), b.clone(), c.clone()], &[]);
        let reversed = assess(&[c, b, a], &[]);
        assert_eq!(forward.confidence, reversed.confidence);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_findings() -> impl Strategy<Value = Value> {
            (
                any::<bool>(),
                any::<bool>(),
                0u32..5,
                any::<bool>(),
                proptest::option::of(0u32..200),
            )
                .prop_map(|(retracted, contradiction, sources, large_effect, sample)| {
                    let mut findings = serde_json::Map::new();
                    if retracted {
                        findings.insert("retracted".into(), json!(true));
                    }
                    if contradiction {
                        findings.insert("contradictoryEvidence".into(), json!(["c"]));
                    }
                    findings.insert(
                        "independentSources".into(),
                        json!(vec!["s"; sources as usize]),
                    );
                    if large_effect {
                        findings.insert("largeEffect".into(), json!(true));
                    }
                    if let Some(n) = sample {
                        findings.insert("sampleSize".into(), json!(n));
                    }
                    Value::Object(findings)
                })
        }

        fn arb_results() -> impl Strategy<Value = Vec<Option<LevelOutput>>> {
            proptest::collection::vec(
                proptest::option::of((1u32..5, arb_findings()).prop_map(|(depth, findings)| {
                    LevelOutput {
                        pathway_id: "P-SCI".to_string(),
                        depth,
                        evidence_found: true,
                        source_rating: Some(SourceRating::B),
                        info_rating: None,
                        findings,
                        branch_signals: None,
                        citations: vec![],
                        next_evidence_types: vec![],
                    }
                })),
                0..6,
            )
        }

        proptest! {
            // R1-R5 is total: every input classifies.
            #[test]
            fn classification_is_total(results in arb_results()) {
                let assessment = assess(&results, &[]);
                prop_assert!(!assessment.label.is_empty());
            }

            // Stable under input permutation.
            #[test]
            fn classification_is_permutation_stable(results in arb_results()) {
                let forward = assess(&results, &[]);
                let mut reversed = results.clone();
                reversed.reverse();
                let backward = assess(&reversed, &[]);
                prop_assert_eq!(forward.confidence, backward.confidence);
            }

            // Retraction dominates regardless of other findings.
            #[test]
            fn retraction_dominates(results in arb_results()) {
                let mut results = results;
                results.push(Some(LevelOutput {
                    pathway_id: "P-SCI".to_string(),
                    depth: 1,
                    evidence_found: true,
                    source_rating: Some(SourceRating::A),
                    info_rating: None,
                    findings: json!({"retracted": true}),
                    branch_signals: None,
                    citations: vec![],
                    next_evidence_types: vec![],
                }));
                prop_assert_eq!(assess(&results, &[]).confidence, Confidence::Retracted);
            }

            // Any active cap bounds the output at PLAUSIBLE.
            #[test]
            fn caps_bound_output(results in arb_results()) {
                let flags = vec![FLAG_INDUSTRY_FUNDING.to_string()];
                let assessment = assess(&results, &flags);
                if assessment.confidence != Confidence::Retracted {
                    prop_assert!(assessment.confidence <= Confidence::Plausible);
                }
            }
        }
    }
}
