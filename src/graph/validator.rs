//! Invariant checking for the synthesized knowledge graph.
//!
//! The validator works on raw JSON so malformed synthesis output produces a
//! report instead of a deserialization failure. Errors are invariant
//! violations; warnings are advisory (edge-type constraint mismatches,
//! isolated nodes, parent cycles). Edges may form cycles by design, so no
//! DAG assumption anywhere.

use serde_json::Value;
use std::collections::{HashMap, HashSet};

use super::types::{EdgeType, NodeType};

/// Outcome of one validation run.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    fn from_parts(errors: Vec<String>, warnings: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }
}

/// Allowed (source, target) node types per edge type. `None` means any.
fn edge_constraints(
    edge_type: EdgeType,
) -> (Option<&'static [NodeType]>, Option<&'static [NodeType]>) {
    use NodeType::*;
    match edge_type {
        EdgeType::Causation => (Some(&[Contaminant, Context]), Some(&[HealthEffect])),
        EdgeType::Evidence => (None, None),
        EdgeType::Composition => (
            Some(&[Domain]),
            Some(&[
                Contaminant,
                Solution,
                Context,
                HealthEffect,
                Product,
                Recommendation,
                Investigation,
            ]),
        ),
        EdgeType::Addresses => (
            Some(&[Solution, Product, Recommendation]),
            Some(&[HealthEffect, Contaminant]),
        ),
        EdgeType::Gap => (None, None),
        EdgeType::Contextualizes => (Some(&[Context]), None),
        EdgeType::Investigates => (Some(&[Investigation]), None),
    }
}

/// Validate a graph artifact against the structural and semantic
/// invariants.
pub fn validate(graph: &Value) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let Some(root) = graph.as_object() else {
        return ValidationReport::from_parts(vec!["graph is not an object".to_string()], warnings);
    };

    let nodes = match root.get("nodes") {
        Some(Value::Array(nodes)) => nodes.as_slice(),
        Some(_) => {
            errors.push("nodes is not an array".to_string());
            &[]
        }
        None => {
            errors.push("nodes is missing".to_string());
            &[]
        }
    };
    let edges = match root.get("edges") {
        Some(Value::Array(edges)) => edges.as_slice(),
        Some(_) => {
            errors.push("edges is not an array".to_string());
            &[]
        }
        None => {
            errors.push("edges is missing".to_string());
            &[]
        }
    };
    let topics = root
        .get("topics")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    // Node structure, id uniqueness (I1), and type membership.
    let mut node_types: HashMap<String, NodeType> = HashMap::new();
    let mut seen_ids: HashSet<String> = HashSet::new();
    for (index, node) in nodes.iter().enumerate() {
        let id = node.get("id").and_then(Value::as_str);
        let label = node.get("label").and_then(Value::as_str);
        let type_str = node.get("type").and_then(Value::as_str);

        let Some(id) = id.filter(|s| !s.is_empty()) else {
            errors.push(format!("node[{}] is missing an id", index));
            continue;
        };
        if label.is_none_or(str::is_empty) {
            errors.push(format!("node {} is missing a label", id));
        }
        match type_str.map(str::parse::<NodeType>) {
            Some(Ok(node_type)) => {
                node_types.insert(id.to_string(), node_type);
            }
            _ => errors.push(format!(
                "node {} has invalid type {:?}",
                id,
                type_str.unwrap_or("<missing>")
            )),
        }

        if !seen_ids.insert(id.to_string()) {
            errors.push(format!("duplicate node id: {}", id));
        }

        // I7: retracted evidence is excluded upstream.
        if node.get("confidence").and_then(Value::as_str) == Some("retracted") {
            errors.push(format!("node {} carries retracted confidence", id));
        }
    }

    // I4: parent references resolve.
    for node in nodes {
        let (Some(id), Some(parent)) = (
            node.get("id").and_then(Value::as_str),
            node.get("parent").and_then(Value::as_str),
        ) else {
            continue;
        };
        if !seen_ids.contains(parent) {
            errors.push(format!("node {} has unresolved parent {}", id, parent));
        }
    }
    warn_parent_cycles(nodes, &mut warnings);

    // Edge structure, type membership (with alias normalization), and
    // endpoint resolution (I2).
    let mut connected: HashSet<String> = HashSet::new();
    for (index, edge) in edges.iter().enumerate() {
        let source = edge.get("source").and_then(Value::as_str);
        let target = edge.get("target").and_then(Value::as_str);
        let type_str = edge.get("type").and_then(Value::as_str);

        let (Some(source), Some(target)) = (source, target) else {
            errors.push(format!("edge[{}] is missing source or target", index));
            continue;
        };
        if edge.get("label").and_then(Value::as_str).is_none_or(str::is_empty) {
            errors.push(format!("edge {} -> {} is missing a label", source, target));
        }

        let edge_type = type_str.and_then(EdgeType::normalize);
        if edge_type.is_none() {
            errors.push(format!(
                "edge {} -> {} has invalid type {:?}",
                source,
                target,
                type_str.unwrap_or("<missing>")
            ));
        }

        for endpoint in [source, target] {
            if !seen_ids.contains(endpoint) {
                errors.push(format!("edge endpoint {} does not resolve to a node", endpoint));
            }
        }
        connected.insert(source.to_string());
        connected.insert(target.to_string());

        // Constraint table violations are warnings only.
        if let Some(edge_type) = edge_type {
            let (allowed_sources, allowed_targets) = edge_constraints(edge_type);
            if let (Some(allowed), Some(actual)) = (allowed_sources, node_types.get(source)) {
                if !allowed.contains(actual) {
                    warnings.push(format!(
                        "{} edge from {} node {}",
                        edge_type.as_str(),
                        actual.as_str(),
                        source
                    ));
                }
            }
            if let (Some(allowed), Some(actual)) = (allowed_targets, node_types.get(target)) {
                if !allowed.contains(actual) {
                    warnings.push(format!(
                        "{} edge to {} node {}",
                        edge_type.as_str(),
                        actual.as_str(),
                        target
                    ));
                }
            }
        }
    }

    // Topic entries must be well-formed.
    for (id, topic) in &topics {
        if topic.get("title").and_then(Value::as_str).is_none_or(str::is_empty) {
            errors.push(format!("topic {} is missing a title", id));
        }
        if let Some(sections) = topic.get("sections") {
            if !sections.is_array() {
                errors.push(format!("topic {} sections is not a list", id));
            }
        }
    }

    // I3: full topic coverage of non-domain nodes.
    let non_domain: Vec<&str> = nodes
        .iter()
        .filter_map(|n| {
            let id = n.get("id").and_then(Value::as_str)?;
            (node_types.get(id) != Some(&NodeType::Domain)).then_some(id)
        })
        .collect();
    let missing_topics: Vec<&str> = non_domain
        .iter()
        .filter(|id| !topics.contains_key(**id))
        .copied()
        .collect();
    if !missing_topics.is_empty() {
        errors.push(format!(
            "topic coverage {}/{}: missing entries for {}",
            non_domain.len() - missing_topics.len(),
            non_domain.len(),
            missing_topics.join(", ")
        ));
    }

    // I5: qualified confidence must surface in the topic text.
    for node in nodes {
        let (Some(id), Some(confidence)) = (
            node.get("id").and_then(Value::as_str),
            node.get("confidence").and_then(Value::as_str),
        ) else {
            continue;
        };
        if confidence != "unverified" && confidence != "disputed" {
            continue;
        }
        let Some(topic) = topics.get(id) else { continue };
        if !topic_mentions(topic, confidence) {
            errors.push(format!(
                "node {} is {} but its topic does not surface the qualification",
                id, confidence
            ));
        }
    }

    // I6: a recommendations domain with at least three recommendation
    // children.
    if node_types.get("recommendations") == Some(&NodeType::Domain) {
        let children = nodes
            .iter()
            .filter(|n| {
                n.get("parent").and_then(Value::as_str) == Some("recommendations")
                    && n.get("id")
                        .and_then(Value::as_str)
                        .is_some_and(|id| node_types.get(id) == Some(&NodeType::Recommendation))
            })
            .count();
        if children < 3 {
            errors.push(format!(
                "recommendations domain has {} recommendation children, need at least 3",
                children
            ));
        }
    } else {
        errors.push("missing recommendations domain node".to_string());
    }

    // Isolated non-domain nodes.
    for id in &non_domain {
        if !connected.contains(*id) {
            warnings.push(format!("non-domain node {} is isolated", id));
        }
    }

    ValidationReport::from_parts(errors, warnings)
}

fn topic_mentions(topic: &Value, word: &str) -> bool {
    let mut text = topic
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_lowercase();
    if let Some(sections) = topic.get("sections").and_then(Value::as_array) {
        for section in sections {
            text.push(' ');
            text.push_str(&section.to_string().to_lowercase());
        }
    }
    text.contains(word)
}

/// Parent links form a tree by intent; a cycle is reported as a warning.
fn warn_parent_cycles(nodes: &[Value], warnings: &mut Vec<String>) {
    let parents: HashMap<&str, &str> = nodes
        .iter()
        .filter_map(|n| {
            Some((
                n.get("id").and_then(Value::as_str)?,
                n.get("parent").and_then(Value::as_str)?,
            ))
        })
        .collect();

    let mut flagged: HashSet<&str> = HashSet::new();
    for start in parents.keys() {
        let mut current = *start;
        let mut seen = HashSet::new();
        while let Some(&next) = parents.get(current) {
            if !seen.insert(current) {
                if flagged.insert(*start) {
                    warnings.push(format!("parent chain from {} forms a cycle", start));
                }
                break;
            }
            current = next;
        }
    }
}
