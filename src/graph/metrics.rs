//! Topology metrics over a graph artifact.
//!
//! Density is directed; degree and connectivity treat edges as undirected.
//! Connected components come from a union-find over node ids.

use serde_json::Value;
use std::collections::HashMap;

/// Summary topology numbers for a graph.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyMetrics {
    pub density: f64,
    pub average_degree: f64,
    pub connected_component_count: usize,
}

struct UnionFind {
    parent: Vec<usize>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[rb] = ra;
        }
    }
}

/// Compute density, average degree, and component count. The empty graph
/// yields all zeros. Edges with unresolved endpoints are ignored.
pub fn compute_topology_metrics(graph: &Value) -> TopologyMetrics {
    let nodes = graph
        .get("nodes")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);
    let edges = graph
        .get("edges")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    let ids: HashMap<&str, usize> = nodes
        .iter()
        .filter_map(|n| n.get("id").and_then(Value::as_str))
        .enumerate()
        .map(|(i, id)| (id, i))
        .collect();
    let n = ids.len();
    if n == 0 {
        return TopologyMetrics {
            density: 0.0,
            average_degree: 0.0,
            connected_component_count: 0,
        };
    }

    let mut union_find = UnionFind::new(n);
    let mut resolved_edges = 0usize;
    for edge in edges {
        let (Some(source), Some(target)) = (
            edge.get("source").and_then(Value::as_str),
            edge.get("target").and_then(Value::as_str),
        ) else {
            continue;
        };
        let (Some(&a), Some(&b)) = (ids.get(source), ids.get(target)) else {
            continue;
        };
        resolved_edges += 1;
        union_find.union(a, b);
    }

    let density = if n > 1 {
        resolved_edges as f64 / (n as f64 * (n as f64 - 1.0))
    } else {
        0.0
    };
    let average_degree = 2.0 * resolved_edges as f64 / n as f64;

    let mut roots = std::collections::HashSet::new();
    for i in 0..n {
        roots.insert(union_find.find(i));
    }

    TopologyMetrics {
        density,
        average_degree,
        connected_component_count: roots.len(),
    }
}
