//! Pathway catalog: a read-through cache over the definitions directory.
//!
//! Definitions are process-wide immutable state after first read; there is
//! no mutation or invalidation path.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};
use crate::model::EvidenceType;

use super::types::Pathway;

/// Loads and memoizes pathway definitions keyed by pathway id.
#[derive(Debug)]
pub struct PathwayCatalog {
    dir: PathBuf,
    cache: RwLock<HashMap<String, Arc<Pathway>>>,
}

impl PathwayCatalog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Get a pathway by id, loading `<dir>/<id>.json` on first request.
    pub fn get(&self, id: &str) -> Result<Arc<Pathway>> {
        if let Ok(cache) = self.cache.read() {
            if let Some(pathway) = cache.get(id) {
                return Ok(Arc::clone(pathway));
            }
        }

        let path = self.dir.join(format!("{}.json", id));
        let raw = std::fs::read_to_string(&path)
            .map_err(|_| Error::PathwayNotFound(id.to_string()))?;
        let pathway: Pathway = serde_json::from_str(&raw)?;
        let pathway = Arc::new(pathway);

        if let Ok(mut cache) = self.cache.write() {
            // A concurrent loader may have won the race; keep the first entry.
            return Ok(Arc::clone(
                cache
                    .entry(id.to_string())
                    .or_insert_with(|| Arc::clone(&pathway)),
            ));
        }
        Ok(pathway)
    }

    /// Resolve an evidence-type code to its pathway id, or None for a code
    /// outside the taxonomy.
    pub fn pathway_for_type(type_code: &str) -> Option<String> {
        type_code
            .parse::<EvidenceType>()
            .ok()
            .map(|t| t.pathway_id())
    }

    /// Number of definitions currently memoized.
    pub fn cached_count(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }
}
