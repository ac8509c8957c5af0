//! Snapshot persistence: one graph, one versioned JSON document.
//!
//! A snapshot must load in a different process from the one that wrote it
//! and reproduce every node, edge, and equivalence exactly, canonical ids
//! included. Derived indices are not serialized; they are rebuilt on load.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use memoir_core::error::{MemoirError, Result};

use crate::graph::MemoryGraph;

/// Current snapshot format version.
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    graph: &'a MemoryGraph,
}

#[derive(Deserialize)]
struct SnapshotEnvelope {
    version: u32,
    graph: MemoryGraph,
}

impl MemoryGraph {
    /// Write the graph to `path` as a versioned JSON snapshot.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let envelope = SnapshotRef {
            version: SNAPSHOT_VERSION,
            graph: self,
        };
        let json = serde_json::to_string_pretty(&envelope)?;
        std::fs::write(path, json)?;
        info!(
            path = %path.display(),
            episodic = self.episodic_count(),
            identities = self.identity_count(),
            "Graph snapshot saved"
        );
        Ok(())
    }

    /// Load a snapshot written by `save`, rebuilding derived indices.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let envelope: SnapshotEnvelope = serde_json::from_str(&json)?;
        if envelope.version != SNAPSHOT_VERSION {
            return Err(MemoirError::Serialization(format!(
                "unsupported snapshot version {} (expected {})",
                envelope.version, SNAPSHOT_VERSION
            )));
        }
        let mut graph = envelope.graph;
        graph.rebuild_indices();
        info!(
            path = %path.display(),
            episodic = graph.episodic_count(),
            identities = graph.identity_count(),
            "Graph snapshot loaded"
        );
        Ok(graph)
    }
}
