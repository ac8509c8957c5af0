//! Evidence assembly: turning the aggregated node set into a readable,
//! time-ordered evidence list.
//!
//! Evidence is ordered by ingestion time rather than relevance score:
//! answer synthesis works from a coherent timeline, not a jumble sorted by
//! similarity. Placeholder alias tokens are translated to display names
//! here; unresolved placeholders stay as written.

use serde::{Deserialize, Serialize};

use memoir_core::types::ClipId;
use memoir_graph::{MemoryGraph, NodeKey};

use crate::rank::ScoredNode;

/// One entry of the final evidence set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Source clip for episodic evidence; `None` for identity profiles.
    pub clip_id: Option<ClipId>,
    /// Human-readable statement text, alias tokens translated.
    pub text: String,
    /// Display names of the identities this evidence involves.
    pub identities: Vec<String>,
}

/// Resolve the selected nodes to evidence items in ingestion-time order.
pub fn assemble(graph: &MemoryGraph, selected: &[ScoredNode]) -> Vec<EvidenceItem> {
    let mut ordered: Vec<&ScoredNode> = selected.iter().collect();
    ordered.sort_by_key(|s| s.order);

    let mut items = Vec::with_capacity(ordered.len());
    for scored in ordered {
        match scored.key {
            NodeKey::Clip(clip_id) => {
                let Some(node) = graph.episodic_by_clip(clip_id) else {
                    continue;
                };
                let text = node
                    .statement_texts()
                    .map(|t| graph.translate(t))
                    .collect::<Vec<_>>()
                    .join("\n");
                let identities = node
                    .mentions
                    .iter()
                    .map(|&id| graph.display_name(id))
                    .collect();
                items.push(EvidenceItem {
                    clip_id: Some(clip_id),
                    text,
                    identities,
                });
            }
            NodeKey::Person(id) => {
                let Some(node) = graph.identity(id) else {
                    continue;
                };
                let name = graph.display_name(id);
                items.push(EvidenceItem {
                    clip_id: None,
                    text: format!(
                        "{} appears from {} to {}",
                        name, node.first_seen, node.last_seen
                    ),
                    identities: vec![name],
                });
            }
        }
    }
    items
}
