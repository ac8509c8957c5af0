//! Per-query ranking of graph nodes.
//!
//! Episodic nodes score by embedding similarity against their statements;
//! identity nodes score by term overlap between the query and the node's
//! resolved name. Both paths flow through the `Scored` capability on the
//! tagged `Node` view, so ranking never inspects node internals.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use memoir_core::types::Embedding;
use memoir_graph::{MemoryGraph, Node, NodeKey};

/// One ranked candidate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoredNode {
    pub key: NodeKey,
    pub score: f64,
    /// Ingestion-time ordering key, used for tie-breaks and for the final
    /// timeline ordering of evidence.
    pub order: (u64, u8, u64),
}

/// Relevance capabilities required of anything the ranker touches.
pub trait Scored {
    /// Relevance in [0, 1] of this node to the query.
    fn relevance_score(&self, query_embedding: &Embedding, query_terms: &HashSet<String>)
        -> f64;

    /// The node's raw statement text, placeholder tokens included.
    fn as_statement_text(&self) -> String;
}

impl Scored for Node<'_> {
    fn relevance_score(
        &self,
        query_embedding: &Embedding,
        query_terms: &HashSet<String>,
    ) -> f64 {
        match self {
            Node::Episodic(node) => {
                let mut best = 0.0f64;
                for statement in &node.statements {
                    if let Some(ref embedding) = statement.embedding {
                        let sim = query_embedding.cosine_similarity(embedding);
                        if sim > best {
                            best = sim;
                        }
                    }
                }
                best.clamp(0.0, 1.0)
            }
            Node::Identity(node) => match node.name.as_deref() {
                Some(name) => jaccard(&term_set(name), query_terms),
                None => 0.0,
            },
        }
    }

    fn as_statement_text(&self) -> String {
        match self {
            Node::Episodic(node) => node
                .statement_texts()
                .collect::<Vec<_>>()
                .join("\n"),
            Node::Identity(node) => node.name.clone().unwrap_or_default(),
        }
    }
}

/// Lowercased alphanumeric terms of at least two characters.
pub fn term_set(text: &str) -> HashSet<String> {
    text.split_whitespace()
        .map(|w| {
            w.to_lowercase()
                .trim_matches(|c: char| !c.is_alphanumeric())
                .to_string()
        })
        .filter(|w| w.len() >= 2)
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.union(b).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

/// Score every node against one query and keep the top `topk` at or above
/// `min_relevance`. Ties break by ingestion order, earlier first.
pub fn rank_nodes(
    graph: &MemoryGraph,
    query_embedding: &Embedding,
    query_text: &str,
    topk: usize,
    min_relevance: f64,
) -> Vec<ScoredNode> {
    let query_terms = term_set(query_text);

    let mut scored: Vec<ScoredNode> = graph
        .all_nodes()
        .map(|node| ScoredNode {
            key: node.key(),
            score: node.relevance_score(query_embedding, &query_terms),
            order: node.order_key(),
        })
        .filter(|s| s.score >= min_relevance)
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.order.cmp(&b.order))
    });
    scored.truncate(topk);
    scored
}
