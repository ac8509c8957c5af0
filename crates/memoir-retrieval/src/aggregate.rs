//! Aggregation: merging per-query ranked lists into one evidence ranking.
//!
//! Every mode is a pure function from the per-query lists to a single
//! ranked list of at most `topk` nodes, with documented deterministic
//! tie-breaks.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use memoir_graph::NodeKey;

use crate::rank::ScoredNode;

/// Policy for combining per-query top-k lists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    /// Keep each node's single best score across queries, then take the
    /// global top-k by score (ties: earlier ingestion first).
    #[default]
    Argmax,
    /// Round-robin across the per-query lists by rank position, first
    /// appearance wins, until topk nodes are collected.
    Union,
    /// Rank by how many query lists a node appears in; break ties by best
    /// score, then ingestion order.
    Vote,
}

impl AggregationMode {
    /// Parse a configuration string.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "argmax" => Some(AggregationMode::Argmax),
            "union" => Some(AggregationMode::Union),
            "vote" => Some(AggregationMode::Vote),
            _ => None,
        }
    }
}

impl std::fmt::Display for AggregationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregationMode::Argmax => write!(f, "argmax"),
            AggregationMode::Union => write!(f, "union"),
            AggregationMode::Vote => write!(f, "vote"),
        }
    }
}

/// Merge the per-query ranked lists under `mode` into one list of at most
/// `topk` nodes.
pub fn aggregate(
    mode: AggregationMode,
    per_query: &[Vec<ScoredNode>],
    topk: usize,
) -> Vec<ScoredNode> {
    match mode {
        AggregationMode::Argmax => argmax(per_query, topk),
        AggregationMode::Union => union(per_query, topk),
        AggregationMode::Vote => vote(per_query, topk),
    }
}

fn argmax(per_query: &[Vec<ScoredNode>], topk: usize) -> Vec<ScoredNode> {
    let mut best: HashMap<NodeKey, ScoredNode> = HashMap::new();
    for list in per_query {
        for node in list {
            best.entry(node.key)
                .and_modify(|kept| {
                    if node.score > kept.score {
                        *kept = node.clone();
                    }
                })
                .or_insert_with(|| node.clone());
        }
    }
    let mut merged: Vec<ScoredNode> = best.into_values().collect();
    merged.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.order.cmp(&b.order))
    });
    merged.truncate(topk);
    merged
}

fn union(per_query: &[Vec<ScoredNode>], topk: usize) -> Vec<ScoredNode> {
    let mut merged: Vec<ScoredNode> = Vec::new();
    let longest = per_query.iter().map(|l| l.len()).max().unwrap_or(0);
    for rank in 0..longest {
        for list in per_query {
            let Some(node) = list.get(rank) else { continue };
            if merged.len() >= topk {
                return merged;
            }
            if !merged.iter().any(|m| m.key == node.key) {
                merged.push(node.clone());
            }
        }
    }
    merged
}

fn vote(per_query: &[Vec<ScoredNode>], topk: usize) -> Vec<ScoredNode> {
    struct Tally {
        votes: usize,
        best: ScoredNode,
    }

    let mut tallies: HashMap<NodeKey, Tally> = HashMap::new();
    for list in per_query {
        for node in list {
            tallies
                .entry(node.key)
                .and_modify(|t| {
                    t.votes += 1;
                    if node.score > t.best.score {
                        t.best = node.clone();
                    }
                })
                .or_insert_with(|| Tally {
                    votes: 1,
                    best: node.clone(),
                });
        }
    }
    let mut counted: Vec<Tally> = tallies.into_values().collect();
    counted.sort_by(|a, b| {
        b.votes
            .cmp(&a.votes)
            .then_with(|| {
                b.best
                    .score
                    .partial_cmp(&a.best.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.best.order.cmp(&b.best.order))
    });
    counted.truncate(topk);
    counted.into_iter().map(|t| t.best).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoir_core::types::ClipId;

    fn node(clip: u64, score: f64) -> ScoredNode {
        ScoredNode {
            key: NodeKey::Clip(ClipId(clip)),
            score,
            order: (clip, 0, clip),
        }
    }

    #[test]
    fn test_mode_from_name() {
        assert_eq!(AggregationMode::from_name("argmax"), Some(AggregationMode::Argmax));
        assert_eq!(AggregationMode::from_name("union"), Some(AggregationMode::Union));
        assert_eq!(AggregationMode::from_name("vote"), Some(AggregationMode::Vote));
        assert_eq!(AggregationMode::from_name("median"), None);
    }

    #[test]
    fn test_argmax_keeps_best_score_per_node() {
        let per_query = vec![
            vec![node(0, 0.4), node(1, 0.9)],
            vec![node(0, 0.8), node(2, 0.5)],
        ];
        let merged = aggregate(AggregationMode::Argmax, &per_query, 10);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].key, NodeKey::Clip(ClipId(1)));
        assert_eq!(merged[1].key, NodeKey::Clip(ClipId(0)));
        assert!((merged[1].score - 0.8).abs() < 1e-9);
        assert_eq!(merged[2].key, NodeKey::Clip(ClipId(2)));
    }

    #[test]
    fn test_argmax_respects_topk() {
        let per_query = vec![vec![node(0, 0.9), node(1, 0.8), node(2, 0.7)]];
        let merged = aggregate(AggregationMode::Argmax, &per_query, 2);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_argmax_tie_breaks_by_ingestion() {
        let per_query = vec![vec![node(5, 0.5)], vec![node(2, 0.5)]];
        let merged = aggregate(AggregationMode::Argmax, &per_query, 10);
        assert_eq!(merged[0].key, NodeKey::Clip(ClipId(2)));
    }

    #[test]
    fn test_argmax_empty_input() {
        let merged = aggregate(AggregationMode::Argmax, &[], 5);
        assert!(merged.is_empty());
        let merged = aggregate(AggregationMode::Argmax, &[vec![], vec![]], 5);
        assert!(merged.is_empty());
    }

    #[test]
    fn test_union_round_robins_by_rank() {
        let per_query = vec![
            vec![node(0, 0.9), node(1, 0.2)],
            vec![node(2, 0.8), node(0, 0.1)],
        ];
        let merged = aggregate(AggregationMode::Union, &per_query, 10);
        let keys: Vec<NodeKey> = merged.iter().map(|n| n.key).collect();
        assert_eq!(
            keys,
            vec![
                NodeKey::Clip(ClipId(0)),
                NodeKey::Clip(ClipId(2)),
                NodeKey::Clip(ClipId(1)),
            ]
        );
    }

    #[test]
    fn test_union_respects_topk() {
        let per_query = vec![vec![node(0, 0.9)], vec![node(1, 0.8)], vec![node(2, 0.7)]];
        let merged = aggregate(AggregationMode::Union, &per_query, 2);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn test_vote_counts_appearances() {
        let per_query = vec![
            vec![node(0, 0.3), node(1, 0.9)],
            vec![node(0, 0.4)],
            vec![node(0, 0.2), node(2, 0.95)],
        ];
        let merged = aggregate(AggregationMode::Vote, &per_query, 10);
        // Node 0 appears in all three lists and outranks higher-scoring
        // single-list nodes.
        assert_eq!(merged[0].key, NodeKey::Clip(ClipId(0)));
        assert!((merged[0].score - 0.4).abs() < 1e-9);
        // Remaining ties on one vote break by score.
        assert_eq!(merged[1].key, NodeKey::Clip(ClipId(2)));
        assert_eq!(merged[2].key, NodeKey::Clip(ClipId(1)));
    }

    #[test]
    fn test_modes_are_deterministic() {
        let per_query = vec![
            vec![node(0, 0.5), node(1, 0.5), node(2, 0.5)],
            vec![node(3, 0.5), node(4, 0.5)],
        ];
        for mode in [
            AggregationMode::Argmax,
            AggregationMode::Union,
            AggregationMode::Vote,
        ] {
            let a = aggregate(mode, &per_query, 4);
            let b = aggregate(mode, &per_query, 4);
            assert_eq!(a, b, "mode {} must be deterministic", mode);
        }
    }
}
