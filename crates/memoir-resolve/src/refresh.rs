//! Deferred re-equivalencing: re-cluster all identities from accumulated
//! evidence and merge what the greedy online pass kept apart.
//!
//! Safe to run at any time between clips; never while an append is in
//! flight (the `&mut MemoryGraph` borrow enforces that). Only the
//! alias-to-canonical mapping changes; statement text is never rewritten.

use serde::{Deserialize, Serialize};
use tracing::info;

use memoir_core::config::ResolverConfig;
use memoir_core::error::Result;
use memoir_core::types::{Embedding, IdentityId};
use memoir_graph::MemoryGraph;

/// What a refresh pass did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshReport {
    /// Multi-identity components found.
    pub components: usize,
    /// Identity pairs actually merged.
    pub merges: usize,
}

/// Re-cluster every live identity at `refresh_threshold` and merge each
/// connected component down to its oldest id.
///
/// Idempotent: a second run over unchanged evidence finds only singleton
/// components. Monotonic: identities are only ever merged, never split.
pub fn refresh_equivalences(
    graph: &mut MemoryGraph,
    config: &ResolverConfig,
) -> Result<RefreshReport> {
    struct Snapshot {
        id: IdentityId,
        faces: Vec<Embedding>,
        voices: Vec<Embedding>,
    }

    let nodes: Vec<Snapshot> = graph
        .live_identity_nodes()
        .map(|n| Snapshot {
            id: n.id,
            faces: n.face_embeddings.clone(),
            voices: n.voice_embeddings.clone(),
        })
        .collect();

    let n = nodes.len();
    let mut adj = vec![vec![false; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let face_sim = best_pairwise(&nodes[i].faces, &nodes[j].faces);
            let voice_sim = best_pairwise(&nodes[i].voices, &nodes[j].voices);
            if face_sim.max(voice_sim) >= config.refresh_threshold {
                adj[i][j] = true;
                adj[j][i] = true;
            }
        }
    }

    let mut report = RefreshReport::default();
    let mut visited = vec![false; n];
    for i in 0..n {
        if visited[i] {
            continue;
        }
        let mut component = Vec::new();
        let mut stack = vec![i];
        while let Some(node) = stack.pop() {
            if visited[node] {
                continue;
            }
            visited[node] = true;
            component.push(node);
            for j in 0..n {
                if adj[node][j] && !visited[j] {
                    stack.push(j);
                }
            }
        }
        if component.len() < 2 {
            continue;
        }
        report.components += 1;

        component.sort_unstable();
        let anchor = nodes[component[0]].id;
        for &member in &component[1..] {
            let other = nodes[member].id;
            if graph.canonical_of(anchor) != graph.canonical_of(other) {
                graph.merge_identities(anchor, other)?;
                report.merges += 1;
            }
        }
    }

    info!(
        components = report.components,
        merges = report.merges,
        "Equivalence refresh complete"
    );
    Ok(report)
}

fn best_pairwise(a: &[Embedding], b: &[Embedding]) -> f64 {
    let mut best = 0.0f64;
    for x in a {
        for y in b {
            let sim = x.cosine_similarity(y);
            if sim > best {
                best = sim;
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoir_core::types::{Alias, ClipId};

    fn embedding(values: &[f32]) -> Embedding {
        Embedding::new(values.to_vec()).unwrap()
    }

    fn config() -> ResolverConfig {
        ResolverConfig::default()
    }

    fn add_identity(graph: &mut MemoryGraph, clip: u64, values: &[f32]) -> IdentityId {
        graph
            .create_identity(
                Alias::local(ClipId(clip), 0),
                vec![embedding(values)],
                vec![],
                ClipId(clip),
            )
            .unwrap()
    }

    #[test]
    fn test_empty_graph_refresh_is_noop() {
        let mut graph = MemoryGraph::new();
        let report = refresh_equivalences(&mut graph, &config()).unwrap();
        assert_eq!(report, RefreshReport::default());
    }

    #[test]
    fn test_similar_identities_merge() {
        let mut graph = MemoryGraph::new();
        let a = add_identity(&mut graph, 0, &[1.0, 0.0, 0.0]);
        let b = add_identity(&mut graph, 1, &[0.99, 0.02, 0.0]);
        let c = add_identity(&mut graph, 2, &[0.0, 0.0, 1.0]);

        let report = refresh_equivalences(&mut graph, &config()).unwrap();
        assert_eq!(report.components, 1);
        assert_eq!(report.merges, 1);
        assert_eq!(graph.canonical_of(b), a);
        assert_eq!(graph.canonical_of(c), c);
    }

    #[test]
    fn test_refresh_is_idempotent() {
        let mut graph = MemoryGraph::new();
        add_identity(&mut graph, 0, &[1.0, 0.0]);
        add_identity(&mut graph, 1, &[0.99, 0.05]);
        add_identity(&mut graph, 2, &[0.0, 1.0]);

        refresh_equivalences(&mut graph, &config()).unwrap();
        let map_first = graph.canonical_map();

        let report = refresh_equivalences(&mut graph, &config()).unwrap();
        assert_eq!(report.merges, 0);
        assert_eq!(graph.canonical_map(), map_first);
    }

    #[test]
    fn test_refresh_is_monotonic() {
        let mut graph = MemoryGraph::new();
        let a = add_identity(&mut graph, 0, &[1.0, 0.0]);
        let b = add_identity(&mut graph, 1, &[0.99, 0.05]);

        refresh_equivalences(&mut graph, &config()).unwrap();
        assert_eq!(graph.canonical_of(b), a);

        // Later evidence never splits them back apart.
        add_identity(&mut graph, 2, &[0.0, 1.0]);
        refresh_equivalences(&mut graph, &config()).unwrap();
        assert_eq!(graph.canonical_of(b), a);
    }

    #[test]
    fn test_transitive_component_merges_to_oldest() {
        let mut graph = MemoryGraph::new();
        // a~b, b~c at the refresh threshold, a!~c.
        let a = add_identity(&mut graph, 0, &[1.0, 0.0, 0.0]);
        let b = add_identity(&mut graph, 1, &[0.92, 0.39, 0.0]);
        let c = add_identity(&mut graph, 2, &[0.71, 0.71, 0.0]);

        let report = refresh_equivalences(&mut graph, &config()).unwrap();
        assert_eq!(report.components, 1);
        assert_eq!(report.merges, 2);
        assert_eq!(graph.canonical_of(b), a);
        assert_eq!(graph.canonical_of(c), a);
    }

    #[test]
    fn test_refresh_does_not_touch_statements() {
        use memoir_graph::MemoryStatement;
        use std::collections::BTreeSet;

        let mut graph = MemoryGraph::new();
        let a = add_identity(&mut graph, 0, &[1.0, 0.0]);
        add_identity(&mut graph, 1, &[0.99, 0.05]);

        let mut mentions = BTreeSet::new();
        mentions.insert(a);
        graph
            .append_clip(
                ClipId(0),
                vec![MemoryStatement::new("<c0_p0> waves", None)],
                &mentions,
            )
            .unwrap();

        refresh_equivalences(&mut graph, &config()).unwrap();
        let node = graph.episodic_by_clip(ClipId(0)).unwrap();
        assert_eq!(node.statements[0].text, "<c0_p0> waves");
    }

    #[test]
    fn test_cross_modality_evidence_does_not_merge() {
        let mut graph = MemoryGraph::new();
        graph
            .create_identity(
                Alias::local(ClipId(0), 0),
                vec![embedding(&[1.0, 0.0])],
                vec![],
                ClipId(0),
            )
            .unwrap();
        graph
            .create_identity(
                Alias::local(ClipId(1), 0),
                vec![],
                vec![embedding(&[1.0, 0.0])],
                ClipId(1),
            )
            .unwrap();

        let report = refresh_equivalences(&mut graph, &config()).unwrap();
        assert_eq!(report.merges, 0);
    }
}
