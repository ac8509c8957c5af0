//! Local resolution: clustering observations within a single clip.
//!
//! Face tracks cluster with face tracks and voice segments with voice
//! segments, by cosine similarity above the per-modality threshold
//! (single linkage: threshold adjacency, then connected components).

use memoir_core::config::ResolverConfig;
use memoir_core::types::{ClipObservation, Embedding};

/// One person as seen inside a single clip, before global resolution.
///
/// `slot` is the clip-local placeholder index: captions reference this
/// person as `<p{slot}>`.
#[derive(Clone, Debug)]
pub struct LocalIdentity {
    pub slot: usize,
    pub face_embeddings: Vec<Embedding>,
    pub voice_embeddings: Vec<Embedding>,
}

/// Cluster a clip's raw observations into local identities.
///
/// Slots are assigned deterministically: face clusters first, in order of
/// their earliest track, then unbound voice clusters in order of their
/// earliest segment. When the clip contains exactly one face cluster and
/// one voice cluster, the two are bound into a single identity; any richer
/// configuration keeps them separate, and the refresh pass can fuse them
/// later once cross-clip evidence accumulates.
pub fn cluster_observation(
    observation: &ClipObservation,
    config: &ResolverConfig,
) -> Vec<LocalIdentity> {
    let face_embeddings: Vec<&Embedding> =
        observation.faces.iter().map(|t| &t.embedding).collect();
    let voice_embeddings: Vec<&Embedding> =
        observation.voices.iter().map(|s| &s.embedding).collect();

    let face_clusters = components_by_similarity(&face_embeddings, config.face_threshold);
    let voice_clusters = components_by_similarity(&voice_embeddings, config.voice_threshold);

    let mut locals = Vec::new();

    if face_clusters.len() == 1 && voice_clusters.len() == 1 {
        locals.push(LocalIdentity {
            slot: 0,
            face_embeddings: gather(&face_embeddings, &face_clusters[0]),
            voice_embeddings: gather(&voice_embeddings, &voice_clusters[0]),
        });
        return locals;
    }

    for cluster in &face_clusters {
        locals.push(LocalIdentity {
            slot: locals.len(),
            face_embeddings: gather(&face_embeddings, cluster),
            voice_embeddings: Vec::new(),
        });
    }
    for cluster in &voice_clusters {
        locals.push(LocalIdentity {
            slot: locals.len(),
            face_embeddings: Vec::new(),
            voice_embeddings: gather(&voice_embeddings, cluster),
        });
    }
    locals
}

fn gather(embeddings: &[&Embedding], indices: &[usize]) -> Vec<Embedding> {
    indices.iter().map(|&i| embeddings[i].clone()).collect()
}

/// Connected components over a threshold-similarity adjacency, returned in
/// order of each component's earliest member.
fn components_by_similarity(embeddings: &[&Embedding], threshold: f64) -> Vec<Vec<usize>> {
    let n = embeddings.len();
    if n == 0 {
        return vec![];
    }

    let mut adj = vec![vec![false; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            if embeddings[i].cosine_similarity(embeddings[j]) >= threshold {
                adj[i][j] = true;
                adj[j][i] = true;
            }
        }
    }

    let mut visited = vec![false; n];
    let mut components = Vec::new();
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
        component.sort_unstable();
        components.push(component);
    }
    components
}
