//! Global resolution: matching a clip's local identities against every
//! identity the graph has accumulated so far.

use tracing::debug;

use memoir_core::config::ResolverConfig;
use memoir_core::error::Result;
use memoir_core::types::{Alias, ClipId, Embedding, IdentityId};
use memoir_graph::MemoryGraph;

use crate::local::LocalIdentity;

/// Outcome of globally resolving one local identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GlobalMatch {
    pub slot: usize,
    pub identity: IdentityId,
    /// True when no existing identity matched and a new node was created.
    pub novel: bool,
}

/// Resolve each local identity to an existing identity node or a new one.
///
/// Match decisions are computed against the graph state as it stood before
/// this clip, then applied: a clip's own local identities never match each
/// other's freshly attached evidence. Acceptance is per modality (face
/// evidence against face representatives, voice against voice); ties break
/// by similarity, then by most recently seen node, then by older id.
pub fn resolve_against_graph(
    graph: &mut MemoryGraph,
    clip: ClipId,
    locals: &[LocalIdentity],
    config: &ResolverConfig,
) -> Result<Vec<GlobalMatch>> {
    // Decision phase, read-only.
    let mut decisions: Vec<Option<IdentityId>> = Vec::with_capacity(locals.len());
    for local in locals {
        decisions.push(best_match(graph, local, config));
    }

    // Apply phase.
    let mut matches = Vec::with_capacity(locals.len());
    for (local, decision) in locals.iter().zip(decisions) {
        let alias = Alias::local(clip, local.slot);
        match decision {
            Some(id) => {
                graph.attach_evidence(
                    id,
                    alias,
                    local.face_embeddings.clone(),
                    local.voice_embeddings.clone(),
                    clip,
                    config.max_representatives,
                )?;
                debug!(clip = %clip, slot = local.slot, identity = %id, "Local identity matched");
                matches.push(GlobalMatch {
                    slot: local.slot,
                    identity: id,
                    novel: false,
                });
            }
            None => {
                let id = graph.create_identity(
                    alias,
                    local.face_embeddings.clone(),
                    local.voice_embeddings.clone(),
                    clip,
                )?;
                debug!(clip = %clip, slot = local.slot, identity = %id, "Local identity is new");
                matches.push(GlobalMatch {
                    slot: local.slot,
                    identity: id,
                    novel: true,
                });
            }
        }
    }
    Ok(matches)
}

fn best_match(
    graph: &MemoryGraph,
    local: &LocalIdentity,
    config: &ResolverConfig,
) -> Option<IdentityId> {
    let mut best: Option<(f64, ClipId, IdentityId)> = None;

    for node in graph.live_identity_nodes() {
        let face_sim = best_pairwise(&node.face_embeddings, &local.face_embeddings);
        let voice_sim = best_pairwise(&node.voice_embeddings, &local.voice_embeddings);

        let mut accepted = f64::NEG_INFINITY;
        if face_sim >= config.face_threshold {
            accepted = accepted.max(face_sim);
        }
        if voice_sim >= config.voice_threshold {
            accepted = accepted.max(voice_sim);
        }
        if accepted == f64::NEG_INFINITY {
            continue;
        }

        let candidate = (accepted, node.last_seen, node.id);
        best = match best {
            None => Some(candidate),
            Some(current) => {
                if candidate.0 > current.0
                    || (candidate.0 == current.0 && candidate.1 > current.1)
                    || (candidate.0 == current.0
                        && candidate.1 == current.1
                        && candidate.2 < current.2)
                {
                    Some(candidate)
                } else {
                    Some(current)
                }
            }
        };
    }

    best.map(|(_, _, id)| id)
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
