//! The memory graph: episodic nodes, identity nodes, equivalences, and the
//! derived indices retrieval depends on.
//!
//! The graph is the single source of truth. Components mutate it only
//! through the operations here; `append_clip` is validate-then-mutate so a
//! failed append leaves no partial state behind.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use memoir_core::error::{MemoirError, Result};
use memoir_core::types::{Alias, ClipId, Embedding, IdentityId};

use crate::equivalence::EquivalenceSet;
use crate::node::{EpisodicNode, IdentityNode, MemoryStatement, Node};

/// Bound on redirect-chain walks. Chains this deep indicate a bug, not data.
const MAX_REDIRECT_HOPS: usize = 64;

/// The persistent memory graph for one video.
#[derive(Debug, Serialize, Deserialize)]
pub struct MemoryGraph {
    graph_id: Uuid,
    /// Episodic nodes in ingestion order.
    episodic: Vec<EpisodicNode>,
    /// Identity nodes keyed by id; BTreeMap gives stable creation order.
    identities: BTreeMap<IdentityId, IdentityNode>,
    equivalences: EquivalenceSet,
    next_identity: u64,
    /// clip id -> index into `episodic`. Derived, rebuilt on load.
    #[serde(skip)]
    clip_index: BTreeMap<ClipId, usize>,
    /// canonical identity -> episodic indices mentioning it. Derived.
    #[serde(skip)]
    mention_index: BTreeMap<IdentityId, Vec<usize>>,
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self {
            graph_id: Uuid::new_v4(),
            episodic: Vec::new(),
            identities: BTreeMap::new(),
            equivalences: EquivalenceSet::new(),
            next_identity: 0,
            clip_index: BTreeMap::new(),
            mention_index: BTreeMap::new(),
        }
    }

    pub fn graph_id(&self) -> Uuid {
        self.graph_id
    }

    pub fn episodic_count(&self) -> usize {
        self.episodic.len()
    }

    pub fn identity_count(&self) -> usize {
        self.identities.len()
    }

    pub fn alias_count(&self) -> usize {
        self.equivalences.len()
    }

    // -------------------------------------------------------------------------
    // Episodic operations
    // -------------------------------------------------------------------------

    /// Append the episodic record of one clip together with its identity
    /// mention edges. Atomic: every validation runs before any mutation.
    pub fn append_clip(
        &mut self,
        clip_id: ClipId,
        statements: Vec<MemoryStatement>,
        mentions: &BTreeSet<IdentityId>,
    ) -> Result<ClipId> {
        if self.clip_index.contains_key(&clip_id) {
            return Err(MemoirError::Ingestion {
                clip: clip_id,
                reason: "clip already ingested".to_string(),
            });
        }
        for id in mentions {
            if !self.identities.contains_key(id) {
                return Err(MemoirError::Ingestion {
                    clip: clip_id,
                    reason: format!("mention of unknown {}", id),
                });
            }
        }

        let canonical_mentions: BTreeSet<IdentityId> =
            mentions.iter().map(|&id| self.canonical_of(id)).collect();

        let index = self.episodic.len();
        let node = EpisodicNode {
            clip_id,
            statements,
            mentions: canonical_mentions.clone(),
            ingest_seq: index as u64,
            created_at: Utc::now(),
        };
        self.episodic.push(node);
        self.clip_index.insert(clip_id, index);
        for id in canonical_mentions {
            self.mention_index.entry(id).or_default().push(index);
        }

        debug!(clip_id = %clip_id, seq = index, "Episodic node appended");
        Ok(clip_id)
    }

    pub fn episodic_by_clip(&self, clip_id: ClipId) -> Option<&EpisodicNode> {
        self.clip_index.get(&clip_id).map(|&i| &self.episodic[i])
    }

    /// Episodic nodes in ingestion order. Restartable: each call yields a
    /// fresh iterator over the same stable sequence.
    pub fn all_episodic_nodes(&self) -> impl Iterator<Item = &EpisodicNode> {
        self.episodic.iter()
    }

    /// Identity nodes in creation (id) order, merged nodes included.
    pub fn all_identity_nodes(&self) -> impl Iterator<Item = &IdentityNode> {
        self.identities.values()
    }

    /// Identity nodes that have not been merged away.
    pub fn live_identity_nodes(&self) -> impl Iterator<Item = &IdentityNode> {
        self.identities.values().filter(|n| n.is_live())
    }

    /// Both node kinds as the retrieval-facing tagged view: episodic nodes
    /// first in ingestion order, then live identities in creation order.
    pub fn all_nodes(&self) -> impl Iterator<Item = Node<'_>> {
        self.episodic
            .iter()
            .map(Node::Episodic)
            .chain(self.live_identity_nodes().map(Node::Identity))
    }

    // -------------------------------------------------------------------------
    // Identity operations
    // -------------------------------------------------------------------------

    /// Create a new identity node from first evidence and register its alias.
    pub fn create_identity(
        &mut self,
        alias: Alias,
        face_embeddings: Vec<Embedding>,
        voice_embeddings: Vec<Embedding>,
        first_seen: ClipId,
    ) -> Result<IdentityId> {
        let id = IdentityId(self.next_identity);
        let node = IdentityNode::from_evidence(
            id,
            alias.clone(),
            face_embeddings,
            voice_embeddings,
            first_seen,
        )
        .map_err(|e| MemoirError::Graph(e.to_string()))?;

        self.next_identity += 1;
        self.identities.insert(id, node);
        self.equivalences.insert(alias, id);
        debug!(identity = %id, clip = %first_seen, "Identity created");
        Ok(id)
    }

    /// Fold new evidence for `alias` into an existing identity: extend its
    /// representative sets (FIFO-capped), record the alias, bump last-seen.
    pub fn attach_evidence(
        &mut self,
        id: IdentityId,
        alias: Alias,
        face_embeddings: Vec<Embedding>,
        voice_embeddings: Vec<Embedding>,
        seen_in: ClipId,
        max_representatives: usize,
    ) -> Result<()> {
        let canonical = self.canonical_of(id);
        let node = self
            .identities
            .get_mut(&canonical)
            .ok_or_else(|| MemoirError::Graph(format!("unknown {}", canonical)))?;

        node.face_embeddings.extend(face_embeddings);
        node.voice_embeddings.extend(voice_embeddings);
        cap_front(&mut node.face_embeddings, max_representatives);
        cap_front(&mut node.voice_embeddings, max_representatives);
        if !node.aliases.contains(&alias) {
            node.aliases.push(alias.clone());
        }
        if seen_in > node.last_seen {
            node.last_seen = seen_in;
        }
        self.equivalences.insert(alias, canonical);
        Ok(())
    }

    /// Record a human name for an identity, if none is known yet. The first
    /// name stated in a caption wins; later statements never silently
    /// rewrite it.
    pub fn assign_name(&mut self, id: IdentityId, name: &str) -> Result<()> {
        let canonical = self.canonical_of(id);
        let node = self
            .identities
            .get_mut(&canonical)
            .ok_or_else(|| MemoirError::Graph(format!("unknown {}", canonical)))?;
        if node.name.is_none() {
            node.name = Some(name.to_string());
            info!(identity = %canonical, name, "Identity named");
        }
        Ok(())
    }

    /// Merge identity `b` into identity `a` (or vice versa: the smaller,
    /// older id always survives). The losing node stays in the graph with a
    /// redirect; statement text is never touched.
    pub fn merge_identities(&mut self, a: IdentityId, b: IdentityId) -> Result<IdentityId> {
        let a = self.canonical_of(a);
        let b = self.canonical_of(b);
        if !self.identities.contains_key(&a) {
            return Err(MemoirError::Graph(format!("unknown {}", a)));
        }
        if !self.identities.contains_key(&b) {
            return Err(MemoirError::Graph(format!("unknown {}", b)));
        }
        if a == b {
            return Ok(a);
        }
        let (winner, loser) = if a < b { (a, b) } else { (b, a) };

        // Move the loser's evidence onto the winner, then leave the loser
        // behind as a redirect shell.
        let loser_node = self
            .identities
            .get_mut(&loser)
            .ok_or_else(|| MemoirError::Graph(format!("unknown {}", loser)))?;
        loser_node.merged_into = Some(winner);
        let faces = std::mem::take(&mut loser_node.face_embeddings);
        let voices = std::mem::take(&mut loser_node.voice_embeddings);
        let aliases = loser_node.aliases.clone();
        let loser_name = loser_node.name.clone();
        let loser_first = loser_node.first_seen;
        let loser_last = loser_node.last_seen;

        let winner_node = self
            .identities
            .get_mut(&winner)
            .ok_or_else(|| MemoirError::Graph(format!("unknown {}", winner)))?;
        winner_node.face_embeddings.extend(faces);
        winner_node.voice_embeddings.extend(voices);
        for alias in aliases {
            if !winner_node.aliases.contains(&alias) {
                winner_node.aliases.push(alias);
            }
        }
        if winner_node.name.is_none() {
            winner_node.name = loser_name;
        }
        if loser_first < winner_node.first_seen {
            winner_node.first_seen = loser_first;
        }
        if loser_last > winner_node.last_seen {
            winner_node.last_seen = loser_last;
        }

        self.equivalences.redirect(loser, winner);
        self.rebuild_mention_index();
        info!(winner = %winner, loser = %loser, "Identities merged");
        Ok(winner)
    }

    /// Follow merge redirects to the live canonical id. Bounded.
    pub fn canonical_of(&self, id: IdentityId) -> IdentityId {
        let mut current = id;
        for _ in 0..MAX_REDIRECT_HOPS {
            match self.identities.get(&current).and_then(|n| n.merged_into) {
                Some(next) => current = next,
                None => return current,
            }
        }
        current
    }

    pub fn identity(&self, id: IdentityId) -> Option<&IdentityNode> {
        self.identities.get(&self.canonical_of(id))
    }

    /// Canonical identity for a placeholder alias, if it ever resolved.
    pub fn resolve_alias(&self, alias: &Alias) -> Option<IdentityId> {
        self.equivalences
            .resolve(alias)
            .map(|id| self.canonical_of(id))
    }

    /// Register `alias_b` as equivalent to `alias_a`, merging the identity
    /// nodes behind them when they differ.
    pub fn merge_aliases(&mut self, alias_a: &Alias, alias_b: &Alias) -> Result<()> {
        if let Some((winner, loser)) = self.equivalences.merge(alias_a, alias_b) {
            self.merge_identities(winner, loser)?;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Lookups
    // -------------------------------------------------------------------------

    /// All statement texts from episodic nodes mentioning `id`, in ingestion
    /// order. Merged aliases count as one identity.
    pub fn lookup_statements(&self, id: IdentityId) -> Vec<String> {
        let canonical = self.canonical_of(id);
        let Some(indices) = self.mention_index.get(&canonical) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for &i in indices {
            for text in self.episodic[i].statement_texts() {
                out.push(text.to_string());
            }
        }
        out
    }

    /// Display name for an identity: its resolved human name, or a stable
    /// generated label.
    pub fn display_name(&self, id: IdentityId) -> String {
        let canonical = self.canonical_of(id);
        match self.identities.get(&canonical).and_then(|n| n.name.as_deref()) {
            Some(name) => name.to_string(),
            None => format!("person-{}", canonical.0),
        }
    }

    /// Rewrite `<alias>` tokens in statement text to display names.
    /// Tokens that do not resolve are left exactly as written.
    pub fn translate(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(open) = rest.find('<') {
            out.push_str(&rest[..open]);
            let tail = &rest[open..];
            match tail.find('>') {
                Some(close) => {
                    let token = &tail[1..close];
                    let alias = Alias(token.to_string());
                    match self.resolve_alias(&alias) {
                        Some(id) => out.push_str(&self.display_name(id)),
                        None => out.push_str(&tail[..=close]),
                    }
                    rest = &tail[close + 1..];
                }
                None => {
                    out.push_str(tail);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }

    /// The full alias-to-canonical mapping, canonicalized through redirects.
    pub fn canonical_map(&self) -> BTreeMap<Alias, IdentityId> {
        self.equivalences
            .canonical_map()
            .into_iter()
            .map(|(alias, id)| (alias, self.canonical_of(id)))
            .collect()
    }

    // -------------------------------------------------------------------------
    // Index maintenance
    // -------------------------------------------------------------------------

    /// Rebuild the derived indices from persistent state. Called after
    /// loading a snapshot and after identity merges.
    pub(crate) fn rebuild_indices(&mut self) {
        self.clip_index.clear();
        for (i, node) in self.episodic.iter().enumerate() {
            self.clip_index.insert(node.clip_id, i);
        }
        self.rebuild_mention_index();
    }

    fn rebuild_mention_index(&mut self) {
        // Mentions stored in nodes are canonical-at-append; canonicalize
        // again here so later merges are reflected.
        let mut index: BTreeMap<IdentityId, Vec<usize>> = BTreeMap::new();
        for (i, node) in self.episodic.iter().enumerate() {
            let canonical: BTreeSet<IdentityId> = node
                .mentions
                .iter()
                .map(|&id| self.canonical_of(id))
                .collect();
            for id in canonical {
                index.entry(id).or_default().push(i);
            }
        }
        self.mention_index = index;
    }
}

fn cap_front(embeddings: &mut Vec<Embedding>, max: usize) {
    if max > 0 && embeddings.len() > max {
        let excess = embeddings.len() - max;
        embeddings.drain(..excess);
    }
}
