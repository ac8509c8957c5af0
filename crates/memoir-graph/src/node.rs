//! Graph node types: episodic memories, resolved identities, and the tagged
//! view the retrieval engine works against.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use memoir_core::types::{Alias, ClipId, Embedding, IdentityId};

/// One memory statement derived from a clip.
///
/// The embedding is absent when the text embedder failed for this statement;
/// such statements still appear in evidence but are invisible to semantic
/// ranking.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemoryStatement {
    pub text: String,
    pub embedding: Option<Embedding>,
}

impl MemoryStatement {
    pub fn new(text: impl Into<String>, embedding: Option<Embedding>) -> Self {
        Self {
            text: text.into(),
            embedding,
        }
    }
}

/// The episodic record of one clip: its memory statements and the canonical
/// identities they mention.
///
/// Immutable once appended; created exactly once per successfully ingested
/// clip and never re-derived.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpisodicNode {
    pub clip_id: ClipId,
    pub statements: Vec<MemoryStatement>,
    pub mentions: BTreeSet<IdentityId>,
    /// Position in ingestion order, assigned by the graph on append.
    pub ingest_seq: u64,
    pub created_at: DateTime<Utc>,
}

impl EpisodicNode {
    /// All statement texts, in statement order.
    pub fn statement_texts(&self) -> impl Iterator<Item = &str> {
        self.statements.iter().map(|s| s.text.as_str())
    }
}

/// A resolved recurring person, accumulated across clips.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IdentityNode {
    pub id: IdentityId,
    /// Representative face embeddings, capped FIFO by the graph.
    pub face_embeddings: Vec<Embedding>,
    /// Representative voice embeddings, capped FIFO by the graph.
    pub voice_embeddings: Vec<Embedding>,
    /// Every placeholder alias ever bound to this identity.
    pub aliases: Vec<Alias>,
    /// Human name, if one was ever stated in a caption.
    pub name: Option<String>,
    pub first_seen: ClipId,
    pub last_seen: ClipId,
    /// Redirect set when this identity was merged into an older one.
    /// The node itself is never deleted and its id is never reused.
    pub merged_into: Option<IdentityId>,
}

impl IdentityNode {
    /// Create a node from its first evidence. At least one embedding of
    /// either modality is required; placeholders with no embedding evidence
    /// never become nodes.
    pub fn from_evidence(
        id: IdentityId,
        alias: Alias,
        face_embeddings: Vec<Embedding>,
        voice_embeddings: Vec<Embedding>,
        first_seen: ClipId,
    ) -> std::result::Result<Self, &'static str> {
        if face_embeddings.is_empty() && voice_embeddings.is_empty() {
            return Err("Identity requires at least one representative embedding");
        }
        Ok(Self {
            id,
            face_embeddings,
            voice_embeddings,
            aliases: vec![alias],
            name: None,
            first_seen,
            last_seen: first_seen,
            merged_into: None,
        })
    }

    /// True when this node has not been merged into another.
    pub fn is_live(&self) -> bool {
        self.merged_into.is_none()
    }

    /// Best cosine similarity between this node's representatives and the
    /// given face/voice evidence, compared modality against modality.
    pub fn similarity_to(&self, faces: &[Embedding], voices: &[Embedding]) -> f64 {
        let face_best = best_pairwise(&self.face_embeddings, faces);
        let voice_best = best_pairwise(&self.voice_embeddings, voices);
        face_best.max(voice_best)
    }
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

/// Stable key naming a node across ranking lists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeKey {
    Clip(ClipId),
    Person(IdentityId),
}

/// Tagged view over the two node kinds.
///
/// Retrieval consumes nodes through this enum and the capabilities defined
/// on it, so there is no runtime attribute inspection anywhere downstream.
#[derive(Clone, Copy, Debug)]
pub enum Node<'a> {
    Episodic(&'a EpisodicNode),
    Identity(&'a IdentityNode),
}

impl<'a> Node<'a> {
    pub fn key(&self) -> NodeKey {
        match self {
            Node::Episodic(n) => NodeKey::Clip(n.clip_id),
            Node::Identity(n) => NodeKey::Person(n.id),
        }
    }

    /// Total order matching ingestion time: episodic nodes by append
    /// sequence, identity nodes by the clip that introduced them. The kind
    /// tag and id make the order total across kinds.
    pub fn order_key(&self) -> (u64, u8, u64) {
        match self {
            Node::Episodic(n) => (n.ingest_seq, 0, n.clip_id.0),
            Node::Identity(n) => (n.first_seen.0, 1, n.id.0),
        }
    }
}
