//! Memoir graph crate - the persistent memory graph and its equivalence
//! structure.
//!
//! Holds episodic nodes (one per ingested clip), identity nodes (one per
//! resolved person), the alias disjoint-set linking placeholders to
//! canonical identities, and the JSON snapshot format that makes ingestion
//! resumable and retrieval a separate process.

pub mod equivalence;
pub mod graph;
pub mod node;
pub mod snapshot;

pub use equivalence::EquivalenceSet;
pub use graph::MemoryGraph;
pub use node::{EpisodicNode, IdentityNode, MemoryStatement, Node, NodeKey};
