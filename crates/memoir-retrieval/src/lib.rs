//! Memoir retrieval crate - question answering over a memory graph.
//!
//! A question flows through expansion (several candidate phrasings),
//! per-query ranking of graph nodes, aggregation under a selectable mode,
//! evidence assembly in timeline order, and optional answer synthesis.
//! Every run produces an auditable session trace.

pub mod aggregate;
pub mod engine;
pub mod evidence;
pub mod expand;
pub mod rank;

pub use aggregate::{aggregate, AggregationMode};
pub use engine::{
    AnswerSynthesizer, DynAnswerSynthesizer, MockSynthesizer, RetrievalEngine,
    RetrievalOutcome, RetrieveOptions, Session,
};
pub use evidence::{assemble, EvidenceItem};
pub use expand::{expansion_set, DynQueryExpander, MockQueryExpander, QueryExpander};
pub use rank::{rank_nodes, term_set, Scored, ScoredNode};
