//! Memoir core crate - shared types, error taxonomy, and configuration.
//!
//! Everything the other Memoir crates agree on lives here:
//! - Identifier newtypes (clips, identities, placeholder aliases)
//! - Embedding vectors and cosine similarity
//! - Per-clip observation structs produced by the modality extractors
//! - The top-level `MemoirError` and `Result` alias
//! - TOML configuration with validation

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    GeneralConfig, IngestConfig, MemoirConfig, ResolverConfig, RetrievalConfig, RetryConfig,
};
pub use error::{MemoirError, Result};
pub use types::{
    Alias, BoundingRegion, CaptionLine, ClipId, ClipObservation, Embedding, FaceTrack,
    IdentityId, Modality, Relevance, TimeSpan, VoiceSegment,
};
