//! Memoir extract crate - collaborator contracts for everything that runs
//! outside this system.
//!
//! Covers the clip source (pre-cut video segments), the three modality
//! extractors (faces, voices, captions), the shared text embedder, and the
//! retry policy wrapped around all of them. Concrete model backends live
//! behind these traits; the deterministic mocks here back the tests and the
//! model-free CLI.

pub mod clip;
pub mod embedder;
pub mod extractor;
pub mod retry;

pub use clip::{Clip, ClipSource, DirectoryClipSource, StaticClipSource};
pub use embedder::{DynTextEmbedder, MockTextEmbedder, TextEmbedder};
pub use extractor::{
    CaptionGenerator, DynCaptionGenerator, DynFaceExtractor, DynVoiceExtractor, FaceExtractor,
    ScriptedCaptionGenerator, ScriptedFaceExtractor, ScriptedVoiceExtractor, VoiceExtractor,
};
pub use retry::RetryPolicy;
