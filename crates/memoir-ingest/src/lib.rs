//! Memoir ingest crate - the streaming ingestion pipeline.
//!
//! Orchestrates the modality extractors, the identity resolver, and the
//! memory graph per clip, strictly in clip order, with per-clip failure
//! containment. One pipeline instance serves one video; a batch of videos
//! is a batch of independent pipelines with private graphs.

pub mod pipeline;

pub use pipeline::{ClipOutcome, IngestPipeline, IngestReport};
