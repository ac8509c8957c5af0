//! The streaming ingestion pipeline.
//!
//! Clips are processed strictly in arrival order: global resolution for
//! clip N reads identity evidence folded in by clips before N. Within one
//! clip, face and voice extraction run concurrently; caption generation
//! follows because it is told how many local identity slots the clip has.
//!
//! Failure containment: a degraded face or voice extractor is
//! recorded and ingestion continues; a caption failure fails the clip
//! (episodic memories are caption-derived); a failed clip leaves the graph
//! exactly as it was and never stops the clips behind it.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use memoir_core::config::MemoirConfig;
use memoir_core::error::{MemoirError, Result};
use memoir_core::types::{ClipId, ClipObservation, Modality};
use memoir_extract::clip::{Clip, ClipSource};
use memoir_extract::embedder::{DynTextEmbedder, TextEmbedder};
use memoir_extract::extractor::{
    CaptionGenerator, DynCaptionGenerator, DynFaceExtractor, DynVoiceExtractor, FaceExtractor,
    VoiceExtractor,
};
use memoir_extract::retry::RetryPolicy;
use memoir_graph::{MemoryGraph, MemoryStatement};
use memoir_resolve::IdentityResolver;

/// Result of ingesting one clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClipOutcome {
    /// The clip produced an episodic node.
    Stored {
        clip_id: ClipId,
        statements: usize,
        new_identities: usize,
        matched_identities: usize,
        degraded: Vec<Modality>,
    },
    /// Every modality came back empty; no node was created.
    Skipped { clip_id: ClipId, reason: String },
}

/// Summary of one video's ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub ingested: Vec<ClipId>,
    pub skipped: Vec<ClipId>,
    pub failed: Vec<(ClipId, String)>,
}

impl IngestReport {
    pub fn total(&self) -> usize {
        self.ingested.len() + self.skipped.len() + self.failed.len()
    }
}

/// Per-video ingestion pipeline holding the modality collaborators.
pub struct IngestPipeline {
    faces: Box<dyn DynFaceExtractor>,
    voices: Box<dyn DynVoiceExtractor>,
    captions: Box<dyn DynCaptionGenerator>,
    embedder: Box<dyn DynTextEmbedder>,
    resolver: IdentityResolver,
    retry: RetryPolicy,
}

impl IngestPipeline {
    pub fn new(
        faces: impl FaceExtractor + 'static,
        voices: impl VoiceExtractor + 'static,
        captions: impl CaptionGenerator + 'static,
        embedder: impl TextEmbedder + 'static,
        config: &MemoirConfig,
    ) -> Self {
        Self {
            faces: Box::new(faces),
            voices: Box::new(voices),
            captions: Box::new(captions),
            embedder: Box::new(embedder),
            resolver: IdentityResolver::new(config.resolver.clone()),
            retry: RetryPolicy::from_config(&config.ingest.retry),
        }
    }

    /// Ingest every clip of one video, in order.
    ///
    /// Failures are contained per clip: the report records them and the
    /// remaining clips still run. Only a failing clip source aborts.
    pub async fn ingest_video(
        &self,
        graph: &mut MemoryGraph,
        source: &dyn ClipSource,
    ) -> Result<IngestReport> {
        let clips = source.clips()?;
        info!(clips = clips.len(), graph = %graph.graph_id(), "Ingestion started");

        let mut report = IngestReport::default();
        for clip in &clips {
            match self.ingest_clip(graph, clip).await {
                Ok(ClipOutcome::Stored { clip_id, .. }) => report.ingested.push(clip_id),
                Ok(ClipOutcome::Skipped { clip_id, reason }) => {
                    warn!(clip = %clip_id, reason, "Clip skipped");
                    report.skipped.push(clip_id);
                }
                Err(err) => {
                    warn!(clip = %clip.clip_id, error = %err, "Clip failed; continuing");
                    report.failed.push((clip.clip_id, err.to_string()));
                }
            }
        }

        info!(
            ingested = report.ingested.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "Ingestion finished"
        );
        Ok(report)
    }

    /// Ingest a single clip: extract, resolve, embed, append.
    ///
    /// Identity resolution and the episodic append both run under the
    /// caller's exclusive `&mut MemoryGraph` borrow, so a clip's evidence is
    /// fully folded in before anything else can read the graph. The
    /// duplicate check runs before resolution: the one append failure that
    /// could strand freshly attached identity evidence is ruled out while
    /// the graph is still untouched.
    pub async fn ingest_clip(
        &self,
        graph: &mut MemoryGraph,
        clip: &Clip,
    ) -> Result<ClipOutcome> {
        let clip_id = clip.clip_id;
        if graph.episodic_by_clip(clip_id).is_some() {
            return Err(MemoirError::Ingestion {
                clip: clip_id,
                reason: "clip already ingested".to_string(),
            });
        }

        // Face and voice have no mutual dependency; run them together.
        let (face_result, voice_result) = tokio::join!(
            self.retry
                .run("face extraction", || self.faces.extract_faces_boxed(clip)),
            self.retry
                .run("voice extraction", || self.voices.extract_voices_boxed(clip)),
        );

        let mut observation = ClipObservation {
            clip_id,
            span: clip.span,
            faces: Vec::new(),
            voices: Vec::new(),
            captions: Vec::new(),
            degraded: Vec::new(),
        };
        match face_result {
            Ok(faces) => observation.faces = faces,
            Err(err) => {
                warn!(clip = %clip_id, error = %err, "Face extraction degraded");
                observation.degraded.push(Modality::Face);
            }
        }
        match voice_result {
            Ok(voices) => observation.voices = voices,
            Err(err) => {
                warn!(clip = %clip_id, error = %err, "Voice extraction degraded");
                observation.degraded.push(Modality::Voice);
            }
        }

        // Caption generation is told the local slot budget, so it runs
        // after the local pass over face/voice evidence.
        let local_identities = self.resolver.local_identity_count(&observation);
        observation.captions = self
            .retry
            .run("caption generation", || {
                self.captions.generate_captions_boxed(clip, local_identities)
            })
            .await
            .map_err(|err| MemoirError::Ingestion {
                clip: clip_id,
                reason: format!("caption generation failed: {}", err),
            })?;

        if observation.is_empty() {
            return Ok(ClipOutcome::Skipped {
                clip_id,
                reason: "no observations in any modality".to_string(),
            });
        }

        let resolved = self.resolver.resolve_clip(graph, &observation)?;

        let mut statements = Vec::with_capacity(resolved.statements.len());
        for text in &resolved.statements {
            let embedding = match self
                .retry
                .run("statement embedding", || self.embedder.embed_boxed(text))
                .await
            {
                Ok(embedding) => Some(embedding),
                Err(err) => {
                    warn!(clip = %clip_id, error = %err, "Statement left unembedded");
                    None
                }
            };
            statements.push(MemoryStatement::new(text.clone(), embedding));
        }

        graph.append_clip(clip_id, statements, &resolved.mentions)?;
        info!(
            clip = %clip_id,
            statements = resolved.statements.len(),
            new_identities = resolved.new_identities,
            matched_identities = resolved.matched_identities,
            "Clip ingested"
        );

        Ok(ClipOutcome::Stored {
            clip_id,
            statements: resolved.statements.len(),
            new_identities: resolved.new_identities,
            matched_identities: resolved.matched_identities,
            degraded: observation.degraded,
        })
    }
}
