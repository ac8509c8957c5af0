//! Deterministic model-free collaborators for the CLI.
//!
//! Real deployments plug model-backed extractors in behind the traits in
//! `memoir-extract`. The CLI ships with these synthetic stand-ins so the
//! whole pipeline can be exercised without any inference stack: a clip
//! file's name prefix (everything before the first `_`) acts as the person
//! appearing in it, so `maya_000.mp4` and `maya_017.mp4` resolve to one
//! identity while `joel_003.mp4` becomes another.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use memoir_core::error::Result;
use memoir_core::types::{BoundingRegion, CaptionLine, Embedding, FaceTrack, VoiceSegment};
use memoir_extract::clip::Clip;
use memoir_extract::extractor::{CaptionGenerator, FaceExtractor, VoiceExtractor};

/// The clip file's stem, e.g. `maya_000` for `/clips/maya_000.mp4`.
fn clip_stem(clip: &Clip) -> String {
    clip.video
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| clip.clip_id.to_string())
}

/// The persona token: the stem up to the first underscore.
fn persona(clip: &Clip) -> String {
    let stem = clip_stem(clip);
    stem.split('_').next().unwrap_or(&stem).to_string()
}

/// Deterministic unit vector derived from a seed string.
fn hash_embedding(seed: &str, salt: &str) -> Embedding {
    let mut values = Vec::with_capacity(64);
    for i in 0..64usize {
        let mut hasher = DefaultHasher::new();
        seed.hash(&mut hasher);
        salt.hash(&mut hasher);
        i.hash(&mut hasher);
        let h = hasher.finish();
        values.push((((h as f64) / (u64::MAX as f64)) * 2.0 - 1.0) as f32);
    }
    let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut values {
            *v /= norm;
        }
    }
    Embedding(values)
}

/// One synthetic face track per clip, keyed by the persona token.
#[derive(Debug, Clone, Default)]
pub struct SyntheticFaceExtractor;

impl FaceExtractor for SyntheticFaceExtractor {
    async fn extract_faces(&self, clip: &Clip) -> Result<Vec<FaceTrack>> {
        Ok(vec![FaceTrack {
            track: 0,
            embedding: hash_embedding(&persona(clip), "face"),
            region: BoundingRegion {
                x: 0.3,
                y: 0.2,
                width: 0.4,
                height: 0.5,
            },
        }])
    }
}

/// One synthetic voice segment per clip, keyed by the persona token.
#[derive(Debug, Clone, Default)]
pub struct SyntheticVoiceExtractor;

impl VoiceExtractor for SyntheticVoiceExtractor {
    async fn extract_voices(&self, clip: &Clip) -> Result<Vec<VoiceSegment>> {
        Ok(vec![VoiceSegment {
            speaker: 0,
            embedding: hash_embedding(&persona(clip), "voice"),
            span: clip.span,
        }])
    }
}

/// Caption lines naming the clip and its placeholder, so retrieval has
/// distinguishable text to rank.
#[derive(Debug, Clone, Default)]
pub struct SyntheticCaptionGenerator;

impl CaptionGenerator for SyntheticCaptionGenerator {
    async fn generate_captions(
        &self,
        clip: &Clip,
        local_identities: usize,
    ) -> Result<Vec<CaptionLine>> {
        let stem = clip_stem(clip);
        if local_identities == 0 {
            return Ok(vec![CaptionLine(format!("scene from {}", stem))]);
        }
        Ok((0..local_identities)
            .map(|slot| CaptionLine(format!("<p{}> appears in {}", slot, stem)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use memoir_core::types::{ClipId, TimeSpan};

    fn clip(path: &str, id: u64) -> Clip {
        Clip {
            clip_id: ClipId(id),
            span: TimeSpan::new(0.0, 30.0),
            video: PathBuf::from(path),
        }
    }

    #[tokio::test]
    async fn test_same_persona_same_face_embedding() {
        let extractor = SyntheticFaceExtractor;
        let a = extractor
            .extract_faces(&clip("/clips/maya_000.mp4", 0))
            .await
            .unwrap();
        let b = extractor
            .extract_faces(&clip("/clips/maya_017.mp4", 17))
            .await
            .unwrap();
        assert_eq!(a[0].embedding, b[0].embedding);
    }

    #[tokio::test]
    async fn test_different_personas_differ() {
        let extractor = SyntheticFaceExtractor;
        let a = extractor
            .extract_faces(&clip("/clips/maya_000.mp4", 0))
            .await
            .unwrap();
        let b = extractor
            .extract_faces(&clip("/clips/joel_000.mp4", 0))
            .await
            .unwrap();
        assert_ne!(a[0].embedding, b[0].embedding);
        assert!(a[0].embedding.cosine_similarity(&b[0].embedding) < 0.5);
    }

    #[tokio::test]
    async fn test_face_and_voice_salts_differ() {
        let c = clip("/clips/maya_000.mp4", 0);
        let face = SyntheticFaceExtractor.extract_faces(&c).await.unwrap();
        let voice = SyntheticVoiceExtractor.extract_voices(&c).await.unwrap();
        assert_ne!(face[0].embedding, voice[0].embedding);
    }

    #[tokio::test]
    async fn test_captions_reference_slots() {
        let c = clip("/clips/maya_000.mp4", 0);
        let lines = SyntheticCaptionGenerator
            .generate_captions(&c, 1)
            .await
            .unwrap();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].0.contains("<p0>"));
        assert!(lines[0].0.contains("maya_000"));
    }

    #[tokio::test]
    async fn test_captions_without_identities() {
        let c = clip("/clips/empty_000.mp4", 0);
        let lines = SyntheticCaptionGenerator
            .generate_captions(&c, 0)
            .await
            .unwrap();
        assert!(lines[0].0.starts_with("scene from"));
    }
}
