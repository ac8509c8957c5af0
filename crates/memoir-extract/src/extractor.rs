//! Modality collaborator contracts and test doubles.
//!
//! Each extractor consumes one clip and returns raw observations. The real
//! implementations wrap external model inference; this crate only fixes the
//! contracts. Reprocessing the same clip must yield semantically equivalent
//! (not necessarily byte-identical) output, since model inference is noisy.
//! Caption statements reference people only through clip-local `<p{slot}>`
//! placeholders; canonical identities do not exist yet at extraction time.
//!
//! The `Dyn*` twins follow the usual pattern: the native traits return
//! `impl Future` and are not object-safe, so each gets a boxed-future twin
//! with a blanket impl, letting pipelines hold `Box<dyn Dyn...>`.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use memoir_core::error::{MemoirError, Result};
use memoir_core::types::{CaptionLine, FaceTrack, VoiceSegment};

use crate::clip::Clip;

/// Detects and embeds face tracks in one clip.
pub trait FaceExtractor: Send + Sync {
    fn extract_faces(
        &self,
        clip: &Clip,
    ) -> impl Future<Output = Result<Vec<FaceTrack>>> + Send;
}

/// Object-safe twin of [`FaceExtractor`].
pub trait DynFaceExtractor: Send + Sync {
    fn extract_faces_boxed<'a>(
        &'a self,
        clip: &'a Clip,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<FaceTrack>>> + Send + 'a>>;
}

impl<T: FaceExtractor> DynFaceExtractor for T {
    fn extract_faces_boxed<'a>(
        &'a self,
        clip: &'a Clip,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<FaceTrack>>> + Send + 'a>> {
        Box::pin(self.extract_faces(clip))
    }
}

/// Detects and embeds speaker segments in one clip's audio.
pub trait VoiceExtractor: Send + Sync {
    fn extract_voices(
        &self,
        clip: &Clip,
    ) -> impl Future<Output = Result<Vec<VoiceSegment>>> + Send;
}

/// Object-safe twin of [`VoiceExtractor`].
pub trait DynVoiceExtractor: Send + Sync {
    fn extract_voices_boxed<'a>(
        &'a self,
        clip: &'a Clip,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<VoiceSegment>>> + Send + 'a>>;
}

impl<T: VoiceExtractor> DynVoiceExtractor for T {
    fn extract_voices_boxed<'a>(
        &'a self,
        clip: &'a Clip,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<VoiceSegment>>> + Send + 'a>> {
        Box::pin(self.extract_voices(clip))
    }
}

/// Generates memory statements for one clip.
///
/// `local_identities` is how many placeholder slots the resolver found in
/// the clip; generated lines may reference `<p0>` .. `<p{n-1}>` and nothing
/// beyond (references to unseen slots survive as unresolved placeholders).
pub trait CaptionGenerator: Send + Sync {
    fn generate_captions(
        &self,
        clip: &Clip,
        local_identities: usize,
    ) -> impl Future<Output = Result<Vec<CaptionLine>>> + Send;
}

/// Object-safe twin of [`CaptionGenerator`].
pub trait DynCaptionGenerator: Send + Sync {
    fn generate_captions_boxed<'a>(
        &'a self,
        clip: &'a Clip,
        local_identities: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<CaptionLine>>> + Send + 'a>>;
}

impl<T: CaptionGenerator> DynCaptionGenerator for T {
    fn generate_captions_boxed<'a>(
        &'a self,
        clip: &'a Clip,
        local_identities: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<CaptionLine>>> + Send + 'a>> {
        Box::pin(self.generate_captions(clip, local_identities))
    }
}

// ---------------------------------------------------------------------------
// Scripted test doubles
// ---------------------------------------------------------------------------

struct Script<T> {
    remaining_failures: u32,
    data: Vec<T>,
}

/// Shared scripting behavior: per-clip canned responses with optional
/// leading transient failures, for exercising retry and degradation paths.
struct ScriptedInner<T> {
    scripts: Mutex<HashMap<u64, Script<T>>>,
}

impl<T: Clone> ScriptedInner<T> {
    fn new() -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
        }
    }

    fn set(&self, clip: u64, failures: u32, data: Vec<T>) {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.insert(
                clip,
                Script {
                    remaining_failures: failures,
                    data,
                },
            );
        }
    }

    fn take(&self, clip: u64, what: &str) -> Result<Vec<T>> {
        let mut scripts = self.scripts.lock().unwrap_or_else(|e| e.into_inner());
        match scripts.get_mut(&clip) {
            Some(script) if script.remaining_failures > 0 => {
                script.remaining_failures -= 1;
                Err(MemoirError::Transient(format!(
                    "scripted {} failure for clip {}",
                    what, clip
                )))
            }
            Some(script) => Ok(script.data.clone()),
            None => Ok(Vec::new()),
        }
    }
}

/// Face extractor returning canned tracks per clip.
pub struct ScriptedFaceExtractor {
    inner: ScriptedInner<FaceTrack>,
}

impl ScriptedFaceExtractor {
    pub fn new() -> Self {
        Self {
            inner: ScriptedInner::new(),
        }
    }

    pub fn with_clip(self, clip: u64, tracks: Vec<FaceTrack>) -> Self {
        self.inner.set(clip, 0, tracks);
        self
    }

    /// Fail transiently `failures` times for `clip` before succeeding.
    pub fn with_flaky_clip(self, clip: u64, failures: u32, tracks: Vec<FaceTrack>) -> Self {
        self.inner.set(clip, failures, tracks);
        self
    }
}

impl Default for ScriptedFaceExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FaceExtractor for ScriptedFaceExtractor {
    async fn extract_faces(&self, clip: &Clip) -> Result<Vec<FaceTrack>> {
        self.inner.take(clip.clip_id.0, "face")
    }
}

/// Voice extractor returning canned segments per clip.
pub struct ScriptedVoiceExtractor {
    inner: ScriptedInner<VoiceSegment>,
}

impl ScriptedVoiceExtractor {
    pub fn new() -> Self {
        Self {
            inner: ScriptedInner::new(),
        }
    }

    pub fn with_clip(self, clip: u64, segments: Vec<VoiceSegment>) -> Self {
        self.inner.set(clip, 0, segments);
        self
    }

    pub fn with_flaky_clip(
        self,
        clip: u64,
        failures: u32,
        segments: Vec<VoiceSegment>,
    ) -> Self {
        self.inner.set(clip, failures, segments);
        self
    }
}

impl Default for ScriptedVoiceExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceExtractor for ScriptedVoiceExtractor {
    async fn extract_voices(&self, clip: &Clip) -> Result<Vec<VoiceSegment>> {
        self.inner.take(clip.clip_id.0, "voice")
    }
}

/// Caption generator returning canned statements per clip.
pub struct ScriptedCaptionGenerator {
    inner: ScriptedInner<CaptionLine>,
}

impl ScriptedCaptionGenerator {
    pub fn new() -> Self {
        Self {
            inner: ScriptedInner::new(),
        }
    }

    pub fn with_clip(self, clip: u64, lines: Vec<CaptionLine>) -> Self {
        self.inner.set(clip, 0, lines);
        self
    }

    pub fn with_flaky_clip(self, clip: u64, failures: u32, lines: Vec<CaptionLine>) -> Self {
        self.inner.set(clip, failures, lines);
        self
    }
}

impl Default for ScriptedCaptionGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptionGenerator for ScriptedCaptionGenerator {
    async fn generate_captions(
        &self,
        clip: &Clip,
        _local_identities: usize,
    ) -> Result<Vec<CaptionLine>> {
        self.inner.take(clip.clip_id.0, "caption")
    }
}
