//! Clip sources: the contract with the external clip splitter.
//!
//! Video decoding and segmentation happen outside this system. A clip
//! source only promises an ordered, finite sequence of already-cut clips
//! with their time spans.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use memoir_core::error::{MemoirError, Result};
use memoir_core::types::{ClipId, TimeSpan};

/// One bounded-duration segment of a source video.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Clip {
    pub clip_id: ClipId,
    pub span: TimeSpan,
    /// Path to the pre-cut clip file.
    pub video: PathBuf,
}

/// Yields the clips of one video, in order. Finite and restartable:
/// `clips` may be called repeatedly and returns the same sequence.
pub trait ClipSource {
    fn clips(&self) -> Result<Vec<Clip>>;
}

/// Clip source over a directory of pre-cut clip files.
///
/// Files are taken in lexicographic name order, which is how external
/// splitters number their output (`clip_000.mp4`, `clip_001.mp4`, ...).
/// Spans are nominal, derived from the configured clip duration.
pub struct DirectoryClipSource {
    dir: PathBuf,
    clip_duration_secs: f64,
}

impl DirectoryClipSource {
    pub fn new(dir: impl Into<PathBuf>, clip_duration_secs: f64) -> Self {
        Self {
            dir: dir.into(),
            clip_duration_secs,
        }
    }
}

impl ClipSource for DirectoryClipSource {
    fn clips(&self) -> Result<Vec<Clip>> {
        if !self.dir.is_dir() {
            return Err(MemoirError::Config(format!(
                "clip directory not found: {}",
                self.dir.display()
            )));
        }
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        files.sort();

        Ok(files
            .into_iter()
            .enumerate()
            .map(|(i, video)| {
                let start = i as f64 * self.clip_duration_secs;
                Clip {
                    clip_id: ClipId(i as u64),
                    span: TimeSpan::new(start, start + self.clip_duration_secs),
                    video,
                }
            })
            .collect())
    }
}

/// Fixed in-memory clip source, for tests and resumable ingestion drivers.
pub struct StaticClipSource {
    clips: Vec<Clip>,
}

impl StaticClipSource {
    pub fn new(clips: Vec<Clip>) -> Self {
        Self { clips }
    }

    /// Build `count` synthetic clips of `duration_secs` each, with video
    /// paths under `base`.
    pub fn synthetic(base: &Path, count: u64, duration_secs: f64) -> Self {
        let clips = (0..count)
            .map(|i| {
                let start = i as f64 * duration_secs;
                Clip {
                    clip_id: ClipId(i),
                    span: TimeSpan::new(start, start + duration_secs),
                    video: base.join(format!("clip_{:03}.mp4", i)),
                }
            })
            .collect();
        Self { clips }
    }
}

impl ClipSource for StaticClipSource {
    fn clips(&self) -> Result<Vec<Clip>> {
        Ok(self.clips.clone())
    }
}
