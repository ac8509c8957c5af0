use serde::{Deserialize, Serialize};

// =============================================================================
// Enums
// =============================================================================

/// One of the three observation channels extracted from a clip.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// Face tracks detected in the video frames.
    Face,
    /// Speaker segments detected in the audio track.
    Voice,
    /// Generated textual memory statements.
    Caption,
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Modality::Face => write!(f, "face"),
            Modality::Voice => write!(f, "voice"),
            Modality::Caption => write!(f, "caption"),
        }
    }
}

// =============================================================================
// Newtype Wrappers - Identity
// =============================================================================

/// Position of a clip in its source video. Monotonic per video, starting at 0.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct ClipId(pub u64);

impl std::fmt::Display for ClipId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "clip_{}", self.0)
    }
}

/// Canonical identifier of a resolved identity node.
///
/// Assigned sequentially by the graph and never reused or renumbered; a
/// merged identity keeps its id and gains a redirect instead.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct IdentityId(pub u64);

impl std::fmt::Display for IdentityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "identity_{}", self.0)
    }
}

/// A durable placeholder token for a person observed in a clip.
///
/// Aliases are clip-scoped and therefore globally unique within one graph:
/// `c{clip}_p{slot}`. Statement text embeds them in angle brackets, e.g.
/// `<c12_p0> waves at <c12_p1>`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Alias(pub String);

impl Alias {
    /// Build the alias for local identity slot `slot` of clip `clip`.
    pub fn local(clip: ClipId, slot: usize) -> Self {
        Self(format!("c{}_p{}", clip.0, slot))
    }

    /// The token form used inside statement text.
    pub fn token(&self) -> String {
        format!("<{}>", self.0)
    }
}

impl std::fmt::Display for Alias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Newtype Wrappers - Vector / Numeric
// =============================================================================

/// An embedding vector produced by a modality or text collaborator.
///
/// Invariant: never empty. The dimension is fixed by the collaborator that
/// produced it, not by this type; similarity across mismatched dimensions
/// is zero.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Embedding(pub Vec<f32>);

impl Embedding {
    pub fn new(data: Vec<f32>) -> std::result::Result<Self, &'static str> {
        if data.is_empty() {
            return Err("Embedding must not be empty");
        }
        Ok(Self(data))
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    /// Cosine similarity in f64 for numeric stability. Returns 0.0 for
    /// zero-magnitude vectors and for dimension mismatches.
    pub fn cosine_similarity(&self, other: &Embedding) -> f64 {
        if self.0.len() != other.0.len() {
            return 0.0;
        }
        let dot: f64 = self
            .0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| (*a as f64) * (*b as f64))
            .sum();
        let mag_a: f64 = self.0.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
        let mag_b: f64 = other
            .0
            .iter()
            .map(|x| (*x as f64).powi(2))
            .sum::<f64>()
            .sqrt();
        if mag_a == 0.0 || mag_b == 0.0 {
            return 0.0;
        }
        dot / (mag_a * mag_b)
    }
}

/// Relevance of a graph node to a query. Range: 0.0 (no match) to 1.0.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Relevance(pub f64);

impl Relevance {
    pub fn new(value: f64) -> Self {
        Self(value.clamp(0.0, 1.0))
    }
}

// =============================================================================
// Temporal
// =============================================================================

/// A time range within the source video, in seconds from the video start.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start_secs: f64,
    pub end_secs: f64,
}

impl TimeSpan {
    pub fn new(start_secs: f64, end_secs: f64) -> Self {
        Self {
            start_secs,
            end_secs,
        }
    }

    pub fn duration_secs(&self) -> f64 {
        (self.end_secs - self.start_secs).max(0.0)
    }

    pub fn overlaps(&self, other: &TimeSpan) -> bool {
        self.start_secs < other.end_secs && other.start_secs < self.end_secs
    }
}

// =============================================================================
// Observation Structs
// =============================================================================

/// Normalized bounding region of a face track within the frame (0.0 to 1.0).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingRegion {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// One face track detected in a clip.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FaceTrack {
    /// Extractor-local track number, meaningless outside the clip.
    pub track: u32,
    pub embedding: Embedding,
    pub region: BoundingRegion,
}

/// One speaker segment detected in a clip's audio.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VoiceSegment {
    /// Extractor-local speaker number, meaningless outside the clip.
    pub speaker: u32,
    pub embedding: Embedding,
    pub span: TimeSpan,
}

/// One generated memory statement, referencing people only through
/// clip-local `<p{slot}>` placeholder tokens.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionLine(pub String);

/// Everything the modality extractors produced for one clip.
///
/// Transient: consumed by the resolver and the graph append, then dropped.
/// `degraded` lists modalities whose extractor failed after retries; their
/// observation lists are empty and ingestion carried on without them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClipObservation {
    pub clip_id: ClipId,
    pub span: TimeSpan,
    pub faces: Vec<FaceTrack>,
    pub voices: Vec<VoiceSegment>,
    pub captions: Vec<CaptionLine>,
    pub degraded: Vec<Modality>,
}

impl ClipObservation {
    /// True when no modality yielded any observation at all.
    pub fn is_empty(&self) -> bool {
        self.faces.is_empty() && self.voices.is_empty() && self.captions.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modality_serialization() {
        let m = Modality::Face;
        let json = serde_json::to_string(&m).unwrap();
        assert_eq!(json, "\"face\"");

        let deserialized: Modality = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, Modality::Face);
    }

    #[test]
    fn test_modality_display() {
        assert_eq!(Modality::Face.to_string(), "face");
        assert_eq!(Modality::Voice.to_string(), "voice");
        assert_eq!(Modality::Caption.to_string(), "caption");
    }

    #[test]
    fn test_clip_id_ordering() {
        assert!(ClipId(0) < ClipId(1));
        assert_eq!(ClipId(3).to_string(), "clip_3");
    }

    #[test]
    fn test_identity_id_display() {
        assert_eq!(IdentityId(42).to_string(), "identity_42");
    }

    #[test]
    fn test_alias_local_format() {
        let alias = Alias::local(ClipId(12), 0);
        assert_eq!(alias.0, "c12_p0");
        assert_eq!(alias.token(), "<c12_p0>");
    }

    #[test]
    fn test_alias_ordering_is_stable() {
        let a = Alias::local(ClipId(1), 0);
        let b = Alias::local(ClipId(1), 1);
        assert!(a < b);
    }

    #[test]
    fn test_embedding_rejects_empty() {
        assert!(Embedding::new(vec![]).is_err());
        assert!(Embedding::new(vec![0.5]).is_ok());
    }

    #[test]
    fn test_embedding_cosine_similarity_identical() {
        let data = vec![1.0f32; 64];
        let a = Embedding::new(data.clone()).unwrap();
        let b = Embedding::new(data).unwrap();
        let sim = a.cosine_similarity(&b);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_embedding_cosine_similarity_zero_magnitude() {
        let a = Embedding::new(vec![0.0f32; 8]).unwrap();
        let b = Embedding::new(vec![1.0f32; 8]).unwrap();
        assert_eq!(a.cosine_similarity(&b), 0.0);
    }

    #[test]
    fn test_embedding_cosine_similarity_dimension_mismatch() {
        let a = Embedding::new(vec![1.0f32; 8]).unwrap();
        let b = Embedding::new(vec![1.0f32; 16]).unwrap();
        assert_eq!(a.cosine_similarity(&b), 0.0);
    }

    #[test]
    fn test_embedding_cosine_similarity_orthogonal() {
        let mut a_data = vec![0.0f32; 8];
        let mut b_data = vec![0.0f32; 8];
        a_data[0] = 1.0;
        b_data[1] = 1.0;
        let a = Embedding::new(a_data).unwrap();
        let b = Embedding::new(b_data).unwrap();
        assert!(a.cosine_similarity(&b).abs() < 1e-6);
    }

    #[test]
    fn test_relevance_clamp() {
        assert_eq!(Relevance::new(1.5).0, 1.0);
        assert_eq!(Relevance::new(-0.5).0, 0.0);
        assert_eq!(Relevance::new(0.75).0, 0.75);
    }

    #[test]
    fn test_time_span_duration() {
        let span = TimeSpan::new(10.0, 40.0);
        assert!((span.duration_secs() - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_time_span_inverted_duration_is_zero() {
        let span = TimeSpan::new(40.0, 10.0);
        assert_eq!(span.duration_secs(), 0.0);
    }

    #[test]
    fn test_time_span_overlap() {
        let a = TimeSpan::new(0.0, 10.0);
        let b = TimeSpan::new(5.0, 15.0);
        let c = TimeSpan::new(10.0, 20.0);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c)); // touching endpoints do not overlap
    }

    #[test]
    fn test_clip_observation_is_empty() {
        let obs = ClipObservation {
            clip_id: ClipId(0),
            span: TimeSpan::new(0.0, 30.0),
            faces: vec![],
            voices: vec![],
            captions: vec![],
            degraded: vec![Modality::Face, Modality::Voice, Modality::Caption],
        };
        assert!(obs.is_empty());
    }

    #[test]
    fn test_clip_observation_json_round_trip() {
        let obs = ClipObservation {
            clip_id: ClipId(3),
            span: TimeSpan::new(90.0, 120.0),
            faces: vec![FaceTrack {
                track: 0,
                embedding: Embedding::new(vec![0.1, 0.2, 0.3]).unwrap(),
                region: BoundingRegion {
                    x: 0.1,
                    y: 0.2,
                    width: 0.3,
                    height: 0.4,
                },
            }],
            voices: vec![VoiceSegment {
                speaker: 0,
                embedding: Embedding::new(vec![0.4, 0.5]).unwrap(),
                span: TimeSpan::new(91.0, 95.0),
            }],
            captions: vec![CaptionLine("<p0> enters the room".to_string())],
            degraded: vec![],
        };

        let json = serde_json::to_string(&obs).unwrap();
        let back: ClipObservation = serde_json::from_str(&json).unwrap();
        assert_eq!(obs, back);
    }

    #[test]
    fn test_alias_serialization_round_trip() {
        let alias = Alias::local(ClipId(7), 2);
        let json = serde_json::to_string(&alias).unwrap();
        let back: Alias = serde_json::from_str(&json).unwrap();
        assert_eq!(alias, back);
    }
}
