use thiserror::Error;

use crate::types::{ClipId, Modality};

/// Top-level error type for the Memoir system.
///
/// Subsystem crates return this type directly so the `?` operator works
/// across crate boundaries. Failures scoped to one clip or one modality are
/// contained by the ingestion pipeline and recorded, never propagated past
/// the clip that produced them.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MemoirError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Extraction failed for {modality} of {clip}: {reason}")]
    Extraction {
        clip: ClipId,
        modality: Modality,
        reason: String,
    },

    #[error("Ingestion failed for {clip}: {reason}")]
    Ingestion { clip: ClipId, reason: String },

    #[error("Graph error: {0}")]
    Graph(String),

    #[error("Retrieval error: {0}")]
    Retrieval(String),

    #[error("Answer synthesis failed after retries: {0}")]
    Synthesis(String),

    #[error("Transient collaborator failure: {0}")]
    Transient(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl MemoirError {
    /// True for failures worth retrying with backoff (network, rate limits).
    pub fn is_transient(&self) -> bool {
        matches!(self, MemoirError::Transient(_))
    }
}

impl From<serde_json::Error> for MemoirError {
    fn from(err: serde_json::Error) -> Self {
        MemoirError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for MemoirError {
    fn from(err: toml::de::Error) -> Self {
        MemoirError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for MemoirError {
    fn from(err: toml::ser::Error) -> Self {
        MemoirError::Config(err.to_string())
    }
}

/// A specialized `Result` type for Memoir operations.
pub type Result<T> = std::result::Result<T, MemoirError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MemoirError::Config("missing field".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing field");
    }

    #[test]
    fn test_extraction_error_display() {
        let err = MemoirError::Extraction {
            clip: ClipId(4),
            modality: Modality::Voice,
            reason: "decoder crashed".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Extraction failed for voice of clip_4: decoder crashed"
        );
    }

    #[test]
    fn test_ingestion_error_display() {
        let err = MemoirError::Ingestion {
            clip: ClipId(9),
            reason: "duplicate clip".to_string(),
        };
        assert_eq!(err.to_string(), "Ingestion failed for clip_9: duplicate clip");
    }

    #[test]
    fn test_is_transient() {
        assert!(MemoirError::Transient("rate limited".into()).is_transient());
        assert!(!MemoirError::Graph("bad id".into()).is_transient());
        assert!(!MemoirError::Synthesis("gave up".into()).is_transient());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: MemoirError = io_err.into();
        assert!(matches!(err, MemoirError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_serde_json_error_conversion() {
        let bad_json = "{ invalid json }";
        let parsed: std::result::Result<serde_json::Value, _> = serde_json::from_str(bad_json);
        let err: MemoirError = parsed.unwrap_err().into();
        assert!(matches!(err, MemoirError::Serialization(_)));
    }

    #[test]
    fn test_toml_error_conversion() {
        let bad_toml = "invalid = [[[";
        let parsed: std::result::Result<toml::Value, _> = toml::from_str(bad_toml);
        let err: MemoirError = parsed.unwrap_err().into();
        assert!(matches!(err, MemoirError::Config(_)));
    }

    #[test]
    fn test_result_type_with_question_mark() {
        fn inner() -> Result<String> {
            let io_result: std::result::Result<i32, std::io::Error> = Ok(42);
            let _value = io_result?;
            Ok("success".to_string())
        }

        assert_eq!(inner().unwrap(), "success");
    }
}
