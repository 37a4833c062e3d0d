use std::path::PathBuf;
use thiserror::Error;

/// Phrase carried by every [`EmbedError::Embedding`] message.
pub const EMBEDDING_FAILURE: &str = "metadata embedding failed";

/// Errors surfaced by [`MetadataEmbedder::embed`](crate::embed::MetadataEmbedder::embed).
///
/// Callers can match on the variant, or on the message: embedding failures
/// always contain [`EMBEDDING_FAILURE`].
#[derive(Debug, Error)]
pub enum EmbedError {
    /// A required input (source path or metadata) was missing.
    #[error("invalid embed request: {0}")]
    Validation(String),

    /// The source file does not exist or cannot be read.
    #[error("source image not found or unreadable: {}", .0.display())]
    NotFound(PathBuf),

    /// The file extension is not one of the supported containers.
    #[error("unsupported image format '{extension}' for {}", .path.display())]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// Anything that went wrong while reading, tagging, or writing the image.
    #[error("metadata embedding failed for {}: {source:#}", .path.display())]
    Embedding {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

impl EmbedError {
    pub(crate) fn embedding(path: impl Into<PathBuf>, source: anyhow::Error) -> Self {
        Self::Embedding {
            path: path.into(),
            source,
        }
    }

    /// `true` for failures raised while tagging or writing the image.
    pub fn is_embedding_failure(&self) -> bool {
        matches!(self, Self::Embedding { .. })
    }
}

pub type Result<T> = std::result::Result<T, EmbedError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_message_carries_phrase() {
        let err = EmbedError::embedding("a.jpg", anyhow::anyhow!("disk full"));
        let msg = err.to_string();
        assert!(msg.contains(EMBEDDING_FAILURE));
        assert!(msg.contains("disk full"));
        assert!(err.is_embedding_failure());
    }

    #[test]
    fn other_variants_are_not_embedding_failures() {
        let errs = [
            EmbedError::Validation("metadata is missing".into()),
            EmbedError::NotFound(PathBuf::from("missing.png")),
            EmbedError::UnsupportedFormat {
                path: PathBuf::from("a.bmp"),
                extension: "bmp".into(),
            },
        ];
        for err in errs {
            assert!(!err.is_embedding_failure());
            assert!(!err.to_string().contains(EMBEDDING_FAILURE));
        }
    }
}
