use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

use crate::config::KeywordConfig;
use crate::error::{EmbedError, Result};

/// SEO metadata to embed into an image.
///
/// Usually decoded from the JSON reply of an AI vision service. Keyword order
/// is kept as given; duplicates are allowed.
///
/// Keyword entries that are not strings are dropped during deserialization
/// (with a warning) instead of failing the whole payload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImageMetadata {
    pub title: String,
    pub description: String,
    #[serde(default, deserialize_with = "deserialize_keywords")]
    pub keywords: Vec<String>,
}

impl ImageMetadata {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        keywords: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }

    /// Apply the keyword clean-up rules from the config.
    pub(crate) fn normalized(&self, rules: &KeywordConfig) -> ImageMetadata {
        let keywords = self
            .keywords
            .iter()
            .map(|k| if rules.trim { k.trim().to_string() } else { k.clone() })
            .filter(|k| !(rules.drop_empty && k.trim().is_empty()))
            .collect();
        ImageMetadata {
            title: self.title.clone(),
            description: self.description.clone(),
            keywords,
        }
    }
}

fn deserialize_keywords<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|v| match v {
            serde_json::Value::String(s) => Some(s),
            other => {
                log::warn!("Dropping non-string keyword entry: {other}");
                None
            }
        })
        .collect())
}

/// One embed job as handed over by the caller.
///
/// Both fields are optional so a request decoded from an external payload can
/// be validated; [`EmbedRequest::validate`] turns a missing field into
/// [`EmbedError::Validation`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbedRequest {
    pub source_path: Option<PathBuf>,
    pub metadata: Option<ImageMetadata>,
}

impl EmbedRequest {
    pub fn new(source_path: impl Into<PathBuf>, metadata: ImageMetadata) -> Self {
        Self {
            source_path: Some(source_path.into()),
            metadata: Some(metadata),
        }
    }

    /// Decode a request from JSON. Malformed payloads are validation errors.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| EmbedError::Validation(format!("malformed embed request: {e}")))
    }

    /// Borrow the required fields, failing if either is missing.
    pub fn validate(&self) -> Result<(&Path, &ImageMetadata)> {
        let metadata = self
            .metadata
            .as_ref()
            .ok_or_else(|| EmbedError::Validation("metadata is missing".into()))?;
        let source = self
            .source_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| EmbedError::Validation("source path is missing".into()))?;
        Ok((source, metadata))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedStatus {
    Success,
}

/// Outcome of a successful embed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedResult {
    pub status: EmbedStatus,
    pub output_path: PathBuf,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_full_metadata() {
        let json = r#"{"title":"Sunset","description":"A beach at dusk","keywords":["beach","sunset"]}"#;
        let meta: ImageMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta, ImageMetadata::new("Sunset", "A beach at dusk", ["beach", "sunset"]));
    }

    #[test]
    fn deserialize_drops_non_string_keywords() {
        let json = r#"{"title":"t","description":"d","keywords":["a",1,null,{"x":1},"b"]}"#;
        let meta: ImageMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.keywords, vec!["a", "b"]);
    }

    #[test]
    fn deserialize_missing_or_null_keywords() {
        let meta: ImageMetadata = serde_json::from_str(r#"{"title":"t","description":"d"}"#).unwrap();
        assert!(meta.keywords.is_empty());
        let meta: ImageMetadata =
            serde_json::from_str(r#"{"title":"t","description":"d","keywords":null}"#).unwrap();
        assert!(meta.keywords.is_empty());
    }

    #[test]
    fn normalized_trims_and_drops_empty() {
        let meta = ImageMetadata::new("t", "d", [" beach ", "", "  ", "sunset", "beach"]);
        let rules = KeywordConfig { trim: true, drop_empty: true };
        let out = meta.normalized(&rules);
        assert_eq!(out.keywords, vec!["beach", "sunset", "beach"]);
    }

    #[test]
    fn normalized_passthrough_by_default() {
        let meta = ImageMetadata::new("t", "d", [" a ", ""]);
        assert_eq!(meta.normalized(&KeywordConfig::default()).keywords, vec![" a ", ""]);
    }

    // ── EmbedRequest ─────────────────────────────────────────────────

    #[test]
    fn request_missing_metadata_is_validation_error() {
        let req = EmbedRequest::from_json(r#"{"source_path":"a.png","metadata":null}"#).unwrap();
        assert!(matches!(req.validate(), Err(EmbedError::Validation(_))));
    }

    #[test]
    fn request_missing_path_is_validation_error() {
        let req = EmbedRequest {
            source_path: None,
            metadata: Some(ImageMetadata::default()),
        };
        assert!(matches!(req.validate(), Err(EmbedError::Validation(_))));

        let req = EmbedRequest::new("", ImageMetadata::default());
        assert!(matches!(req.validate(), Err(EmbedError::Validation(_))));
    }

    #[test]
    fn request_malformed_json_is_validation_error() {
        assert!(matches!(
            EmbedRequest::from_json("{not json"),
            Err(EmbedError::Validation(_))
        ));
        assert!(matches!(
            EmbedRequest::from_json(r#"{"source_path":"a.png","metadata":{"title":3}}"#),
            Err(EmbedError::Validation(_))
        ));
    }

    #[test]
    fn result_serializes_lowercase_status() {
        let result = EmbedResult {
            status: EmbedStatus::Success,
            output_path: PathBuf::from("a_with_metadata.png"),
            message: "ok".into(),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["output_path"], "a_with_metadata.png");
    }
}
