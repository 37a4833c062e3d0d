use anyhow::{Context, Result};

use super::Tagging;
use super::ifd::{self, IfdEntry, TAG_DOCUMENT_NAME, TAG_IMAGE_DESCRIPTION, TAG_XP_KEYWORDS};

/// Tag a TIFF: DocumentName (title), ImageDescription (description),
/// XPKeywords (keywords) in IFD0. Strip/tile data is not moved.
pub(crate) fn embed(source: &[u8], tagging: &Tagging<'_>) -> Result<Vec<u8>> {
    let entries = [
        IfdEntry::ascii(TAG_DOCUMENT_NAME, &tagging.metadata.title),
        IfdEntry::ascii(TAG_IMAGE_DESCRIPTION, &tagging.metadata.description),
        IfdEntry::xp(TAG_XP_KEYWORDS, &tagging.joined_keywords),
    ];
    ifd::inject_into_ifd0(source, &entries).context("Failed to update TIFF IFD0")
}
