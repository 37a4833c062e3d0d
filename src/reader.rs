use anyhow::{Context, Result};
use img_parts::jpeg::Jpeg;
use img_parts::{Bytes, ImageEXIF};
use nom_exif::{EntryValue, Exif, ExifIter, ExifTag, MediaParser, MediaSource};
use serde::Serialize;
use std::path::Path;

use crate::embed::ifd::{self, TAG_DOCUMENT_NAME, TAG_IMAGE_DESCRIPTION, TAG_XP_KEYWORDS, TAG_XP_TITLE};
use crate::embed::{iptc, png, webp, xmp};
use crate::format::ImageFormat;

/// SEO metadata found in an image, read from the slots the embedder writes.
///
/// `keywords` is the keyword string as stored (with the format's separator);
/// `keyword_list` holds individually stored keywords (IPTC Keywords for JPEG,
/// `dc:subject` for WebP) and is empty for PNG and TIFF.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmbeddedMetadata {
    pub format: ImageFormat,
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
    pub keyword_list: Vec<String>,
}

impl EmbeddedMetadata {
    fn empty(format: ImageFormat) -> Self {
        Self {
            format,
            title: None,
            description: None,
            keywords: None,
            keyword_list: Vec::new(),
        }
    }

    /// `true` when none of the SEO slots carry a value.
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.keywords.is_none()
            && self.keyword_list.is_empty()
    }
}

/// Read embedded SEO metadata from any supported image file.
///
/// # Example
///
/// ```rust,no_run
/// use seo_embed::reader::read_embedded;
/// use std::path::Path;
///
/// let found = read_embedded(Path::new("photo_with_metadata.jpg")).unwrap();
/// println!("Title: {:?}", found.title);
/// ```
pub fn read_embedded(path: &Path) -> Result<EmbeddedMetadata> {
    let format = ImageFormat::from_path(path)
        .with_context(|| format!("Unsupported image format: {}", path.display()))?;
    let bytes = std::fs::read(path).context("Failed to read image file")?;

    match format {
        ImageFormat::Jpeg => read_jpeg(path, &bytes),
        ImageFormat::Png => read_png(&bytes),
        ImageFormat::WebP => read_webp(&bytes),
        ImageFormat::Tiff => read_tiff(path, &bytes),
    }
}

fn read_jpeg(path: &Path, bytes: &[u8]) -> Result<EmbeddedMetadata> {
    let jpeg = Jpeg::from_bytes(Bytes::copy_from_slice(bytes))
        .map_err(|e| anyhow::anyhow!("Failed to parse JPEG: {e}"))?;
    let mut data = EmbeddedMetadata::empty(ImageFormat::Jpeg);

    let records = jpeg
        .segments()
        .iter()
        .filter(|s| s.marker() == 0xED)
        .find_map(|s| iptc::iim_from_app13(s.contents()))
        .map(iptc::parse_records)
        .transpose()?
        .unwrap_or_default();
    data.title = iptc::values(&records, iptc::OBJECT_NAME).into_iter().next();
    data.description = iptc::values(&records, iptc::CAPTION).into_iter().next();
    data.keyword_list = iptc::values(&records, iptc::KEYWORDS);

    if let Some(tiff) = jpeg.exif() {
        if data.title.is_none() {
            data.title = ifd::read_xp_tag(&tiff, TAG_XP_TITLE).ok().flatten();
        }
        if data.description.is_none() {
            data.description = exif_text(path, TAG_IMAGE_DESCRIPTION)
                .or_else(|| ifd::read_ascii_tag(&tiff, TAG_IMAGE_DESCRIPTION).ok().flatten());
        }
        data.keywords = ifd::read_xp_tag(&tiff, TAG_XP_KEYWORDS).ok().flatten();
    }

    Ok(data)
}

fn read_png(bytes: &[u8]) -> Result<EmbeddedMetadata> {
    let mut data = EmbeddedMetadata::empty(ImageFormat::Png);
    for (key, value) in png::read_text_chunks(bytes)? {
        let slot = match key.as_str() {
            png::KEY_TITLE => &mut data.title,
            png::KEY_DESCRIPTION => &mut data.description,
            png::KEY_KEYWORDS => &mut data.keywords,
            _ => continue,
        };
        slot.get_or_insert(value);
    }
    Ok(data)
}

fn read_webp(bytes: &[u8]) -> Result<EmbeddedMetadata> {
    let mut data = EmbeddedMetadata::empty(ImageFormat::WebP);
    if let Some(packet) = webp::read_xmp(bytes)? {
        data.title = xmp::read_alt(&packet, "dc:title");
        data.description = xmp::read_alt(&packet, "dc:description");
        data.keywords = xmp::read_simple(&packet, "pdf:Keywords");
        data.keyword_list = xmp::read_bag(&packet, "dc:subject");
    }
    Ok(data)
}

fn read_tiff(path: &Path, bytes: &[u8]) -> Result<EmbeddedMetadata> {
    let mut data = EmbeddedMetadata::empty(ImageFormat::Tiff);
    data.title = exif_text(path, TAG_DOCUMENT_NAME)
        .or_else(|| ifd::read_ascii_tag(bytes, TAG_DOCUMENT_NAME).ok().flatten());
    data.description = exif_text(path, TAG_IMAGE_DESCRIPTION)
        .or_else(|| ifd::read_ascii_tag(bytes, TAG_IMAGE_DESCRIPTION).ok().flatten());
    data.keywords = ifd::read_xp_tag(bytes, TAG_XP_KEYWORDS)?;
    Ok(data)
}

/// Read an IFD0 text tag with nom-exif. `None` when the file has no EXIF
/// nom-exif can parse, or the tag is absent or empty.
fn exif_text(path: &Path, tag: u16) -> Option<String> {
    let mut parser = MediaParser::new();
    let ms = MediaSource::file_path(path).ok()?;
    let iter: ExifIter = match parser.parse(ms) {
        Ok(iter) => iter,
        Err(e) => {
            log::debug!("nom-exif could not parse {}: {e}", path.display());
            return None;
        }
    };
    let exif: Exif = iter.into();
    let value = match tag {
        TAG_IMAGE_DESCRIPTION => exif.get(ExifTag::ImageDescription),
        _ => exif.get_by_ifd_tag_code(0, tag),
    };
    value.and_then(entry_to_string)
}

/// Convert an EntryValue to an Option<String>. Text is returned verbatim,
/// apart from trailing NUL padding.
fn entry_to_string(val: &EntryValue) -> Option<String> {
    let s = match val.as_str() {
        Some(text) => text.trim_end_matches('\0').to_string(),
        None => val.to_string(),
    };
    if s.is_empty() { None } else { Some(s) }
}
