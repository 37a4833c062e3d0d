use anyhow::{Context, Result};
use img_parts::jpeg::{Jpeg, JpegSegment};
use img_parts::{Bytes, ImageEXIF};
use little_exif::endian::Endian;
use little_exif::exif_tag::{ExifTag, ExifTagGroup};
use little_exif::exif_tag_format::ExifTagFormat;
use little_exif::filetype::FileExtension;
use little_exif::metadata::Metadata;

use super::ifd::{self, IfdEntry, TAG_IMAGE_DESCRIPTION, TAG_XP_KEYWORDS, TAG_XP_TITLE};
use super::iptc::{self, IptcFields, PHOTOSHOP_HEADER};
use super::Tagging;

const MARKER_APP0: u8 = 0xE0;
const MARKER_APP1: u8 = 0xE1;
const MARKER_APP13: u8 = 0xED;
pub(crate) const EXIF_PREFIX: &[u8] = b"Exif\0\0";

// little_exif as_u8_vec(JPEG) returns: [APP1 marker 2B][length 2B][Exif\0\0 6B][TIFF data]
// img-parts set_exif() expects just the TIFF data (after Exif\0\0)
const JPEG_EXIF_OVERHEAD: usize = 10; // 2 + 2 + 6

// Segment length is a u16 that counts its own two bytes
const MAX_SEGMENT_CONTENTS: usize = 0xFFFF - 2;

/// Tag a JPEG: EXIF (XPTitle, ImageDescription, XPKeywords) and IPTC-IIM
/// (Object Name, Caption, Keywords). All other segments are carried over.
pub(crate) fn embed(source: &[u8], tagging: &Tagging<'_>) -> Result<Vec<u8>> {
    let mut jpeg = Jpeg::from_bytes(Bytes::copy_from_slice(source))
        .map_err(|e| anyhow::anyhow!("Failed to parse JPEG: {e}"))?;

    let orig_exif_pos = find_segment_pos(&jpeg, MARKER_APP1, EXIF_PREFIX);
    let tiff_data = match jpeg.exif() {
        Some(existing) if !existing.is_empty() => {
            log::debug!("Merging into existing EXIF ({} bytes)", existing.len());
            ifd::inject_into_ifd0(&existing, &exif_entries(tagging))
                .context("Failed to update existing EXIF")?
        }
        _ => fresh_exif(tagging)?,
    };
    if tiff_data.len() + EXIF_PREFIX.len() > MAX_SEGMENT_CONTENTS {
        anyhow::bail!("EXIF data exceeds the JPEG APP1 segment limit");
    }
    jpeg.set_exif(Some(Bytes::from(tiff_data)));

    // set_exif() may insert after other APP1 segments; EXIF has to come
    // first for many parsers, so move it back to where it was
    if let Some(new_pos) = find_segment_pos(&jpeg, MARKER_APP1, EXIF_PREFIX) {
        let target = orig_exif_pos.unwrap_or_else(|| {
            let segments = jpeg.segments();
            usize::from(segments.first().is_some_and(|s| s.marker() == MARKER_APP0))
        });
        if target < new_pos {
            let segments = jpeg.segments_mut();
            let seg = segments.remove(new_pos);
            segments.insert(target, seg);
        }
    }

    update_iptc(&mut jpeg, tagging)?;

    Ok(jpeg.encoder().bytes().to_vec())
}

fn exif_entries(tagging: &Tagging<'_>) -> Vec<IfdEntry> {
    vec![
        IfdEntry::ascii(TAG_IMAGE_DESCRIPTION, &tagging.metadata.description),
        IfdEntry::xp(TAG_XP_TITLE, &tagging.metadata.title),
        IfdEntry::xp(TAG_XP_KEYWORDS, &tagging.joined_keywords),
    ]
}

/// Create an XP* tag (UTF-16LE encoded, IFD0 group).
fn make_xp_tag(tag_id: u16, value: &str) -> Result<ExifTag> {
    ExifTag::from_u16_with_data(
        tag_id,
        &ExifTagFormat::INT8U,
        &ifd::encode_utf16le(value),
        &Endian::Little,
        &ExifTagGroup::IFD0,
    )
    .map_err(|e| anyhow::anyhow!("Failed to build EXIF tag 0x{tag_id:04X}: {e}"))
}

/// Build a new EXIF block for a JPEG that has none.
fn fresh_exif(tagging: &Tagging<'_>) -> Result<Vec<u8>> {
    let mut metadata = Metadata::new();
    metadata.set_tag(ExifTag::ImageDescription(tagging.metadata.description.clone()));
    metadata.set_tag(make_xp_tag(TAG_XP_TITLE, &tagging.metadata.title)?);
    metadata.set_tag(make_xp_tag(TAG_XP_KEYWORDS, &tagging.joined_keywords)?);

    let exif_bytes = metadata.as_u8_vec(FileExtension::JPEG);
    if exif_bytes.len() <= JPEG_EXIF_OVERHEAD {
        anyhow::bail!("little_exif produced an empty EXIF block");
    }
    Ok(exif_bytes[JPEG_EXIF_OVERHEAD..].to_vec())
}

/// Find the position of an APPn segment whose contents start with `prefix`.
pub(crate) fn find_segment_pos(jpeg: &Jpeg, marker: u8, prefix: &[u8]) -> Option<usize> {
    jpeg.segments()
        .iter()
        .position(|s| s.marker() == marker && s.contents().starts_with(prefix))
}

/// Replace or create the APP13 Photoshop segment carrying IPTC-IIM.
fn update_iptc(jpeg: &mut Jpeg, tagging: &Tagging<'_>) -> Result<()> {
    let iptc_pos = find_segment_pos(jpeg, MARKER_APP13, PHOTOSHOP_HEADER);
    let existing = iptc_pos.map(|pos| jpeg.segments()[pos].contents().to_vec());

    let contents = iptc::build_app13(
        existing.as_deref(),
        &IptcFields {
            object_name: &tagging.metadata.title,
            caption: &tagging.metadata.description,
            keywords: &tagging.metadata.keywords,
        },
    )?;
    if contents.len() > MAX_SEGMENT_CONTENTS {
        anyhow::bail!("IPTC data exceeds the JPEG APP13 segment limit");
    }
    let new_segment = JpegSegment::new_with_contents(MARKER_APP13, Bytes::from(contents));

    let segments = jpeg.segments_mut();
    match iptc_pos {
        Some(pos) => segments[pos] = new_segment,
        None => {
            // After the leading APPn run (JFIF, EXIF, XMP...)
            let insert_at = segments
                .iter()
                .take_while(|s| (MARKER_APP0..=0xEF).contains(&s.marker()))
                .count();
            segments.insert(insert_at, new_segment);
        }
    }
    Ok(())
}
