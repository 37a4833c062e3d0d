use anyhow::{Context, Result};
use img_parts::Bytes;
use img_parts::riff::{RiffChunk, RiffContent};
use img_parts::webp::WebP;

use super::Tagging;
use super::xmp::{self, XmpFields};

pub(crate) const CHUNK_XMP: [u8; 4] = *b"XMP ";
const CHUNK_VP8X: [u8; 4] = *b"VP8X";
const CHUNK_VP8L: [u8; 4] = *b"VP8L";
const CHUNK_ALPH: [u8; 4] = *b"ALPH";

const FLAG_ALPHA: u8 = 0x10;
const FLAG_XMP: u8 = 0x04;
const VP8L_SIGNATURE: u8 = 0x2F;
const MAX_CANVAS: u32 = 1 << 24;

/// Tag a WebP with an XMP packet (`dc:title`, `dc:description`,
/// `pdf:Keywords`, `dc:subject`).
///
/// Simple-format files are promoted to the extended format, since only a
/// `VP8X` header can announce the XMP chunk.
pub(crate) fn embed(source: &[u8], tagging: &Tagging<'_>) -> Result<Vec<u8>> {
    let mut webp = WebP::from_bytes(Bytes::copy_from_slice(source))
        .map_err(|e| anyhow::anyhow!("Failed to parse WebP: {e}"))?;

    let existing = webp
        .chunk_by_id(CHUNK_XMP)
        .and_then(chunk_data)
        .map(|b| String::from_utf8_lossy(&b).into_owned());

    let packet = xmp::build_packet(
        existing.as_deref(),
        &XmpFields {
            title: &tagging.metadata.title,
            description: &tagging.metadata.description,
            keywords: &tagging.metadata.keywords,
            joined_keywords: &tagging.joined_keywords,
        },
    );

    set_xmp_flag(&mut webp, tagging.dimensions)?;

    // XMP is the last chunk of an extended WebP
    webp.remove_chunks_by_id(CHUNK_XMP);
    webp.chunks_mut().push(RiffChunk::new(
        CHUNK_XMP,
        RiffContent::Data(Bytes::from(packet.into_bytes())),
    ));

    Ok(webp.encoder().bytes().to_vec())
}

pub(crate) fn chunk_data(chunk: &RiffChunk) -> Option<Bytes> {
    match chunk.content() {
        RiffContent::Data(data) => Some(data.clone()),
        _ => None,
    }
}

/// Set the XMP flag on the VP8X header, creating the header if needed.
fn set_xmp_flag(webp: &mut WebP, (width, height): (u32, u32)) -> Result<()> {
    let header = match webp.chunk_by_id(CHUNK_VP8X) {
        Some(chunk) => {
            let mut data = chunk_data(chunk)
                .filter(|d| d.len() >= 10)
                .context("Malformed VP8X header")?
                .to_vec();
            data[0] |= FLAG_XMP;
            data
        }
        None => {
            if width == 0 || height == 0 || width > MAX_CANVAS || height > MAX_CANVAS {
                anyhow::bail!("WebP canvas {width}x{height} cannot be described by VP8X");
            }
            let mut flags = FLAG_XMP;
            if has_alpha(webp) {
                flags |= FLAG_ALPHA;
            }
            let mut data = vec![flags, 0, 0, 0];
            data.extend_from_slice(&(width - 1).to_le_bytes()[..3]);
            data.extend_from_slice(&(height - 1).to_le_bytes()[..3]);
            data
        }
    };

    let chunk = RiffChunk::new(CHUNK_VP8X, RiffContent::Data(Bytes::from(header)));
    let chunks = webp.chunks_mut();
    match chunks.iter().position(|c| c.id() == CHUNK_VP8X) {
        Some(pos) => chunks[pos] = chunk,
        None => chunks.insert(0, chunk),
    }
    Ok(())
}

/// Whether a simple-format WebP carries alpha (VP8L header bit or ALPH chunk).
fn has_alpha(webp: &WebP) -> bool {
    if webp.chunk_by_id(CHUNK_ALPH).is_some() {
        return true;
    }
    let Some(data) = webp.chunk_by_id(CHUNK_VP8L).and_then(chunk_data) else {
        return false;
    };
    if data.len() < 5 || data[0] != VP8L_SIGNATURE {
        return false;
    }
    // 14 bits width-1, 14 bits height-1, then the alpha_is_used bit
    let bits = u32::from_le_bytes([data[1], data[2], data[3], data[4]]);
    (bits >> 28) & 1 == 1
}

/// The XMP packet of a WebP, if any.
pub(crate) fn read_xmp(bytes: &[u8]) -> Result<Option<String>> {
    let webp = WebP::from_bytes(Bytes::copy_from_slice(bytes))
        .map_err(|e| anyhow::anyhow!("Failed to parse WebP: {e}"))?;
    Ok(webp
        .chunk_by_id(CHUNK_XMP)
        .and_then(chunk_data)
        .map(|b| String::from_utf8_lossy(&b).into_owned()))
}
