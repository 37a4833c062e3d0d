//! Minimal TIFF IFD0 editing and reading.
//!
//! Shared by the JPEG EXIF path (the EXIF payload is a TIFF structure) and by
//! plain TIFF files. Only IFD0 is touched: new entries are appended after the
//! original data together with a rebuilt IFD0, and the header is pointed at
//! the new directory. Everything else in the file is left where it was.

use anyhow::{Context, Result};

pub const TAG_DOCUMENT_NAME: u16 = 0x010D;
pub const TAG_IMAGE_DESCRIPTION: u16 = 0x010E;
pub const TAG_XP_TITLE: u16 = 0x9C9B;
pub const TAG_XP_KEYWORDS: u16 = 0x9C9E;

const FORMAT_BYTE: u16 = 1;
const FORMAT_ASCII: u16 = 2;
const TIFF_MAGIC: u16 = 42;
const BIGTIFF_MAGIC: u16 = 43;
const ENTRY_LEN: usize = 12;

/// A tag to write into IFD0.
#[derive(Debug, Clone, PartialEq)]
pub struct IfdEntry {
    pub tag: u16,
    format: u16,
    data: Vec<u8>,
}

impl IfdEntry {
    /// NUL-terminated string tag (TIFF type ASCII).
    pub fn ascii(tag: u16, value: &str) -> Self {
        let mut data = value.as_bytes().to_vec();
        data.push(0);
        Self { tag, format: FORMAT_ASCII, data }
    }

    /// Windows XP* tag: UTF-16LE text stored as BYTE.
    pub fn xp(tag: u16, value: &str) -> Self {
        Self { tag, format: FORMAT_BYTE, data: encode_utf16le(value) }
    }

    fn count(&self) -> u32 {
        // ASCII and BYTE are both one byte per unit
        self.data.len() as u32
    }
}

/// Encode a string as UTF-16LE bytes with a NUL terminator (used for XP* tags).
pub fn encode_utf16le(s: &str) -> Vec<u8> {
    let mut bytes: Vec<u8> = s.encode_utf16().flat_map(|c| c.to_le_bytes()).collect();
    bytes.push(0);
    bytes.push(0);
    bytes
}

fn decode_utf16le(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|c| u16::from_le_bytes([c[0], c[1]]))
        .take_while(|&u| u != 0)
        .collect();
    String::from_utf16_lossy(&units)
}

#[derive(Debug, Clone, Copy)]
struct ByteOrder {
    big_endian: bool,
}

impl ByteOrder {
    fn detect(data: &[u8]) -> Result<Self> {
        if data.len() < 8 {
            anyhow::bail!("TIFF data too short ({} bytes)", data.len());
        }
        let order = match &data[0..2] {
            b"MM" => Self { big_endian: true },
            b"II" => Self { big_endian: false },
            _ => anyhow::bail!("Invalid TIFF byte order"),
        };
        match order.u16_at(data, 2)? {
            TIFF_MAGIC => Ok(order),
            BIGTIFF_MAGIC => anyhow::bail!("BigTIFF is not supported"),
            other => anyhow::bail!("Invalid TIFF magic number {other}"),
        }
    }

    fn u16_at(self, data: &[u8], offset: usize) -> Result<u16> {
        let b: [u8; 2] = data
            .get(offset..offset + 2)
            .and_then(|s| s.try_into().ok())
            .context("TIFF read out of bounds")?;
        Ok(if self.big_endian { u16::from_be_bytes(b) } else { u16::from_le_bytes(b) })
    }

    fn u32_at(self, data: &[u8], offset: usize) -> Result<u32> {
        let b: [u8; 4] = data
            .get(offset..offset + 4)
            .and_then(|s| s.try_into().ok())
            .context("TIFF read out of bounds")?;
        Ok(if self.big_endian { u32::from_be_bytes(b) } else { u32::from_le_bytes(b) })
    }

    fn u16_bytes(self, v: u16) -> [u8; 2] {
        if self.big_endian { v.to_be_bytes() } else { v.to_le_bytes() }
    }

    fn u32_bytes(self, v: u32) -> [u8; 4] {
        if self.big_endian { v.to_be_bytes() } else { v.to_le_bytes() }
    }
}

/// Location of IFD0 inside a TIFF structure.
struct Ifd0 {
    order: ByteOrder,
    entries_start: usize,
    count: usize,
    next: u32,
}

fn locate_ifd0(data: &[u8]) -> Result<Ifd0> {
    let order = ByteOrder::detect(data)?;
    let offset = order.u32_at(data, 4)? as usize;
    let count = order.u16_at(data, offset).context("IFD0 offset out of bounds")? as usize;
    let entries_start = offset + 2;
    let entries_end = entries_start + count * ENTRY_LEN;
    let next = order
        .u32_at(data, entries_end)
        .context("IFD0 entries extend beyond TIFF data")?;
    Ok(Ifd0 { order, entries_start, count, next })
}

/// Write `entries` into IFD0 of `original`, returning the new TIFF bytes.
///
/// Existing entries are kept; an entry with the same tag is replaced. The
/// rebuilt directory is sorted by tag as TIFF requires.
pub fn inject_into_ifd0(original: &[u8], entries: &[IfdEntry]) -> Result<Vec<u8>> {
    let ifd0 = locate_ifd0(original)?;
    let order = ifd0.order;

    let mut raw: Vec<(u16, [u8; ENTRY_LEN])> = (0..ifd0.count)
        .map(|i| -> Result<(u16, [u8; ENTRY_LEN])> {
            let at = ifd0.entries_start + i * ENTRY_LEN;
            let mut bytes = [0u8; ENTRY_LEN];
            bytes.copy_from_slice(&original[at..at + ENTRY_LEN]);
            Ok((order.u16_at(original, at)?, bytes))
        })
        .collect::<Result<_>>()?;
    raw.retain(|(tag, _)| !entries.iter().any(|e| e.tag == *tag));

    let mut result = original.to_vec();
    pad_to_word(&mut result);

    // Out-of-line values first, then the directory that points at them
    for entry in entries {
        let mut ib = [0u8; ENTRY_LEN];
        ib[0..2].copy_from_slice(&order.u16_bytes(entry.tag));
        ib[2..4].copy_from_slice(&order.u16_bytes(entry.format));
        ib[4..8].copy_from_slice(&order.u32_bytes(entry.count()));
        if entry.data.len() <= 4 {
            ib[8..8 + entry.data.len()].copy_from_slice(&entry.data);
        } else {
            let offset = offset_u32(result.len())?;
            ib[8..12].copy_from_slice(&order.u32_bytes(offset));
            result.extend_from_slice(&entry.data);
            pad_to_word(&mut result);
        }
        raw.push((entry.tag, ib));
    }
    raw.sort_by_key(|(tag, _)| *tag);

    let count = u16::try_from(raw.len()).context("Too many IFD0 entries")?;
    let new_ifd0 = offset_u32(result.len())?;
    result.extend_from_slice(&order.u16_bytes(count));
    for (_, ib) in &raw {
        result.extend_from_slice(ib);
    }
    result.extend_from_slice(&order.u32_bytes(ifd0.next));

    result[4..8].copy_from_slice(&order.u32_bytes(new_ifd0));
    Ok(result)
}

fn pad_to_word(buf: &mut Vec<u8>) {
    if buf.len() % 2 != 0 {
        buf.push(0);
    }
}

fn offset_u32(len: usize) -> Result<u32> {
    u32::try_from(len).context("TIFF data exceeds 4 GiB")
}

/// Read the raw value bytes of an IFD0 tag, if present.
pub fn read_ifd0_tag(data: &[u8], tag: u16) -> Result<Option<Vec<u8>>> {
    let ifd0 = locate_ifd0(data)?;
    let order = ifd0.order;
    for i in 0..ifd0.count {
        let at = ifd0.entries_start + i * ENTRY_LEN;
        if order.u16_at(data, at)? != tag {
            continue;
        }
        let format = order.u16_at(data, at + 2)?;
        let unit = match format {
            1 | 2 | 6 | 7 => 1,
            3 | 8 => 2,
            4 | 9 | 11 => 4,
            _ => 8,
        };
        let len = order.u32_at(data, at + 4)? as usize * unit;
        let value = if len <= 4 {
            data[at + 8..at + 8 + len].to_vec()
        } else {
            let offset = order.u32_at(data, at + 8)? as usize;
            data.get(offset..offset + len)
                .context("IFD0 value out of bounds")?
                .to_vec()
        };
        return Ok(Some(value));
    }
    Ok(None)
}

/// Read an XP* tag as text.
pub fn read_xp_tag(data: &[u8], tag: u16) -> Result<Option<String>> {
    Ok(read_ifd0_tag(data, tag)?.map(|v| decode_utf16le(&v)))
}

/// Read an ASCII tag as text (lossy UTF-8, trailing NULs stripped).
pub fn read_ascii_tag(data: &[u8], tag: u16) -> Result<Option<String>> {
    Ok(read_ifd0_tag(data, tag)?
        .map(|v| String::from_utf8_lossy(&v).trim_end_matches('\0').to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Smallest valid TIFF header with an empty IFD0.
    fn empty_tiff(big_endian: bool) -> Vec<u8> {
        if big_endian {
            vec![b'M', b'M', 0, 42, 0, 0, 0, 8, 0, 0, 0, 0, 0, 0]
        } else {
            vec![b'I', b'I', 42, 0, 8, 0, 0, 0, 0, 0, 0, 0, 0, 0]
        }
    }

    #[test]
    fn utf16le_roundtrip() {
        let encoded = encode_utf16le("beach;sunset");
        assert_eq!(encoded.len(), 12 * 2 + 2);
        assert_eq!(decode_utf16le(&encoded), "beach;sunset");
        assert_eq!(decode_utf16le(&encode_utf16le("Café 日本")), "Café 日本");
    }

    #[test]
    fn inject_into_empty_little_endian() {
        let out = inject_into_ifd0(
            &empty_tiff(false),
            &[
                IfdEntry::ascii(TAG_IMAGE_DESCRIPTION, "A beach at dusk"),
                IfdEntry::xp(TAG_XP_KEYWORDS, "beach;sunset"),
                IfdEntry::ascii(TAG_DOCUMENT_NAME, "Sun"),
            ],
        )
        .unwrap();

        assert_eq!(
            read_ascii_tag(&out, TAG_IMAGE_DESCRIPTION).unwrap().as_deref(),
            Some("A beach at dusk")
        );
        // "Sun\0" fits inline in the entry
        assert_eq!(read_ascii_tag(&out, TAG_DOCUMENT_NAME).unwrap().as_deref(), Some("Sun"));
        assert_eq!(
            read_xp_tag(&out, TAG_XP_KEYWORDS).unwrap().as_deref(),
            Some("beach;sunset")
        );
    }

    #[test]
    fn inject_big_endian() {
        let out = inject_into_ifd0(
            &empty_tiff(true),
            &[IfdEntry::ascii(TAG_IMAGE_DESCRIPTION, "Big endian description")],
        )
        .unwrap();
        assert_eq!(&out[0..2], b"MM");
        assert_eq!(
            read_ascii_tag(&out, TAG_IMAGE_DESCRIPTION).unwrap().as_deref(),
            Some("Big endian description")
        );
    }

    #[test]
    fn reinject_replaces_existing_tag() {
        let first = inject_into_ifd0(
            &empty_tiff(false),
            &[IfdEntry::ascii(TAG_IMAGE_DESCRIPTION, "old value")],
        )
        .unwrap();
        let second = inject_into_ifd0(
            &first,
            &[
                IfdEntry::ascii(TAG_IMAGE_DESCRIPTION, "new value"),
                IfdEntry::xp(TAG_XP_TITLE, "Title"),
            ],
        )
        .unwrap();

        let ifd0 = locate_ifd0(&second).unwrap();
        assert_eq!(ifd0.count, 2);
        assert_eq!(
            read_ascii_tag(&second, TAG_IMAGE_DESCRIPTION).unwrap().as_deref(),
            Some("new value")
        );
        assert_eq!(read_xp_tag(&second, TAG_XP_TITLE).unwrap().as_deref(), Some("Title"));
    }

    #[test]
    fn entries_sorted_by_tag() {
        let out = inject_into_ifd0(
            &empty_tiff(false),
            &[
                IfdEntry::xp(TAG_XP_KEYWORDS, "k"),
                IfdEntry::ascii(TAG_DOCUMENT_NAME, "doc name"),
                IfdEntry::ascii(TAG_IMAGE_DESCRIPTION, "desc"),
            ],
        )
        .unwrap();
        let ifd0 = locate_ifd0(&out).unwrap();
        let tags: Vec<u16> = (0..ifd0.count)
            .map(|i| ifd0.order.u16_at(&out, ifd0.entries_start + i * ENTRY_LEN).unwrap())
            .collect();
        assert_eq!(tags, vec![TAG_DOCUMENT_NAME, TAG_IMAGE_DESCRIPTION, TAG_XP_KEYWORDS]);
        // IFD offsets stay word aligned
        assert_eq!(u32::from_le_bytes(out[4..8].try_into().unwrap()) % 2, 0);
    }

    #[test]
    fn missing_tag_reads_none() {
        assert_eq!(read_ifd0_tag(&empty_tiff(false), TAG_XP_TITLE).unwrap(), None);
    }

    #[test]
    fn rejects_garbage_and_bigtiff() {
        assert!(inject_into_ifd0(b"hello world!", &[]).is_err());
        assert!(inject_into_ifd0(b"II", &[]).is_err());
        let bigtiff = [b'I', b'I', 43, 0, 8, 0, 0, 0, 0, 0, 0, 0];
        let err = inject_into_ifd0(&bigtiff, &[]).unwrap_err();
        assert!(err.to_string().contains("BigTIFF"));
    }

    #[test]
    fn rejects_out_of_bounds_ifd() {
        let bad = [b'I', b'I', 42, 0, 0xFF, 0, 0, 0];
        assert!(inject_into_ifd0(&bad, &[]).is_err());
    }
}
