use anyhow::Result;
use img_parts::Bytes;
use img_parts::png::{Png, PngChunk};

use super::Tagging;

pub(crate) const CHUNK_TEXT: [u8; 4] = *b"tEXt";
pub(crate) const CHUNK_ITXT: [u8; 4] = *b"iTXt";
pub(crate) const CHUNK_ZTXT: [u8; 4] = *b"zTXt";
const CHUNK_IEND: [u8; 4] = *b"IEND";

pub(crate) const KEY_TITLE: &str = "Title";
pub(crate) const KEY_DESCRIPTION: &str = "Description";
pub(crate) const KEY_KEYWORDS: &str = "Keywords";

/// Tag a PNG with `Title`, `Description`, and `Keywords` text chunks.
///
/// Text that fits Latin-1 goes into `tEXt`; anything else into an
/// uncompressed UTF-8 `iTXt`. Older chunks with the same keywords are dropped.
pub(crate) fn embed(source: &[u8], tagging: &Tagging<'_>) -> Result<Vec<u8>> {
    let mut png = Png::from_bytes(Bytes::copy_from_slice(source))
        .map_err(|e| anyhow::anyhow!("Failed to parse PNG: {e}"))?;

    let owned = [KEY_TITLE, KEY_DESCRIPTION, KEY_KEYWORDS];
    png.chunks_mut().retain(|c| {
        !text_chunk_keyword(c).is_some_and(|k| owned.contains(&k.as_str()))
    });

    let new_chunks = [
        text_chunk(KEY_TITLE, &tagging.metadata.title),
        text_chunk(KEY_DESCRIPTION, &tagging.metadata.description),
        text_chunk(KEY_KEYWORDS, &tagging.joined_keywords),
    ];

    let chunks = png.chunks_mut();
    let iend = chunks
        .iter()
        .position(|c| c.kind() == CHUNK_IEND)
        .unwrap_or(chunks.len());
    for (i, chunk) in new_chunks.into_iter().enumerate() {
        chunks.insert(iend + i, chunk);
    }

    Ok(png.encoder().bytes().to_vec())
}

fn is_latin1(s: &str) -> bool {
    s.chars().all(|c| c != '\0' && (c as u32) <= 0xFF)
}

/// Build a text chunk for `keyword` = `value`.
fn text_chunk(keyword: &str, value: &str) -> PngChunk {
    let mut data = keyword.as_bytes().to_vec();
    data.push(0);
    if is_latin1(value) {
        data.extend(value.chars().map(|c| c as u8));
        PngChunk::new(CHUNK_TEXT, Bytes::from(data))
    } else {
        // compression flag, compression method, empty language, empty translated keyword
        data.extend_from_slice(&[0, 0, 0, 0]);
        data.extend_from_slice(value.as_bytes());
        PngChunk::new(CHUNK_ITXT, Bytes::from(data))
    }
}

fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

/// Split a tEXt/iTXt/zTXt chunk into its keyword and the bytes after the
/// keyword separator.
fn split_text_chunk(chunk: &PngChunk) -> Option<(String, &[u8])> {
    if ![CHUNK_TEXT, CHUNK_ITXT, CHUNK_ZTXT].contains(&chunk.kind()) {
        return None;
    }
    let contents = chunk.contents();
    let end = contents.iter().position(|&b| b == 0)?;
    Some((latin1_to_string(&contents[..end]), &contents[end + 1..]))
}

fn text_chunk_keyword(chunk: &PngChunk) -> Option<String> {
    split_text_chunk(chunk).map(|(keyword, _)| keyword)
}

/// Decode an uncompressed text chunk into `(keyword, value)`.
/// Compressed chunks are skipped.
pub(crate) fn decode_text_chunk(chunk: &PngChunk) -> Option<(String, String)> {
    let (keyword, rest) = split_text_chunk(chunk)?;
    match chunk.kind() {
        CHUNK_TEXT => Some((keyword, latin1_to_string(rest))),
        CHUNK_ITXT => {
            // compression flag must be 0
            if rest.first() != Some(&0) {
                return None;
            }
            let after_flags = rest.get(2..)?;
            let lang_end = after_flags.iter().position(|&b| b == 0)?;
            let after_lang = &after_flags[lang_end + 1..];
            let translated_end = after_lang.iter().position(|&b| b == 0)?;
            let text = &after_lang[translated_end + 1..];
            Some((keyword, String::from_utf8_lossy(text).into_owned()))
        }
        _ => None,
    }
}

/// All readable text chunks of a PNG, in file order.
pub(crate) fn read_text_chunks(bytes: &[u8]) -> Result<Vec<(String, String)>> {
    let png = Png::from_bytes(Bytes::copy_from_slice(bytes))
        .map_err(|e| anyhow::anyhow!("Failed to parse PNG: {e}"))?;
    Ok(png.chunks().iter().filter_map(decode_text_chunk).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embed::fixtures::{sunset, write_image};
    use crate::embed::MetadataEmbedder;
    use crate::metadata::ImageMetadata;
    use tempfile::TempDir;

    #[test]
    fn sunset_chunks_exact() {
        let dir = TempDir::new().unwrap();
        let source = write_image(dir.path(), "beach.png");
        let result = MetadataEmbedder::default().embed(&source, &sunset()).unwrap();

        let chunks = read_text_chunks(&std::fs::read(&result.output_path).unwrap()).unwrap();
        assert_eq!(
            chunks,
            vec![
                ("Title".to_string(), "Sunset".to_string()),
                ("Description".to_string(), "A beach at dusk".to_string()),
                ("Keywords".to_string(), "beach, sunset".to_string()),
            ]
        );
    }

    #[test]
    fn latin1_uses_text_and_unicode_uses_itxt() {
        let latin = text_chunk("Title", "Café");
        assert_eq!(latin.kind(), CHUNK_TEXT);
        assert_eq!(&latin.contents()[..], b"Title\0Caf\xE9");

        let unicode = text_chunk("Title", "夕日");
        assert_eq!(unicode.kind(), CHUNK_ITXT);
        assert_eq!(
            decode_text_chunk(&unicode),
            Some(("Title".to_string(), "夕日".to_string()))
        );
    }

    #[test]
    fn re_embedding_leaves_single_set_of_chunks() {
        let dir = TempDir::new().unwrap();
        let source = write_image(dir.path(), "a.png");
        let embedder = MetadataEmbedder::default();
        let first = embedder.embed(&source, &sunset()).unwrap();
        let second = embedder
            .embed(&first.output_path, &ImageMetadata::new("Dawn", "Bay", ["bay"]))
            .unwrap();

        let chunks = read_text_chunks(&std::fs::read(&second.output_path).unwrap()).unwrap();
        assert_eq!(chunks.len(), 3);
        assert!(chunks.contains(&("Title".to_string(), "Dawn".to_string())));
        assert!(chunks.contains(&("Keywords".to_string(), "bay".to_string())));
    }

    #[test]
    fn unrelated_text_chunks_kept() {
        let dir = TempDir::new().unwrap();
        let source = write_image(dir.path(), "a.png");

        let mut png = Png::from_bytes(Bytes::from(std::fs::read(&source).unwrap())).unwrap();
        let chunks = png.chunks_mut();
        let at = chunks.len() - 1;
        chunks.insert(at, text_chunk("Author", "Jane"));
        std::fs::write(&source, png.encoder().bytes()).unwrap();

        let result = MetadataEmbedder::default().embed(&source, &sunset()).unwrap();
        let chunks = read_text_chunks(&std::fs::read(&result.output_path).unwrap()).unwrap();
        assert!(chunks.contains(&("Author".to_string(), "Jane".to_string())));
        assert_eq!(chunks.len(), 4);
    }

    #[test]
    fn iend_stays_last() {
        let dir = TempDir::new().unwrap();
        let source = write_image(dir.path(), "a.png");
        let result = MetadataEmbedder::default().embed(&source, &sunset()).unwrap();

        let png = Png::from_bytes(Bytes::from(std::fs::read(&result.output_path).unwrap())).unwrap();
        assert_eq!(png.chunks().last().unwrap().kind(), CHUNK_IEND);
    }
}
