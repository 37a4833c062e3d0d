//! Format-aware metadata embedding.
//!
//! [`MetadataEmbedder::embed`] validates the request, picks the handler for the
//! container type, and writes a new file next to the source:
//!
//! | Format | Title | Description | Keywords |
//! |--------|-------|-------------|----------|
//! | JPEG | EXIF XPTitle + IPTC Object Name | EXIF ImageDescription + IPTC Caption | IPTC Keywords + EXIF XPKeywords (`;`) |
//! | PNG | `Title` text chunk | `Description` text chunk | `Keywords` text chunk (`, `) |
//! | WebP | XMP `dc:title` | XMP `dc:description` | XMP `pdf:Keywords` (`, `) |
//! | TIFF | DocumentName | ImageDescription | XPKeywords (`;`) |
//!
//! Handlers work on the container structure only; compressed pixel data is
//! copied through untouched.

pub(crate) mod ifd;
pub(crate) mod iptc;
mod jpeg;
pub(crate) mod png;
mod tiff;
pub(crate) mod webp;
pub(crate) mod xmp;

use anyhow::{Context, Result};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{Config, OutputConfig};
use crate::error::EmbedError;
use crate::format::ImageFormat;
use crate::metadata::{EmbedRequest, EmbedResult, EmbedStatus, ImageMetadata};

/// Everything a format handler needs to tag one image.
pub(crate) struct Tagging<'a> {
    pub metadata: &'a ImageMetadata,
    /// Keywords joined with the target format's separator.
    pub joined_keywords: String,
    /// Pixel dimensions read from the image header.
    pub dimensions: (u32, u32),
}

type Handler = fn(&[u8], &Tagging<'_>) -> Result<Vec<u8>>;

fn handler_for(format: ImageFormat) -> Handler {
    match format {
        ImageFormat::Jpeg => jpeg::embed,
        ImageFormat::Png => png::embed,
        ImageFormat::WebP => webp::embed,
        ImageFormat::Tiff => tiff::embed,
    }
}

/// Compute the output path: `<dir>/<stem><suffix><.ext>`.
///
/// ```rust
/// use seo_embed::embed::output_path_for;
/// use std::path::Path;
///
/// let out = output_path_for(Path::new("/tmp/up/photo.JPG"), "_with_metadata");
/// assert_eq!(out, Path::new("/tmp/up/photo_with_metadata.JPG"));
/// ```
pub fn output_path_for(source: &Path, suffix: &str) -> PathBuf {
    let mut name = source.file_stem().unwrap_or_default().to_os_string();
    name.push(suffix);
    if let Some(ext) = source.extension() {
        name.push(".");
        name.push(ext);
    }
    source.with_file_name(name)
}

/// Embeds SEO metadata into image files.
///
/// Holds only its configuration, so it is cheap to clone and safe to share
/// across threads. Each call reads the source, never modifies it, and writes a
/// new output file.
///
/// # Example
///
/// ```rust,no_run
/// use seo_embed::embed::MetadataEmbedder;
/// use seo_embed::metadata::ImageMetadata;
///
/// let embedder = MetadataEmbedder::default();
/// let metadata = ImageMetadata::new("Sunset", "A beach at dusk", ["beach", "sunset"]);
/// let result = embedder.embed("uploads/photo.png", &metadata)?;
/// println!("{}", result.output_path.display()); // uploads/photo_with_metadata.png
/// # Ok::<(), seo_embed::error::EmbedError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct MetadataEmbedder {
    config: Arc<Config>,
}

impl MetadataEmbedder {
    /// Build an embedder, rejecting configs whose output would replace the source.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Where the output for `source` will be written.
    pub fn output_path(&self, source: &Path) -> PathBuf {
        output_path_for(source, &self.config.output.suffix)
    }

    /// Embed `metadata` into a copy of the image at `source`.
    pub fn embed(
        &self,
        source: impl AsRef<Path>,
        metadata: &ImageMetadata,
    ) -> crate::error::Result<EmbedResult> {
        let source = source.as_ref();
        if source.as_os_str().is_empty() {
            return Err(EmbedError::Validation("source path is missing".into()));
        }

        // Dispatch before touching the filesystem
        let extension = source
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        let format =
            ImageFormat::from_extension(&extension).ok_or_else(|| EmbedError::UnsupportedFormat {
                path: source.to_path_buf(),
                extension: extension.clone(),
            })?;

        let source_bytes = read_source(source)?;
        let output_path = self.output_path(source);
        if output_path == source {
            return Err(EmbedError::embedding(
                source,
                anyhow::anyhow!("output path equals the source path"),
            ));
        }

        self.embed_bytes(format, &source_bytes, metadata, source, &output_path)
            .map_err(|e| EmbedError::embedding(source, e))?;

        log::info!("Embedded {format} metadata: {}", output_path.display());
        Ok(EmbedResult {
            status: EmbedStatus::Success,
            message: format!("Metadata embedded into {format} image"),
            output_path,
        })
    }

    /// Embed from a request whose fields may be missing.
    pub fn embed_request(&self, request: &EmbedRequest) -> crate::error::Result<EmbedResult> {
        let (source, metadata) = request.validate()?;
        self.embed(source, metadata)
    }

    fn embed_bytes(
        &self,
        format: ImageFormat,
        source_bytes: &[u8],
        metadata: &ImageMetadata,
        source: &Path,
        output_path: &Path,
    ) -> Result<()> {
        let metadata = metadata.normalized(&self.config.keywords);
        let dimensions = probe_dimensions(format, source_bytes)?;
        let tagging = Tagging {
            joined_keywords: format.join_keywords(&metadata.keywords),
            metadata: &metadata,
            dimensions,
        };

        log::debug!("  Format: {format} ({}x{})", dimensions.0, dimensions.1);
        log::debug!("  Title: {}", metadata.title);
        log::debug!("  Description: {}", metadata.description);
        log::debug!("  Keywords: {}", tagging.joined_keywords);

        let tagged = handler_for(format)(source_bytes, &tagging)
            .with_context(|| format!("Failed to tag {format} container"))?;

        let permissions = std::fs::metadata(source).ok().map(|m| m.permissions());
        write_output(output_path, &tagged, &self.config.output, permissions)
    }
}

fn read_source(source: &Path) -> crate::error::Result<Vec<u8>> {
    match std::fs::metadata(source) {
        Ok(meta) if meta.is_file() => {}
        _ => return Err(EmbedError::NotFound(source.to_path_buf())),
    }
    std::fs::read(source).map_err(|e| {
        log::debug!("Cannot read {}: {e}", source.display());
        EmbedError::NotFound(source.to_path_buf())
    })
}

/// Read width and height from the image header; also rejects files whose
/// content doesn't match their extension.
fn probe_dimensions(format: ImageFormat, bytes: &[u8]) -> Result<(u32, u32)> {
    image::ImageReader::with_format(Cursor::new(bytes), format.image_format())
        .into_dimensions()
        .with_context(|| format!("Failed to decode {format} image header"))
}

fn write_output(
    path: &Path,
    bytes: &[u8],
    output: &OutputConfig,
    permissions: Option<std::fs::Permissions>,
) -> Result<()> {
    if !output.overwrite && path.exists() {
        anyhow::bail!("Output file already exists: {}", path.display());
    }

    if !output.atomic_write {
        std::fs::write(path, bytes).context("Failed to write output file")?;
        return Ok(());
    }

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .context("Failed to create temporary output file")?;
    tmp.write_all(bytes).context("Failed to write output file")?;
    tmp.as_file().sync_all().context("Failed to flush output file")?;
    if let Some(permissions) = permissions {
        std::fs::set_permissions(tmp.path(), permissions)
            .context("Failed to set output file permissions")?;
    }
    tmp.persist(path)
        .map_err(|e| e.error)
        .context("Failed to move output file into place")?;
    Ok(())
}
