use serde::{Deserialize, Serialize};
use std::path::Path;

/// The image containers the embedder can write.
///
/// Each variant maps the abstract SEO fields onto a different set of native
/// metadata slots:
/// - **Jpeg**: EXIF (XPTitle, ImageDescription, XPKeywords) plus IPTC-IIM
/// - **Png**: `Title`, `Description`, `Keywords` text chunks
/// - **WebP**: XMP packet in a RIFF `XMP ` chunk
/// - **Tiff**: DocumentName, ImageDescription, XPKeywords tags in IFD0
///
/// # Example
///
/// ```rust
/// use seo_embed::format::ImageFormat;
/// use std::path::Path;
///
/// assert_eq!(ImageFormat::from_path(Path::new("photo.JPG")), Some(ImageFormat::Jpeg));
/// assert_eq!(ImageFormat::from_path(Path::new("scan.bmp")), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageFormat {
    Jpeg,
    Png,
    WebP,
    Tiff,
}

impl ImageFormat {
    /// Every supported format, in dispatch order.
    pub const ALL: [ImageFormat; 4] = [Self::Jpeg, Self::Png, Self::WebP, Self::Tiff];

    /// Lowercase file extensions (without the dot) handled as this format.
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Self::Jpeg => &["jpg", "jpeg"],
            Self::Png => &["png"],
            Self::WebP => &["webp"],
            Self::Tiff => &["tiff"],
        }
    }

    /// Match a file extension (without the dot), ignoring case.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.extensions().contains(&ext.as_str()))
    }

    /// Every supported extension, dotted, e.g. for help and error messages.
    pub fn supported_extensions() -> Vec<String> {
        Self::ALL
            .iter()
            .flat_map(|format| format.extensions())
            .map(|ext| format!(".{ext}"))
            .collect()
    }

    /// Determine the format from a file path extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        Self::from_extension(path.extension()?.to_str()?)
    }

    /// Delimiter used when keywords are stored as a single string.
    ///
    /// EXIF/TIFF readers expect semicolon-delimited XPKeywords; PNG text
    /// chunks and XMP readers expect comma-space.
    pub fn keyword_separator(self) -> &'static str {
        match self {
            Self::Jpeg | Self::Tiff => ";",
            Self::Png | Self::WebP => ", ",
        }
    }

    /// Join keywords with this format's separator.
    pub fn join_keywords(self, keywords: &[String]) -> String {
        keywords.join(self.keyword_separator())
    }

    /// The matching `image` crate format, used to probe headers.
    pub fn image_format(self) -> image::ImageFormat {
        match self {
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Png => image::ImageFormat::Png,
            Self::WebP => image::ImageFormat::WebP,
            Self::Tiff => image::ImageFormat::Tiff,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::WebP => "image/webp",
            Self::Tiff => "image/tiff",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::WebP => "WebP",
            Self::Tiff => "TIFF",
        }
    }
}

impl std::fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
