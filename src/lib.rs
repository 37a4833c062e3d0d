//! # seo-embed
//!
//! Embed SEO metadata (title, description, keywords) into image files without
//! re-encoding them. Typically the metadata comes from an AI vision service;
//! this crate writes it into the native metadata slots of each container so
//! that search engines, DAMs and file browsers pick it up.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use seo_embed::embed::MetadataEmbedder;
//! use seo_embed::metadata::ImageMetadata;
//!
//! fn main() -> anyhow::Result<()> {
//!     let embedder = MetadataEmbedder::default();
//!     let metadata = ImageMetadata::new("Sunset", "A beach at dusk", ["beach", "sunset"]);
//!
//!     // Writes uploads/photo_with_metadata.jpg; the source is left untouched
//!     let result = embedder.embed("uploads/photo.jpg", &metadata)?;
//!     println!("{}", result.output_path.display());
//!     Ok(())
//! }
//! ```
//!
//! ## Batches
//!
//! ```rust,no_run
//! use seo_embed::batch::{collect_images, embed_batch};
//! use seo_embed::config::Config;
//! use seo_embed::embed::MetadataEmbedder;
//! use seo_embed::metadata::{EmbedRequest, ImageMetadata};
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(Some("config.json".as_ref()))?;
//!     let images = collect_images(&[PathBuf::from("./uploads")], &config.output.suffix);
//!     let embedder = MetadataEmbedder::new(config)?;
//!
//!     let metadata = ImageMetadata::new("Harbour", "Boats at noon", ["boats"]);
//!     let jobs = images
//!         .into_iter()
//!         .map(|p| EmbedRequest::new(p, metadata.clone()))
//!         .collect();
//!
//!     for outcome in embed_batch(&embedder, jobs).await {
//!         match outcome.result {
//!             Ok(r) => println!("{} -> {}", outcome.source.display(), r.output_path.display()),
//!             Err(e) => eprintln!("{e}"),
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Supported Formats
//!
//! | Format | Write Strategy |
//! |--------|---------------|
//! | JPEG (`.jpg`, `.jpeg`) | EXIF (XPTitle, ImageDescription, XPKeywords) + IPTC |
//! | PNG (`.png`) | `tEXt` / `iTXt` chunks |
//! | WebP (`.webp`) | XMP in RIFF |
//! | TIFF (`.tiff`) | IFD0 tags |
//!
//! ## Modules
//!
//! - [`embed`]: the [`embed::MetadataEmbedder`] and per-format handlers
//! - [`reader`]: read back what was embedded
//! - [`batch`]: image collection and concurrent batch embedding
//! - [`config`]: configuration types and loading/saving
//! - [`metadata`]: request, metadata and result types
//! - [`format`]: supported formats and extension dispatch
//! - [`error`]: the [`error::EmbedError`] failure classes

pub mod batch;
pub mod config;
pub mod embed;
pub mod error;
pub mod format;
pub mod metadata;
pub mod reader;
