use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::embed::MetadataEmbedder;
use crate::error::EmbedError;
use crate::format::ImageFormat;
use crate::metadata::{EmbedRequest, EmbedResult};

/// Outcome of one job in a batch.
#[derive(Debug)]
pub struct BatchOutcome {
    pub source: PathBuf,
    pub result: Result<EmbedResult, EmbedError>,
}

/// Collect supported image files from the given paths.
///
/// Accepts a mix of file paths and directory paths. Directories are walked
/// recursively (following symlinks). Files already carrying `output_suffix`
/// in their stem are outputs of an earlier run and are skipped when found
/// inside a directory.
///
/// # Example
///
/// ```rust,no_run
/// use seo_embed::batch::collect_images;
/// use std::path::PathBuf;
///
/// let images = collect_images(&[PathBuf::from("./uploads/")], "_with_metadata");
/// println!("Found {} images", images.len());
/// ```
pub fn collect_images(paths: &[PathBuf], output_suffix: &str) -> Vec<PathBuf> {
    let mut images = Vec::new();

    for path in paths {
        if path.is_file() {
            if ImageFormat::from_path(path).is_some() {
                images.push(path.clone());
            } else {
                log::warn!("Skipping unsupported file: {}", path.display());
            }
        } else if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let p = entry.path();
                if p.is_file()
                    && ImageFormat::from_path(p).is_some()
                    && !is_generated_output(p, output_suffix)
                {
                    images.push(p.to_path_buf());
                }
            }
        } else {
            log::warn!("Path does not exist: {}", path.display());
        }
    }

    images
}

fn is_generated_output(path: &Path, suffix: &str) -> bool {
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.ends_with(suffix))
}

/// Embed every job concurrently on the blocking thread pool.
///
/// Jobs are independent; outcomes come back in input order. Two jobs for the
/// same source path write the same output file, so callers should not submit
/// duplicates.
pub async fn embed_batch(embedder: &MetadataEmbedder, jobs: Vec<EmbedRequest>) -> Vec<BatchOutcome> {
    let handles: Vec<_> = jobs
        .into_iter()
        .map(|job| {
            let embedder = embedder.clone();
            let source = job.source_path.clone().unwrap_or_default();
            let handle = tokio::task::spawn_blocking(move || embedder.embed_request(&job));
            (source, handle)
        })
        .collect();

    let mut outcomes = Vec::with_capacity(handles.len());
    for (source, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(EmbedError::embedding(
                source.clone(),
                anyhow::anyhow!("embed task failed: {e}"),
            )),
        };
        outcomes.push(BatchOutcome { source, result });
    }
    outcomes
}
