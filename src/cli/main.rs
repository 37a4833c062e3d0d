use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use seo_embed::batch::{self, BatchOutcome};
use seo_embed::config;
use seo_embed::embed::MetadataEmbedder;
use seo_embed::format::ImageFormat;
use seo_embed::metadata::{EmbedRequest, ImageMetadata};
use seo_embed::reader::{self, EmbeddedMetadata};

#[derive(Parser, Debug)]
#[command(
    name = "seo-embed",
    version,
    about = "Embed SEO titles, descriptions and keywords into JPEG, PNG, WebP and TIFF images"
)]
struct Cli {
    /// Image files or directories to process
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Title to embed
    #[arg(short, long)]
    title: Option<String>,

    /// Description to embed
    #[arg(short, long)]
    description: Option<String>,

    /// Comma-separated keywords to embed
    #[arg(short, long, value_delimiter = ',')]
    keywords: Vec<String>,

    /// Read title, description and keywords from a JSON file instead
    #[arg(short, long, value_name = "FILE", conflicts_with_all = ["title", "description", "keywords"])]
    metadata: Option<PathBuf>,

    /// Path to config file (default: config.json next to binary)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Initialize a default config.json and exit
    #[arg(long)]
    init: bool,

    /// Display the embedded SEO metadata and exit
    #[arg(long)]
    show: bool,

    /// Output results as JSON
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Handle --init
    if cli.init {
        let config = config::Config::default();
        let path = cli.config.as_deref();
        config.save(path)?;
        let save_path = match path {
            Some(p) => p.to_path_buf(),
            None => config::Config::config_path()?,
        };
        println!("Default config written to {}", save_path.display());
        return Ok(());
    }

    if cli.paths.is_empty() {
        anyhow::bail!("No input files or directories specified. Use --help for usage.");
    }

    let config = config::Config::load(cli.config.as_deref())?;

    let images = batch::collect_images(&cli.paths, &config.output.suffix);
    if images.is_empty() {
        anyhow::bail!(
            "No supported image files ({}) found in the specified paths.",
            ImageFormat::supported_extensions().join(", ")
        );
    }

    // Handle --show
    if cli.show {
        let mut found = Vec::new();
        for image_path in &images {
            match reader::read_embedded(image_path) {
                Ok(data) => found.push((image_path, data)),
                Err(e) => log::error!("Failed to read {}: {e:#}", image_path.display()),
            }
        }
        if cli.json {
            let json: Vec<serde_json::Value> = found
                .iter()
                .map(|(path, data)| {
                    serde_json::json!({ "path": path.display().to_string(), "metadata": data })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json)?);
        } else {
            for (path, data) in &found {
                print_embedded(path, data);
            }
        }
        return Ok(());
    }

    let metadata = resolve_metadata(&cli)?;

    log::info!("Found {} image(s) to process", images.len());
    let total = images.len();
    let jobs = images
        .into_iter()
        .map(|path| EmbedRequest::new(path, metadata.clone()))
        .collect();

    let embedder = MetadataEmbedder::new(config)?;
    let outcomes = batch::embed_batch(&embedder, jobs).await;

    for (i, outcome) in outcomes.iter().enumerate() {
        match &outcome.result {
            Ok(result) => log::info!(
                "[{}/{}] {} -> {}",
                i + 1,
                total,
                outcome.source.display(),
                result.output_path.display()
            ),
            Err(e) => log::error!("[{}/{}] {e}", i + 1, total),
        }
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcomes_json(&outcomes))?);
    }

    // Summary
    let success = outcomes.iter().filter(|o| o.result.is_ok()).count();
    let failed = total - success;
    log::info!("Done: {success} succeeded, {failed} failed out of {total} images");

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Metadata from `--metadata FILE` or from the individual flags.
fn resolve_metadata(cli: &Cli) -> Result<ImageMetadata> {
    if let Some(ref file) = cli.metadata {
        let contents = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read metadata file {}", file.display()))?;
        return serde_json::from_str(&contents).context("Failed to parse metadata file");
    }

    if cli.title.is_none() && cli.description.is_none() && cli.keywords.is_empty() {
        anyhow::bail!("No metadata given. Use --title/--description/--keywords or --metadata FILE.");
    }
    Ok(ImageMetadata::new(
        cli.title.clone().unwrap_or_default(),
        cli.description.clone().unwrap_or_default(),
        cli.keywords.clone(),
    ))
}

fn outcomes_json(outcomes: &[BatchOutcome]) -> Vec<serde_json::Value> {
    outcomes
        .iter()
        .map(|o| match &o.result {
            Ok(result) => serde_json::json!({
                "path": o.source.display().to_string(),
                "status": result.status,
                "output_path": result.output_path.display().to_string(),
                "message": result.message,
            }),
            Err(e) => serde_json::json!({
                "path": o.source.display().to_string(),
                "status": "error",
                "error": e.to_string(),
            }),
        })
        .collect()
}

// ANSI color codes
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";

/// Max width for the value column before wrapping.
const VAL_WIDTH: usize = 46;
/// Indent for continuation lines (tag column width + " : " = 25 chars + 2 leading spaces).
const INDENT: &str = "                           ";

/// Print the embedded SEO metadata of one file.
fn print_embedded(path: &Path, data: &EmbeddedMetadata) {
    println!();
    println!("{BOLD}File:{RESET} {} ({})", path.display(), data.format.mime_type());
    println!("{DIM}{}{RESET}", "═".repeat(72));

    if data.is_empty() {
        println!("  {DIM}(no SEO metadata found){RESET}");
        println!();
        return;
    }

    let rows = [
        ("Title", data.title.clone()),
        ("Description", data.description.clone()),
        ("Keywords", data.keywords.clone()),
        (
            "KeywordList",
            (!data.keyword_list.is_empty()).then(|| data.keyword_list.join(" | ")),
        ),
    ];
    for (tag, val) in &rows {
        if let Some(v) = val {
            print_row(tag, v);
        }
    }
    println!();
}

/// Print a single row in the metadata display table.
fn print_row(tag: &str, val: &str) {
    let tag_col = format!("{:<22}", tag);
    for (i, line) in wrap_text(val, VAL_WIDTH).iter().enumerate() {
        if i == 0 {
            println!("  {tag_col} : {line}");
        } else {
            println!("  {INDENT}{line}");
        }
    }
}

/// Wrap text at word boundaries to fit within max_width.
fn wrap_text(s: &str, max_width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in s.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.len() + 1 + word.len() <= max_width {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            lines.push(current_line);
            current_line = word.to_string();
        }
    }

    if !current_line.is_empty() {
        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(s.to_string());
    }

    lines
}
