use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for the embedder.
///
/// Controls how output files are named and written, and how keyword lists
/// are cleaned up before they are embedded.
///
/// # Loading
///
/// ```rust,no_run
/// use seo_embed::config::Config;
///
/// // From a JSON file
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.output.atomic_write = false;
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Output naming and write behavior.
    pub output: OutputConfig,
    /// Keyword clean-up rules.
    pub keywords: KeywordConfig,
}

/// Output naming and write behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Inserted between the file stem and the extension of the output file.
    pub suffix: String,
    /// Write to a temporary file in the output directory and rename it into
    /// place once complete.
    pub atomic_write: bool,
    /// Replace an existing output file. When `false`, an existing output is
    /// an embedding failure.
    pub overwrite: bool,
}

/// Keyword clean-up applied before embedding. Both rules are off by default,
/// so keywords are embedded exactly as given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordConfig {
    /// Strip surrounding whitespace from each keyword.
    pub trim: bool,
    /// Drop keywords that are empty (after trimming).
    pub drop_empty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            suffix: "_with_metadata".to_string(),
            atomic_write: true,
            overwrite: true,
        }
    }
}

impl Default for KeywordConfig {
    fn default() -> Self {
        Self {
            trim: false,
            drop_empty: false,
        }
    }
}

impl Config {
    /// Resolve the config file path: same directory as the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Failed to get executable path")?;
        let exe_dir = exe_path
            .parent()
            .context("Failed to get executable directory")?;
        Ok(exe_dir.join("config.json"))
    }

    /// Load config from the given path, or from the default location.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            log::warn!(
                "Config file not found at {}. Using defaults.",
                config_path.display()
            );
            return Ok(Self::default());
        }

        let contents =
            std::fs::read_to_string(&config_path).context("Failed to read config file")?;
        let config: Config =
            serde_json::from_str(&contents).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to the given path, or to the default location.
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::config_path()?,
        };

        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, contents).context("Failed to write config file")?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }

    /// Reject settings that would make the output path collide with the source.
    pub fn validate(&self) -> Result<()> {
        let suffix = &self.output.suffix;
        if suffix.is_empty() {
            anyhow::bail!("output.suffix must not be empty (the source would be overwritten)");
        }
        if suffix.contains(['/', '\\']) {
            anyhow::bail!("output.suffix must not contain path separators: {suffix:?}");
        }
        Ok(())
    }
}
