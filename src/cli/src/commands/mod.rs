//! Subcommands and the helpers they share.

pub mod estimate;
pub mod plan;
pub mod recommend;
pub mod templates;
pub mod validate;

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use covenant_core::config::Config;
use serde::de::DeserializeOwned;

/// Default configuration path (`~/.covenant/config.toml`).
fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".covenant").join("config.toml"))
}

/// Load configuration from `path`, else the default file when it exists,
/// else the environment alone.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(|| default_config_path().filter(|p| p.exists()));

    match path {
        Some(path) => Config::from_file(&path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Config::load().context("Failed to load configuration"),
    }
}

/// Input file formats, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Json,
    Yaml,
    Toml,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match ext.as_deref() {
            Some("json") => Ok(Self::Json),
            Some("yaml") | Some("yml") => Ok(Self::Yaml),
            Some("toml") => Ok(Self::Toml),
            _ => bail!(
                "Unsupported file type for {} (expected .json, .yaml or .toml)",
                path.display()
            ),
        }
    }
}

/// Parse `contents` in the given format.
pub fn parse_structured<T: DeserializeOwned>(contents: &str, format: InputFormat) -> Result<T> {
    let value = match format {
        InputFormat::Json => serde_json::from_str(contents)?,
        InputFormat::Yaml => serde_yaml::from_str(contents)?,
        InputFormat::Toml => toml::from_str(contents)?,
    };
    Ok(value)
}

/// Read and parse a JSON, YAML or TOML file.
pub fn read_structured<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let format = InputFormat::from_path(path)?;
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_structured(&contents, format).with_context(|| format!("Failed to parse {}", path.display()))
}
