use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    error::{Error, Result},
    schema::ServerConfig,
};

/// Standard config file names, checked in order in the working directory.
const CONFIG_FILENAMES: &[&str] = &["parlor.toml", "parlor.yaml", "parlor.yml", "parlor.json"];

/// Load config from the given path (format by extension).
pub fn load_config(path: &Path) -> Result<ServerConfig> {
    let raw = std::fs::read_to_string(path)?;
    let config = parse_config(&raw, path)?;
    config.validate()?;
    Ok(config)
}

/// Discover and load config from the working directory.
///
/// Returns `ServerConfig::default()` when no config file exists; a file
/// that exists but fails to load or validate is reported and skipped.
#[must_use]
pub fn discover_and_load() -> ServerConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(config) => return config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    ServerConfig::default()
}

fn find_config_file() -> Option<PathBuf> {
    CONFIG_FILENAMES
        .iter()
        .copied()
        .map(PathBuf::from)
        .find(|p| p.exists())
}

fn parse_config(raw: &str, path: &Path) -> Result<ServerConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => Err(Error::UnsupportedFormat {
            extension: ext.to_string(),
        }),
    }
}
