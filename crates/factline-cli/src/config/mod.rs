//! Configuration loading and resolution.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use factline::{CorrelationConfig, LayoutConfig};

/// Engine constants, optionally read from a JSON file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub layout: LayoutConfig,
    pub correlation: CorrelationConfig,
}

/// Resolve the fact data directory.
///
/// Order: explicit flag, `FACTLINE_DATA`, `./facts`, `$HOME/.factline/facts`.
pub fn resolve_data_dir(explicit: Option<&str>) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }

    if let Ok(env_path) = std::env::var("FACTLINE_DATA") {
        return PathBuf::from(env_path);
    }

    let cwd_facts = PathBuf::from("facts");
    if cwd_facts.is_dir() {
        return cwd_facts;
    }

    home_dir().join(".factline").join("facts")
}

/// Load engine constants.
///
/// Order: explicit path, `FACTLINE_CONFIG`, `./factline.json`, built-in defaults.
pub fn load_engine_config(explicit: Option<&str>) -> anyhow::Result<EngineConfig> {
    let path = match explicit {
        Some(p) => Some(PathBuf::from(p)),
        None => std::env::var("FACTLINE_CONFIG")
            .ok()
            .map(PathBuf::from)
            .or_else(|| Some(PathBuf::from("factline.json")).filter(|p| p.is_file())),
    };

    match path {
        Some(path) => read_engine_config(&path),
        None => Ok(EngineConfig::default()),
    }
}

pub fn read_engine_config(path: &Path) -> anyhow::Result<EngineConfig> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config = serde_json::from_slice(&bytes)
        .with_context(|| format!("Invalid config {}", path.display()))?;
    tracing::debug!("Loaded engine config from {}", path.display());
    Ok(config)
}

pub(crate) fn home_dir() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_data_dir_wins() {
        assert_eq!(resolve_data_dir(Some("/srv/facts")), PathBuf::from("/srv/facts"));
    }

    #[test]
    fn test_partial_config_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("factline.json");
        std::fs::write(&path, r#"{ "layout": { "minGapPx": 40 } }"#).unwrap();

        let config = read_engine_config(&path).unwrap();
        assert_eq!(config.layout.min_gap_px, 40.0);
        assert_eq!(config.layout.pixels_per_year, 200.0);
        assert_eq!(config.correlation, CorrelationConfig::default());
    }
}
