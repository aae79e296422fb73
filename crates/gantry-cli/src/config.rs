//! CLI configuration management.

use anyhow::{Context, Result};
use gantry_builder::BuildConfig;
use gantry_matrix::AxisVocabulary;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Image build settings.
    #[serde(default)]
    pub build: BuildConfig,
    /// Extra axis-name synonyms on top of the built-in ones.
    #[serde(default)]
    pub axis_synonyms: BTreeMap<String, String>,
}

impl CliConfig {
    /// Load configuration from `path`, or from the user config file if it
    /// exists, falling back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read config file {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Get the configuration file path.
    pub fn config_path() -> Option<PathBuf> {
        let dirs = directories::ProjectDirs::from("io", "gantry", "gantry")?;
        Some(dirs.config_dir().join("config.yaml"))
    }

    /// Axis vocabulary for matrix expansion.
    pub fn vocabulary(&self) -> AxisVocabulary {
        self.axis_synonyms
            .iter()
            .fold(AxisVocabulary::default(), |vocabulary, (name, canonical)| {
                vocabulary.with_synonym(name.as_str(), canonical.as_str())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "build:\n  max_images: 3\n  default_cache_repo: null\naxis_synonyms:\n  os: DIST\n"
        )
        .unwrap();

        let config = CliConfig::load(Some(file.path())).unwrap();

        assert_eq!(config.build.max_images, 3);
        assert_eq!(config.build.default_cache_repo, None);
        assert_eq!(config.build.project, "rucio");
        assert_eq!(config.vocabulary().canonical("os"), "DIST");
        assert_eq!(config.vocabulary().canonical("python"), "PYTHON");
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        assert!(CliConfig::load(Some(Path::new("/nonexistent/gantry.yaml"))).is_err());
    }
}
