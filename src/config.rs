//! Project settings, read from `cvpubs.toml`.
//!
//! Every key is optional; a missing file gives the defaults below.
//!
//! ```toml
//! [paths]
//! publications = "data/publications.yaml"
//! bibliography = "data/papers.bib"
//!
//! [matching]
//! similarity_threshold = 0.7
//!
//! [duplicates]
//! match_title = true
//! match_doi = true
//!
//! [registry]
//! environment = "production"
//! token_file = "/home/me/.cv-manager/orcid_tokens.yaml"
//! ```

use crate::matcher::DEFAULT_SIMILARITY_THRESHOLD;
use crate::registry::RegistryEnvironment;
use crate::{DuplicatePolicy, Error, MatcherConfig, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Name of the settings file looked up in the working directory.
pub const DEFAULT_SETTINGS_FILE: &str = "cvpubs.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: PathSettings,
    pub matching: MatchingSettings,
    pub duplicates: DuplicatePolicy,
    pub registry: RegistrySettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathSettings {
    /// The persisted publication collection.
    pub publications: PathBuf,
    /// The BibTeX bibliography citation counts are matched against.
    pub bibliography: PathBuf,
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            publications: PathBuf::from("data/publications.yaml"),
            bibliography: PathBuf::from("data/papers.bib"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingSettings {
    pub similarity_threshold: f64,
}

impl Default for MatchingSettings {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    pub environment: RegistryEnvironment,
    /// Token store location; the CLI falls back to
    /// `~/.cv-manager/orcid_tokens.yaml`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_file: Option<PathBuf>,
}

impl Settings {
    /// Parses and validates a settings document.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(input)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Loads settings from `path`. A missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => Self::from_toml_str(&content),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                Ok(Self::default())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// # Errors
    ///
    /// [`Error::InvalidSetting`] when the similarity threshold is outside
    /// `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        let threshold = self.matching.similarity_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::InvalidSetting {
                field: "matching.similarity_threshold".to_string(),
                message: format!("{threshold} is not between 0 and 1"),
            });
        }
        Ok(())
    }

    pub fn matcher_config(&self) -> MatcherConfig {
        MatcherConfig::default().with_threshold(self.matching.similarity_threshold)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(
            settings.paths.publications,
            PathBuf::from("data/publications.yaml")
        );
        assert_eq!(settings.matcher_config(), MatcherConfig::default());
        assert_eq!(settings.duplicates, DuplicatePolicy::default());
        assert_eq!(settings.registry.environment, RegistryEnvironment::Production);
    }

    #[test]
    fn test_partial_document() {
        let settings = Settings::from_toml_str(
            r#"
[matching]
similarity_threshold = 0.85

[duplicates]
match_doi = false

[registry]
environment = "sandbox"
"#,
        )
        .unwrap();

        assert_eq!(settings.matching.similarity_threshold, 0.85);
        assert!(settings.duplicates.match_title);
        assert!(!settings.duplicates.match_doi);
        assert_eq!(settings.registry.environment, RegistryEnvironment::Sandbox);
        assert_eq!(settings.paths, PathSettings::default());
    }

    #[rstest]
    #[case(-0.1)]
    #[case(1.5)]
    fn test_threshold_out_of_range(#[case] threshold: f64) {
        let input = format!("[matching]\nsimilarity_threshold = {threshold}\n");
        assert!(matches!(
            Settings::from_toml_str(&input),
            Err(Error::InvalidSetting { ref field, .. }) if field == "matching.similarity_threshold"
        ));
    }

    #[test]
    fn test_load_missing_and_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(DEFAULT_SETTINGS_FILE);
        assert_eq!(Settings::load(&path).unwrap(), Settings::default());

        fs::write(&path, "[matching\n").unwrap();
        assert!(matches!(Settings::load(&path), Err(Error::Settings(_))));
    }
}
