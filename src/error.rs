//! Error types shared across the crate.

use thiserror::Error;

/// A specialized Result type for publication operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a whole operation.
///
/// Problems with a single entry, row or remote work are not errors: they are
/// collected as [`ExtractionIssue`](crate::ExtractionIssue)s and the batch
/// carries on.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Settings error: {0}")]
    Settings(#[from] toml::de::Error),

    #[error("Parse error: {0}")]
    InvalidFormat(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid ORCID iD: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid setting: {field} - {message}")]
    InvalidSetting { field: String, message: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[cfg(feature = "csv")]
impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::InvalidFormat(err.to_string())
    }
}

/// Errors from the identifier registry (ORCID) client and token store.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[cfg(feature = "orcid")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("parse error: {0}")]
    Parse(String),

    #[error("no access token stored for ORCID iD {0}")]
    MissingToken(String),
}

impl From<serde_json::Error> for RegistryError {
    fn from(err: serde_json::Error) -> Self {
        RegistryError::Parse(err.to_string())
    }
}
