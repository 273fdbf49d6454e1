use crate::regex::Regex;
use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static URL_PREFIX_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://orcid\.org/").unwrap());

static ORCID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{4}-\d{4}-\d{3}[\dX]$").unwrap());

/// A validated ORCID iD in its dashed form, `0000-0002-1825-0097`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OrcidId(String);

impl OrcidId {
    /// Parses an iD given as a URL, a dashed iD or a bare block of 16
    /// characters.
    ///
    /// ```
    /// use cvpubs::OrcidId;
    ///
    /// let id = OrcidId::parse("https://orcid.org/0000-0002-1825-009x").unwrap();
    /// assert_eq!(id.as_str(), "0000-0002-1825-009X");
    /// assert!(OrcidId::parse("0000-0002-1825").is_err());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentifier`] when the cleaned input is not of
    /// the form `NNNN-NNNN-NNNN-NNN[0-9X]`.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        let without_prefix = URL_PREFIX_REGEX.replace(trimmed, "");
        let mut cleaned: String = without_prefix
            .to_uppercase()
            .chars()
            .filter(|c| c.is_ascii_digit() || *c == '-' || *c == 'X')
            .collect();

        if cleaned.len() == 16 && !cleaned.contains('-') {
            cleaned = format!(
                "{}-{}-{}-{}",
                &cleaned[..4],
                &cleaned[4..8],
                &cleaned[8..12],
                &cleaned[12..]
            );
        }

        if ORCID_REGEX.is_match(&cleaned) {
            Ok(Self(cleaned))
        } else {
            Err(Error::InvalidIdentifier(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for OrcidId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for OrcidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for OrcidId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
