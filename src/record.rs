//! The source-agnostic publication record and the category it is filed under.

use crate::normalize::normalize;
use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::str::FromStr;

/// Which extractor produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceTag {
    Bibliography,
    Registry,
    CitationExport,
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceTag::Bibliography => "bibliography",
            SourceTag::Registry => "registry",
            SourceTag::CitationExport => "citation-export",
        };
        f.write_str(name)
    }
}

/// Publication categories of the CV.
///
/// `conference_papers` is the only category grouped by year; every other
/// category is a flat list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    JournalPapers,
    ConferencePapers,
    Preprints,
    UnderReview,
    WorkshopPapers,
}

impl Category {
    /// All categories, in the order they are laid out in a new collection.
    pub const ALL: [Category; 5] = [
        Category::JournalPapers,
        Category::ConferencePapers,
        Category::Preprints,
        Category::UnderReview,
        Category::WorkshopPapers,
    ];

    /// The key used in the persisted collection.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::JournalPapers => "journal_papers",
            Category::ConferencePapers => "conference_papers",
            Category::Preprints => "preprints",
            Category::UnderReview => "under_review",
            Category::WorkshopPapers => "workshop_papers",
        }
    }

    pub fn is_year_bucketed(self) -> bool {
        self == Category::ConferencePapers
    }

    /// `journal_papers` -> `Journal Papers`
    pub fn display_name(self) -> String {
        self.as_str()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            })
            .collect::<Vec<String>>()
            .join(" ")
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| crate::Error::InvalidFormat(format!("unknown category '{s}'")))
    }
}

/// Stable identifiers attached to a publication.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identifiers {
    /// Citation key of the BibTeX entry.
    #[serde(rename = "bibtex_key", default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arxiv: Option<String>,
    /// Put-code of the work in the ORCID registry.
    #[serde(rename = "orcid_put_code", default, skip_serializing_if = "Option::is_none")]
    pub put_code: Option<u64>,
}

/// A single publication, as extracted from a source or stored in the CV.
///
/// The comparison form of the title is never stored: it is always derived
/// from [`title`](Self::title) through [`normalized_title`](Self::normalized_title).
///
/// Keys the record does not know about are kept in [`extra`](Self::extra)
/// so that loading and saving a hand-edited collection loses nothing. A
/// record loaded from a collection also remembers its [`Layout`], and is
/// saved with its keys in the order they were read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublicationRecord {
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(
        default,
        deserialize_with = "lenient_year",
        skip_serializing_if = "Option::is_none"
    )]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub volume: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub number: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub pages: Option<String>,
    #[serde(flatten)]
    pub identifiers: Identifiers,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<u32>,
    /// Presentation type of a conference paper (`oral`, `poster`).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub presentation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptance_rate: Option<String>,
    /// Work type as reported by the registry (`journal-article`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_type: Option<String>,
    #[serde(skip)]
    pub source: Option<SourceTag>,
    #[serde(flatten)]
    pub extra: Mapping,
    #[serde(skip)]
    pub layout: Layout,
}

impl PublicationRecord {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Comparison form of the title.
    pub fn normalized_title(&self) -> String {
        normalize(&self.title)
    }

    /// Where the work appeared: the venue, or the journal when no venue is set.
    pub fn venue(&self) -> Option<&str> {
        self.venue
            .as_deref()
            .filter(|v| !v.is_empty())
            .or_else(|| self.journal.as_deref().filter(|j| !j.is_empty()))
    }

    pub fn key(&self) -> Option<&str> {
        self.identifiers.key.as_deref().filter(|k| !k.is_empty())
    }

    pub fn doi(&self) -> Option<&str> {
        self.identifiers.doi.as_deref().filter(|d| !d.trim().is_empty())
    }
}

/// The mapping a record was read from.
///
/// Layout is formatting, not content: records compare equal whatever their
/// layout.
#[derive(Debug, Clone, Default)]
pub struct Layout(Option<Mapping>);

impl PartialEq for Layout {
    fn eq(&self, _: &Self) -> bool {
        true
    }
}

impl Layout {
    pub fn from_mapping(mapping: Mapping) -> Self {
        Self(Some(mapping))
    }

    /// Reorders the freshly serialized `fields` of a record after this layout.
    ///
    /// Keys that were read come first, in their original order. A scalar
    /// whose text did not change keeps its original spelling, so `volume: 12`
    /// is not rewritten as `volume: '12'`. Keys the record gained since come
    /// last.
    pub fn apply(&self, fields: Mapping) -> Mapping {
        let Some(original) = &self.0 else {
            return fields;
        };
        let mut laid_out = Mapping::with_capacity(fields.len());
        for (key, old) in original {
            if let Some(new) = fields.get(key) {
                let value = if scalar_text(old).is_some() && scalar_text(old) == scalar_text(new) {
                    old.clone()
                } else {
                    new.clone()
                };
                laid_out.insert(key.clone(), value);
            }
        }
        for (key, value) in fields {
            if !original.contains_key(&key) {
                laid_out.insert(key, value);
            }
        }
        laid_out
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

/// Scalars that hand-edited YAML may write either as numbers or as strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::Int(value) => value.to_string(),
            Scalar::Float(value) => value.to_string(),
            Scalar::Text(value) => value,
        }
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Scalar>::deserialize(deserializer)?.map(Scalar::into_string))
}

fn lenient_year<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let year = match Option::<Scalar>::deserialize(deserializer)? {
        Some(Scalar::Int(value)) => i32::try_from(value).ok(),
        Some(Scalar::Float(value)) => Some(value as i32),
        Some(Scalar::Text(text)) => crate::utils::extract_year(&text),
        None => None,
    };
    Ok(year)
}
