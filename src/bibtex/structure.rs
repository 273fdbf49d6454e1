//! BibTeX entry data structures.
//!
//! This module defines the raw entry produced by the parser and its
//! conversion into an [`ExtractedRecord`].
//!
//! # Field Processing
//!
//! - **Display fields** (title, authors, venue, note) go through
//!   [`clean_markup`], which decodes accents and drops LaTeX commands.
//! - **Identifiers** (DOI, URL, pages) are taken verbatim apart from DOI
//!   prefix stripping.
//! - **Venue**: `journal` for articles; otherwise `booktitle`, then
//!   `journal`, then `howpublished`.

use crate::bibtex::entry_type::EntryType;
use crate::normalize::clean_markup;
use crate::regex::Regex;
use crate::utils::{display_author_name, extract_year, format_doi};
use crate::{Error, ExtractedRecord, Identifiers, PublicationRecord, SourceTag};
use std::sync::LazyLock;

static AUTHOR_SEPARATOR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+and\s+").unwrap());

static ARXIV_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4}\.\d{4,5})").unwrap());

/// A parsed BibTeX entry with macros resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RawBibtexEntry {
    /// Lowercased entry type.
    pub(crate) entry_type: String,
    pub(crate) key: String,
    /// Lowercased field names with their values, in input order.
    pub(crate) fields: Vec<(String, String)>,
    /// Line on which the entry starts.
    pub(crate) line: usize,
}

impl RawBibtexEntry {
    /// The value of a field, if present and not blank.
    pub(crate) fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value.as_str())
            .filter(|value| !value.trim().is_empty())
    }

    fn get_clean(&self, name: &str) -> Option<String> {
        self.get(name)
            .map(clean_markup)
            .filter(|value| !value.is_empty())
    }

    fn get_trimmed(&self, name: &str) -> Option<String> {
        self.get(name).map(|value| value.trim().to_string())
    }

    fn mentions_arxiv(&self) -> bool {
        self.key.to_lowercase().contains("arxiv")
            || self
                .fields
                .iter()
                .any(|(_, value)| value.to_lowercase().contains("arxiv"))
    }

    fn find_arxiv_id(&self) -> Option<String> {
        std::iter::once(self.key.as_str())
            .chain(self.fields.iter().map(|(_, value)| value.as_str()))
            .find_map(|text| ARXIV_ID_REGEX.captures(text).map(|caps| caps[1].to_string()))
    }
}

/// Splits a BibTeX author list on ` and ` and turns `Last, First` around.
pub(crate) fn parse_authors(authors: &str) -> Vec<String> {
    AUTHOR_SEPARATOR_REGEX
        .split(authors.trim())
        .map(|author| display_author_name(&clean_markup(author)))
        .filter(|author| !author.is_empty())
        .collect()
}

impl TryFrom<RawBibtexEntry> for ExtractedRecord {
    type Error = Error;

    fn try_from(raw: RawBibtexEntry) -> Result<Self, Self::Error> {
        let title = raw
            .get_clean("title")
            .ok_or_else(|| Error::MissingField("title".to_string()))?;

        let entry_type = EntryType::from_name(&raw.entry_type);

        let mut record = PublicationRecord {
            title,
            authors: raw.get("author").map(parse_authors).unwrap_or_default(),
            year: raw.get("year").and_then(extract_year),
            volume: raw.get_trimmed("volume"),
            number: raw.get_trimmed("number"),
            pages: raw.get_trimmed("pages"),
            identifiers: Identifiers {
                key: Some(raw.key.clone()).filter(|key| !key.is_empty()),
                doi: raw.get("doi").and_then(format_doi),
                url: raw.get_trimmed("url"),
                ..Default::default()
            },
            source: Some(SourceTag::Bibliography),
            ..Default::default()
        };

        if entry_type == EntryType::Article {
            record.journal = raw.get_clean("journal");
        } else {
            record.venue = raw
                .get_clean("booktitle")
                .or_else(|| raw.get_clean("journal"))
                .or_else(|| raw.get_clean("howpublished"));
        }

        if entry_type.is_conference_like() {
            if let Some(note) = raw.get("note") {
                let lowered = note.to_lowercase();
                if lowered.contains("accept") || note.contains('%') {
                    record.acceptance_rate = Some(clean_markup(note));
                }
                if lowered.contains("oral") {
                    record.presentation = Some("oral".to_string());
                } else if lowered.contains("poster") {
                    record.presentation = Some("poster".to_string());
                }
            }
        }

        if entry_type.is_preprint_like() && raw.mentions_arxiv() {
            record.identifiers.arxiv = raw.find_arxiv_id();
        }

        Ok(ExtractedRecord {
            record,
            category: Some(entry_type.category()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Category;
    use pretty_assertions::assert_eq;

    fn raw(entry_type: &str, key: &str, fields: &[(&str, &str)]) -> RawBibtexEntry {
        RawBibtexEntry {
            entry_type: entry_type.to_string(),
            key: key.to_string(),
            fields: fields
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            line: 1,
        }
    }

    #[test]
    fn test_article_conversion() {
        let entry = raw(
            "article",
            "doe2021",
            &[
                ("title", r"Deep \emph{Models} for {C}ausal Inference"),
                ("author", "Doe, Jane and Richard {Ro\\\"e}"),
                ("journal", r"Journal of \LaTeX{} Things"),
                ("year", "2021"),
                ("volume", "12"),
                ("number", "3"),
                ("pages", "1--10"),
                ("doi", "https://doi.org/10.1000/XYZ"),
                ("url", "https://example.org/paper"),
            ],
        );

        let extracted = ExtractedRecord::try_from(entry).unwrap();
        let record = extracted.record;
        assert_eq!(extracted.category, Some(Category::JournalPapers));
        assert_eq!(record.title, "Deep Models for Causal Inference");
        assert_eq!(record.authors, vec!["Jane Doe", "Richard Roë"]);
        assert_eq!(record.journal.as_deref(), Some("Journal of Things"));
        assert_eq!(record.venue, None);
        assert_eq!(record.year, Some(2021));
        assert_eq!(record.volume.as_deref(), Some("12"));
        assert_eq!(record.pages.as_deref(), Some("1--10"));
        assert_eq!(record.identifiers.key.as_deref(), Some("doe2021"));
        assert_eq!(record.identifiers.doi.as_deref(), Some("10.1000/XYZ"));
        assert_eq!(record.identifiers.url.as_deref(), Some("https://example.org/paper"));
        assert_eq!(record.source, Some(SourceTag::Bibliography));
    }

    #[test]
    fn test_conference_note() {
        let entry = raw(
            "inproceedings",
            "x",
            &[
                ("title", "A Talk"),
                ("booktitle", "Proc. of {ICML}"),
                ("year", "2022"),
                ("note", r"Oral presentation, 21\% acceptance rate"),
            ],
        );
        let extracted = ExtractedRecord::try_from(entry).unwrap();
        assert_eq!(extracted.category, Some(Category::ConferencePapers));
        assert_eq!(extracted.record.venue.as_deref(), Some("Proc. of ICML"));
        assert_eq!(
            extracted.record.acceptance_rate.as_deref(),
            Some("Oral presentation, 21% acceptance rate")
        );
        assert_eq!(extracted.record.presentation.as_deref(), Some("oral"));
    }

    #[test]
    fn test_misc_arxiv() {
        let entry = raw(
            "misc",
            "roe2024",
            &[
                ("title", "Preprinted"),
                ("howpublished", "arXiv preprint"),
                ("eprint", "2401.01234"),
                ("year", "2024"),
            ],
        );
        let record = ExtractedRecord::try_from(entry).unwrap().record;
        assert_eq!(record.venue.as_deref(), Some("arXiv preprint"));
        assert_eq!(record.identifiers.arxiv.as_deref(), Some("2401.01234"));

        let entry = raw("techreport", "t", &[("title", "Report"), ("note", "arXiv 2401.01234")]);
        let record = ExtractedRecord::try_from(entry).unwrap().record;
        assert_eq!(record.identifiers.arxiv, None);
    }

    #[test]
    fn test_missing_title_is_an_error() {
        let entry = raw("article", "notitle", &[("author", "Doe, Jane")]);
        assert!(matches!(
            ExtractedRecord::try_from(entry),
            Err(Error::MissingField(field)) if field == "title"
        ));

        let entry = raw("article", "blank", &[("title", "{ }")]);
        assert!(ExtractedRecord::try_from(entry).is_err());
    }

    #[test]
    fn test_parse_authors() {
        assert_eq!(
            parse_authors("Doe, Jane and  Roe, R.\n and Alice Smith"),
            vec!["Jane Doe", "R. Roe", "Alice Smith"]
        );
        assert!(parse_authors("").is_empty());
    }
}
