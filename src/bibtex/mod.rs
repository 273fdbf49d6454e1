//! BibTeX extractor.
//!
//! Reads `.bib` text and produces one record per entry, filed under the
//! category its entry type maps to (see [`EntryType::category`]).
//!
//! # Example
//!
//! ```
//! use cvpubs::{BibtexExtractor, Category, RecordExtractor};
//!
//! let input = r#"@inproceedings{roe2022,
//!   title = {Fast {B}ayesian Search},
//!   author = {Richard Roe},
//!   booktitle = {Proceedings of ICML},
//!   year = {2022}
//! }"#;
//!
//! let extraction = BibtexExtractor::new().extract(input).unwrap();
//! assert_eq!(extraction.records[0].category, Some(Category::ConferencePapers));
//! assert_eq!(extraction.records[0].record.venue.as_deref(), Some("Proceedings of ICML"));
//! ```

mod entry_type;
mod export;
mod parse;
mod structure;

pub use entry_type::EntryType;
pub use export::{export_bibtex, generate_key};

use crate::{ExtractedRecord, Extraction, ExtractionIssue, RecordExtractor, Result};
use parse::bibtex_parse;
use tracing::{debug, warn};

/// Extractor for BibTeX bibliographies.
#[derive(Debug, Clone, Default)]
pub struct BibtexExtractor;

impl BibtexExtractor {
    /// Creates a new BibTeX extractor.
    ///
    /// # Examples
    ///
    /// ```
    /// use cvpubs::BibtexExtractor;
    /// let extractor = BibtexExtractor::new();
    /// ```
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RecordExtractor for BibtexExtractor {
    /// Extracts every entry of a BibTeX document.
    ///
    /// Entries that fail to parse, or that have no title, are reported in
    /// [`Extraction::issues`] and skipped.
    fn extract(&self, input: &str) -> Result<Extraction> {
        let parsed = bibtex_parse(input);
        let mut extraction = Extraction::default();

        for error in parsed.errors {
            warn!(line = error.line, "skipping malformed BibTeX entry: {}", error.message);
            let mut issue = ExtractionIssue::new(error.message).at_line(error.line);
            if let Some(key) = error.key.filter(|k| !k.is_empty()) {
                issue = issue.for_item(key);
            }
            extraction.issues.push(issue);
        }

        for raw in parsed.entries {
            let line = raw.line;
            let key = raw.key.clone();
            match ExtractedRecord::try_from(raw) {
                Ok(record) => extraction.records.push(record),
                Err(err) => {
                    warn!(line, key = %key, "skipping BibTeX entry: {err}");
                    extraction
                        .issues
                        .push(ExtractionIssue::new(err.to_string()).at_line(line).for_item(key));
                }
            }
        }

        extraction.issues.sort_by_key(|issue| issue.line);
        debug!(
            records = extraction.records.len(),
            issues = extraction.issues.len(),
            "extracted BibTeX entries"
        );
        Ok(extraction)
    }
}
