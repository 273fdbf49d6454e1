//! Import, match and deduplicate the publications of an academic CV.
//!
//! `cvpubs` keeps the publication list of a CV as a human-editable YAML
//! document and folds data from external sources into it without creating
//! duplicates.
//!
//! # Key Features
//!
//! - **Record extraction** from:
//!   - BibTeX bibliographies
//!   - the ORCID registry (public API, with an injectable transport)
//!   - Google Scholar profile pages and CSV citation exports
//!
//! - **Matching and merging**:
//!   - Markup-insensitive title normalization
//!   - Ratcliff/Obershelp title similarity
//!   - Exact-then-fuzzy matching against a bibliography
//!   - Append-only merge with title/DOI duplicate suppression
//!   - Citation-count updates with before/after deltas
//!
//! # Basic Usage
//!
//! ```rust
//! use cvpubs::{BibtexExtractor, RecordExtractor};
//!
//! let input = r#"@article{doe2021deep,
//!   title = {Deep Models for {C}ausal Inference},
//!   author = {Doe, Jane and Roe, Richard},
//!   journal = {Journal of Things},
//!   year = 2021
//! }"#;
//!
//! let extraction = BibtexExtractor::new().extract(input).unwrap();
//! let record = &extraction.records[0].record;
//! assert_eq!(record.title, "Deep Models for Causal Inference");
//! assert_eq!(record.authors, vec!["Jane Doe", "Richard Roe"]);
//! ```
//!
//! # Merging into the Collection
//!
//! ```rust
//! use cvpubs::merge::Merger;
//! use cvpubs::{BibtexExtractor, PublicationCollection, RecordExtractor};
//!
//! let bib = "@article{a, title = {A Paper}, year = 2020}";
//! let imported = BibtexExtractor::new().extract(bib).unwrap().into_collection();
//!
//! let outcome = Merger::new().merge(&imported, &PublicationCollection::new());
//! assert_eq!(outcome.added_count(), 1);
//!
//! // Merging the same records again adds nothing.
//! let again = Merger::new().merge(&imported, &outcome.collection);
//! assert_eq!(again.added_count(), 0);
//! assert_eq!(again.collection, outcome.collection);
//! ```
//!
//! # Error Handling
//!
//! Operations that cannot produce anything fail with [`Error`]. Problems with
//! a single entry, row or remote work are reported as [`ExtractionIssue`]s
//! and the rest of the batch is still processed:
//!
//! ```rust
//! use cvpubs::{BibtexExtractor, RecordExtractor};
//!
//! let input = "@article{broken, title = {Unclosed}\n@article{ok, title = {Fine}}";
//! let extraction = BibtexExtractor::new().extract(input).unwrap();
//! assert_eq!(extraction.records.len(), 1);
//! assert_eq!(extraction.issues.len(), 1);
//! ```

use std::fmt;

pub mod bibtex;
pub mod citations;
pub mod collection;
pub mod config;
pub mod matcher;
pub mod merge;
pub mod normalize;
pub mod registry;
pub mod similarity;
pub mod workflow;

mod error;
mod record;
mod regex;
mod utils;

// Reexports
pub use bibtex::BibtexExtractor;
pub use citations::ScholarHtmlExtractor;
#[cfg(feature = "csv")]
pub use citations::csv::CsvCitationExtractor;
pub use collection::{CategoryEntries, PublicationCollection, YearBuckets};
pub use error::{Error, RegistryError, Result};
pub use matcher::{MatchReport, MatchResult, Matcher, MatcherConfig};
pub use merge::{DuplicatePolicy, MergeOutcome, Merger};
pub use record::{Category, Identifiers, Layout, PublicationRecord, SourceTag};
pub use registry::{OrcidId, RegistryExtractor};

/// A record together with the category its source assigns it to.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedRecord {
    pub record: PublicationRecord,
    /// `None` for sources that carry no category (citation exports).
    pub category: Option<Category>,
}

/// An input item that was skipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionIssue {
    pub reason: String,
    /// Line of the input where the item starts, when known.
    pub line: Option<usize>,
    /// Identifier of the skipped item (citation key, put-code, ...).
    pub item: Option<String>,
}

impl ExtractionIssue {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            line: None,
            item: None,
        }
    }

    #[must_use]
    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    #[must_use]
    pub fn for_item(mut self, item: impl Into<String>) -> Self {
        self.item = Some(item.into());
        self
    }
}

impl fmt::Display for ExtractionIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.line, &self.item) {
            (Some(line), Some(item)) => write!(f, "line {line} ({item}): {}", self.reason),
            (Some(line), None) => write!(f, "line {line}: {}", self.reason),
            (None, Some(item)) => write!(f, "{item}: {}", self.reason),
            (None, None) => f.write_str(&self.reason),
        }
    }
}

/// Output of a [`RecordExtractor`]: records in source order plus the items
/// that were skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub records: Vec<ExtractedRecord>,
    pub issues: Vec<ExtractionIssue>,
}

impl Extraction {
    /// The bare records, dropping category information.
    pub fn publication_records(&self) -> Vec<PublicationRecord> {
        self.records.iter().map(|r| r.record.clone()).collect()
    }

    /// Files the records into a fresh collection.
    ///
    /// Conference papers with a year go to that year's bucket, those without
    /// a year to `workshop_papers`. Flat categories are sorted by year,
    /// newest first and undated last; year buckets are sorted by title.
    /// Records without a category are left out.
    pub fn into_collection(self) -> PublicationCollection {
        let mut collection = PublicationCollection::new();

        for category in Category::ALL {
            for extracted in self.records.iter().filter(|r| r.category == Some(category)) {
                let record = extracted.record.clone();
                collection.push(category, record.year, record);
            }
        }

        let skipped = self.records.iter().filter(|r| r.category.is_none()).count();
        if skipped > 0 {
            tracing::debug!(skipped, "records without a category left out of the collection");
        }

        for (_, entries) in collection.categories_mut() {
            match entries {
                CategoryEntries::Flat(records) => records.sort_by(|a, b| b.year.cmp(&a.year)),
                CategoryEntries::YearBucketed(buckets) => {
                    for (_, records) in buckets.iter_mut() {
                        records.sort_by(|a, b| a.title.cmp(&b.title));
                    }
                }
            }
        }

        collection
    }
}

/// Trait for source-specific record extractors.
pub trait RecordExtractor {
    /// Extract publication records from raw source text.
    ///
    /// # Arguments
    ///
    /// * `input` - The source document (BibTeX text, HTML page, ORCID iD, ...)
    ///
    /// # Errors
    ///
    /// Returns an error only when nothing can be extracted at all; malformed
    /// items are reported in [`Extraction::issues`].
    fn extract(&self, input: &str) -> Result<Extraction>;
}
