//! End-to-end operations on the collection file.
//!
//! Each workflow loads the collection, changes it in memory and writes it
//! back only when something changed and the run is not a dry run. A backup
//! of the previous file is taken first when requested.

use crate::citations::{CitationDelta, apply_citation_counts};
use crate::collection::backup_collection;
use crate::registry::WorksSource;
use crate::utils::truncate_chars;
use crate::{
    BibtexExtractor, Extraction, ExtractionIssue, Matcher, Merger, PublicationCollection,
    RecordExtractor, RegistryExtractor, Result,
};
use itertools::Itertools;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Unmatched titles listed in a [`CitationReport`] summary.
const UNMATCHED_PREVIEW: usize = 5;
const TITLE_PREVIEW_CHARS: usize = 60;

/// How a workflow treats the collection file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    /// Merge into the existing collection. When `false` the imported
    /// records replace it. Ignored by [`update_citations`].
    pub merge: bool,
    /// Copy the file to `<file>.backup` before overwriting it.
    pub backup: bool,
    /// Compute everything but write nothing.
    pub dry_run: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            merge: true,
            backup: true,
            dry_run: false,
        }
    }
}

/// Outcome of an import.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportReport {
    /// Human-readable name of the source.
    pub source: String,
    pub extracted: usize,
    pub added: usize,
    pub duplicates: usize,
    /// Skipped input items.
    pub issues: Vec<ExtractionIssue>,
    /// Record count per category of the resulting collection.
    pub summary: Vec<(String, usize)>,
    pub backup: Option<PathBuf>,
    pub saved: bool,
    pub dry_run: bool,
}

impl fmt::Display for ImportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let heading = format!("{} Import Summary", self.source);
        writeln!(f, "{heading}")?;
        writeln!(f, "{}", "=".repeat(heading.chars().count()))?;
        writeln!(f, "Records extracted: {}", self.extracted)?;
        writeln!(f, "Records added: {}", self.added)?;
        writeln!(f, "Duplicates skipped: {}", self.duplicates)?;
        writeln!(f, "Entries skipped: {}", self.issues.len())?;
        writeln!(
            f,
            "Collection: {}",
            self.summary
                .iter()
                .map(|(category, count)| format!("{category} {count}"))
                .join(", ")
        )?;
        if let Some(backup) = &self.backup {
            writeln!(f, "Backup: {}", backup.display())?;
        }
        if self.dry_run {
            writeln!(f, "\n[DRY RUN] No files were modified")?;
        }
        if !self.issues.is_empty() {
            writeln!(f, "\nSkipped:")?;
            for issue in &self.issues {
                writeln!(f, "  • {issue}")?;
            }
        }
        Ok(())
    }
}

/// Outcome of [`update_citations`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CitationReport {
    /// Records read from the citation source.
    pub found: usize,
    /// Records in the bibliography.
    pub bibliography: usize,
    pub matched: usize,
    pub updates: Vec<CitationDelta>,
    /// Title and citation count of every unmatched source record.
    pub unmatched: Vec<(String, u32)>,
    /// Citations of all source records.
    pub total_citations: u64,
    /// Citations of the matched source records.
    pub matched_citations: u64,
    pub issues: Vec<ExtractionIssue>,
    pub backup: Option<PathBuf>,
    pub saved: bool,
    pub dry_run: bool,
}

impl fmt::Display for CitationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Citation Update Summary")?;
        writeln!(f, "{}", "=".repeat(22))?;
        writeln!(f, "Papers found in citation source: {}", self.found)?;
        writeln!(f, "Papers in BibTeX database: {}", self.bibliography)?;
        writeln!(f, "Papers matched: {}", self.matched)?;
        writeln!(f, "Papers updated: {}", self.updates.len())?;
        writeln!(f, "Total citations (all papers): {}", self.total_citations)?;
        writeln!(f, "Total citations (matched): {}", self.matched_citations)?;

        if self.dry_run {
            writeln!(f, "\n[DRY RUN] No files were modified")?;
        }

        if !self.updates.is_empty() {
            writeln!(f, "\nUpdated Papers:")?;
            for delta in &self.updates {
                writeln!(f, "  • {}: {} → {} citations", delta.key, delta.old, delta.new)?;
            }
        }

        if !self.unmatched.is_empty() {
            let count = self.unmatched.len();
            writeln!(f, "\nUnmatched papers from citation source: {count}")?;
            for (title, citations) in self.unmatched.iter().take(UNMATCHED_PREVIEW) {
                writeln!(
                    f,
                    "  • {} ({citations} citations)",
                    truncate_chars(title, TITLE_PREVIEW_CHARS)
                )?;
            }
            if count > UNMATCHED_PREVIEW {
                writeln!(f, "  ... and {} more", count - UNMATCHED_PREVIEW)?;
            }
        }

        if !self.issues.is_empty() {
            writeln!(f, "\nSkipped:")?;
            for issue in &self.issues {
                writeln!(f, "  • {issue}")?;
            }
        }
        Ok(())
    }
}

/// Folds an extraction into the collection at `publications`.
///
/// Records the source left without a category are ignored.
pub fn import_extraction(
    source: &str,
    extraction: Extraction,
    publications: &Path,
    options: &ImportOptions,
    merger: &Merger,
) -> Result<ImportReport> {
    let mut report = ImportReport {
        source: source.to_string(),
        extracted: extraction.records.len(),
        issues: extraction.issues.clone(),
        dry_run: options.dry_run,
        ..Default::default()
    };
    let imported = extraction.into_collection();

    let collection = if options.merge {
        let canonical = PublicationCollection::load(publications)?;
        let outcome = merger.merge(&imported, &canonical);
        report.added = outcome.added_count();
        report.duplicates = outcome.duplicates.len();
        outcome.collection
    } else {
        report.added = imported.len();
        imported
    };
    report.summary = collection.summary();

    let changed = report.added > 0 || !options.merge;
    if changed && !options.dry_run {
        report.backup = persist(&collection, publications, options.backup)?;
        report.saved = true;
    }

    info!(
        source,
        extracted = report.extracted,
        added = report.added,
        duplicates = report.duplicates,
        saved = report.saved,
        "import finished"
    );
    Ok(report)
}

/// Imports a BibTeX bibliography.
pub fn import_bibliography(
    bibtex: &str,
    publications: &Path,
    options: &ImportOptions,
    merger: &Merger,
) -> Result<ImportReport> {
    let extraction = BibtexExtractor::new().extract(bibtex)?;
    import_extraction("BibTeX", extraction, publications, options, merger)
}

/// Imports the works of an ORCID profile.
///
/// # Errors
///
/// Fails before any request when `orcid` is not a valid iD, and when the
/// works summary cannot be fetched.
pub fn import_registry<S: WorksSource>(
    extractor: &RegistryExtractor<S>,
    orcid: &str,
    publications: &Path,
    options: &ImportOptions,
    merger: &Merger,
) -> Result<ImportReport> {
    let extraction = extractor.extract(orcid)?;
    import_extraction("ORCID", extraction, publications, options, merger)
}

/// Updates citation counts in the collection at `publications`.
///
/// `citations` are the records of a citation source (a Scholar page or a
/// CSV export). They are matched by title against the entries of the
/// `bibtex` bibliography, and every collection record carrying a matched
/// entry's citation key receives the source's count.
pub fn update_citations(
    citations: Extraction,
    bibtex: &str,
    publications: &Path,
    matcher: &Matcher,
    options: &ImportOptions,
) -> Result<CitationReport> {
    let bibliography = BibtexExtractor::new().extract(bibtex)?;
    let known = bibliography.publication_records();
    let found = citations.publication_records();
    info!(
        found = found.len(),
        bibliography = known.len(),
        "matching citation records"
    );

    let report = matcher.match_records(&found, &known);
    let mut collection = PublicationCollection::load(publications)?;
    let updates = apply_citation_counts(&mut collection, &report.matches);

    let citations_of = |record: &crate::PublicationRecord| u64::from(record.citations.unwrap_or(0));
    let mut issues = citations.issues;
    if !bibliography.issues.is_empty() {
        warn!(
            skipped = bibliography.issues.len(),
            "bibliography entries skipped"
        );
        issues.extend(bibliography.issues);
    }
    let mut result = CitationReport {
        found: found.len(),
        bibliography: known.len(),
        matched: report.matches.len(),
        unmatched: report
            .unmatched
            .iter()
            .map(|record| (record.title.clone(), record.citations.unwrap_or(0)))
            .collect(),
        total_citations: found.iter().map(citations_of).sum(),
        matched_citations: report.matches.iter().map(|m| citations_of(m.source)).sum(),
        issues,
        dry_run: options.dry_run,
        updates,
        ..Default::default()
    };

    if !result.updates.is_empty() && !options.dry_run {
        result.backup = persist(&collection, publications, options.backup)?;
        result.saved = true;
    }

    info!(
        matched = result.matched,
        updated = result.updates.len(),
        saved = result.saved,
        "citation update finished"
    );
    Ok(result)
}

fn persist(
    collection: &PublicationCollection,
    path: &Path,
    backup: bool,
) -> Result<Option<PathBuf>> {
    let backup_path = if backup {
        backup_collection(path)?
    } else {
        None
    };
    collection.save(path)?;
    Ok(backup_path)
}
