//! Citation-count extractors.
//!
//! A citation export lists papers with the number of times each was cited,
//! but carries no category: records extracted here are only used to update
//! the `citations` field of records already in the collection (see
//! [`apply_citation_counts`]).
//!
//! # Google Scholar profile pages
//!
//! [`ScholarHtmlExtractor`] reads a saved profile page. Each paper is a table
//! row; the title, citation count and year are picked out of the row with
//! regular expressions rather than a full HTML parse.
//!
//! ```
//! use cvpubs::{RecordExtractor, ScholarHtmlExtractor};
//!
//! let page = r#"<table><tr class="gsc_a_tr">
//!   <td><a href="/x" class="gsc_a_at">Deep Models for Causal Inference</a></td>
//!   <td class="gsc_a_c"><a href="/c" class="gsc_a_ac gs_ibl">42</a></td>
//!   <td class="gsc_a_y"><span class="gsc_a_h gsc_a_hc gs_ibl">2021</span></td>
//! </tr></table>"#;
//!
//! let extraction = ScholarHtmlExtractor::new().extract(page).unwrap();
//! let record = &extraction.records[0].record;
//! assert_eq!(record.citations, Some(42));
//! assert_eq!(record.year, Some(2021));
//! ```

#[cfg(feature = "csv")]
pub mod csv;
mod update;

pub use update::{CitationDelta, apply_citation_counts};

use crate::regex::Regex;
use crate::utils::{strip_tags, unescape_html};
use crate::{
    Error, ExtractedRecord, Extraction, ExtractionIssue, PublicationRecord, RecordExtractor,
    Result, SourceTag,
};
use std::sync::LazyLock;
use tracing::{debug, info};

/// Default minimum title length; shorter titles are layout noise.
pub const DEFAULT_MIN_TITLE_LENGTH: usize = 10;

/// Patterns locating papers in a citation-export page.
///
/// Each pattern is a regular expression whose first capture group is the
/// value of interest. Citation and year patterns are tried in order; the
/// first one that matches wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScholarMarkers {
    /// One match per paper; group 1 is the body of the row.
    pub row: String,
    /// Group 1 is the title markup.
    pub title: String,
    pub citation_patterns: Vec<String>,
    pub year_patterns: Vec<String>,
    /// Rows whose title has fewer characters are dropped.
    pub min_title_length: usize,
}

impl Default for ScholarMarkers {
    fn default() -> Self {
        Self {
            row: r#"(?is)<tr class="gsc_a_tr"[^>]*>(.*?)</tr>"#.to_string(),
            title: r#"(?is)<a[^>]*class="gsc_a_at"[^>]*>(.*?)</a>"#.to_string(),
            citation_patterns: vec![
                r#"(?i)<a[^>]*class="gsc_a_ac[^"]*"[^>]*>(\d+)</a>"#.to_string(),
                r#"(?i)<td[^>]*class="gsc_a_c[^"]*"[^>]*>.*?(\d+).*?</td>"#.to_string(),
            ],
            year_patterns: vec![
                r#"(?i)<span[^>]*class="gsc_a_h[^"]*"[^>]*>.*?((?:19|20)\d{2}).*?</span>"#
                    .to_string(),
                r#"(?i)<td[^>]*class="gsc_a_y[^"]*"[^>]*>((?:19|20)\d{2})</td>"#.to_string(),
            ],
            min_title_length: DEFAULT_MIN_TITLE_LENGTH,
        }
    }
}

#[derive(Debug, Clone)]
struct CompiledMarkers {
    row: Regex,
    title: Regex,
    citations: Vec<Regex>,
    years: Vec<Regex>,
    min_title_length: usize,
}

impl CompiledMarkers {
    fn compile(markers: &ScholarMarkers) -> Result<Self> {
        let compile = |field: &str, pattern: &str| {
            Regex::new(pattern).map_err(|e| Error::InvalidSetting {
                field: field.to_string(),
                message: e.to_string(),
            })
        };
        Ok(Self {
            row: compile("row", &markers.row)?,
            title: compile("title", &markers.title)?,
            citations: markers
                .citation_patterns
                .iter()
                .map(|p| compile("citation_patterns", p))
                .collect::<Result<_>>()?,
            years: markers
                .year_patterns
                .iter()
                .map(|p| compile("year_patterns", p))
                .collect::<Result<_>>()?,
            min_title_length: markers.min_title_length,
        })
    }
}

static DEFAULT_MARKERS: LazyLock<CompiledMarkers> =
    LazyLock::new(|| CompiledMarkers::compile(&ScholarMarkers::default()).unwrap());

fn first_capture<T: std::str::FromStr>(patterns: &[Regex], text: &str) -> Option<T> {
    patterns
        .iter()
        .filter_map(|pattern| pattern.captures(text))
        .find_map(|caps| caps.get(1).and_then(|m| m.as_str().parse().ok()))
}

/// Extractor for saved Google Scholar profile pages.
#[derive(Debug, Clone)]
pub struct ScholarHtmlExtractor {
    markers: CompiledMarkers,
}

impl Default for ScholarHtmlExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl ScholarHtmlExtractor {
    /// Creates an extractor with the default Google Scholar markers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            markers: DEFAULT_MARKERS.clone(),
        }
    }

    /// Creates an extractor with custom markers.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSetting`] when a pattern is not a valid
    /// regular expression.
    pub fn with_markers(markers: &ScholarMarkers) -> Result<Self> {
        Ok(Self {
            markers: CompiledMarkers::compile(markers)?,
        })
    }
}

impl RecordExtractor for ScholarHtmlExtractor {
    fn extract(&self, input: &str) -> Result<Extraction> {
        let mut extraction = Extraction::default();
        let rows: Vec<&str> = self
            .markers
            .row
            .captures_iter(input)
            .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
            .collect();
        info!(rows = rows.len(), "found candidate paper rows");

        for (index, row) in rows.into_iter().enumerate() {
            let item = format!("row {}", index + 1);
            let Some(raw_title) = self.markers.title.captures(row).and_then(|c| c.get(1)) else {
                debug!(%item, "row without a title link");
                extraction
                    .issues
                    .push(ExtractionIssue::new("no title").for_item(item));
                continue;
            };

            let title = unescape_html(&strip_tags(raw_title.as_str())).trim().to_string();
            if title.chars().count() < self.markers.min_title_length {
                debug!(%item, %title, "title too short");
                extraction.issues.push(
                    ExtractionIssue::new(format!(
                        "title '{title}' shorter than {} characters",
                        self.markers.min_title_length
                    ))
                    .for_item(item),
                );
                continue;
            }

            let record = PublicationRecord {
                title,
                year: first_capture(&self.markers.years, row),
                citations: Some(first_capture(&self.markers.citations, row).unwrap_or(0)),
                source: Some(SourceTag::CitationExport),
                ..Default::default()
            };
            extraction.records.push(ExtractedRecord {
                record,
                category: None,
            });
        }

        Ok(extraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PAGE: &str = r#"<html><body><table id="gsc_a_t"><tbody>
<tr class="gsc_a_tr"><td class="gsc_a_t"><a href="/citations?x=1" class="gsc_a_at">Deep Models for <b>Causal</b> Inference</a>
<div class="gs_gray">J Doe, R Roe</div></td>
<td class="gsc_a_c"><a href="/scholar?cites=1" class="gsc_a_ac gs_ibl">128</a></td>
<td class="gsc_a_y"><span class="gsc_a_h gsc_a_hc gs_ibl">2021</span></td></tr>
<tr class="gsc_a_tr"><td class="gsc_a_t"><a href="/citations?x=2" class="gsc_a_at">Tom &amp; Jerry&#39;s Causal Graphs</a></td>
<td class="gsc_a_c"><span>cited 7 times</span></td>
<td class="gsc_a_y">2019</td></tr>
<tr class="gsc_a_tr"><td class="gsc_a_t"><a class="gsc_a_at">Short</a></td></tr>
<tr class="gsc_a_tr"><td class="gsc_a_t">no link here</td></tr>
<tr class="gsc_a_tr"><td class="gsc_a_t"><a class="gsc_a_at">An Uncited Working Paper</a></td>
<td class="gsc_a_c"><a class="gsc_a_ac gs_ibl"></a></td></tr>
</tbody></table></body></html>"#;

    #[test]
    fn test_extract_rows() {
        let extraction = ScholarHtmlExtractor::new().extract(PAGE).unwrap();

        let records: Vec<_> = extraction
            .records
            .iter()
            .map(|r| (r.record.title.as_str(), r.record.citations, r.record.year))
            .collect();
        assert_eq!(
            records,
            vec![
                ("Deep Models for Causal Inference", Some(128), Some(2021)),
                ("Tom & Jerry's Causal Graphs", Some(7), Some(2019)),
                ("An Uncited Working Paper", Some(0), None),
            ]
        );
        assert!(extraction.records.iter().all(|r| r.category.is_none()
            && r.record.source == Some(SourceTag::CitationExport)));

        let issues: Vec<_> = extraction.issues.iter().map(|i| i.to_string()).collect();
        assert_eq!(
            issues,
            vec![
                "row 3: title 'Short' shorter than 10 characters",
                "row 4: no title",
            ]
        );
    }

    #[test]
    fn test_named_entities_match_accented_bibtex() {
        let row = r#"<tr class="gsc_a_tr"><a class="gsc_a_at">Caf&eacute; Society Networks in M&uuml;nchen</a><td class="gsc_a_c">12</td></tr>"#;
        let scholar = ScholarHtmlExtractor::new().extract(row).unwrap();
        assert_eq!(
            scholar.records[0].record.title,
            "Café Society Networks in München"
        );

        let bib = r#"@article{cafe, title = {Caf\'e Society Networks in M\"unchen}}"#;
        let known = crate::BibtexExtractor::new()
            .extract(bib)
            .unwrap()
            .publication_records();
        let found = scholar.publication_records();

        let report = crate::Matcher::new().match_records(&found, &known);
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches[0].score, 1.0);
        assert_eq!(report.matches[0].canonical.key(), Some("cafe"));
    }

    #[test]
    fn test_year_cell_fallback() {
        let row = r#"<tr class="gsc_a_tr"><a class="gsc_a_at">A Sufficiently Long Title</a><td class="gsc_a_y">1998</td></tr>"#;
        let extraction = ScholarHtmlExtractor::new().extract(row).unwrap();
        assert_eq!(extraction.records[0].record.year, Some(1998));
    }

    #[test]
    fn test_custom_markers() {
        let markers = ScholarMarkers {
            row: r"(?s)<li>(.*?)</li>".to_string(),
            title: r"<b>(.*?)</b>".to_string(),
            citation_patterns: vec![r"cites: (\d+)".to_string()],
            year_patterns: Vec::new(),
            min_title_length: 3,
        };
        let extractor = ScholarHtmlExtractor::with_markers(&markers).unwrap();
        let extraction = extractor
            .extract("<ul><li><b>Abc</b> cites: 9</li><li><b>No</b></li></ul>")
            .unwrap();
        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.records[0].record.citations, Some(9));
        assert_eq!(extraction.issues.len(), 1);

        let broken = ScholarMarkers {
            row: "(unclosed".to_string(),
            ..ScholarMarkers::default()
        };
        assert!(matches!(
            ScholarHtmlExtractor::with_markers(&broken),
            Err(Error::InvalidSetting { field, .. }) if field == "row"
        ));
    }

    #[test]
    fn test_no_rows() {
        let extraction = ScholarHtmlExtractor::new().extract("<html></html>").unwrap();
        assert!(extraction.records.is_empty());
        assert!(extraction.issues.is_empty());
    }
}
