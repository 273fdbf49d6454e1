//! CSV citation exports.
//!
//! Reads spreadsheets exported from citation services (Google Scholar,
//! Publish or Perish, ...) with configurable column headers.
//!
//! # Example
//!
//! ```
//! use cvpubs::{CsvCitationExtractor, RecordExtractor};
//!
//! let input = "Title,Authors,Cites,Year\nDeep Models for Causal Inference,J Doe,42,2021";
//!
//! let extraction = CsvCitationExtractor::new().extract(input).unwrap();
//! assert_eq!(extraction.records[0].record.citations, Some(42));
//! ```

use csv::{ReaderBuilder, StringRecord};
use std::collections::HashMap;

use super::DEFAULT_MIN_TITLE_LENGTH;
use crate::utils::{extract_year, format_doi};
use crate::{
    ExtractedRecord, Extraction, ExtractionIssue, PublicationRecord, RecordExtractor, Result,
    SourceTag,
};

/// Default header mappings for common CSV column names
const DEFAULT_HEADERS: &[(&str, &[&str])] = &[
    ("title", &["title", "article title", "publication title"]),
    ("citations", &["citations", "cited by", "cites", "times cited"]),
    ("year", &["year", "publication year", "pub year"]),
    ("authors", &["author", "authors"]),
    ("venue", &["publication", "journal", "source", "venue"]),
    ("doi", &["doi"]),
];

/// Header mappings and dialect of a CSV citation export.
///
/// # Examples
///
/// ```
/// use cvpubs::citations::csv::CsvCitationConfig;
///
/// let mut config = CsvCitationConfig::new();
/// config.set_header_mapping("citations", vec!["Zitate".to_string()]);
/// config.set_delimiter(b';');
/// ```
#[derive(Debug, Clone)]
pub struct CsvCitationConfig {
    header_map: HashMap<String, Vec<String>>,
    delimiter: u8,
    min_title_length: usize,
}

impl CsvCitationConfig {
    /// Creates a configuration with the default headers, `,` as delimiter
    /// and the same minimum title length as the Scholar extractor.
    #[must_use]
    pub fn new() -> Self {
        let mut config = Self {
            header_map: HashMap::new(),
            delimiter: b',',
            min_title_length: DEFAULT_MIN_TITLE_LENGTH,
        };
        for (field, aliases) in DEFAULT_HEADERS {
            config.header_map.insert(
                field.to_string(),
                aliases.iter().map(|s| s.to_string()).collect(),
            );
        }
        config
    }

    /// Sets the accepted headers of a field
    pub fn set_header_mapping(&mut self, field: &str, aliases: Vec<String>) -> &mut Self {
        self.header_map.insert(field.to_string(), aliases);
        self
    }

    pub fn set_delimiter(&mut self, delimiter: u8) -> &mut Self {
        self.delimiter = delimiter;
        self
    }

    /// Rows whose title has fewer characters are reported and skipped.
    pub fn set_min_title_length(&mut self, min_title_length: usize) -> &mut Self {
        self.min_title_length = min_title_length;
        self
    }

    fn get_field_for_header(&self, header: &str) -> Option<&str> {
        let header_lower = header.trim().to_lowercase();
        self.header_map
            .iter()
            .find(|(_, aliases)| aliases.iter().any(|a| a.to_lowercase() == header_lower))
            .map(|(field, _)| field.as_str())
    }
}

impl Default for CsvCitationConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Extractor for CSV citation exports.
#[derive(Debug, Clone)]
pub struct CsvCitationExtractor {
    config: CsvCitationConfig,
}

impl Default for CsvCitationExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvCitationExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: CsvCitationConfig::new(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: CsvCitationConfig) -> Self {
        self.config = config;
        self
    }

    fn parse_row(&self, fields: &[Option<&str>], row: &StringRecord) -> PublicationRecord {
        let mut record = PublicationRecord {
            citations: Some(0),
            source: Some(SourceTag::CitationExport),
            ..Default::default()
        };

        for (field, value) in fields.iter().zip(row.iter()) {
            let value = value.trim();
            match field {
                Some("title") => record.title = value.to_string(),
                Some("citations") => {
                    let digits: String = value.chars().filter(char::is_ascii_digit).collect();
                    record.citations = Some(digits.parse().unwrap_or(0));
                }
                Some("year") => record.year = extract_year(value),
                Some("authors") => {
                    record.authors = value
                        .split([';', ','])
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect();
                }
                Some("venue") if !value.is_empty() => record.venue = Some(value.to_string()),
                Some("doi") => record.identifiers.doi = format_doi(value),
                _ => {}
            }
        }

        record
    }
}

impl RecordExtractor for CsvCitationExtractor {
    fn extract(&self, input: &str) -> Result<Extraction> {
        let mut reader = ReaderBuilder::new()
            .delimiter(self.config.delimiter)
            .flexible(true)
            .from_reader(input.as_bytes());

        let fields: Vec<Option<&str>> = reader
            .headers()?
            .iter()
            .map(|header| self.config.get_field_for_header(header))
            .collect();

        let mut extraction = Extraction::default();
        for result in reader.records() {
            let row = match result {
                Ok(row) => row,
                Err(err) => {
                    let line = err.position().map(|p| p.line() as usize).unwrap_or(0);
                    tracing::warn!(line, "skipping unreadable CSV row: {err}");
                    extraction
                        .issues
                        .push(ExtractionIssue::new(err.to_string()).at_line(line));
                    continue;
                }
            };
            let line = row.position().map(|p| p.line() as usize).unwrap_or(0);

            let record = self.parse_row(&fields, &row);
            if record.title.is_empty() {
                extraction.issues.push(ExtractionIssue::new("no title").at_line(line));
                continue;
            }
            if record.title.chars().count() < self.config.min_title_length {
                extraction.issues.push(
                    ExtractionIssue::new(format!(
                        "title '{}' shorter than {} characters",
                        record.title, self.config.min_title_length
                    ))
                    .at_line(line),
                );
                continue;
            }

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

    #[test]
    fn test_basic_csv() {
        let input = "\
Authors,Title,Publication,Cited by,Year
\"J Doe, R Roe\",Deep Models for Causal Inference,Journal of Things,\"1,024\",2021
A Smith,Another Paper,,,
";

        let extraction = CsvCitationExtractor::new().extract(input).unwrap();
        assert!(extraction.issues.is_empty());
        assert_eq!(extraction.records.len(), 2);

        let first = &extraction.records[0].record;
        assert_eq!(first.title, "Deep Models for Causal Inference");
        assert_eq!(first.authors, vec!["J Doe", "R Roe"]);
        assert_eq!(first.venue.as_deref(), Some("Journal of Things"));
        assert_eq!(first.citations, Some(1024));
        assert_eq!(first.year, Some(2021));
        assert_eq!(first.source, Some(SourceTag::CitationExport));
        assert_eq!(extraction.records[0].category, None);

        let second = &extraction.records[1].record;
        assert_eq!(second.citations, Some(0));
        assert_eq!(second.year, None);
        assert_eq!(second.venue, None);
    }

    #[test]
    fn test_custom_headers_and_delimiter() {
        let input = "Titel;Zitate\nTiefe Modelle;17\n;3\nKurz;1";

        let mut config = CsvCitationConfig::new();
        config
            .set_header_mapping("title", vec!["Titel".to_string()])
            .set_header_mapping("citations", vec!["Zitate".to_string()])
            .set_delimiter(b';')
            .set_min_title_length(5);

        let extraction = CsvCitationExtractor::new()
            .with_config(config)
            .extract(input)
            .unwrap();
        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.records[0].record.title, "Tiefe Modelle");
        assert_eq!(extraction.records[0].record.citations, Some(17));

        let issues: Vec<_> = extraction.issues.iter().map(|i| i.to_string()).collect();
        assert_eq!(
            issues,
            vec![
                "line 3: no title",
                "line 4: title 'Kurz' shorter than 5 characters"
            ]
        );
    }

    #[test]
    fn test_short_titles_skipped_by_default() {
        let input = "Title,Cites
Preface,4
A Proper Paper Title,9
";

        let extraction = CsvCitationExtractor::new().extract(input).unwrap();
        let titles: Vec<_> = extraction.records.iter().map(|r| r.record.title.as_str()).collect();
        assert_eq!(titles, vec!["A Proper Paper Title"]);

        let issues: Vec<_> = extraction.issues.iter().map(|i| i.to_string()).collect();
        assert_eq!(
            issues,
            vec![format!(
                "line 2: title 'Preface' shorter than {DEFAULT_MIN_TITLE_LENGTH} characters"
            )]
        );
        assert_eq!(
            CsvCitationConfig::default().min_title_length,
            crate::citations::ScholarMarkers::default().min_title_length
        );
    }
}
