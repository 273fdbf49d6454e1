//! Cross-source record matching.
//!
//! Pairs freshly extracted records with the records of the canonical
//! bibliography by title.
//!
//! ## Algorithm
//!
//! For each new record, in input order:
//!
//! 1. A known record whose normalized title is equal wins outright with a
//!    score of `1.0`.
//! 2. Otherwise every known record is scored with
//!    [`similarity`](crate::similarity::similarity); the best score wins if
//!    it is strictly greater than the threshold. On ties the first known
//!    record wins.
//!
//! Records that match nothing are returned in [`MatchReport::unmatched`].
//!
//! ## Usage
//!
//! ```rust
//! use cvpubs::{Matcher, MatcherConfig, PublicationRecord};
//!
//! let known = vec![PublicationRecord::new("Deep Models for Causal Inference")];
//! let new = vec![
//!     PublicationRecord::new("deep models for  causal inference"),
//!     PublicationRecord::new("Something Else Entirely"),
//! ];
//!
//! let matcher = Matcher::new().with_config(MatcherConfig::default().with_threshold(0.8));
//! let report = matcher.match_records(&new, &known);
//!
//! assert_eq!(report.matches.len(), 1);
//! assert_eq!(report.matches[0].score, 1.0);
//! assert_eq!(report.unmatched.len(), 1);
//! ```

use crate::similarity::similarity;
use crate::{PublicationRecord, SourceTag};
use tracing::debug;

/// Default similarity a fuzzy match has to exceed.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

/// Configuration of the [`Matcher`].
#[derive(Debug, Clone, PartialEq)]
pub struct MatcherConfig {
    /// A fuzzy match is accepted only when its score is strictly greater
    /// than this value.
    pub similarity_threshold: f64,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

impl MatcherConfig {
    #[must_use]
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }
}

/// A new record paired with the known record it was matched to.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult<'a> {
    pub source: &'a PublicationRecord,
    pub canonical: &'a PublicationRecord,
    /// `1.0` for exact title matches, the similarity otherwise.
    pub score: f64,
    /// Extractor that produced `source`, if known.
    pub source_tag: Option<SourceTag>,
}

/// Outcome of [`Matcher::match_records`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchReport<'a> {
    /// Matches, in the order of the new records.
    pub matches: Vec<MatchResult<'a>>,
    /// New records that matched nothing, in input order.
    pub unmatched: Vec<&'a PublicationRecord>,
}

#[derive(Debug)]
struct PreprocessedRecord<'a> {
    original: &'a PublicationRecord,
    normalized_title: String,
}

impl<'a> PreprocessedRecord<'a> {
    fn new(original: &'a PublicationRecord) -> Self {
        Self {
            original,
            normalized_title: original.normalized_title(),
        }
    }
}

/// Title matcher between new and known records.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    config: MatcherConfig,
}

impl Matcher {
    /// Creates a matcher with the default threshold of `0.7`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(mut self, config: MatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    /// Matches every new record against the known records.
    ///
    /// Records with an empty normalized title never match.
    pub fn match_records<'a>(
        &self,
        new: &'a [PublicationRecord],
        known: &'a [PublicationRecord],
    ) -> MatchReport<'a> {
        let known: Vec<PreprocessedRecord<'a>> = known.iter().map(PreprocessedRecord::new).collect();
        let mut report = MatchReport::default();

        for record in new {
            let candidate = PreprocessedRecord::new(record);
            match self.best_match(&candidate, &known) {
                Some((canonical, score)) => {
                    debug!(
                        title = %record.title,
                        canonical = %canonical.title,
                        score,
                        "matched record"
                    );
                    report.matches.push(MatchResult {
                        source: record,
                        canonical,
                        score,
                        source_tag: record.source,
                    });
                }
                None => {
                    debug!(title = %record.title, "no match");
                    report.unmatched.push(record);
                }
            }
        }

        report
    }

    fn best_match<'a>(
        &self,
        candidate: &PreprocessedRecord<'_>,
        known: &[PreprocessedRecord<'a>],
    ) -> Option<(&'a PublicationRecord, f64)> {
        if candidate.normalized_title.is_empty() {
            return None;
        }

        if let Some(exact) = known
            .iter()
            .find(|k| k.normalized_title == candidate.normalized_title)
        {
            return Some((exact.original, 1.0));
        }

        let mut best: Option<(&'a PublicationRecord, f64)> = None;
        for other in known.iter().filter(|k| !k.normalized_title.is_empty()) {
            let score = similarity(&candidate.normalized_title, &other.normalized_title);
            let best_score = best.map_or(0.0, |(_, s)| s);
            if score > self.config.similarity_threshold && score > best_score {
                best = Some((other.original, score));
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn records(titles: &[&str]) -> Vec<PublicationRecord> {
        titles.iter().map(|t| PublicationRecord::new(*t)).collect()
    }

    #[rstest]
    #[case(0.0)]
    #[case(0.7)]
    #[case(1.0)]
    fn test_exact_match_ignores_threshold(#[case] threshold: f64) {
        let known = records(&["Other Paper", "Deep Models for Causal Inference"]);
        let new = records(&["deep  models for causal\ninference"]);

        let matcher = Matcher::new().with_config(MatcherConfig::default().with_threshold(threshold));
        let report = matcher.match_records(&new, &known);

        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches[0].score, 1.0);
        assert_eq!(report.matches[0].canonical.title, "Deep Models for Causal Inference");
        assert!(report.unmatched.is_empty());
    }

    #[test]
    fn test_below_threshold_is_unmatched() {
        let known = records(&["Fast Bayesian Optimization"]);
        let new = records(&["Fast Bayesian Search"]);
        let score = similarity("fast bayesian search", "fast bayesian optimization");
        assert!(score > 0.6 && score < 0.7, "score was {score}");

        let report = Matcher::new().match_records(&new, &known);
        assert!(report.matches.is_empty());
        assert_eq!(report.unmatched.len(), 1);
        assert_eq!(report.unmatched[0].title, "Fast Bayesian Search");
    }

    #[test]
    fn test_threshold_is_strict() {
        let known = records(&["Robust Learning of Dense Graphs"]);
        let new = records(&["Robust Estimation of Sparse Graphs"]);
        let score = similarity(
            "robust estimation of sparse graphs",
            "robust learning of dense graphs",
        );

        let report = Matcher::new().match_records(&new, &known);
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches[0].score, score);

        let at_score = Matcher::new().with_config(MatcherConfig::default().with_threshold(score));
        assert!(at_score.match_records(&new, &known).matches.is_empty());
    }

    #[test]
    fn test_best_candidate_wins() {
        let known = records(&[
            "Deep Networks for Causal Discovery",
            "Shallow Models for Causal Inference",
        ]);
        let mut new = records(&["Deep Models for Causal Inference"]);
        new[0].source = Some(SourceTag::CitationExport);

        let report = Matcher::new().match_records(&new, &known);
        assert_eq!(report.matches.len(), 1);
        assert_eq!(
            report.matches[0].canonical.title,
            "Shallow Models for Causal Inference"
        );
        assert_eq!(report.matches[0].source_tag, Some(SourceTag::CitationExport));
    }

    #[test]
    fn test_empty_titles_never_match() {
        let known = records(&["", "{}"]);
        let new = records(&["", "   "]);
        let report = Matcher::new().match_records(&new, &known);
        assert!(report.matches.is_empty());
        assert_eq!(report.unmatched.len(), 2);
    }
}
