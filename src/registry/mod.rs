//! ORCID registry import and sync.
//!
//! [`RegistryExtractor`] imports the works of a public profile: it reads the
//! works summary, fetches the latest version of every work and converts it
//! to a record. [`sync_to_registry`] goes the other way and posts the
//! publications missing from a profile, using a token from the
//! [`TokenStore`].
//!
//! Both depend on the registry only through [`WorksSource`] and
//! [`WorksSink`]; with the `orcid` feature, [`HttpRegistryClient`] provides
//! them over HTTP.
//!
//! # Example
//!
//! ```
//! use cvpubs::registry::{Work, WorksSource, WorksSummary};
//! use cvpubs::{Category, OrcidId, RecordExtractor, RegistryError, RegistryExtractor};
//!
//! struct Canned;
//!
//! impl WorksSource for Canned {
//!     fn works_summary(&self, _id: &OrcidId) -> Result<WorksSummary, RegistryError> {
//!         Ok(serde_json::from_str(r#"{"group": [{"work-summary": [{"put-code": 1}]}]}"#)?)
//!     }
//!
//!     fn work_detail(&self, _id: &OrcidId, _put_code: u64) -> Result<Work, RegistryError> {
//!         Ok(serde_json::from_str(
//!             r#"{"title": {"title": {"value": "A Paper"}}, "type": "journal-article"}"#,
//!         )?)
//!     }
//! }
//!
//! let extraction = RegistryExtractor::new(Canned)
//!     .extract("https://orcid.org/0000-0002-1825-0097")
//!     .unwrap();
//! assert_eq!(extraction.records[0].record.title, "A Paper");
//! assert_eq!(extraction.records[0].category, Some(Category::JournalPapers));
//! ```

mod client;
mod id;
mod sync;
mod token;
mod work;

#[cfg(feature = "orcid")]
pub use client::HttpRegistryClient;
pub use client::{RegistryEnvironment, WorksSink, WorksSource};
pub use id::OrcidId;
pub use sync::{PostedWork, SyncReport, sync_to_registry};
pub use token::{StoredToken, TokenStore};
pub use work::{
    Work, WorksSummary, category_for_work_type, publication_to_work, work_type_for_category,
};

use crate::{ExtractedRecord, Extraction, ExtractionIssue, RecordExtractor, Result};
use tracing::{debug, info, warn};

/// Extractor for the works of an ORCID profile.
///
/// The input of [`extract`](RecordExtractor::extract) is the ORCID iD, in
/// any form [`OrcidId::parse`] accepts.
#[derive(Debug, Clone)]
pub struct RegistryExtractor<S> {
    source: S,
}

impl<S: WorksSource> RegistryExtractor<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// Imports every work of the profile of `id`.
    ///
    /// # Errors
    ///
    /// Fails only when the works summary cannot be fetched. A work whose
    /// detail cannot be fetched, or that has no title, is reported in
    /// [`Extraction::issues`].
    pub fn extract_profile(&self, id: &OrcidId) -> Result<Extraction> {
        let summary = self.source.works_summary(id)?;
        info!(%id, works = summary.group.len(), "fetched works summary");

        let mut extraction = Extraction::default();
        for (index, put_code) in summary.latest_put_codes().enumerate() {
            let Some(put_code) = put_code else {
                extraction.issues.push(
                    ExtractionIssue::new("work summary without put-code")
                        .for_item(format!("group {}", index + 1)),
                );
                continue;
            };
            let item = format!("work {put_code}");

            let work = match self.source.work_detail(id, put_code) {
                Ok(work) => work,
                Err(err) => {
                    warn!(put_code, "could not fetch work: {err}");
                    extraction
                        .issues
                        .push(ExtractionIssue::new(err.to_string()).for_item(item));
                    continue;
                }
            };

            match ExtractedRecord::try_from(work) {
                Ok(record) => extraction.records.push(record),
                Err(err) => {
                    debug!(put_code, "skipping work: {err}");
                    extraction
                        .issues
                        .push(ExtractionIssue::new(err.to_string()).for_item(item));
                }
            }
        }

        info!(
            records = extraction.records.len(),
            issues = extraction.issues.len(),
            "imported ORCID works"
        );
        Ok(extraction)
    }
}

impl<S: WorksSource> RecordExtractor for RegistryExtractor<S> {
    /// Validates the iD before any request is made.
    fn extract(&self, input: &str) -> Result<Extraction> {
        let id = OrcidId::parse(input)?;
        self.extract_profile(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Category, Error, RegistryError};
    use pretty_assertions::assert_eq;
    use std::cell::Cell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakeSource {
        summary: Option<&'static str>,
        works: HashMap<u64, &'static str>,
        calls: Cell<usize>,
    }

    impl WorksSource for FakeSource {
        fn works_summary(&self, _id: &OrcidId) -> std::result::Result<WorksSummary, RegistryError> {
            self.calls.set(self.calls.get() + 1);
            match self.summary {
                Some(json) => Ok(serde_json::from_str(json)?),
                None => Err(RegistryError::Api {
                    status: 500,
                    message: "down".to_string(),
                }),
            }
        }

        fn work_detail(&self, _id: &OrcidId, put_code: u64) -> std::result::Result<Work, RegistryError> {
            self.calls.set(self.calls.get() + 1);
            match self.works.get(&put_code) {
                Some(json) => Ok(serde_json::from_str(json)?),
                None => Err(RegistryError::Api {
                    status: 404,
                    message: "Not Found".to_string(),
                }),
            }
        }
    }

    const SUMMARY: &str = r#"{"group": [
        {"work-summary": [
            {"put-code": 10, "last-modified-date": {"value": 1}},
            {"put-code": 11, "last-modified-date": {"value": 2}}
        ]},
        {"work-summary": [{"put-code": 20}]},
        {"work-summary": [{"put-code": 30}]},
        {"work-summary": [{"put-code": 40}]}
    ]}"#;

    fn source() -> FakeSource {
        FakeSource {
            summary: Some(SUMMARY),
            works: HashMap::from([
                (
                    11,
                    r#"{"put-code": 11, "title": {"title": {"value": "Journal Work"}},
                        "type": "journal-article", "publication-date": {"year": {"value": "2020"}}}"#,
                ),
                (
                    10,
                    r#"{"put-code": 10, "title": {"title": {"value": "Stale Version"}}}"#,
                ),
                (
                    20,
                    r#"{"put-code": 20, "title": {"title": {"value": "Talk"}},
                        "type": "conference-paper", "publication-date": {"year": {"value": "2022"}}}"#,
                ),
                (40, r#"{"put-code": 40, "title": null, "type": "preprint"}"#),
            ]),
            calls: Cell::new(0),
        }
    }

    #[test]
    fn test_extract_profile() {
        let extraction = RegistryExtractor::new(source())
            .extract("0000-0002-1825-0097")
            .unwrap();

        let records: Vec<_> = extraction
            .records
            .iter()
            .map(|r| (r.record.title.as_str(), r.category, r.record.identifiers.put_code))
            .collect();
        assert_eq!(
            records,
            vec![
                ("Journal Work", Some(Category::JournalPapers), Some(11)),
                ("Talk", Some(Category::ConferencePapers), Some(20)),
            ]
        );

        let issues: Vec<_> = extraction.issues.iter().map(|i| i.to_string()).collect();
        assert_eq!(
            issues,
            vec![
                "work 30: API error (status 404): Not Found",
                "work 40: Missing required field: title",
            ]
        );

        let collection = extraction.into_collection();
        assert_eq!(collection.len(), 2);
    }

    #[test]
    fn test_invalid_id_makes_no_request() {
        let fake = source();
        let extractor = RegistryExtractor::new(&fake);
        assert!(matches!(
            extractor.extract("not-an-orcid"),
            Err(Error::InvalidIdentifier(_))
        ));
        assert_eq!(fake.calls.get(), 0);
    }

    #[test]
    fn test_summary_failure_is_fatal() {
        let fake = FakeSource::default();
        let result = RegistryExtractor::new(fake).extract("0000-0002-1825-0097");
        assert!(matches!(
            result,
            Err(Error::Registry(RegistryError::Api { status: 500, .. }))
        ));
    }
}
