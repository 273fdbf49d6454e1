use crate::normalize::normalize;
use crate::registry::client::{WorksSink, WorksSource};
use crate::registry::token::TokenStore;
use crate::registry::work::publication_to_work;
use crate::registry::OrcidId;
use crate::utils::doi_key;
use crate::{Category, PublicationCollection, Result};
use std::collections::HashSet;
use std::fmt;
use tracing::{info, warn};

/// A work that was (or in a dry run, would have been) posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedWork {
    pub title: String,
    pub work_type: String,
    /// Put-code assigned by the registry, when it reported one.
    pub put_code: Option<u64>,
    pub dry_run: bool,
}

/// Outcome of [`sync_to_registry`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub posted: usize,
    /// Publications already on the profile.
    pub skipped: usize,
    pub errors: Vec<String>,
    pub posted_works: Vec<PostedWork>,
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ORCID Sync Summary")?;
        writeln!(f, "==================")?;
        writeln!(f, "Posted: {}", self.posted)?;
        writeln!(f, "Skipped (already on profile): {}", self.skipped)?;
        writeln!(f, "Errors: {}", self.errors.len())?;
        for work in &self.posted_works {
            let marker = if work.dry_run { " [DRY RUN]" } else { "" };
            writeln!(f, "  + {} ({}){marker}", work.title, work.work_type)?;
        }
        for error in &self.errors {
            writeln!(f, "  ! {error}")?;
        }
        Ok(())
    }
}

/// Posts every publication of the collection that is not yet on the
/// profile of `id`.
///
/// A publication is already on the profile when a work there has the same
/// normalized title or the same DOI. Failing to read the profile, or to post
/// one work, is recorded in [`SyncReport::errors`] and the sync goes on. In
/// a dry run nothing is posted but the report lists what would have been.
///
/// # Errors
///
/// [`RegistryError::MissingToken`](crate::RegistryError::MissingToken) when
/// no token is stored for `id`; nothing is sent in that case.
pub fn sync_to_registry<S, K>(
    source: &S,
    sink: &K,
    tokens: &TokenStore,
    id: &OrcidId,
    collection: &PublicationCollection,
    dry_run: bool,
) -> Result<SyncReport>
where
    S: WorksSource + ?Sized,
    K: WorksSink + ?Sized,
{
    let access_token = tokens.access_token(id)?;
    let mut report = SyncReport::default();

    let mut existing_titles = HashSet::new();
    let mut existing_dois = HashSet::new();
    match source.works_summary(id) {
        Ok(summary) => {
            for work in summary.summaries() {
                if let Some(title) = work.title() {
                    existing_titles.insert(normalize(title));
                }
                if let Some(doi) = doi_key(work.doi().as_deref()) {
                    existing_dois.insert(doi);
                }
            }
        }
        Err(err) => {
            warn!(%id, "could not read existing works: {err}");
            report.errors.push(format!("Error fetching existing works: {err}"));
        }
    }

    for (name, entries) in collection.categories() {
        let category = name.parse::<Category>().ok();
        for record in entries.records() {
            let title = record.normalized_title();
            let doi = doi_key(record.doi());
            if title.is_empty()
                || existing_titles.contains(&title)
                || doi.as_ref().is_some_and(|doi| existing_dois.contains(doi))
            {
                report.skipped += 1;
                continue;
            }

            let work = publication_to_work(record, category);
            let work_type = work.work_type.clone().unwrap_or_default();

            let put_code = if dry_run {
                None
            } else {
                match sink.post_work(id, access_token, &work) {
                    Ok(put_code) => put_code,
                    Err(err) => {
                        warn!(title = %record.title, "could not post work: {err}");
                        report
                            .errors
                            .push(format!("Error posting '{}': {err}", record.title));
                        continue;
                    }
                }
            };

            report.posted += 1;
            report.posted_works.push(PostedWork {
                title: record.title.clone(),
                work_type,
                put_code,
                dry_run,
            });
            existing_titles.insert(title);
            if let Some(doi) = doi {
                existing_dois.insert(doi);
            }
        }
    }

    info!(
        posted = report.posted,
        skipped = report.skipped,
        errors = report.errors.len(),
        dry_run,
        "synced publications to ORCID"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::token::StoredToken;
    use crate::registry::work::{Work, WorksSummary};
    use crate::{PublicationRecord, RegistryError};
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    struct FakeRegistry {
        summary: std::result::Result<WorksSummary, u16>,
        posted: RefCell<Vec<Work>>,
        reject: Option<&'static str>,
    }

    impl FakeRegistry {
        fn with_titles(titles: &[&str]) -> Self {
            let groups: Vec<String> = titles
                .iter()
                .enumerate()
                .map(|(i, title)| {
                    format!(
                        r#"{{"work-summary": [{{"put-code": {i}, "title": {{"title": {{"value": "{title}"}}}},
                        "external-ids": {{"external-id": [{{"external-id-type": "doi", "external-id-value": "10.1/{i}"}}]}}}}]}}"#
                    )
                })
                .collect();
            let json = format!(r#"{{"group": [{}]}}"#, groups.join(","));
            Self {
                summary: Ok(serde_json::from_str(&json).unwrap()),
                posted: RefCell::new(Vec::new()),
                reject: None,
            }
        }
    }

    impl WorksSource for FakeRegistry {
        fn works_summary(&self, _id: &OrcidId) -> std::result::Result<WorksSummary, RegistryError> {
            self.summary.clone().map_err(|status| RegistryError::Api {
                status,
                message: "unavailable".to_string(),
            })
        }

        fn work_detail(&self, _id: &OrcidId, put_code: u64) -> std::result::Result<Work, RegistryError> {
            Err(RegistryError::Api {
                status: 404,
                message: format!("no work {put_code}"),
            })
        }
    }

    impl WorksSink for FakeRegistry {
        fn post_work(
            &self,
            _id: &OrcidId,
            access_token: &str,
            work: &Work,
        ) -> std::result::Result<Option<u64>, RegistryError> {
            assert_eq!(access_token, "secret-token");
            let title = work
                .title
                .as_ref()
                .and_then(|t| t.title.as_ref())
                .and_then(|v| v.value.clone())
                .unwrap_or_default();
            if self.reject == Some(title.as_str()) {
                return Err(RegistryError::Api {
                    status: 409,
                    message: "conflict".to_string(),
                });
            }
            self.posted.borrow_mut().push(work.clone());
            Ok(Some(1000 + self.posted.borrow().len() as u64))
        }
    }

    fn id() -> OrcidId {
        OrcidId::parse("0000-0002-1825-0097").unwrap()
    }

    fn tokens() -> TokenStore {
        let mut store = TokenStore::in_memory();
        store.insert(&id(), StoredToken::new("secret-token")).unwrap();
        store
    }

    fn collection() -> PublicationCollection {
        let mut collection = PublicationCollection::new();
        collection.push(Category::JournalPapers, None, PublicationRecord::new("Already There"));
        let mut by_doi = PublicationRecord::new("Renamed Paper");
        by_doi.identifiers.doi = Some("10.1/1".to_string());
        collection.push(Category::JournalPapers, None, by_doi);
        collection.push(Category::ConferencePapers, Some(2022), PublicationRecord::new("New Talk"));
        collection.push(Category::Preprints, None, PublicationRecord::new("new  talk"));
        collection.push(Category::UnderReview, None, PublicationRecord::new("Submitted"));
        collection
    }

    #[test]
    fn test_sync_posts_missing_works() {
        let registry = FakeRegistry::with_titles(&["Already there", "Other"]);
        let report =
            sync_to_registry(&registry, &registry, &tokens(), &id(), &collection(), false).unwrap();

        assert_eq!(report.posted, 2);
        assert_eq!(report.skipped, 3);
        assert!(report.errors.is_empty());
        let posted: Vec<_> = report
            .posted_works
            .iter()
            .map(|w| (w.title.as_str(), w.work_type.as_str(), w.put_code))
            .collect();
        assert_eq!(
            posted,
            vec![
                ("New Talk", "conference-paper", Some(1001)),
                ("Submitted", "working-paper", Some(1002)),
            ]
        );
        assert_eq!(registry.posted.borrow().len(), 2);
    }

    #[test]
    fn test_dry_run_posts_nothing() {
        let registry = FakeRegistry::with_titles(&[]);
        let report =
            sync_to_registry(&registry, &registry, &tokens(), &id(), &collection(), true).unwrap();

        assert_eq!(report.posted, 4);
        assert_eq!(report.skipped, 1);
        assert!(report.posted_works.iter().all(|w| w.dry_run && w.put_code.is_none()));
        assert!(registry.posted.borrow().is_empty());
    }

    #[test]
    fn test_errors_do_not_stop_the_sync() {
        let mut registry = FakeRegistry::with_titles(&[]);
        registry.summary = Err(503);
        registry.reject = Some("New Talk");

        let report =
            sync_to_registry(&registry, &registry, &tokens(), &id(), &collection(), false).unwrap();

        // The rejected title is not remembered, so its preprint twin is posted.
        assert_eq!(report.posted, 4);
        assert_eq!(
            report.errors,
            vec![
                "Error fetching existing works: API error (status 503): unavailable".to_string(),
                "Error posting 'New Talk': API error (status 409): conflict".to_string(),
            ]
        );
        assert!(report.to_string().contains("Errors: 2"));
    }

    #[test]
    fn test_missing_token_fails_before_io() {
        let registry = FakeRegistry::with_titles(&[]);
        let result = sync_to_registry(
            &registry,
            &registry,
            &TokenStore::in_memory(),
            &id(),
            &collection(),
            false,
        );
        assert!(matches!(
            result,
            Err(crate::Error::Registry(RegistryError::MissingToken(_)))
        ));
        assert!(registry.posted.borrow().is_empty());
    }
}
