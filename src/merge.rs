//! Folding imported records into the canonical collection.
//!
//! The merge is append-only: records already in the collection keep their
//! place, and imported records that are not duplicates are added at the end
//! of their category (or year bucket) in import order. Nothing is re-sorted.
//!
//! ## Duplicates
//!
//! An imported record is a duplicate of an existing record of the same list
//! when their normalized titles are equal, or when both carry a DOI and the
//! DOIs are equal ignoring case and surrounding whitespace. Either criterion
//! is sufficient; each can be switched off through [`DuplicatePolicy`].
//!
//! ```rust
//! use cvpubs::{Category, DuplicatePolicy, Merger, PublicationCollection, PublicationRecord};
//!
//! let mut canonical = PublicationCollection::new();
//! canonical.push(Category::JournalPapers, None, PublicationRecord::new("A Paper"));
//!
//! let mut imported = PublicationCollection::new();
//! imported.push(Category::JournalPapers, None, PublicationRecord::new("a  paper"));
//! imported.push(Category::JournalPapers, None, PublicationRecord::new("Another Paper"));
//!
//! let outcome = Merger::new().merge(&imported, &canonical);
//! assert_eq!(outcome.added_count(), 1);
//! assert_eq!(outcome.duplicates.len(), 1);
//!
//! let title_blind = Merger::new().with_policy(DuplicatePolicy {
//!     match_title: false,
//!     match_doi: true,
//! });
//! assert_eq!(title_blind.merge(&imported, &canonical).added_count(), 2);
//! ```

use crate::utils::doi_key;
use crate::{Category, CategoryEntries, PublicationCollection, PublicationRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Bucket of a year-bucketed `workshop_papers` for records without a year.
const UNDATED_BUCKET: &str = "undated";

/// Which criteria make two records duplicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DuplicatePolicy {
    /// Equal normalized titles.
    pub match_title: bool,
    /// Equal DOIs, when both records have one.
    pub match_doi: bool,
}

impl Default for DuplicatePolicy {
    fn default() -> Self {
        Self {
            match_title: true,
            match_doi: true,
        }
    }
}

impl DuplicatePolicy {
    pub fn is_duplicate(&self, existing: &PublicationRecord, new: &PublicationRecord) -> bool {
        if self.match_title {
            let title = new.normalized_title();
            if !title.is_empty() && existing.normalized_title() == title {
                return true;
            }
        }
        if self.match_doi {
            if let (Some(a), Some(b)) = (doi_key(existing.doi()), doi_key(new.doi())) {
                return a == b;
            }
        }
        false
    }
}

/// Result of [`Merger::merge`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeOutcome {
    /// The merged collection.
    pub collection: PublicationCollection,
    /// Number of records added, per category, in the order the imported
    /// categories were visited.
    pub added: Vec<(String, usize)>,
    /// Imported records that were dropped as duplicates.
    pub duplicates: Vec<PublicationRecord>,
}

impl MergeOutcome {
    pub fn added_count(&self) -> usize {
        self.added.iter().map(|(_, count)| count).sum()
    }
}

/// Merges imported collections into the canonical one.
#[derive(Debug, Clone, Default)]
pub struct Merger {
    policy: DuplicatePolicy,
}

impl Merger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Merges `new` into a copy of `canonical`.
    ///
    /// `canonical` is left untouched so that callers can preview the result
    /// and decide whether to persist it.
    pub fn merge(
        &self,
        new: &PublicationCollection,
        canonical: &PublicationCollection,
    ) -> MergeOutcome {
        let mut outcome = MergeOutcome {
            collection: canonical.clone(),
            ..Default::default()
        };

        for (name, entries) in new.categories() {
            // Imported categories exist in the result even when empty
            outcome.collection.entries_mut(name);
            let mut added = 0;

            let labelled: Vec<(Option<String>, &PublicationRecord)> = match entries {
                CategoryEntries::Flat(records) => records
                    .iter()
                    .map(|record| (record.year.map(|y| y.to_string()), record))
                    .collect(),
                CategoryEntries::YearBucketed(buckets) => buckets
                    .iter()
                    .flat_map(|(label, records)| {
                        records.iter().map(move |record| (Some(label.to_string()), record))
                    })
                    .collect(),
            };
            for (label, record) in labelled {
                let list = destination(&mut outcome.collection, name, label);
                if self.append_unique(list, record, &mut outcome.duplicates) {
                    added += 1;
                }
            }

            outcome.added.push((name.to_string(), added));
        }

        info!(
            added = outcome.added_count(),
            duplicates = outcome.duplicates.len(),
            "merged imported records"
        );
        outcome
    }

    fn append_unique(
        &self,
        list: &mut Vec<PublicationRecord>,
        record: &PublicationRecord,
        duplicates: &mut Vec<PublicationRecord>,
    ) -> bool {
        if list
            .iter()
            .any(|existing| self.policy.is_duplicate(existing, record))
        {
            debug!(title = %record.title, "skipping duplicate");
            duplicates.push(record.clone());
            false
        } else {
            list.push(record.clone());
            true
        }
    }
}

/// The list a record of category `name` lands in.
///
/// A year-bucketed category files the record under `label`. Without a label
/// the record goes to `workshop_papers`, as [`PublicationCollection::push`]
/// does.
fn destination<'a>(
    collection: &'a mut PublicationCollection,
    name: &str,
    label: Option<String>,
) -> &'a mut Vec<PublicationRecord> {
    let bucketed = matches!(
        collection.entries_mut(name),
        CategoryEntries::YearBucketed(_)
    );
    let (name, label) = match label.filter(|l| !l.is_empty()) {
        None if bucketed => {
            debug!(category = name, "no year label, filing under workshop papers");
            (Category::WorkshopPapers.as_str(), None)
        }
        label => (name, label),
    };
    match collection.entries_mut(name) {
        CategoryEntries::Flat(list) => list,
        CategoryEntries::YearBucketed(buckets) => {
            buckets.bucket_mut(label.as_deref().unwrap_or(UNDATED_BUCKET))
        }
    }
}
