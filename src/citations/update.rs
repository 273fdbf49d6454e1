use crate::{MatchResult, PublicationCollection};
use std::collections::HashMap;
use tracing::debug;

/// A citation count that changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationDelta {
    /// Citation key of the updated record.
    pub key: String,
    pub title: String,
    /// Stored count before the update; a missing count is `0`.
    pub old: u32,
    pub new: u32,
}

/// Copies citation counts from matched records into the collection.
///
/// Only matches whose canonical record has a citation key and whose source
/// record carries a count are used; when several matches share a key the
/// last one wins. Every record of the collection with that key and a
/// different stored count is overwritten, and one delta is returned for it.
/// No record is added or removed.
pub fn apply_citation_counts(
    collection: &mut PublicationCollection,
    matches: &[MatchResult<'_>],
) -> Vec<CitationDelta> {
    let counts: HashMap<&str, u32> = matches
        .iter()
        .filter_map(|m| Some((m.canonical.key()?, m.source.citations?)))
        .collect();

    let mut deltas = Vec::new();
    for record in collection.records_mut() {
        let Some(&new) = record.key().and_then(|key| counts.get(key)) else {
            continue;
        };
        let old = record.citations.unwrap_or(0);
        if old == new {
            continue;
        }

        debug!(key = record.key(), old, new, "updating citation count");
        record.citations = Some(new);
        deltas.push(CitationDelta {
            key: record.key().unwrap_or_default().to_string(),
            title: record.title.clone(),
            old,
            new,
        });
    }
    deltas
}
