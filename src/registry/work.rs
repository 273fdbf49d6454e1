//! ORCID work documents and their conversion to and from records.
//!
//! Only the parts of the v3.0 schema that the CV uses are modelled; unknown
//! keys are ignored on input and never written on output.

use crate::regex::Regex;
use crate::utils::format_doi;
use crate::{Category, Error, ExtractedRecord, Identifiers, PublicationRecord, SourceTag};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::LazyLock;

static VOLUME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)volume\s*[:=]?\s*\{?\s*(\d+)").unwrap());

static PAGES_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)pages?\s*[:=]?\s*\{?\s*(\d+(?:-{1,2}\d+)?)").unwrap());

static CITATION_AUTHOR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"author\s*=\s*\{([^}]+)\}").unwrap());

/// Lists that the API sometimes sends as `null`.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// `{"value": ...}` wrapper used throughout the schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Value<T> {
    pub value: Option<T>,
}

impl<T> Value<T> {
    pub fn new(value: T) -> Self {
        Self { value: Some(value) }
    }
}

impl Value<String> {
    fn text(&self) -> Option<&str> {
        self.value.as_deref().map(str::trim).filter(|v| !v.is_empty())
    }
}

/// Response of `GET /{orcid}/works`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WorksSummary {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub group: Vec<WorkGroup>,
}

/// Versions of the same work from different sources.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WorkGroup {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub work_summary: Vec<WorkSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WorkSummary {
    pub put_code: Option<u64>,
    pub title: Option<WorkTitle>,
    #[serde(rename = "type")]
    pub work_type: Option<String>,
    pub external_ids: Option<ExternalIds>,
    /// Milliseconds since the epoch.
    pub last_modified_date: Option<Value<i64>>,
}

impl WorksSummary {
    /// Put-codes of the most recently modified version of each work.
    ///
    /// On equal modification dates the first version listed wins. Groups
    /// whose chosen version has no put-code yield `None`.
    pub fn latest_put_codes(&self) -> impl Iterator<Item = Option<u64>> + '_ {
        self.group.iter().filter_map(|group| {
            group
                .work_summary
                .iter()
                .reduce(|best, summary| {
                    if modified(summary) > modified(best) {
                        summary
                    } else {
                        best
                    }
                })
                .map(|latest| latest.put_code)
        })
    }

    /// Every version of every work.
    pub fn summaries(&self) -> impl Iterator<Item = &WorkSummary> {
        self.group.iter().flat_map(|group| group.work_summary.iter())
    }
}

fn modified(summary: &WorkSummary) -> i64 {
    summary
        .last_modified_date
        .as_ref()
        .and_then(|date| date.value)
        .unwrap_or(0)
}

impl WorkSummary {
    pub fn title(&self) -> Option<&str> {
        self.title.as_ref().and_then(WorkTitle::title)
    }

    pub fn doi(&self) -> Option<String> {
        self.external_ids.as_ref().and_then(ExternalIds::doi)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WorkTitle {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<Value<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<Value<String>>,
}

impl WorkTitle {
    fn title(&self) -> Option<&str> {
        self.title.as_ref().and_then(Value::text)
    }

    fn subtitle(&self) -> Option<&str> {
        self.subtitle.as_ref().and_then(Value::text)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PublicationDate {
    /// The API sends the year as a string.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<Value<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Contributors {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub contributor: Vec<Contributor>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Contributor {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_name: Option<Value<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contributor_attributes: Option<ContributorAttributes>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ContributorAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contributor_role: Option<String>,
}

impl Contributor {
    fn is_author(&self) -> bool {
        self.contributor_attributes
            .as_ref()
            .and_then(|attributes| attributes.contributor_role.as_deref())
            .is_none_or(|role| role.eq_ignore_ascii_case("author"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExternalIds {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub external_id: Vec<ExternalId>,
}

impl ExternalIds {
    fn value_of(&self, id_type: &str) -> Option<&str> {
        self.external_id
            .iter()
            .filter(|id| {
                id.external_id_type
                    .as_deref()
                    .is_some_and(|t| t.eq_ignore_ascii_case(id_type))
            })
            .find_map(|id| id.external_id_value.as_deref())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    fn doi(&self) -> Option<String> {
        self.value_of("doi").and_then(format_doi)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExternalId {
    pub external_id_type: Option<String>,
    pub external_id_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id_relationship: Option<String>,
}

impl ExternalId {
    fn own(id_type: &str, value: &str) -> Self {
        Self {
            external_id_type: Some(id_type.to_string()),
            external_id_value: Some(value.to_string()),
            external_id_relationship: Some("self".to_string()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WorkCitation {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation_value: Option<String>,
}

/// A full work, as returned by `GET /{orcid}/work/{put-code}` and as
/// posted to `POST /{orcid}/work`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Work {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put_code: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<WorkTitle>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub work_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publication_date: Option<PublicationDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub journal_title: Option<Value<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_ids: Option<ExternalIds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contributors: Option<Contributors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citation: Option<WorkCitation>,
}

impl Work {
    fn citation_text(&self) -> Option<&str> {
        self.citation
            .as_ref()
            .and_then(|citation| citation.citation_value.as_deref())
    }

    /// Work type in the API's spelling (`journal-article`), lowercased.
    fn normalized_type(&self) -> Option<String> {
        self.work_type
            .as_deref()
            .map(|t| t.trim().to_lowercase().replace('_', "-"))
            .filter(|t| !t.is_empty())
    }

    fn authors(&self) -> Vec<String> {
        let authors: Vec<String> = self
            .contributors
            .iter()
            .flat_map(|contributors| contributors.contributor.iter())
            .filter(|contributor| contributor.is_author())
            .filter_map(|contributor| contributor.credit_name.as_ref().and_then(Value::text))
            .map(String::from)
            .collect();
        if !authors.is_empty() {
            return authors;
        }

        self.citation_text()
            .and_then(|text| CITATION_AUTHOR_REGEX.captures(text))
            .map(|caps| vec![caps[1].trim().to_string()])
            .unwrap_or_default()
    }
}

/// Category a work type is filed under. Unknown types are preprints.
pub fn category_for_work_type(work_type: &str) -> Category {
    match work_type.to_lowercase().replace('_', "-").as_str() {
        "journal-article" | "book" | "book-chapter" | "book-review" | "dissertation-thesis" => {
            Category::JournalPapers
        }
        "conference-paper" | "conference-abstract" | "conference-poster" => {
            Category::ConferencePapers
        }
        _ => Category::Preprints,
    }
}

/// Work type posted for a category.
pub fn work_type_for_category(category: Category) -> &'static str {
    match category {
        Category::JournalPapers => "journal-article",
        Category::ConferencePapers => "conference-paper",
        Category::Preprints => "preprint",
        Category::UnderReview => "working-paper",
        Category::WorkshopPapers => "conference-poster",
    }
}

impl TryFrom<Work> for ExtractedRecord {
    type Error = Error;

    fn try_from(work: Work) -> Result<Self, Self::Error> {
        let title = work
            .title
            .as_ref()
            .and_then(WorkTitle::title)
            .ok_or_else(|| Error::MissingField("title".to_string()))?
            .to_string();

        let work_type = work.normalized_type();
        let journal = work
            .journal_title
            .as_ref()
            .and_then(Value::text)
            .or_else(|| work.title.as_ref().and_then(WorkTitle::subtitle))
            .map(String::from);
        let citation = work.citation_text();

        let record = PublicationRecord {
            title,
            authors: work.authors(),
            year: work
                .publication_date
                .as_ref()
                .and_then(|date| date.year.as_ref())
                .and_then(Value::text)
                .and_then(|year| year.parse().ok()),
            venue: journal.clone(),
            journal,
            volume: citation
                .and_then(|text| VOLUME_REGEX.captures(text))
                .map(|caps| caps[1].to_string()),
            pages: citation
                .and_then(|text| PAGES_REGEX.captures(text))
                .map(|caps| caps[1].to_string()),
            identifiers: Identifiers {
                doi: work.external_ids.as_ref().and_then(ExternalIds::doi),
                url: work
                    .external_ids
                    .as_ref()
                    .and_then(|ids| ids.value_of("url").or_else(|| ids.value_of("uri")))
                    .map(String::from),
                put_code: work.put_code,
                ..Default::default()
            },
            source: Some(SourceTag::Registry),
            ..Default::default()
        };

        Ok(ExtractedRecord {
            category: Some(category_for_work_type(work_type.as_deref().unwrap_or_default())),
            record: PublicationRecord {
                work_type,
                ..record
            },
        })
    }
}

/// Builds the work posted for a publication.
///
/// The work type comes from the category; for records outside the CV
/// categories the record's own work type is used, defaulting to
/// `journal-article`.
pub fn publication_to_work(record: &PublicationRecord, category: Option<Category>) -> Work {
    let work_type = match category {
        Some(category) => work_type_for_category(category).to_string(),
        None => record
            .work_type
            .clone()
            .unwrap_or_else(|| "journal-article".to_string()),
    };

    let mut external_id = Vec::new();
    if let Some(doi) = record.doi() {
        external_id.push(ExternalId::own("doi", doi.trim()));
    }
    if let Some(url) = record.identifiers.url.as_deref().filter(|u| !u.is_empty()) {
        external_id.push(ExternalId::own("uri", url));
    }

    let contributor: Vec<Contributor> = record
        .authors
        .iter()
        .map(|author| Contributor {
            credit_name: Some(Value::new(author.clone())),
            contributor_attributes: Some(ContributorAttributes {
                contributor_role: Some("author".to_string()),
            }),
        })
        .collect();

    Work {
        title: Some(WorkTitle {
            title: Some(Value::new(record.title.clone())),
            subtitle: None,
        }),
        work_type: Some(work_type),
        publication_date: record.year.map(|year| PublicationDate {
            year: Some(Value::new(year.to_string())),
        }),
        journal_title: record
            .journal
            .as_deref()
            .filter(|j| !j.is_empty())
            .or(record.venue())
            .map(|journal| Value::new(journal.to_string())),
        external_ids: Some(ExternalIds { external_id }),
        contributors: (!contributor.is_empty()).then_some(Contributors { contributor }),
        ..Default::default()
    }
}
