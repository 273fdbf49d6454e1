//! The canonical publication collection and its YAML persistence.
//!
//! The collection is an ordered mapping from category name to entries.
//! `conference_papers` maps year labels to lists of records; every other
//! category is a flat list. Category and year-bucket order is kept exactly as
//! loaded, and new categories or buckets are appended at the end.
//!
//! ```
//! use cvpubs::{Category, PublicationCollection, PublicationRecord};
//!
//! let mut collection = PublicationCollection::new();
//! collection.push(Category::JournalPapers, None, PublicationRecord::new("A Paper"));
//! collection.push(Category::ConferencePapers, Some(2023), PublicationRecord::new("A Talk"));
//!
//! let yaml = collection.to_yaml_string().unwrap();
//! let reloaded = PublicationCollection::from_yaml_str(&yaml).unwrap();
//! assert_eq!(reloaded, collection);
//! ```

use crate::{Category, Layout, PublicationRecord, Result};
use either::Either;
use serde::de::{self, MapAccess, Visitor};
use serde::ser::{self, SerializeMap};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Entries of one category.
#[derive(Debug, Clone, PartialEq)]
pub enum CategoryEntries {
    Flat(Vec<PublicationRecord>),
    YearBucketed(YearBuckets),
}

impl CategoryEntries {
    /// Empty entries of the right shape for a category name.
    pub fn empty_for(name: &str) -> Self {
        if name == Category::ConferencePapers.as_str() {
            CategoryEntries::YearBucketed(YearBuckets::default())
        } else {
            CategoryEntries::Flat(Vec::new())
        }
    }

    pub fn len(&self) -> usize {
        match self {
            CategoryEntries::Flat(records) => records.len(),
            CategoryEntries::YearBucketed(buckets) => buckets.record_count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn records(&self) -> impl Iterator<Item = &PublicationRecord> {
        match self {
            CategoryEntries::Flat(records) => Either::Left(records.iter()),
            CategoryEntries::YearBucketed(buckets) => Either::Right(buckets.records()),
        }
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut PublicationRecord> {
        match self {
            CategoryEntries::Flat(records) => Either::Left(records.iter_mut()),
            CategoryEntries::YearBucketed(buckets) => Either::Right(buckets.records_mut()),
        }
    }
}

/// Year label -> records, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct YearBuckets {
    buckets: Vec<(String, Vec<PublicationRecord>)>,
}

impl YearBuckets {
    pub fn get(&self, label: &str) -> Option<&Vec<PublicationRecord>> {
        self.buckets
            .iter()
            .find(|(existing, _)| existing == label)
            .map(|(_, records)| records)
    }

    /// The bucket for `label`, appended empty if it does not exist yet.
    pub fn bucket_mut(&mut self, label: &str) -> &mut Vec<PublicationRecord> {
        let index = match self.buckets.iter().position(|(existing, _)| existing == label) {
            Some(index) => index,
            None => {
                self.buckets.push((label.to_string(), Vec::new()));
                self.buckets.len() - 1
            }
        };
        &mut self.buckets[index].1
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(|(label, _)| label.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Vec<PublicationRecord>)> {
        self.buckets
            .iter()
            .map(|(label, records)| (label.as_str(), records))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut Vec<PublicationRecord>)> {
        self.buckets
            .iter_mut()
            .map(|(label, records)| (label.as_str(), records))
    }

    pub fn records(&self) -> impl Iterator<Item = &PublicationRecord> {
        self.buckets.iter().flat_map(|(_, records)| records.iter())
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut PublicationRecord> {
        self.buckets
            .iter_mut()
            .flat_map(|(_, records)| records.iter_mut())
    }

    pub fn record_count(&self) -> usize {
        self.buckets.iter().map(|(_, records)| records.len()).sum()
    }
}

/// The persisted, authoritative set of publications, organized by category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PublicationCollection {
    categories: Vec<(String, CategoryEntries)>,
}

impl PublicationCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&CategoryEntries> {
        self.categories
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, entries)| entries)
    }

    /// The entries of `name`, appended empty if the category does not exist.
    pub fn entries_mut(&mut self, name: &str) -> &mut CategoryEntries {
        let index = match self.categories.iter().position(|(existing, _)| existing == name) {
            Some(index) => index,
            None => {
                self.categories
                    .push((name.to_string(), CategoryEntries::empty_for(name)));
                self.categories.len() - 1
            }
        };
        &mut self.categories[index].1
    }

    /// Appends a record to a category.
    ///
    /// Conference papers go to the bucket of `year`; without a year they fall
    /// back to `workshop_papers`.
    pub fn push(&mut self, category: Category, year: Option<i32>, record: PublicationRecord) {
        let target = match (category.is_year_bucketed(), year) {
            (true, None) => Category::WorkshopPapers,
            _ => category,
        };
        match self.entries_mut(target.as_str()) {
            CategoryEntries::Flat(records) => records.push(record),
            CategoryEntries::YearBucketed(buckets) => {
                // `year` is always set here
                let label = year.map(|y| y.to_string()).unwrap_or_default();
                buckets.bucket_mut(&label).push(record);
            }
        }
    }

    pub fn categories(&self) -> impl Iterator<Item = (&str, &CategoryEntries)> {
        self.categories
            .iter()
            .map(|(name, entries)| (name.as_str(), entries))
    }

    pub fn categories_mut(&mut self) -> impl Iterator<Item = (&str, &mut CategoryEntries)> {
        self.categories
            .iter_mut()
            .map(|(name, entries)| (name.as_str(), entries))
    }

    /// Every record, in category order.
    pub fn records(&self) -> impl Iterator<Item = &PublicationRecord> {
        self.categories
            .iter()
            .flat_map(|(_, entries)| entries.records())
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut PublicationRecord> {
        self.categories
            .iter_mut()
            .flat_map(|(_, entries)| entries.records_mut())
    }

    pub fn len(&self) -> usize {
        self.categories.iter().map(|(_, entries)| entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record count per category, skipping empty ones.
    pub fn summary(&self) -> Vec<(String, usize)> {
        self.categories
            .iter()
            .filter(|(_, entries)| !entries.is_empty())
            .map(|(name, entries)| (name.clone(), entries.len()))
            .collect()
    }

    pub fn from_yaml_str(input: &str) -> Result<Self> {
        if input.trim().is_empty() {
            return Ok(Self::new());
        }
        Ok(serde_yaml::from_str::<Option<Self>>(input)?.unwrap_or_default())
    }

    pub fn to_yaml_string(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Loads a collection from disk. A missing file is an empty collection.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => {
                let collection = Self::from_yaml_str(&content)?;
                debug!(path = %path.display(), records = collection.len(), "loaded collection");
                Ok(collection)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "no collection file yet, starting empty");
                Ok(Self::new())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Writes the collection to a sibling temporary file and renames it over
    /// `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        let yaml = self.to_yaml_string()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let temp = sibling_path(path, ".tmp");
        fs::write(&temp, yaml)?;
        if let Err(err) = fs::rename(&temp, path) {
            let _ = fs::remove_file(&temp);
            return Err(err.into());
        }
        info!(path = %path.display(), records = self.len(), "saved collection");
        Ok(())
    }
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Copies the collection file to `<file>.backup` next to it.
///
/// Returns the backup path, or `None` when there is nothing to back up.
pub fn backup_collection(path: &Path) -> Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }
    let backup = sibling_path(path, ".backup");
    fs::copy(path, &backup)?;
    info!(backup = %backup.display(), "backup created");
    Ok(Some(backup))
}

/// A record written after its [`Layout`].
struct LaidOut<'a>(&'a PublicationRecord);

impl Serialize for LaidOut<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match serde_yaml::to_value(self.0).map_err(<S::Error as ser::Error>::custom)? {
            Value::Mapping(fields) => self.0.layout.apply(fields).serialize(serializer),
            other => other.serialize(serializer),
        }
    }
}

struct Records<'a>(&'a [PublicationRecord]);

impl Serialize for Records<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter().map(LaidOut))
    }
}

impl Serialize for YearBuckets {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.buckets.len()))?;
        for (label, records) in &self.buckets {
            // Year labels are written as bare numbers: `2023:`
            match label.parse::<i64>() {
                Ok(year) if year.to_string() == *label => {
                    map.serialize_entry(&year, &Records(records))?
                }
                _ => map.serialize_entry(label, &Records(records))?,
            }
        }
        map.end()
    }
}

impl Serialize for CategoryEntries {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            CategoryEntries::Flat(records) => Records(records).serialize(serializer),
            CategoryEntries::YearBucketed(buckets) => buckets.serialize(serializer),
        }
    }
}

impl Serialize for PublicationCollection {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.categories.len()))?;
        for (name, entries) in &self.categories {
            map.serialize_entry(name, entries)?;
        }
        map.end()
    }
}

/// A record read together with its [`Layout`].
struct Stored(PublicationRecord);

impl<'de> Deserialize<'de> for Stored {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let mapping = Mapping::deserialize(deserializer)?;
        let mut record: PublicationRecord =
            serde_yaml::from_value(Value::Mapping(mapping.clone()))
                .map_err(<D::Error as de::Error>::custom)?;
        record.layout = Layout::from_mapping(mapping);
        Ok(Stored(record))
    }
}

fn stored_records(records: Option<Vec<Stored>>) -> Vec<PublicationRecord> {
    records
        .unwrap_or_default()
        .into_iter()
        .map(|Stored(record)| record)
        .collect()
}

/// A mapping key that YAML may spell as a string or a bare number (`2023:`).
struct Label(String);

impl<'de> Deserialize<'de> for Label {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct LabelVisitor;

        impl Visitor<'_> for LabelVisitor {
            type Value = Label;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a string or integer key")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Label, E> {
                Ok(Label(v.to_string()))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Label, E> {
                Ok(Label(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Label, E> {
                Ok(Label(v.to_string()))
            }
        }

        deserializer.deserialize_any(LabelVisitor)
    }
}

impl<'de> Deserialize<'de> for YearBuckets {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct BucketsVisitor;

        impl<'de> Visitor<'de> for BucketsVisitor {
            type Value = YearBuckets;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping from year to a list of publications")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<YearBuckets, A::Error> {
                let mut buckets = YearBuckets::default();
                while let Some(Label(label)) = map.next_key()? {
                    let records: Option<Vec<Stored>> = map.next_value()?;
                    buckets.bucket_mut(&label).extend(stored_records(records));
                }
                Ok(buckets)
            }
        }

        deserializer.deserialize_map(BucketsVisitor)
    }
}

impl<'de> Deserialize<'de> for PublicationCollection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct CollectionVisitor;

        impl<'de> Visitor<'de> for CollectionVisitor {
            type Value = PublicationCollection;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping from category to publications")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<PublicationCollection, A::Error> {
                let mut collection = PublicationCollection::new();
                while let Some(Label(name)) = map.next_key()? {
                    let entries = if name == Category::ConferencePapers.as_str() {
                        let buckets: Option<YearBuckets> = map.next_value()?;
                        CategoryEntries::YearBucketed(buckets.unwrap_or_default())
                    } else {
                        let records: Option<Vec<Stored>> = map.next_value()?;
                        CategoryEntries::Flat(stored_records(records))
                    };
                    if collection.get(&name).is_some() {
                        return Err(de::Error::custom(format!("duplicate category '{name}'")));
                    }
                    collection.categories.push((name, entries));
                }
                Ok(collection)
            }
        }

        deserializer.deserialize_map(CollectionVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    const SAMPLE: &str = "\
journal_papers:
- title: Paper A
  year: 2021
- title: Paper B
conference_papers:
  '2022':
  - title: Talk X
    venue: ICML
  2020:
  - title: Talk Y
preprints: []
talks:
- title: Invited Talk
";

    #[test]
    fn test_load_preserves_order_and_shapes() {
        let collection = PublicationCollection::from_yaml_str(SAMPLE).unwrap();
        let names: Vec<&str> = collection.categories().map(|(name, _)| name).collect();
        assert_eq!(
            names,
            vec!["journal_papers", "conference_papers", "preprints", "talks"]
        );

        match collection.get("conference_papers") {
            Some(CategoryEntries::YearBucketed(buckets)) => {
                assert_eq!(buckets.labels().collect::<Vec<_>>(), vec!["2022", "2020"]);
                assert_eq!(buckets.get("2022").unwrap()[0].title, "Talk X");
            }
            other => panic!("expected year buckets, got {other:?}"),
        }
        assert_eq!(collection.len(), 5);
        assert_eq!(
            collection.records().map(|r| r.title.as_str()).collect::<Vec<_>>(),
            vec!["Paper A", "Paper B", "Talk X", "Talk Y", "Invited Talk"]
        );
    }

    #[test]
    fn test_round_trip_is_stable() {
        let collection = PublicationCollection::from_yaml_str(SAMPLE).unwrap();
        let written = collection.to_yaml_string().unwrap();
        let reloaded = PublicationCollection::from_yaml_str(&written).unwrap();
        assert_eq!(reloaded, collection);
        assert_eq!(reloaded.to_yaml_string().unwrap(), written);
        assert!(written.find("journal_papers").unwrap() < written.find("conference_papers").unwrap());
    }

    #[test]
    fn test_save_keeps_hand_written_layout() {
        let input = "\
journal_papers:
- bibtex_key: k1
  title: Paper
  citations: 3
  year: 2020
  volume: 12
  notes: keep me
conference_papers:
  2022:
  - venue: ICML
    title: Talk X
  2020:
  - title: Talk Y
";
        let mut collection = PublicationCollection::from_yaml_str(input).unwrap();
        assert_eq!(collection.to_yaml_string().unwrap(), input);

        let paper = collection.records_mut().next().unwrap();
        paper.citations = Some(9);
        paper.identifiers.doi = Some("10.1/x".to_string());
        collection.push(Category::ConferencePapers, Some(2022), PublicationRecord::new("Talk Z"));

        assert_eq!(
            collection.to_yaml_string().unwrap(),
            "\
journal_papers:
- bibtex_key: k1
  title: Paper
  citations: 9
  year: 2020
  volume: 12
  notes: keep me
  doi: 10.1/x
conference_papers:
  2022:
  - venue: ICML
    title: Talk X
  - title: Talk Z
  2020:
  - title: Talk Y
"
        );
    }

    #[test]
    fn test_year_labels_are_written_as_numbers() {
        let collection = PublicationCollection::from_yaml_str(SAMPLE).unwrap();
        let written = collection.to_yaml_string().unwrap();
        assert!(written.contains("\n  2022:\n"), "{written}");
        assert!(!written.contains("'2022'"));
    }

    #[test]
    fn test_conference_papers_must_be_mapping() {
        let result = PublicationCollection::from_yaml_str("conference_papers:\n- title: X\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_inputs() {
        assert!(PublicationCollection::from_yaml_str("").unwrap().is_empty());
        assert!(PublicationCollection::from_yaml_str("---\n").unwrap().is_empty());
        let collection = PublicationCollection::from_yaml_str("preprints:\n").unwrap();
        assert!(collection.get("preprints").unwrap().is_empty());
    }

    #[test]
    fn test_push_buckets_conference_papers() {
        let mut collection = PublicationCollection::new();
        collection.push(Category::ConferencePapers, Some(2023), PublicationRecord::new("A"));
        collection.push(Category::ConferencePapers, None, PublicationRecord::new("B"));
        collection.push(Category::ConferencePapers, Some(2023), PublicationRecord::new("C"));

        match collection.get("conference_papers") {
            Some(CategoryEntries::YearBucketed(buckets)) => {
                let titles: Vec<_> = buckets.get("2023").unwrap().iter().map(|r| &r.title).collect();
                assert_eq!(titles, vec!["A", "C"]);
            }
            other => panic!("expected year buckets, got {other:?}"),
        }
        assert_eq!(collection.get("workshop_papers").unwrap().len(), 1);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let collection = PublicationCollection::load(&dir.path().join("missing.yaml")).unwrap();
        assert!(collection.is_empty());
    }

    #[test]
    fn test_save_and_backup() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("publications.yaml");
        assert_eq!(backup_collection(&path).unwrap(), None);

        let collection = PublicationCollection::from_yaml_str(SAMPLE).unwrap();
        collection.save(&path).unwrap();
        assert_eq!(PublicationCollection::load(&path).unwrap(), collection);
        assert!(!dir.path().join("data").join("publications.yaml.tmp").exists());

        let backup = backup_collection(&path).unwrap().unwrap();
        assert_eq!(backup, dir.path().join("data").join("publications.yaml.backup"));
        assert_eq!(
            fs::read_to_string(&backup).unwrap(),
            fs::read_to_string(&path).unwrap()
        );
    }
}
