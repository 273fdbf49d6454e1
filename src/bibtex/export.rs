//! Writing the collection back out as BibTeX.

use crate::bibtex::entry_type::EntryType;
use crate::{Category, CategoryEntries, PublicationCollection, PublicationRecord};
use std::fmt::Write;

/// Citation key for a record: the stored key, or
/// `<first author's last name><year><first two title words>`.
///
/// `fallback_year` is used when the record has no year of its own.
pub fn generate_key(record: &PublicationRecord, fallback_year: Option<&str>) -> String {
    if let Some(key) = record.key() {
        return key.to_string();
    }

    let author = record
        .authors
        .first()
        .and_then(|name| name.split_whitespace().last())
        .unwrap_or("unknown");
    let year = record
        .year
        .map(|y| y.to_string())
        .or(fallback_year.map(str::to_string))
        .unwrap_or_default();
    let title: String = record
        .title
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|word| !word.is_empty())
        .take(2)
        .collect();

    format!("{author}{year}{title}")
}

/// Renders every publication of the known categories as BibTeX entries.
///
/// Categories are written in collection order. Conference papers without a
/// stored year take the year of their bucket. Categories that are not part
/// of the CV layout (talks, ...) are skipped.
pub fn export_bibtex(collection: &PublicationCollection) -> String {
    let mut output = String::new();

    for (name, entries) in collection.categories() {
        let Ok(category) = name.parse::<Category>() else {
            tracing::debug!(category = name, "not exporting unknown category");
            continue;
        };
        let entry_type = EntryType::for_category(category);

        match entries {
            CategoryEntries::Flat(records) => {
                for record in records {
                    write_entry(&mut output, &entry_type, category, record, None);
                }
            }
            CategoryEntries::YearBucketed(buckets) => {
                for (label, records) in buckets.iter() {
                    for record in records {
                        write_entry(&mut output, &entry_type, category, record, Some(label));
                    }
                }
            }
        }
    }

    output
}

fn write_entry(
    output: &mut String,
    entry_type: &EntryType,
    category: Category,
    record: &PublicationRecord,
    bucket: Option<&str>,
) {
    let mut fields: Vec<(&str, String)> = vec![("title", record.title.clone())];
    if !record.authors.is_empty() {
        fields.push(("author", record.authors.join(" and ")));
    }

    let venue = record.venue().map(str::to_string);
    match category {
        Category::JournalPapers => {
            if let Some(journal) = record.journal.clone().filter(|j| !j.is_empty()).or(venue) {
                fields.push(("journal", journal));
            }
        }
        _ if *entry_type == EntryType::InProceedings => {
            if let Some(venue) = venue {
                fields.push(("booktitle", venue));
            }
        }
        _ => {
            if let Some(venue) = venue {
                fields.push(("journal", venue));
            }
        }
    }

    if let Some(year) = record.year.map(|y| y.to_string()).or(bucket.map(str::to_string)) {
        fields.push(("year", year));
    }

    for (name, value) in [
        ("volume", &record.volume),
        ("number", &record.number),
        ("pages", &record.pages),
        ("doi", &record.identifiers.doi),
        ("url", &record.identifiers.url),
    ] {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            fields.push((name, value.to_string()));
        }
    }

    let note = match (&record.acceptance_rate, &record.identifiers.arxiv) {
        (Some(rate), _) if !rate.is_empty() => Some(rate.clone()),
        (_, Some(arxiv)) if !arxiv.is_empty() => Some(format!("arXiv:{arxiv}")),
        _ => None,
    };
    if let Some(note) = note {
        fields.push(("note", note));
    }

    if !output.is_empty() {
        output.push('\n');
    }
    let _ = writeln!(output, "@{}{{{},", entry_type.as_str(), generate_key(record, bucket));
    let last = fields.len() - 1;
    for (index, (name, value)) in fields.iter().enumerate() {
        let separator = if index == last { "" } else { "," };
        let _ = writeln!(output, "  {name} = {{{value}}}{separator}");
    }
    output.push_str("}\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bibtex::BibtexExtractor;
    use crate::RecordExtractor;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_generate_key() {
        let mut record = PublicationRecord::new("Deep Models for Causal Inference");
        record.authors = vec!["Jane van Doe".to_string()];
        record.year = Some(2021);
        assert_eq!(generate_key(&record, Some("1999")), "Doe2021deepmodels");

        record.identifiers.key = Some("stored".to_string());
        assert_eq!(generate_key(&record, None), "stored");

        let record = PublicationRecord::new("X-ray Vision");
        assert_eq!(generate_key(&record, None), "unknownxray");
        assert_eq!(generate_key(&record, Some("2020")), "unknown2020xray");
    }

    #[test]
    fn test_export_entries() {
        let yaml = "\
journal_papers:
- title: Deep Models
  authors: [Jane Doe, Richard Roe]
  journal: Journal of Things
  year: 2021
  volume: '3'
  doi: 10.1000/abc
  bibtex_key: doe2021deep
conference_papers:
  '2022':
  - title: Fast Search
    venue: Proc. ICML
    acceptance_rate: 21% acceptance
talks:
- title: Invited
";
        let collection = PublicationCollection::from_yaml_str(yaml).unwrap();
        let bib = export_bibtex(&collection);

        assert_eq!(
            bib,
            "\
@article{doe2021deep,
  title = {Deep Models},
  author = {Jane Doe and Richard Roe},
  journal = {Journal of Things},
  year = {2021},
  volume = {3},
  doi = {10.1000/abc}
}

@inproceedings{unknown2022fastsearch,
  title = {Fast Search},
  booktitle = {Proc. ICML},
  year = {2022},
  note = {21% acceptance}
}
"
        );
    }

    #[test]
    fn test_export_reads_back() {
        let mut collection = PublicationCollection::new();
        let mut record = PublicationRecord::new("Preprinted Work");
        record.authors = vec!["Alice Smith".to_string()];
        record.year = Some(2024);
        record.venue = Some("arXiv".to_string());
        record.identifiers.arxiv = Some("2401.01234".to_string());
        collection.push(Category::Preprints, record.year, record);

        let extraction = BibtexExtractor::new()
            .extract(&export_bibtex(&collection))
            .unwrap();
        assert!(extraction.issues.is_empty());
        let record = &extraction.records[0];
        assert_eq!(record.category, Some(Category::Preprints));
        assert_eq!(record.record.title, "Preprinted Work");
        assert_eq!(record.record.identifiers.arxiv.as_deref(), Some("2401.01234"));
        assert_eq!(
            record.record.identifiers.key.as_deref(),
            Some("Smith2024preprintedwork")
        );
    }
}
