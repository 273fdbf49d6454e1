//! BibTeX entry types and the CV category each one is filed under.

use crate::Category;

/// BibTeX entry types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntryType {
    Article,
    Book,
    Booklet,
    Conference,
    InBook,
    InCollection,
    InProceedings,
    MastersThesis,
    Misc,
    PhdThesis,
    Proceedings,
    TechReport,
    Unpublished,
    /// Any type not listed above
    Other(String),
}

impl EntryType {
    /// Convert an entry type name (any case) to an EntryType.
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "article" => EntryType::Article,
            "book" => EntryType::Book,
            "booklet" => EntryType::Booklet,
            "conference" => EntryType::Conference,
            "inbook" => EntryType::InBook,
            "incollection" => EntryType::InCollection,
            "inproceedings" => EntryType::InProceedings,
            "mastersthesis" => EntryType::MastersThesis,
            "misc" => EntryType::Misc,
            "phdthesis" => EntryType::PhdThesis,
            "proceedings" => EntryType::Proceedings,
            "techreport" => EntryType::TechReport,
            "unpublished" => EntryType::Unpublished,
            other => EntryType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            EntryType::Article => "article",
            EntryType::Book => "book",
            EntryType::Booklet => "booklet",
            EntryType::Conference => "conference",
            EntryType::InBook => "inbook",
            EntryType::InCollection => "incollection",
            EntryType::InProceedings => "inproceedings",
            EntryType::MastersThesis => "mastersthesis",
            EntryType::Misc => "misc",
            EntryType::PhdThesis => "phdthesis",
            EntryType::Proceedings => "proceedings",
            EntryType::TechReport => "techreport",
            EntryType::Unpublished => "unpublished",
            EntryType::Other(name) => name,
        }
    }

    /// The CV category for this entry type. Unknown types are preprints.
    pub fn category(&self) -> Category {
        match self {
            EntryType::Article
            | EntryType::PhdThesis
            | EntryType::MastersThesis
            | EntryType::Book
            | EntryType::InBook => Category::JournalPapers,
            EntryType::InProceedings
            | EntryType::InCollection
            | EntryType::Proceedings
            | EntryType::Conference => Category::ConferencePapers,
            EntryType::Unpublished => Category::UnderReview,
            EntryType::Misc | EntryType::TechReport | EntryType::Booklet | EntryType::Other(_) => {
                Category::Preprints
            }
        }
    }

    /// Entry type written when exporting a category.
    pub fn for_category(category: Category) -> Self {
        match category {
            Category::JournalPapers => EntryType::Article,
            Category::ConferencePapers | Category::WorkshopPapers => EntryType::InProceedings,
            Category::Preprints => EntryType::Misc,
            Category::UnderReview => EntryType::Unpublished,
        }
    }

    /// Entry types whose note may carry an acceptance rate or presentation type.
    pub fn is_conference_like(&self) -> bool {
        matches!(
            self,
            EntryType::InProceedings | EntryType::InCollection | EntryType::Conference
        )
    }

    /// Entry types that may describe an arXiv preprint.
    pub fn is_preprint_like(&self) -> bool {
        matches!(self, EntryType::Misc | EntryType::Unpublished)
    }
}
