use crate::regex::Regex;
use std::sync::LazyLock;

static DOI_URL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://(?:dx\.)?doi\.org/(.+)$").unwrap());

static YEAR_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d{4}").unwrap());

static TAG_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Formats a DOI string by removing URL prefixes and `doi:` labels.
///
/// Returns `None` when no DOI can be found in the input. Case is preserved;
/// comparisons lowercase on their own.
///
/// # Arguments
///
/// * `doi_str` - The DOI string to format
pub fn format_doi(doi_str: &str) -> Option<String> {
    let doi: String = doi_str.chars().filter(|c| !c.is_whitespace()).collect();
    if doi.is_empty() {
        return None;
    }

    if let Some(captures) = DOI_URL_REGEX.captures(&doi) {
        return Some(captures[1].to_string());
    }

    // Find the first occurrence of "10." which starts every DOI
    doi.find("10.").map(|pos| doi[pos..].to_string())
}

/// Key used to compare two DOIs: trimmed and lowercased, `None` if empty.
pub fn doi_key(doi: Option<&str>) -> Option<String> {
    doi.map(|d| d.trim().to_lowercase()).filter(|d| !d.is_empty())
}

/// Extracts the first run of four digits as a year.
pub fn extract_year(text: &str) -> Option<i32> {
    YEAR_REGEX
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
}

/// Turns a `Last, First` author name into `First Last`.
///
/// Names without a comma are returned trimmed but otherwise unchanged.
pub fn display_author_name(name: &str) -> String {
    match name.split_once(',') {
        Some((last, first)) => format!("{} {}", first.trim(), last.trim())
            .trim()
            .to_string(),
        None => name.trim().to_string(),
    }
}

/// Removes every `<...>` tag.
pub fn strip_tags(html: &str) -> String {
    TAG_REGEX.replace_all(html, "").into_owned()
}

/// Decodes named (HTML5) and numeric character references.
///
/// Unknown named entities are left as they are.
pub fn unescape_html(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

/// Shortens `text` to `max_chars` characters, appending `...` when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => format!("{}...", &text[..index]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_format_doi() {
        assert_eq!(
            format_doi("10.1000/xyz123"),
            Some("10.1000/xyz123".to_string())
        );
        assert_eq!(
            format_doi("https://doi.org/10.1000/XYZ123"),
            Some("10.1000/XYZ123".to_string())
        );
        assert_eq!(
            format_doi("http://dx.doi.org/10.1000/xyz123"),
            Some("10.1000/xyz123".to_string())
        );
        assert_eq!(
            format_doi("doi: 10.1000/xyz123 "),
            Some("10.1000/xyz123".to_string())
        );
        assert_eq!(format_doi("not a doi"), None);
        assert_eq!(format_doi(""), None);
    }

    #[test]
    fn test_doi_key() {
        assert_eq!(
            doi_key(Some(" 10.1000/ABC ")),
            Some("10.1000/abc".to_string())
        );
        assert_eq!(doi_key(Some("  ")), None);
        assert_eq!(doi_key(None), None);
    }

    #[rstest]
    #[case("2023", Some(2023))]
    #[case("  {2019} ", Some(2019))]
    #[case("circa 2001-2002", Some(2001))]
    #[case("n.d.", None)]
    #[case("", None)]
    fn test_extract_year(#[case] input: &str, #[case] expected: Option<i32>) {
        assert_eq!(extract_year(input), expected);
    }

    #[rstest]
    #[case("Doe, Jane", "Jane Doe")]
    #[case("van der Berg, A. B.", "A. B. van der Berg")]
    #[case(" Jane Doe ", "Jane Doe")]
    #[case("Doe,", "Doe")]
    fn test_display_author_name(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(display_author_name(input), expected);
    }

    #[test]
    fn test_html_helpers() {
        assert_eq!(strip_tags("<b>Deep</b> <i>Models</i>"), "Deep Models");
        assert_eq!(
            unescape_html("Q&amp;A &#8211; &#x41;&quot;x&quot; &bogus;"),
            "Q&A – A\"x\" &bogus;"
        );
        assert_eq!(
            unescape_html("Caf&eacute; Society in G&ouml;ttingen &ndash; &Aring;"),
            "Café Society in Göttingen – Å"
        );
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 60), "short");
        assert_eq!(truncate_chars("abcdef", 3), "abc...");
        assert_eq!(truncate_chars("ééé", 3), "ééé");
    }
}
