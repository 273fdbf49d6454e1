//! Title normalization.
//!
//! Two renderings of a bibliographic string are produced here:
//!
//! - [`clean_markup`] removes LaTeX markup but keeps the text readable. It is
//!   applied to titles, authors and venues coming out of BibTeX.
//! - [`normalize`] goes further and produces the comparison key used by the
//!   matcher and the merger. It is never displayed or persisted.
//!
//! ```
//! use cvpubs::normalize::normalize;
//!
//! assert_eq!(
//!     normalize(r"  \emph{Deep}   Models for {C}ausal Inference "),
//!     "deep models for causal inference"
//! );
//! ```

use crate::regex::{Captures, Regex};
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// `\'e`, `\"{o}`, `{\'\i}` ...
static SYMBOL_ACCENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\\([`'^"~=.])\s*(?:\{\\?([A-Za-z])\}|\\?([A-Za-z]))"#).unwrap());

/// `\c{c}`, `\v s`, `\k{e}` ...
static LETTER_ACCENT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\([uvHckr])(?:\{\\?([A-Za-z])\}|\s+([A-Za-z])\b)").unwrap()
});

static SPECIAL_LETTER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\(ss|ae|AE|oe|OE|aa|AA|o|O|l|L|i)(?:\{\}|\s+|\b)").unwrap());

static ESCAPED_SYMBOL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\([&%$#_ ])").unwrap());

static COMMAND_WITH_ARGUMENT_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\[a-zA-Z]+\{([^}]*)\}").unwrap());

static BARE_COMMAND_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\[a-zA-Z]+").unwrap());

static WHITESPACE_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Maps a LaTeX accent command to the Unicode combining mark it stands for.
fn combining_mark(command: &str) -> Option<char> {
    let mark = match command {
        "`" => '\u{0300}',
        "'" => '\u{0301}',
        "^" => '\u{0302}',
        "~" => '\u{0303}',
        "=" => '\u{0304}',
        "u" => '\u{0306}',
        "." => '\u{0307}',
        "\"" => '\u{0308}',
        "r" => '\u{030A}',
        "H" => '\u{030B}',
        "v" => '\u{030C}',
        "c" => '\u{0327}',
        "k" => '\u{0328}',
        _ => return None,
    };
    Some(mark)
}

fn special_letter(command: &str) -> &'static str {
    match command {
        "ss" => "ß",
        "ae" => "æ",
        "AE" => "Æ",
        "oe" => "œ",
        "OE" => "Œ",
        "aa" => "å",
        "AA" => "Å",
        "o" => "ø",
        "O" => "Ø",
        "l" => "ł",
        "L" => "Ł",
        _ => "i",
    }
}

fn compose_accent(caps: &Captures) -> String {
    let letter = caps
        .get(2)
        .or_else(|| caps.get(3))
        .map(|m| m.as_str())
        .unwrap_or_default();
    match combining_mark(&caps[1]) {
        Some(mark) => letter.chars().chain(std::iter::once(mark)).nfc().collect(),
        None => caps[0].to_string(),
    }
}

/// Decodes accent commands and escaped symbols into plain Unicode.
fn decode_latex(text: &str) -> String {
    let text = SYMBOL_ACCENT_REGEX.replace_all(text, |caps: &Captures| compose_accent(caps));
    let text = LETTER_ACCENT_REGEX.replace_all(&text, |caps: &Captures| compose_accent(caps));
    let text = SPECIAL_LETTER_REGEX
        .replace_all(&text, |caps: &Captures| special_letter(&caps[1]).to_string());
    let text = ESCAPED_SYMBOL_REGEX.replace_all(&text, "$1");
    text.replace('~', " ")
}

/// Collapses every run of whitespace to a single space and trims the ends.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_REGEX.replace_all(text, " ").trim().to_string()
}

/// Strips LaTeX markup from a display string.
///
/// Accent commands become composed characters, `\command{text}` becomes
/// `text`, remaining bare commands and braces are dropped, and whitespace is
/// collapsed. Case is preserved.
pub fn clean_markup(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }
    let text = decode_latex(text);
    let text = COMMAND_WITH_ARGUMENT_REGEX.replace_all(&text, "$1");
    let text = BARE_COMMAND_REGEX.replace_all(&text, "");
    let text = text.replace(['{', '}'], "");
    collapse_whitespace(&text)
}

/// Produces the comparison key for a title.
///
/// Markup is stripped as in [`clean_markup`], backslashes and quote
/// characters are removed, whitespace is collapsed and the result is
/// lowercased. `normalize(normalize(x)) == normalize(x)` for every input.
pub fn normalize(title: &str) -> String {
    let cleaned = clean_markup(title);
    let cleaned = cleaned.replace(['\\', '\'', '"', '“', '”', '‘', '’'], "");
    collapse_whitespace(&cleaned).to_lowercase().nfc().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case("", "")]
    #[case("Plain Title", "Plain Title")]
    #[case(r"\textbf{Bold} move", "Bold move")]
    #[case(r"The {BERT} model", "The BERT model")]
    #[case(r"\textbf{\emph{Nested}} markup", "Nested markup")]
    #[case(r#"Schr\"{o}dinger's cat"#, "Schrödinger's cat")]
    #[case(r"Caf\'e and Fa\c{c}ade", "Café and Façade")]
    #[case(r"Stra\ss e", "Straße")]
    #[case(r"Learning \& Reasoning", "Learning & Reasoning")]
    #[case("Multi\n   line\ttitle ", "Multi line title")]
    #[case(r"On the \LaTeX\ system", "On the system")]
    fn test_clean_markup(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(clean_markup(input), expected);
    }

    #[test]
    fn test_normalize_case_and_whitespace() {
        assert_eq!(normalize("The  Title"), normalize("the title"));
        assert_eq!(normalize("  The\tTitle \n"), "the title");
    }

    #[test]
    fn test_normalize_strips_markup_and_quotes() {
        assert_eq!(
            normalize(r#"``Quoted'' {D}eep \emph{Models}"#),
            "``quoted deep models"
        );
        assert_eq!(normalize(r"A \\ B"), "a b");
    }

    #[test]
    fn test_normalize_matches_decoded_accents() {
        assert_eq!(normalize(r#"Schr\"odinger"#), normalize("Schrödinger"));
    }

    #[rstest]
    #[case("")]
    #[case("The  Title")]
    #[case(r"\emph{Deep} Models for {C}ausal \textit{Inference}")]
    #[case(r#"Caf\'e ``quoted'' \\ odd {{braces}}"#)]
    #[case("ÀÉÎ mixed Case ǅ")]
    fn test_normalize_is_idempotent(#[case] input: &str) {
        let once = normalize(input);
        assert_eq!(normalize(&once), once);
    }
}
