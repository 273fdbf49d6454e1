//! BibTeX text parsing.
//!
//! This module turns BibTeX text into raw entries: entry type, citation key
//! and fields with `@string` macros and `#` concatenation already resolved.
//! Text outside entries is ignored, as BibTeX does.
//!
//! A malformed entry does not stop the parse. It is reported with the line
//! it starts on and parsing resumes at the next `@` after its start, so an
//! unclosed brace costs only the entry it appears in.

use crate::bibtex::structure::RawBibtexEntry;
use either::Either;
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{take_until, take_while, take_while1},
    character::complete::{char, digit1, multispace0, one_of},
    combinator::{map, opt},
    error::{Error as NomError, ErrorKind},
    multi::{many0, separated_list1},
    sequence::{preceded, terminated, tuple},
};
use std::collections::HashMap;

/// A piece of a field value: a literal, or the name of a macro to expand.
type ValuePiece = Either<String, String>;

type Res<'a, T> = IResult<&'a str, T>;

type Field<'a> = (&'a str, Vec<ValuePiece>);

const MONTH_MACROS: [(&str, &str); 12] = [
    ("jan", "January"),
    ("feb", "February"),
    ("mar", "March"),
    ("apr", "April"),
    ("may", "May"),
    ("jun", "June"),
    ("jul", "July"),
    ("aug", "August"),
    ("sep", "September"),
    ("oct", "October"),
    ("nov", "November"),
    ("dec", "December"),
];

/// An entry that could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SyntaxError {
    /// Line on which the entry starts.
    pub(crate) line: usize,
    /// Citation key, when it was read before the failure.
    pub(crate) key: Option<String>,
    pub(crate) message: String,
}

/// Everything found in a BibTeX document.
#[derive(Debug, Default)]
pub(crate) struct ParsedBibtex {
    pub(crate) entries: Vec<RawBibtexEntry>,
    pub(crate) errors: Vec<SyntaxError>,
}

enum Block<'a> {
    Entry {
        entry_type: &'a str,
        key: &'a str,
        fields: Vec<Field<'a>>,
    },
    Macro(&'a str, Vec<ValuePiece>),
    Ignored,
}

struct BlockError<'a> {
    key: Option<&'a str>,
    error: nom::Err<NomError<&'a str>>,
}

/// Newline offsets, for turning input positions into line numbers.
struct LineIndex(Vec<usize>);

impl LineIndex {
    fn new(text: &str) -> Self {
        Self(text.match_indices('\n').map(|(offset, _)| offset).collect())
    }

    fn line_of(&self, offset: usize) -> usize {
        self.0.partition_point(|&newline| newline < offset) + 1
    }
}

/// Parse BibTeX text into raw entries and syntax errors.
pub(crate) fn bibtex_parse(text: &str) -> ParsedBibtex {
    let lines = LineIndex::new(text);
    let line_at = |rest: &str| lines.line_of(text.len() - rest.len());
    let mut macros: HashMap<String, String> = MONTH_MACROS
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();
    let mut parsed = ParsedBibtex::default();

    let mut rest = text;
    while let Some(at) = rest.find('@') {
        let block = &rest[at..];
        let line = line_at(block);

        match read_block(block) {
            Ok((after, Block::Entry {
                entry_type,
                key,
                fields,
            })) => {
                let mut resolved: Vec<(String, String)> = Vec::with_capacity(fields.len());
                for (name, pieces) in fields {
                    let name = name.to_lowercase();
                    // First occurrence wins
                    if !resolved.iter().any(|(existing, _)| *existing == name) {
                        resolved.push((name, expand(pieces, &macros)));
                    }
                }
                parsed.entries.push(RawBibtexEntry {
                    entry_type: entry_type.to_lowercase(),
                    key: key.to_string(),
                    fields: resolved,
                    line,
                });
                rest = after;
            }
            Ok((after, Block::Macro(name, pieces))) => {
                let value = expand(pieces, &macros);
                macros.insert(name.to_lowercase(), value);
                rest = after;
            }
            Ok((after, Block::Ignored)) => rest = after,
            Err(BlockError { key, error }) => {
                parsed.errors.push(SyntaxError {
                    line,
                    key: key.map(String::from),
                    message: describe(error, line_at),
                });
                rest = &block[1..];
            }
        }
    }

    parsed
}

fn expand(pieces: Vec<ValuePiece>, macros: &HashMap<String, String>) -> String {
    pieces
        .into_iter()
        .map(|piece| match piece {
            Either::Left(literal) => literal,
            Either::Right(name) => macros
                .get(&name.to_lowercase())
                .cloned()
                .unwrap_or(name),
        })
        .collect()
}

fn describe(error: nom::Err<NomError<&str>>, line_at: impl Fn(&str) -> usize) -> String {
    match error {
        nom::Err::Incomplete(_) => "unexpected end of input".to_string(),
        nom::Err::Error(err) | nom::Err::Failure(err) => match (err.code, err.input.chars().next()) {
            (ErrorKind::Eof, _) => {
                format!("unterminated value starting at line {}", line_at(err.input))
            }
            (_, Some(c)) => format!("unexpected '{c}' at line {}", line_at(err.input)),
            (_, None) => "unexpected end of input".to_string(),
        },
    }
}

/// Reads one `@type{...}` block starting at `@`.
fn read_block(input: &str) -> Result<(&str, Block<'_>), BlockError<'_>> {
    let no_key = |error| BlockError { key: None, error };
    // An `@` that does not open a block is plain text
    let Ok((body, (kind, open))) = block_open(input) else {
        return Ok((&input[1..], Block::Ignored));
    };
    let close = if open == '{' { '}' } else { ')' };

    match kind.to_lowercase().as_str() {
        "comment" => {
            let (rest, _) = comment_body(body, open).map_err(no_key)?;
            let (rest, _) = char(close)(rest).map_err(no_key)?;
            Ok((rest, Block::Ignored))
        }
        "preamble" => {
            let (rest, _) = terminated(ws(value), ws(char(close)))(body).map_err(no_key)?;
            Ok((rest, Block::Ignored))
        }
        "string" => {
            let (rest, (name, _, pieces, _)) = tuple((
                ws(identifier),
                ws(char('=')),
                ws(value),
                ws(char(close)),
            ))(body)
            .map_err(no_key)?;
            Ok((rest, Block::Macro(name, pieces)))
        }
        _ => {
            let (body, key) = ws(take_while(|c: char| {
                c != ',' && c != close && !c.is_whitespace()
            }))(body)
            .map_err(no_key)?;
            let (rest, fields) = entry_fields(body, close).map_err(|error| BlockError {
                key: Some(key).filter(|k| !k.is_empty()),
                error,
            })?;
            Ok((rest, Block::Entry {
                entry_type: kind,
                key,
                fields,
            }))
        }
    }
}

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> Res<'a, O>
where
    F: FnMut(&'a str) -> Res<'a, O>,
{
    preceded(multispace0, inner)
}

fn identifier(input: &str) -> Res<'_, &str> {
    take_while1(|c: char| c.is_alphanumeric() || "_-:.+/'".contains(c))(input)
}

/// `@type` followed by the opening delimiter.
fn block_open(input: &str) -> Res<'_, (&str, char)> {
    preceded(char('@'), tuple((ws(identifier), ws(one_of("{(")))))(input)
}

/// `, name = value` repeated, an optional trailing comma and the closing
/// delimiter.
fn entry_fields(input: &str, close: char) -> Res<'_, Vec<Field<'_>>> {
    terminated(
        many0(preceded(ws(char(',')), ws(field))),
        tuple((opt(ws(char(','))), ws(char(close)))),
    )(input)
}

fn field(input: &str) -> Res<'_, Field<'_>> {
    let (rest, (name, _, pieces)) = tuple((identifier, ws(char('=')), ws(value)))(input)?;
    Ok((rest, (name, pieces)))
}

/// `piece # piece # ...`
fn value(input: &str) -> Res<'_, Vec<ValuePiece>> {
    separated_list1(ws(char('#')), ws(piece))(input)
}

fn piece(input: &str) -> Res<'_, ValuePiece> {
    alt((
        map(braced, |text: &str| Either::Left(text.to_string())),
        map(quoted, |text: &str| Either::Left(text.to_string())),
        map(digit1, |digits: &str| Either::Left(digits.to_string())),
        map(identifier, |name: &str| Either::Right(name.to_string())),
    ))(input)
}

/// `{...}` with nested braces; yields the text between the outer braces.
///
/// An unterminated value is a hard failure so that no alternative is tried.
fn braced(input: &str) -> Res<'_, &str> {
    let (body, _) = char('{')(input)?;
    let mut depth = 1usize;
    for (index, c) in body.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&body[index + 1..], &body[..index]));
                }
            }
            _ => {}
        }
    }
    Err(nom::Err::Failure(NomError::new(input, ErrorKind::Eof)))
}

/// `"..."`; quotes inside braces do not end the value.
fn quoted(input: &str) -> Res<'_, &str> {
    let (body, _) = char('"')(input)?;
    let mut depth = 0usize;
    for (index, c) in body.char_indices() {
        match c {
            '"' if depth == 0 => return Ok((&body[index + 1..], &body[..index])),
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    Err(nom::Err::Failure(NomError::new(input, ErrorKind::Eof)))
}

/// Everything up to the delimiter closing an already consumed `open`.
fn comment_body(input: &str, open: char) -> Res<'_, &str> {
    if open == '(' {
        return take_until(")")(input);
    }
    let mut depth = 1usize;
    for (index, c) in input.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&input[index..], &input[..index]));
                }
            }
            _ => {}
        }
    }
    Err(nom::Err::Failure(NomError::new(input, ErrorKind::Eof)))
}
