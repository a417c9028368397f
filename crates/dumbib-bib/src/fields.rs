use once_cell::sync::Lazy;
use regex::Regex;

use dumbib_core::{EntryType, VenueTable};

use crate::{FieldError, extract_text_in_braces};

/// `name = {` with the name on a word boundary, so `title` never matches
/// inside `booktitle`.
static FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b([A-Za-z][A-Za-z0-9_-]*)\s*=\s*\{").unwrap());

/// Locate field `name` in a raw entry and return its brace content.
///
/// Field names are case-sensitive. The first occurrence wins.
pub fn find_field<'a>(raw: &'a str, name: &str) -> Result<&'a str, FieldError> {
    let caps = FIELD_RE
        .captures_iter(raw)
        .find(|c| &c[1] == name)
        .ok_or_else(|| FieldError::MissingField(name.to_string()))?;
    let open = caps.get(0).map_or(0, |m| m.end() - 1);

    extract_text_in_braces(&raw[open..]).map_err(|e| match e {
        FieldError::MalformedBraces(detail) => {
            FieldError::MalformedBraces(format!("in field '{}': {}", name, detail))
        }
        other => other,
    })
}

/// Like [`find_field`], but whitespace-only content is an `EmptyField` error.
fn find_nonempty_field<'a>(raw: &'a str, name: &str) -> Result<&'a str, FieldError> {
    let content = find_field(raw, name)?;
    if content.trim().is_empty() {
        return Err(FieldError::EmptyField(name.to_string()));
    }
    Ok(content)
}

/// The letters right after the `@` of an entry header.
pub(crate) fn entry_tag(raw: &str) -> &str {
    static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@([a-z]*)").unwrap());
    TAG_RE
        .captures(raw)
        .and_then(|c| c.get(1))
        .map_or("", |m| m.as_str())
}

/// Classify an entry by its lower-case `@type` tag.
pub fn parse_entry_type(raw: &str) -> Result<EntryType, FieldError> {
    let tag = entry_tag(raw);
    EntryType::from_tag(tag).ok_or_else(|| FieldError::UnknownEntryType(tag.to_string()))
}

/// The single number inside `year = {...}`.
///
/// `{2023, July}` gives `2023`. Anything else is rejected rather than
/// guessed at: no number (`{n.d.}`), several numbers (`{19 90}`), or a
/// number glued to letters (`{circa 1990s}`).
pub fn parse_year(raw: &str) -> Result<String, FieldError> {
    static NUMBER_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"[A-Za-z]*[0-9]+[A-Za-z]*").unwrap());

    let content = find_nonempty_field(raw, "year")?;
    let runs: Vec<&str> = NUMBER_RE.find_iter(content).map(|m| m.as_str()).collect();
    match runs.as_slice() {
        [year] if year.parse::<u32>().is_ok() => Ok((*year).to_string()),
        _ => Err(FieldError::YearError(content.trim().to_string())),
    }
}

/// Title with every whitespace run collapsed to one space.
pub fn parse_title(raw: &str) -> Result<String, FieldError> {
    let content = find_nonempty_field(raw, "title")?;
    Ok(content.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Outcome of venue resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVenue {
    pub venue: String,
    /// The raw entry mentions arXiv; the venue came from `eprint`.
    pub arxiv: bool,
    /// The venue is a workshop and was used verbatim.
    pub workshop: bool,
}

/// Resolve the display venue of an entry.
///
/// The field consulted depends on the entry type, except that any mention
/// of arXiv in the raw text switches to `eprint`. Workshop venues are used
/// verbatim; everything else must match a row of `table`.
pub fn resolve_venue(
    raw: &str,
    entry_type: Option<EntryType>,
    table: &VenueTable,
) -> Result<ResolvedVenue, FieldError> {
    let arxiv = raw.to_lowercase().contains("arxiv");
    let field = match (arxiv, entry_type) {
        (true, _) => "eprint",
        (false, Some(t)) => t.venue_field(),
        (false, None) => return Err(FieldError::UnknownEntryType(entry_tag(raw).to_string())),
    };

    let content = find_nonempty_field(raw, field)?.trim();

    if content.to_lowercase().contains("workshop") {
        return Ok(ResolvedVenue {
            venue: content.to_string(),
            arxiv,
            workshop: true,
        });
    }

    let content = content.split_whitespace().collect::<Vec<_>>().join(" ");

    if arxiv {
        return Ok(ResolvedVenue {
            venue: format!("arXiv: {}", content),
            arxiv,
            workshop: false,
        });
    }

    let row = table
        .lookup(&content)
        .ok_or_else(|| FieldError::UnknownVenue(content))?;
    Ok(ResolvedVenue {
        venue: row.display_name(),
        arxiv,
        workshop: false,
    })
}
