use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use dumbib_core::{EntryError, EntryRecord, EntryWarning, Severity, VenueTable};

mod authors;
mod braces;
mod fields;

pub use authors::{parse_author, parse_authors};
pub use braces::extract_text_in_braces;
pub use fields::{ResolvedVenue, find_field, parse_entry_type, parse_title, parse_year, resolve_venue};

/// Why a single field of a single entry could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("Malformed braces: {0}")]
    MalformedBraces(String),
    #[error("The field '{0}' was not found.")]
    MissingField(String),
    #[error("The field '{0}' is empty.")]
    EmptyField(String),
    #[error("Could not parse the author list: {0}")]
    AuthorListError(String),
    #[error("Could not find exactly one year in '{0}'.")]
    YearError(String),
    #[error("Unknown entry type '@{0}'. Only lower-case standard BibTeX types are supported.")]
    UnknownEntryType(String),
    #[error("Unknown venue: '{0}'. Add a row matching it to the venue table.")]
    UnknownVenue(String),
}

impl FieldError {
    /// Config-level errors mean the type or venue tables do not cover the
    /// input; everything else is local to one malformed entry.
    pub fn severity(&self) -> Severity {
        match self {
            FieldError::UnknownEntryType(_) | FieldError::UnknownVenue(_) => Severity::Config,
            _ => Severity::Entry,
        }
    }
}

impl From<FieldError> for EntryError {
    fn from(err: FieldError) -> Self {
        EntryError::new(err.severity(), err.to_string())
    }
}

#[derive(Error, Debug)]
pub enum BibError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed bibliography file: {0}")]
    MalformedFile(String),
}

/// One `@type{...}` unit cut out of a bibliography file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEntry {
    pub id: usize,
    /// Header tag and body, trailing whitespace removed.
    pub text: String,
    /// `@Type{` headers inside the body that were not split on.
    pub stray_headers: Vec<String>,
}

/// Entry headers the splitter recognizes: `@` plus lower-case letters.
static ENTRY_HEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@[a-z]*\{").unwrap());

/// Anything that looks like a header but was not split on: an upper-case
/// letter in the type, or whitespace before the brace.
static STRAY_HEADER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@[A-Za-z]+\s*\{").unwrap());

fn stray_headers(text: &str) -> Vec<String> {
    STRAY_HEADER_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Cut a bibliography into entries at every `@type{` header.
///
/// The file is split into alternating filler and entry segments; anything
/// before the first header is filler and is ignored.
pub fn split_entries(content: &str) -> Result<Vec<RawEntry>, BibError> {
    let mut segments: Vec<&str> = Vec::new();
    let mut last = 0;
    for m in ENTRY_HEADER_RE.find_iter(content) {
        segments.push(&content[last..m.start()]);
        segments.push(m.as_str());
        last = m.end();
    }
    segments.push(&content[last..]);

    // Filler and header segments alternate, starting and ending with filler.
    if segments.len() % 2 != 1 {
        return Err(BibError::MalformedFile(format!(
            "{} segments after splitting on entry headers",
            segments.len()
        )));
    }

    for header in stray_headers(segments[0]) {
        tracing::warn!(header = %header, "unrecognized entry header before the first entry");
    }

    let entries = segments[1..]
        .chunks(2)
        .enumerate()
        .map(|(id, pair)| {
            let (header, body) = match pair {
                [header, body] => (*header, *body),
                _ => (pair[0], ""),
            };
            RawEntry {
                id,
                text: format!("{}{}", header, body).trim_end().to_string(),
                stray_headers: stray_headers(body),
            }
        })
        .collect();
    Ok(entries)
}

/// Parse every field of one raw entry into a record.
///
/// Failures are recorded on the record, never propagated: one bad entry
/// must not stop the rest of the file.
pub fn build_record(entry: &RawEntry, venues: &VenueTable) -> EntryRecord {
    let raw = entry.text.as_str();
    let mut record = EntryRecord::new(entry.id, raw);

    match parse_entry_type(raw) {
        Ok(t) => record.entry_type = Some(t),
        Err(e) => record.errors.push(e.into()),
    }
    match parse_authors(raw) {
        Ok(authors) => record.author_list = authors,
        Err(e) => record.errors.push(e.into()),
    }
    match parse_year(raw) {
        Ok(year) => record.year = year,
        Err(e) => record.errors.push(e.into()),
    }
    match parse_title(raw) {
        Ok(title) => record.title = title,
        Err(e) => record.errors.push(e.into()),
    }

    // Without a type there is no venue field to look in, and the type
    // error is already recorded.
    let arxiv = raw.to_lowercase().contains("arxiv");
    if record.entry_type.is_some() || arxiv {
        match resolve_venue(raw, record.entry_type, venues) {
            Ok(resolved) => {
                record.venue = resolved.venue;
                record.arxiv = resolved.arxiv;
                if resolved.workshop {
                    record.warnings.push(EntryWarning::WorkshopVenue);
                }
            }
            Err(e) => record.errors.push(e.into()),
        }
    }

    record.warnings.extend(
        entry
            .stray_headers
            .iter()
            .cloned()
            .map(EntryWarning::UnrecognizedHeader),
    );

    tracing::debug!(
        id = record.id,
        entry_type = record.entry_type.map(|t| t.as_str()).unwrap_or("?"),
        errors = record.errors.len(),
        warnings = record.warnings.len(),
        "loaded entry"
    );
    record
}

/// Split and parse a whole bibliography held in memory.
pub fn load_bibliography_str(
    content: &str,
    venues: &VenueTable,
) -> Result<Vec<EntryRecord>, BibError> {
    let records: Vec<EntryRecord> = split_entries(content)?
        .iter()
        .map(|entry| build_record(entry, venues))
        .collect();

    tracing::info!(
        entries = records.len(),
        excluded = records.iter().filter(|r| !r.is_included()).count(),
        "loaded bibliography"
    );
    Ok(records)
}

/// Read and parse a bibliography file.
pub fn load_bibliography(path: &Path, venues: &VenueTable) -> Result<Vec<EntryRecord>, BibError> {
    let content = std::fs::read_to_string(path)?;
    load_bibliography_str(&content, venues)
}
