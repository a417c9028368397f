use once_cell::sync::Lazy;
use regex::Regex;

use dumbib_core::Author;

use crate::{FieldError, find_field};

/// Name particles that belong to the surname rather than the given names.
/// Compound particles are glued with `_` before the name is split.
const PARTICLES: &[&str] = &[
    "van", "von", "da", "de", "der", "van_de", "van_der", "von_de", "von_der",
];

/// Separator placed between successive initials (a forced LaTeX space).
const INITIAL_SEPARATOR: &str = "\\ ";

/// Parse `author = {...}` into an ordered author list.
///
/// Authors are separated by the word `and` (case-sensitive). Each name may
/// be written `Last, First Middle` or `First Middle Last`.
pub fn parse_authors(raw: &str) -> Result<Vec<Author>, FieldError> {
    let content = find_field(raw, "author")?;
    if content.trim().is_empty() {
        return Err(FieldError::EmptyField("author".to_string()));
    }

    let words: Vec<&str> = content.split_whitespace().collect();
    let authors = words
        .split(|w| *w == "and")
        .enumerate()
        .map(|(i, name)| {
            if name.is_empty() {
                return Err(FieldError::AuthorListError(format!(
                    "author #{} in '{}' is empty",
                    i + 1,
                    content.trim()
                )));
            }
            parse_author(&name.join(" "))
        })
        .collect::<Result<Vec<_>, _>>()?;

    tracing::trace!(count = authors.len(), "parsed author list");
    Ok(authors)
}

/// Parse one author name into surname and abbreviated given names.
///
/// Particles among the given names move onto the surname in lower case, so
/// `Rip Van Winkle` becomes `van Winkle R.`. Given names are reduced to
/// their first character; names with multi-letter initial conventions are
/// not special-cased.
pub fn parse_author(name: &str) -> Result<Author, FieldError> {
    static PARTICLE_JOIN_RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"(?i)\b(v[ao]n) (der?)\b").unwrap());

    let name = name.trim();
    let joined = PARTICLE_JOIN_RE.replace_all(name, "${1}_${2}");

    let (last_name, given_names): (&str, Vec<&str>) = match joined.split_once(',') {
        Some((last, rest)) => (last.trim(), rest.split_whitespace().collect()),
        None => {
            let mut words: Vec<&str> = joined.split_whitespace().collect();
            let last = words.pop().unwrap_or("");
            (last, words)
        }
    };

    if last_name.is_empty() {
        return Err(FieldError::AuthorListError(format!(
            "no last name in author '{}'",
            name
        )));
    }

    let mut particles = Vec::new();
    let mut initials = Vec::new();
    for given in given_names {
        let lower = given.to_lowercase();
        if PARTICLES.contains(&lower.as_str()) {
            particles.push(lower);
        } else if let Some(first) = given.chars().next() {
            initials.push(format!("{}.", first));
        }
    }

    particles.push(last_name.to_string());
    Ok(Author::new(
        particles.join(" ").replace('_', " "),
        initials.join(INITIAL_SEPARATOR),
    ))
}
