//! Whole-list transforms applied after loading.
//!
//! Unlike the field parsers these operate on the full record collection:
//! sorting, duplicate detection, citation keys, year letters and italics.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use crate::{Author, EntryError, EntryRecord, EntryWarning, Settings, Style};

/// Letters available for disambiguating same-key entries.
const YEAR_LETTERS: &str = "abcdefghijklmnopqrstuvwxyz";

/// Placeholder used in place of author names when an entry has none.
const NO_AUTHORS: &str = "???";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TransformError {
    #[error(
        "{} entries share the citation key '{key}' (reference ids {}); year letters only go up to 'z'",
        .ids.len(),
        join_ids(.ids)
    )]
    YearIndexExhausted { key: String, ids: Vec<usize> },
    #[error("entry #{id} is included but has no entry type to derive its style from")]
    MissingStyle { id: usize },
}

impl TransformError {
    /// Ids of the records that caused the failure, in citation order.
    pub fn entry_ids(&self) -> Vec<usize> {
        match self {
            TransformError::YearIndexExhausted { ids, .. } => ids.clone(),
            TransformError::MissingStyle { id } => vec![*id],
        }
    }
}

fn join_ids(ids: &[usize]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Run every transform step in order.
pub fn transform(records: &mut [EntryRecord], settings: &Settings) -> Result<(), TransformError> {
    build_author_strings(records);
    sort_records(records);
    flag_duplicates(records, settings.duplicate_match_year);
    assign_keys(records);
    assign_year_indices(records)?;
    build_compact_citations(records);
    finalize(records)?;

    tracing::info!(
        total = records.len(),
        included = records.iter().filter(|r| r.is_included()).count(),
        duplicates = records.iter().filter(|r| r.is_duplicate()).count(),
        "transformed reference list"
    );
    Ok(())
}

/// `Last1 F., Last2 G.` with a trailing period enforced.
pub fn author_string(authors: &[Author]) -> String {
    if authors.is_empty() {
        return NO_AUTHORS.to_string();
    }
    let mut joined = authors
        .iter()
        .map(Author::display)
        .collect::<Vec<_>>()
        .join(", ");
    if !joined.ends_with('.') {
        joined.push('.');
    }
    joined
}

pub fn build_author_strings(records: &mut [EntryRecord]) {
    for record in records.iter_mut().filter(|r| r.is_included()) {
        record.author_string = author_string(&record.author_list);
    }
}

/// Stable sort of all records by `(author_string, year, title)`.
pub fn sort_records(records: &mut [EntryRecord]) {
    records.sort_by(|a, b| {
        (a.author_string.as_str(), a.year_value(), a.title.as_str()).cmp(&(
            b.author_string.as_str(),
            b.year_value(),
            b.title.as_str(),
        ))
    });
}

/// Compare each included record with the previous included one.
///
/// Same authors and same title (both case-insensitive) marks the later
/// record as a duplicate and excludes it; same authors alone only warns.
/// When `match_year` is set the years must also be equal for either check.
/// A duplicate never becomes the anchor for the next comparison.
pub fn flag_duplicates(records: &mut [EntryRecord], match_year: bool) {
    let mut anchor: Option<usize> = None;

    for i in 0..records.len() {
        if !records[i].is_included() {
            continue;
        }

        if let Some(a) = anchor {
            let earlier = &records[a];
            let later = &records[i];
            let same_authors =
                earlier.author_string.to_lowercase() == later.author_string.to_lowercase();
            let same_year = !match_year || earlier.year == later.year;

            if same_authors && same_year {
                let earlier_id = earlier.id;
                let later_id = later.id;
                if earlier.title.to_lowercase() == later.title.to_lowercase() {
                    let record = &mut records[i];
                    record.duplicate_of = Some(earlier_id);
                    record
                        .errors
                        .push(EntryError::duplicate(earlier_id, later_id));
                    tracing::debug!(earlier = earlier_id, later = later_id, "duplicate entry");
                    continue;
                }
                let record = &mut records[i];
                record.possible_duplicate_of = Some(earlier_id);
                record.warnings.push(EntryWarning::PossibleDuplicate {
                    earlier: earlier_id,
                    later: later_id,
                });
            }
        }

        anchor = Some(i);
    }
}

/// Strip everything outside `[A-Za-z0-9_-]` and lower-case.
pub fn sanitize_key(raw: &str) -> String {
    static KEY_STRIP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9_-]+").unwrap());
    KEY_STRIP_RE.replace_all(raw, "").to_lowercase()
}

/// Citation key before any year letter is appended.
///
/// - one author: `<last><year>`
/// - two authors: `<last1>_<last2><year>`
/// - three or more: `<last1>_etal<year>`
pub fn base_key(authors: &[Author], year: &str) -> String {
    let names = match authors {
        [] => NO_AUTHORS.to_string(),
        [only] => only.last_name.clone(),
        [first, second] => format!("{}_{}", first.last_name, second.last_name),
        [first, ..] => format!("{}_etal", first.last_name),
    };
    sanitize_key(&format!("{}{}", names, year))
}

/// In-text author form: `Last`, `Last1 and Last2`, or `Last1 et al.`.
pub fn short_author_citation(authors: &[Author]) -> String {
    match authors {
        [] => NO_AUTHORS.to_string(),
        [only] => only.last_name.clone(),
        [first, second] => format!("{} and {}", first.last_name, second.last_name),
        [first, ..] => format!("{} et al.", first.last_name),
    }
}

pub fn assign_keys(records: &mut [EntryRecord]) {
    for record in records.iter_mut().filter(|r| r.is_included()) {
        if record.author_list.is_empty() {
            record.warnings.push(EntryWarning::ZeroAuthors);
        }
        record.citation_key = base_key(&record.author_list, &record.year);
        record.short_author_citation = short_author_citation(&record.author_list);
    }
}

/// Give every group of included records sharing a key the letters
/// `a`, `b`, ... in sort order. Keys used only once get no letter.
pub fn assign_year_indices(records: &mut [EntryRecord]) -> Result<(), TransformError> {
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, record) in records.iter().enumerate() {
        if record.is_included() {
            groups.entry(record.citation_key.as_str()).or_default().push(i);
        }
    }

    let mut assignments = Vec::new();
    for (key, members) in groups {
        if members.len() < 2 {
            continue;
        }
        if members.len() > YEAR_LETTERS.len() {
            return Err(TransformError::YearIndexExhausted {
                key: key.to_string(),
                ids: members.iter().map(|&i| records[i].id).collect(),
            });
        }
        assignments.extend(members.into_iter().zip(YEAR_LETTERS.chars()));
    }

    for (i, letter) in assignments {
        records[i].year_index = Some(letter);
    }
    Ok(())
}

/// `[XYZ+2025]`-style label: first three letters of a sole author's
/// surname, or the surname initials of several authors (at most four,
/// then `+`), followed by the year label.
pub fn compact_citation(authors: &[Author], year_label: &str) -> String {
    let mut prefix: String = match authors {
        [only] => only
            .last_name
            .chars()
            .filter(|c| c.is_alphabetic())
            .take(3)
            .collect(),
        _ => authors
            .iter()
            .filter_map(|a| a.last_name.chars().find(|c| c.is_alphabetic()))
            .collect(),
    };
    if authors.len() > 1 && prefix.chars().count() > 4 {
        prefix = prefix.chars().take(4).collect();
        prefix.push('+');
    }
    format!("{}{}", prefix, year_label)
}

pub fn build_compact_citations(records: &mut [EntryRecord]) {
    for record in records.iter_mut().filter(|r| r.is_included()) {
        record.compact_citation = compact_citation(&record.author_list, &record.year_label());
    }
}

pub fn italicize(text: &str) -> String {
    format!("\\textit{{{}}}", text)
}

/// Append year letters to keys and apply style italics, exactly once.
pub fn finalize(records: &mut [EntryRecord]) -> Result<(), TransformError> {
    for record in records.iter_mut().filter(|r| r.is_included()) {
        if let Some(letter) = record.year_index {
            record.citation_key.push(letter);
        }
        match record.style() {
            Some(Style::PaperLike) => record.venue = italicize(&record.venue),
            Some(Style::BookLike) => record.title = italicize(&record.title),
            None => return Err(TransformError::MissingStyle { id: record.id }),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EntryType, Severity};

    fn record(id: usize, authors: &[(&str, &str)], year: &str, title: &str) -> EntryRecord {
        let mut r = EntryRecord::new(id, format!("@article{{k{id}, ...}}"));
        r.entry_type = Some(EntryType::Article);
        r.author_list = authors.iter().map(|(l, f)| Author::new(*l, *f)).collect();
        r.year = year.to_string();
        r.title = title.to_string();
        r.venue = "Journal".to_string();
        r
    }

    fn run(records: &mut Vec<EntryRecord>) {
        transform(records, &Settings::default()).unwrap();
    }

    #[test]
    fn test_author_string_trailing_period() {
        let authors = vec![Author::new("Smith", "J."), Author::new("Jones", "A.")];
        assert_eq!(author_string(&authors), "Smith J., Jones A.");
        assert_eq!(author_string(&[Author::new("Plato", "")]), "Plato.");
        assert_eq!(author_string(&[]), "???");
    }

    #[test]
    fn test_sort_by_authors_then_year() {
        let mut records = vec![
            record(0, &[("Aaronson", "S.")], "2001", "Quantum"),
            record(1, &[("Feynman", "R.")], "1965", "Lectures"),
            record(2, &[("Feynman", "R.")], "1960", "Plenty of Room"),
        ];
        build_author_strings(&mut records);
        sort_records(&mut records);
        let order: Vec<_> = records.iter().map(|r| (r.author_string.as_str(), r.year.as_str())).collect();
        assert_eq!(
            order,
            vec![("Aaronson S.", "2001"), ("Feynman R.", "1960"), ("Feynman R.", "1965")]
        );
    }

    #[test]
    fn test_sort_year_is_numeric() {
        let mut records = vec![
            record(0, &[("Smith", "J.")], "2010", "B"),
            record(1, &[("Smith", "J.")], "999", "A"),
        ];
        build_author_strings(&mut records);
        sort_records(&mut records);
        assert_eq!(records[0].year, "999");
    }

    #[test]
    fn test_duplicate_excluded_with_both_ids() {
        let mut records = vec![
            record(4, &[("Smith", "J.")], "2020", "A Study"),
            record(9, &[("smith", "j.")], "2020", "a study"),
        ];
        run(&mut records);
        let dup = records.iter().find(|r| r.id == 9).unwrap();
        assert!(!dup.is_included());
        assert_eq!(dup.duplicate_of, Some(4));
        assert!(dup.error_message().contains("#4 and #9"));
        let kept = records.iter().find(|r| r.id == 4).unwrap();
        assert!(kept.is_included());
        assert_eq!(kept.citation_key, "smith2020");
        assert_eq!(kept.year_index, None);
    }

    #[test]
    fn test_possible_duplicate_only_warns() {
        let mut records = vec![
            record(0, &[("Smith", "J.")], "2020", "A Study"),
            record(1, &[("Smith", "J.")], "2020", "Another Study"),
        ];
        run(&mut records);
        let second = records.iter().find(|r| r.id == 1).unwrap();
        assert!(second.is_included());
        assert_eq!(second.possible_duplicate_of, Some(0));
        assert!(second.warning_message().contains("possibly duplicate"));
    }

    #[test]
    fn test_duplicate_year_policy() {
        // Same authors and title, different years.
        let make = || {
            vec![
                record(0, &[("Smith", "J.")], "2019", "A Study"),
                record(1, &[("Smith", "J.")], "2020", "A Study"),
            ]
        };

        let mut year_inclusive = make();
        transform(&mut year_inclusive, &Settings::default()).unwrap();
        assert!(year_inclusive.iter().all(|r| r.is_included()));
        assert!(year_inclusive.iter().all(|r| r.possible_duplicate_of.is_none()));

        let mut year_blind = make();
        let settings = Settings {
            duplicate_match_year: false,
            ..Settings::default()
        };
        transform(&mut year_blind, &settings).unwrap();
        let second = year_blind.iter().find(|r| r.id == 1).unwrap();
        assert_eq!(second.duplicate_of, Some(0));
        assert!(!second.is_included());
    }

    #[test]
    fn test_triplicate_all_caught() {
        let mut records = vec![
            record(0, &[("Smith", "J.")], "2020", "A Study"),
            record(1, &[("Smith", "J.")], "2020", "A Study"),
            record(2, &[("Smith", "J.")], "2020", "A Study"),
        ];
        run(&mut records);
        assert_eq!(records.iter().filter(|r| r.is_included()).count(), 1);
        assert_eq!(records[2].duplicate_of, Some(0));
    }

    #[test]
    fn test_excluded_records_skip_duplicate_check() {
        let mut bad = record(1, &[("Smith", "J.")], "2020", "A Study");
        bad.errors
            .push(EntryError::new(Severity::Entry, "broken venue"));
        let mut records = vec![record(0, &[("Smith", "J.")], "2020", "A Study"), bad];
        run(&mut records);
        let bad = records.iter().find(|r| r.id == 1).unwrap();
        assert!(bad.duplicate_of.is_none());
        assert_eq!(bad.errors.len(), 1);
        assert!(bad.citation_key.is_empty());
    }

    #[test]
    fn test_keys_and_short_citations() {
        let one = [Author::new("Feynman", "R.")];
        let two = [Author::new("Smith", "J."), Author::new("Jones", "A.")];
        let three = [
            Author::new("van Winkle", "R."),
            Author::new("Jones", "A."),
            Author::new("Brown", "C."),
        ];
        assert_eq!(base_key(&one, "1965"), "feynman1965");
        assert_eq!(base_key(&two, "2020"), "smith_jones2020");
        assert_eq!(base_key(&three, "2001"), "vanwinkle_etal2001");
        assert_eq!(base_key(&[Author::new("{\\\"O}zt{\\\"u}rk", "A.")], "2019"), "ozturk2019");
        assert_eq!(short_author_citation(&one), "Feynman");
        assert_eq!(short_author_citation(&two), "Smith and Jones");
        assert_eq!(short_author_citation(&three), "van Winkle et al.");
    }

    #[test]
    fn test_zero_authors_placeholder() {
        let mut records = vec![record(0, &[], "2020", "Anonymous Work")];
        run(&mut records);
        let r = &records[0];
        assert!(r.is_included());
        assert_eq!(r.short_author_citation, "???");
        assert_eq!(r.citation_key, "2020");
        assert_eq!(r.warnings, vec![EntryWarning::ZeroAuthors]);
    }

    #[test]
    fn test_year_letters_in_sort_order() {
        let mut records = vec![
            record(0, &[("Feynman", "R.")], "1965", "Gamma"),
            record(1, &[("Feynman", "R.")], "1965", "Alpha"),
            record(2, &[("Feynman", "R.")], "1965", "Beta"),
        ];
        run(&mut records);
        let keys: Vec<_> = records
            .iter()
            .map(|r| (r.id, r.citation_key.as_str(), r.year_label()))
            .collect();
        assert_eq!(
            keys,
            vec![
                (1, "feynman1965a", "1965a".to_string()),
                (2, "feynman1965b", "1965b".to_string()),
                (0, "feynman1965c", "1965c".to_string()),
            ]
        );
    }

    #[test]
    fn test_pair_collision_starts_at_a() {
        let mut records = vec![
            record(0, &[("Feynman", "R.")], "1960", "Room at the Bottom"),
            record(1, &[("Feynman", "R.")], "1960", "Lectures"),
            record(2, &[("Feynman", "R.")], "1961", "Other"),
        ];
        run(&mut records);
        let letters: Vec<_> = records.iter().map(|r| r.year_index).collect();
        assert_eq!(letters, vec![Some('a'), Some('b'), None]);
        assert_eq!(records[0].citation_key, "feynman1960a");
        assert_eq!(records[2].citation_key, "feynman1961");
    }

    #[test]
    fn test_non_adjacent_collision_gets_letters() {
        // Different initials sort a 1961 paper between the two 1960 ones.
        let mut records = vec![
            record(0, &[("Smith", "J.")], "1960", "First"),
            record(1, &[("Smith", "J.")], "1961", "Middle"),
            record(2, &[("Smith", "K.")], "1960", "Last"),
        ];
        run(&mut records);
        assert_eq!(records[0].citation_key, "smith1960a");
        assert_eq!(records[1].citation_key, "smith1961");
        assert_eq!(records[2].citation_key, "smith1960b");
    }

    #[test]
    fn test_year_letters_exhausted() {
        let mut records: Vec<_> = (0..27)
            .map(|i| record(i, &[("Prolific", "P.")], "2000", &format!("Paper {:02}", i)))
            .collect();
        let err = transform(&mut records, &Settings::default()).unwrap_err();
        assert_eq!(
            err,
            TransformError::YearIndexExhausted {
                key: "prolific2000".to_string(),
                ids: (0..27).collect(),
            }
        );
        assert_eq!(err.entry_ids().len(), 27);
        let message = err.to_string();
        assert!(message.starts_with("27 entries share the citation key 'prolific2000'"));
        assert!(message.contains("(reference ids 0, 1, 2,"));
        assert!(message.contains(" 25, 26)"));

        let mut records: Vec<_> = (0..26)
            .map(|i| record(i, &[("Prolific", "P.")], "2000", &format!("Paper {:02}", i)))
            .collect();
        transform(&mut records, &Settings::default()).unwrap();
        assert_eq!(records[25].citation_key, "prolific2000z");
    }

    #[test]
    fn test_compact_citation() {
        let sole = [Author::new("Feynman", "R.")];
        assert_eq!(compact_citation(&sole, "1965a"), "Fey1965a");
        let three = [
            Author::new("Xu", "A."),
            Author::new("Yang", "B."),
            Author::new("Zhou", "C."),
        ];
        assert_eq!(compact_citation(&three, "2025"), "XYZ2025");
        let five: Vec<_> = ["Adams", "Brown", "Clark", "Davis", "Evans"]
            .iter()
            .map(|n| Author::new(*n, "X."))
            .collect();
        assert_eq!(compact_citation(&five, "2025"), "ABCD+2025");
        let four: Vec<_> = five[..4].to_vec();
        assert_eq!(compact_citation(&four, "2025"), "ABCD2025");
        assert_eq!(
            compact_citation(&[Author::new("{\\\"O}zt{\\\"u}rk", "A.")], "2019"),
            "Ozt2019"
        );
    }

    #[test]
    fn test_italics_by_style() {
        let mut paper = record(0, &[("Smith", "J.")], "2020", "A Study");
        paper.venue = "Journal of Studies (JoS)".into();
        let mut book = record(1, &[("Knuth", "D.")], "1968", "Fundamental Algorithms");
        book.entry_type = Some(EntryType::Book);
        book.venue = "Addison-Wesley".into();
        let mut records = vec![paper, book];
        run(&mut records);

        let book = records.iter().find(|r| r.id == 1).unwrap();
        assert_eq!(book.title, "\\textit{Fundamental Algorithms}");
        assert_eq!(book.venue, "Addison-Wesley");
        let paper = records.iter().find(|r| r.id == 0).unwrap();
        assert_eq!(paper.title, "A Study");
        assert_eq!(paper.venue, "\\textit{Journal of Studies (JoS)}");
    }

    #[test]
    fn test_missing_style_is_fatal() {
        let mut untyped = record(7, &[("Smith", "J.")], "2020", "A Study");
        untyped.entry_type = None;
        let mut records = vec![untyped];
        assert_eq!(
            transform(&mut records, &Settings::default()),
            Err(TransformError::MissingStyle { id: 7 })
        );
    }
}
