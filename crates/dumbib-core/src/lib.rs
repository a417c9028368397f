use std::fmt;

pub mod config_file;
pub mod transform;
pub mod venue;

// Re-export for convenience
pub use config_file::{ConfigFile, Settings};
pub use transform::{TransformError, transform};
pub use venue::{VenueRow, VenueTable, VenueTableError};

/// BibTeX entry types understood by the loader.
///
/// Based on the standard BibTeX type list. Matching against the `@type`
/// tag is case-sensitive, so `@Article` is not an [`EntryType::Article`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryType {
    Article,
    Book,
    Booklet,
    Conference,
    Inbook,
    Incollection,
    Inproceedings,
    Manual,
    Masterthesis,
    Misc,
    Phdthesis,
    Proceedings,
    Techreport,
    Unpublished,
}

impl EntryType {
    pub const ALL: [EntryType; 14] = [
        EntryType::Article,
        EntryType::Book,
        EntryType::Booklet,
        EntryType::Conference,
        EntryType::Inbook,
        EntryType::Incollection,
        EntryType::Inproceedings,
        EntryType::Manual,
        EntryType::Masterthesis,
        EntryType::Misc,
        EntryType::Phdthesis,
        EntryType::Proceedings,
        EntryType::Techreport,
        EntryType::Unpublished,
    ];

    /// Look up a type by its lower-case BibTeX tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == tag)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Article => "article",
            EntryType::Book => "book",
            EntryType::Booklet => "booklet",
            EntryType::Conference => "conference",
            EntryType::Inbook => "inbook",
            EntryType::Incollection => "incollection",
            EntryType::Inproceedings => "inproceedings",
            EntryType::Manual => "manual",
            EntryType::Masterthesis => "masterthesis",
            EntryType::Misc => "misc",
            EntryType::Phdthesis => "phdthesis",
            EntryType::Proceedings => "proceedings",
            EntryType::Techreport => "techreport",
            EntryType::Unpublished => "unpublished",
        }
    }

    /// Which rendered field gets italicized for this type.
    pub fn style(&self) -> Style {
        match self {
            EntryType::Article
            | EntryType::Conference
            | EntryType::Inproceedings
            | EntryType::Misc
            | EntryType::Unpublished => Style::PaperLike,
            EntryType::Book
            | EntryType::Booklet
            | EntryType::Inbook
            | EntryType::Incollection
            | EntryType::Manual
            | EntryType::Masterthesis
            | EntryType::Phdthesis
            | EntryType::Proceedings
            | EntryType::Techreport => Style::BookLike,
        }
    }

    /// The BibTeX field holding the publication venue for this type.
    pub fn venue_field(&self) -> &'static str {
        match self {
            EntryType::Article => "journal",
            EntryType::Conference | EntryType::Inproceedings => "booktitle",
            EntryType::Book
            | EntryType::Inbook
            | EntryType::Incollection
            | EntryType::Proceedings => "publisher",
            EntryType::Booklet | EntryType::Misc => "howpublished",
            EntryType::Manual => "organization",
            EntryType::Masterthesis | EntryType::Phdthesis => "school",
            EntryType::Techreport => "institution",
            EntryType::Unpublished => "note",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Rendering style: papers italicize the venue, books italicize the title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Style {
    PaperLike,
    BookLike,
}

/// One parsed author: surname (with any particles) and abbreviated given names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub last_name: String,
    /// Initials joined with a forced LaTeX space, e.g. `R.\ P.`.
    pub first_initials: String,
}

impl Author {
    pub fn new(last_name: impl Into<String>, first_initials: impl Into<String>) -> Self {
        Self {
            last_name: last_name.into(),
            first_initials: first_initials.into(),
        }
    }

    /// "Last F." form used in the full author list.
    pub fn display(&self) -> String {
        if self.first_initials.is_empty() {
            self.last_name.clone()
        } else {
            format!("{} {}", self.last_name, self.first_initials)
        }
    }
}

/// How serious a recorded failure is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The static configuration (type table, venue table) does not cover this input.
    Config,
    /// The entry itself is malformed; only this entry is affected.
    Entry,
}

/// A failure that excludes an entry from the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryError {
    pub severity: Severity,
    pub message: String,
}

impl EntryError {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
        }
    }

    pub fn duplicate(earlier: usize, later: usize) -> Self {
        Self::new(
            Severity::Entry,
            format!(
                "The following are duplicate entries: references #{} and #{}. \
                 Please remove one of the duplicate entries from the .bib file.",
                earlier, later
            ),
        )
    }
}

/// A non-fatal observation; the entry still appears in the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryWarning {
    WorkshopVenue,
    ZeroAuthors,
    PossibleDuplicate { earlier: usize, later: usize },
    /// An `@Type{` header that the case-sensitive splitter did not recognize.
    UnrecognizedHeader(String),
}

impl fmt::Display for EntryWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryWarning::WorkshopVenue => f.write_str(
                "The publication venue is a workshop, and thus the venue name was used \
                 verbatim. You might need to edit it manually for proper formatting.",
            ),
            EntryWarning::ZeroAuthors => f.write_str("This entry has zero authors."),
            EntryWarning::PossibleDuplicate { earlier, later } => write!(
                f,
                "The following are possibly duplicate entries: #{} and #{}. \
                 Consider checking them manually.",
                earlier, later
            ),
            EntryWarning::UnrecognizedHeader(header) => write!(
                f,
                "The text of this entry contains the header '{}', which was not read as \
                 a separate entry (entry types must be lower case and directly followed by '{{').",
                header
            ),
        }
    }
}

/// One bibliography item, from raw text through to its final rendered fields.
///
/// Built by the loader, enriched in place by [`transform()`], then read-only.
#[derive(Debug, Clone)]
pub struct EntryRecord {
    /// 0-based position in the input file.
    pub id: usize,
    pub raw_text: String,
    pub entry_type: Option<EntryType>,
    /// Set when the raw text mentions arXiv; the venue then comes from `eprint`.
    pub arxiv: bool,
    pub author_list: Vec<Author>,
    pub year: String,
    pub title: String,
    pub venue: String,
    pub author_string: String,
    pub citation_key: String,
    pub year_index: Option<char>,
    pub short_author_citation: String,
    pub compact_citation: String,
    pub duplicate_of: Option<usize>,
    pub possible_duplicate_of: Option<usize>,
    pub errors: Vec<EntryError>,
    pub warnings: Vec<EntryWarning>,
}

impl EntryRecord {
    pub fn new(id: usize, raw_text: impl Into<String>) -> Self {
        Self {
            id,
            raw_text: raw_text.into(),
            entry_type: None,
            arxiv: false,
            author_list: Vec::new(),
            year: String::new(),
            title: String::new(),
            venue: String::new(),
            author_string: String::new(),
            citation_key: String::new(),
            year_index: None,
            short_author_citation: String::new(),
            compact_citation: String::new(),
            duplicate_of: None,
            possible_duplicate_of: None,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Whether this record goes into the output database.
    pub fn is_included(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn is_duplicate(&self) -> bool {
        self.duplicate_of.is_some()
    }

    pub fn style(&self) -> Option<Style> {
        self.entry_type.map(|t| t.style())
    }

    /// Numeric year for sorting; records without a parsed year sort first.
    pub fn year_value(&self) -> u32 {
        self.year.parse().unwrap_or(0)
    }

    /// Year with its disambiguating letter, e.g. `1960b`.
    pub fn year_label(&self) -> String {
        match self.year_index {
            Some(letter) => format!("{}{}", self.year, letter),
            None => self.year.clone(),
        }
    }

    pub fn has_config_error(&self) -> bool {
        self.errors.iter().any(|e| e.severity == Severity::Config)
    }

    /// Accumulated error text, one `- ` line per failure.
    pub fn error_message(&self) -> String {
        self.errors
            .iter()
            .map(|e| format!("\n- {}", e.message))
            .collect()
    }

    /// Accumulated warning text, one `- ` line per warning.
    pub fn warning_message(&self) -> String {
        self.warnings.iter().map(|w| format!("\n- {}", w)).collect()
    }
}

/// The lowest-id record carrying a configuration-level error, if any.
///
/// In strict mode the run aborts on this record instead of writing output.
pub fn first_config_error(records: &[EntryRecord]) -> Option<&EntryRecord> {
    records
        .iter()
        .filter(|r| r.has_config_error())
        .min_by_key(|r| r.id)
}
