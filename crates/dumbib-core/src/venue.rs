use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Abbreviation placeholder meaning "this venue has no abbreviation".
pub const NO_ABBREVIATION: &str = "??";

#[derive(Error, Debug)]
pub enum VenueTableError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("venue row {row} has an empty search string")]
    EmptySearch { row: usize },
    #[error("unsupported venue table format: {} (expected .csv or .toml)", .0.display())]
    UnsupportedFormat(PathBuf),
}

/// One row of the venue lookup table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenueRow {
    /// Lower-case substring searched for in the entry's venue text.
    pub search: String,
    pub name: String,
    pub abbreviation: Option<String>,
}

impl VenueRow {
    pub fn new(search: &str, name: &str, abbreviation: Option<&str>) -> Self {
        Self {
            search: search.trim().to_lowercase(),
            name: name.trim().to_string(),
            abbreviation: abbreviation
                .map(str::trim)
                .filter(|a| !a.is_empty() && *a != NO_ABBREVIATION)
                .map(str::to_string),
        }
    }

    /// `Name (ABBR)` or just `Name`.
    pub fn display_name(&self) -> String {
        match &self.abbreviation {
            Some(abbr) => format!("{} ({})", self.name, abbr),
            None => self.name.clone(),
        }
    }
}

/// Ordered venue lookup table. Loaded once per run, never mutated afterwards.
#[derive(Debug, Clone, Default)]
pub struct VenueTable {
    rows: Vec<VenueRow>,
}

#[derive(Deserialize)]
struct CsvRow {
    search_string: String,
    venue_name: String,
    abbreviation: Option<String>,
}

#[derive(Deserialize)]
struct TomlTable {
    #[serde(default)]
    venue: Vec<TomlRow>,
}

#[derive(Deserialize)]
struct TomlRow {
    search: String,
    name: String,
    abbreviation: Option<String>,
}

impl VenueTable {
    pub fn new(rows: Vec<VenueRow>) -> Result<Self, VenueTableError> {
        if let Some(row) = rows.iter().position(|r| r.search.is_empty()) {
            return Err(VenueTableError::EmptySearch { row: row + 1 });
        }
        Ok(Self { rows })
    }

    /// Load a table, choosing the format by file extension.
    pub fn load(path: &Path) -> Result<Self, VenueTableError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        let table = match ext.as_str() {
            "csv" => Self::from_csv_reader(std::fs::File::open(path)?)?,
            "toml" => Self::from_toml_str(&std::fs::read_to_string(path)?)?,
            _ => return Err(VenueTableError::UnsupportedFormat(path.to_path_buf())),
        };
        tracing::info!(path = %path.display(), rows = table.len(), "loaded venue table");
        Ok(table)
    }

    /// Parse `search_string,venue_name,abbreviation` CSV with a header row.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, VenueTableError> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut rows = Vec::new();
        for record in rdr.deserialize() {
            let row: CsvRow = record?;
            rows.push(VenueRow::new(
                &row.search_string,
                &row.venue_name,
                row.abbreviation.as_deref(),
            ));
        }
        Self::new(rows)
    }

    pub fn from_csv_str(content: &str) -> Result<Self, VenueTableError> {
        Self::from_csv_reader(content.as_bytes())
    }

    /// Parse a TOML table made of `[[venue]]` entries.
    pub fn from_toml_str(content: &str) -> Result<Self, VenueTableError> {
        let table: TomlTable = toml::from_str(content)?;
        let rows = table
            .venue
            .iter()
            .map(|r| VenueRow::new(&r.search, &r.name, r.abbreviation.as_deref()))
            .collect();
        Self::new(rows)
    }

    /// First row (in table order) whose search string occurs in `venue_text`.
    ///
    /// Overlapping search strings are not disambiguated; table order decides.
    pub fn lookup(&self, venue_text: &str) -> Option<&VenueRow> {
        let haystack = venue_text.to_lowercase();
        self.rows
            .iter()
            .find(|row| haystack.contains(row.search.as_str()))
    }

    pub fn rows(&self) -> &[VenueRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
