//! Rendering of the reference database and the diagnostic log.
//!
//! Both are plain text. The database holds one macro invocation per
//! included record in citation order; the log holds one block per record,
//! included or not, in input order.

use std::io::Write;
use std::path::{Path, PathBuf};

use dumbib_core::{EntryRecord, Settings};

const RULE_WIDTH: usize = 64;

/// Key shown in the log for records that never got one.
const NO_KEY: &str = "(none)";

/// `{authors} ({year}{letter}). {title}. {venue}.`
pub fn render_sentence(record: &EntryRecord) -> String {
    format!(
        "{} ({}). {}. {}.",
        record.author_string,
        record.year_label(),
        record.title,
        record.venue
    )
}

/// One macro invocation for an included record, followed by a blank line.
pub fn render_entry(record: &EntryRecord, macro_name: &str) -> String {
    format!(
        "\\{}[{}]{{{}}}{{{}}}{{{}}}%\n{{{}}}\n\n",
        macro_name,
        record.compact_citation,
        record.citation_key,
        record.short_author_citation,
        record.year_label(),
        render_sentence(record)
    )
}

/// The database text: every included record, in the order given.
pub fn render_database(records: &[EntryRecord], settings: &Settings) -> String {
    records
        .iter()
        .filter(|r| r.is_included())
        .map(|r| render_entry(r, &settings.macro_name))
        .collect()
}

fn heading(out: &mut String, title: &str, width: usize) {
    let underline = "~".repeat(width);
    out.push_str(&underline);
    out.push('\n');
    out.push_str(title);
    out.push('\n');
    out.push_str(&underline);
}

/// The log block for one record.
pub fn render_log_block(record: &EntryRecord) -> String {
    let key = if record.citation_key.is_empty() {
        NO_KEY
    } else {
        record.citation_key.as_str()
    };

    let mut out = String::new();
    out.push_str(&"=".repeat(RULE_WIDTH));
    out.push('\n');
    out.push_str(&format!(
        "Reference id: {}  (key generated: {})\n",
        record.id, key
    ));
    out.push_str(&"-".repeat(RULE_WIDTH));
    out.push('\n');

    heading(&mut out, "Raw .bibtex input:", 18);
    out.push('\n');
    out.push_str(&record.raw_text);
    out.push_str("\n\n");

    if record.is_included() {
        heading(&mut out, "The processed output:", 21);
        out.push('\n');
        out.push_str(&render_sentence(record));
    } else {
        heading(
            &mut out,
            "No output was generated! Following errors were encountered:",
            59,
        );
        out.push_str(&record.error_message());
    }

    if !record.warnings.is_empty() {
        out.push_str("\n\n");
        heading(&mut out, "There are some warnings for this entry:", 39);
        out.push_str(&record.warning_message());
    }

    out.push('\n');
    out.push_str(&"=".repeat(RULE_WIDTH));
    out.push_str("\n\n\n\n");
    out
}

/// The full log, ordered by input position regardless of citation order.
pub fn render_log(records: &[EntryRecord]) -> String {
    let mut by_id: Vec<&EntryRecord> = records.iter().collect();
    by_id.sort_by_key(|r| r.id);
    by_id.into_iter().map(render_log_block).collect()
}

/// Where the database and log for one run are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub database: PathBuf,
    pub log: PathBuf,
}

/// `refs.tex` gives `refs.tex` + `refs.log`; any other name gets both
/// extensions appended (`refs` gives `refs.tex` + `refs.log`).
pub fn artifact_paths(output: &Path) -> ArtifactPaths {
    let is_tex = output.extension().is_some_and(|e| e == "tex");
    if is_tex {
        ArtifactPaths {
            database: output.to_path_buf(),
            log: output.with_extension("log"),
        }
    } else {
        let append = |ext: &str| {
            let mut name = output.as_os_str().to_owned();
            name.push(ext);
            PathBuf::from(name)
        };
        ArtifactPaths {
            database: append(".tex"),
            log: append(".log"),
        }
    }
}

/// Write the database and the log.
pub fn write_artifacts(
    paths: &ArtifactPaths,
    records: &[EntryRecord],
    settings: &Settings,
) -> std::io::Result<()> {
    let mut database = std::fs::File::create(&paths.database)?;
    database.write_all(render_database(records, settings).as_bytes())?;

    let mut log = std::fs::File::create(&paths.log)?;
    log.write_all(render_log(records).as_bytes())?;
    Ok(())
}
