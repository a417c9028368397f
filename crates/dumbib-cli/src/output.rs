use std::io::Write;

use dumbib_core::EntryRecord;
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub included: usize,
    pub excluded: usize,
    pub duplicates: usize,
    pub with_warnings: usize,
}

impl RunSummary {
    pub fn from_records(records: &[EntryRecord]) -> Self {
        let included = records.iter().filter(|r| r.is_included()).count();
        Self {
            total: records.len(),
            included,
            excluded: records.len() - included,
            duplicates: records.iter().filter(|r| r.is_duplicate()).count(),
            with_warnings: records.iter().filter(|r| !r.warnings.is_empty()).count(),
        }
    }
}

/// Echo the log block of an excluded entry so it is seen without opening
/// the log file.
pub fn print_excluded_block(
    w: &mut dyn Write,
    block: &str,
    color: ColorMode,
) -> std::io::Result<()> {
    if color.enabled() {
        write!(w, "{}", block.red())?;
    } else {
        write!(w, "{}", block)?;
    }
    Ok(())
}

/// Print the end-of-run counts.
pub fn print_summary(
    w: &mut dyn Write,
    summary: &RunSummary,
    color: ColorMode,
) -> std::io::Result<()> {
    writeln!(w, "{} entries read", summary.total)?;
    if color.enabled() {
        writeln!(
            w,
            "  {} included, {} excluded ({} duplicates), {} with warnings",
            summary.included.green(),
            summary.excluded.red(),
            summary.duplicates,
            summary.with_warnings.yellow()
        )?;
    } else {
        writeln!(
            w,
            "  {} included, {} excluded ({} duplicates), {} with warnings",
            summary.included, summary.excluded, summary.duplicates, summary.with_warnings
        )?;
    }
    Ok(())
}
