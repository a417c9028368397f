use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use dumbib_core::config_file::{self, ConfigFile};
use dumbib_core::{
    EntryRecord, Settings, TransformError, VenueTable, first_config_error, transform,
};
use dumbib_reporting::{artifact_paths, render_log, render_log_block, write_artifacts};

mod output;

use output::{ColorMode, RunSummary};

/// dumbib - Turn a BibTeX file into a sorted, deduplicated LaTeX reference database
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Show debug logging (overrides RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the reference database and its log
    Build {
        /// Path to the .bib file
        input: PathBuf,

        /// Output path; `.tex` and `.log` files are written next to it
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        run: RunArgs,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,
    },

    /// Dry run: process the .bib file and print the log without writing files
    Check {
        /// Path to the .bib file
        input: PathBuf,

        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Venue table (.csv or .toml)
    #[arg(long)]
    venues: Option<PathBuf>,

    /// Config file to use instead of the default locations
    #[arg(long)]
    config: Option<PathBuf>,

    /// Exclude entries with unknown types or venues instead of aborting
    #[arg(long)]
    keep_going: bool,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    match cli.command {
        Command::Build {
            input,
            output,
            run,
            no_color,
        } => build(&input, &output, &run, ColorMode(!no_color)),
        Command::Check { input, run } => check(&input, &run),
    }
}

fn setup_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Parse a boolean environment flag (`1`/`0`, `true`/`false`).
fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Resolve settings and the venue table: CLI flags > env vars > config file > defaults.
fn resolve(run: &RunArgs) -> anyhow::Result<(Settings, VenueTable)> {
    let config: ConfigFile = match &run.config {
        Some(path) => config_file::load_from_path(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?,
        None => config_file::load_config(),
    };

    let mut settings = Settings::from_config(&config);
    if let Ok(value) = std::env::var("DUMBIB_STRICT") {
        match parse_flag(&value) {
            Some(strict) => settings.strict = strict,
            None => tracing::warn!(value = %value, "ignoring unrecognized DUMBIB_STRICT"),
        }
    }
    if run.keep_going {
        settings.strict = false;
    }

    let venue_path = run
        .venues
        .clone()
        .or_else(|| std::env::var("DUMBIB_VENUES").ok().map(PathBuf::from))
        .or_else(|| config.venue_table_path())
        .context(
            "No venue table given. Pass --venues, set DUMBIB_VENUES, or set [venues] path in the config file",
        )?;
    let venues = VenueTable::load(&venue_path)
        .with_context(|| format!("Could not load venue table: {}", venue_path.display()))?;

    tracing::debug!(?settings, venue_rows = venues.len(), "resolved configuration");
    Ok((settings, venues))
}

/// Load, parse and transform the input file.
fn process(input: &Path, settings: &Settings, venues: &VenueTable) -> anyhow::Result<Vec<EntryRecord>> {
    if !input.exists() {
        anyhow::bail!("File not found: {}", input.display());
    }
    let mut records = dumbib_bib::load_bibliography(input, venues)
        .with_context(|| format!("Could not read bibliography: {}", input.display()))?;
    if let Err(err) = transform(&mut records, settings) {
        return Err(transform_failure(err, &records));
    }
    Ok(records)
}

/// Attach the raw text of the entries behind a transform error.
fn transform_failure(err: TransformError, records: &[EntryRecord]) -> anyhow::Error {
    let mut offending = String::new();
    for id in err.entry_ids() {
        if let Some(record) = records.iter().find(|r| r.id == id) {
            offending.push_str(&format!("\n\nReference id {}:\n{}", record.id, record.raw_text));
        }
    }
    anyhow::Error::new(err).context(format!("Could not build the reference list{}", offending))
}

/// In strict mode, the first entry that the type or venue tables do not cover.
fn strict_failure<'a>(records: &'a [EntryRecord], settings: &Settings) -> Option<&'a EntryRecord> {
    if settings.strict {
        first_config_error(records)
    } else {
        None
    }
}

fn fatal_entry_error(record: &EntryRecord, log_hint: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Reference id {} cannot be processed with the current configuration:{}\n\n{}\n\n{}\
         Fix the venue table or the .bib file, or rerun with --keep-going to skip such entries.",
        record.id,
        record.error_message(),
        record.raw_text,
        log_hint
    )
}

fn build(input: &Path, output: &Path, run: &RunArgs, color: ColorMode) -> anyhow::Result<()> {
    let (settings, venues) = resolve(run)?;
    let records = process(input, &settings, &venues)?;
    let paths = artifact_paths(output);

    if let Some(record) = strict_failure(&records, &settings) {
        std::fs::write(&paths.log, render_log(&records))
            .with_context(|| format!("Failed to write log: {}", paths.log.display()))?;
        return Err(fatal_entry_error(
            record,
            &format!("The full log was written to {}.\n", paths.log.display()),
        ));
    }

    write_artifacts(&paths, &records, &settings).with_context(|| {
        format!(
            "Failed to write {} and {}",
            paths.database.display(),
            paths.log.display()
        )
    })?;

    let mut stderr = std::io::stderr().lock();
    let mut excluded: Vec<&EntryRecord> = records.iter().filter(|r| !r.is_included()).collect();
    excluded.sort_by_key(|r| r.id);
    for record in excluded {
        output::print_excluded_block(&mut stderr, &render_log_block(record), color)?;
    }
    output::print_summary(&mut stderr, &RunSummary::from_records(&records), color)?;
    writeln!(
        stderr,
        "Wrote {} and {}",
        paths.database.display(),
        paths.log.display()
    )?;
    Ok(())
}

fn check(input: &Path, run: &RunArgs) -> anyhow::Result<()> {
    let (settings, venues) = resolve(run)?;
    let records = process(input, &settings, &venues)?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(render_log(&records).as_bytes())?;
    stdout.flush()?;

    if let Some(record) = strict_failure(&records, &settings) {
        return Err(fatal_entry_error(record, ""));
    }

    output::print_summary(
        &mut std::io::stderr().lock(),
        &RunSummary::from_records(&records),
        ColorMode(false),
    )?;
    Ok(())
}
