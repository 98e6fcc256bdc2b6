use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use faultline::config::{
    ConfigError, DEFAULT_CONFIG_FILE, ScanConfig, default_config_yaml, load_config_or_default,
    read_list_file, read_merge_directives,
};
use faultline::range::{Observation, RangeBuilder};
use faultline::report::{evolution_report, group_by_revision, range_report};
use faultline::scan::{ScanError, TreeScanner};
use faultline::store::{ExceptionStore, IdentityRecord};
use faultline::vcs::{self, VcsError};
use serde_json::{Value, json};

#[derive(Debug)]
struct CliError {
    code: &'static str,
    message: String,
}

impl CliError {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn io(code: &'static str, err: io::Error) -> Self {
        Self::new(code, err.to_string())
    }
}

impl From<rusqlite::Error> for CliError {
    fn from(value: rusqlite::Error) -> Self {
        Self::new("sqlite_error", value.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::new("json_error", value.to_string())
    }
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        Self::new("config_error", value.to_string())
    }
}

impl From<ScanError> for CliError {
    fn from(value: ScanError) -> Self {
        Self::new("scan_error", value.to_string())
    }
}

impl From<VcsError> for CliError {
    fn from(value: VcsError) -> Self {
        Self::new("vcs_error", value.to_string())
    }
}

#[derive(Parser, Debug)]
#[command(name = "faultline")]
#[command(about = "Mine how one exception type's messages evolve across revisions")]
struct Cli {
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Init,
    Collect(CollectArgs),
    Merge(MergeArgs),
    Ranges(RangesArgs),
    Evolution,
}

#[derive(Args, Debug)]
struct CollectArgs {
    #[arg(long)]
    repo: PathBuf,
    #[arg(long)]
    revisions: PathBuf,
    #[arg(long)]
    exclude: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct MergeArgs {
    #[arg(long)]
    directives: PathBuf,
}

#[derive(Args, Debug)]
struct RangesArgs {
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let payload = json!({
                "error": {
                    "code": err.code,
                    "message": err.message,
                }
            });
            eprintln!("{payload}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), CliError> {
    let cli = Cli::parse();
    let mut config = load_config_or_default(&cli.config)?;
    if let Some(db) = &cli.db {
        config.database = db.to_string_lossy().into_owned();
    }
    match cli.command {
        Command::Init => cmd_init(&cli.config, &config),
        Command::Collect(args) => cmd_collect(&config, args),
        Command::Merge(args) => cmd_merge(&config, args),
        Command::Ranges(args) => cmd_ranges(&config, args),
        Command::Evolution => cmd_evolution(&config),
    }
}

fn cmd_init(config_path: &Path, config: &ScanConfig) -> Result<(), CliError> {
    if !config_path.exists() {
        fs::write(config_path, default_config_yaml())
            .map_err(|err| CliError::io("write_config_error", err))?;
    }
    let _ = ExceptionStore::open(&config.database)?;

    print_json(&json!({
        "status": "ok",
        "config": config_path,
        "database": config.database,
        "exception": config.exception,
    }))
}

/// Checks out each revision of the sequence in turn, scans it, prints the
/// evolution and range reports to stdout, then folds the observations into
/// the store. Progress and store summaries go to stderr so stdout stays a
/// clean report.
fn cmd_collect(config: &ScanConfig, args: CollectArgs) -> Result<(), CliError> {
    let started_at = now_iso8601();
    let revisions = read_list_file(&args.revisions)?;
    if revisions.is_empty() {
        return Err(CliError::new(
            "empty_revision_list",
            format!("no revisions listed in {}", args.revisions.display()),
        ));
    }
    let excludes = match &args.exclude {
        Some(path) => read_list_file(path)?,
        None => Vec::new(),
    };
    let scanner = TreeScanner::new(config, &excludes)?;

    let mut observations = Vec::new();
    for (index, revision) in revisions.iter().enumerate() {
        eprintln!("checkout to {revision}");
        vcs::checkout(&args.repo, revision)?;
        let outcome = scanner.scan(&args.repo)?;
        for excluded in &outcome.excluded {
            eprintln!("exclude {excluded}");
        }
        eprintln!("{revision}: {} throw sites", outcome.sites.len());
        for site in outcome.sites {
            observations.push(Observation {
                filename: site.filename,
                message: site.message,
                revision: revision.clone(),
                revision_index: index as i64,
            });
        }
    }

    let by_revision = group_by_revision(&observations);
    for line in evolution_report(&revisions, &by_revision) {
        println!("{line}");
    }

    let builder = RangeBuilder::build(&observations);
    println!();
    for line in range_report(&builder) {
        println!("{line}");
    }

    let store = ExceptionStore::open(&config.database)?;
    let loaded = store.load_raw(&observations)?;
    let reconciled = store.reconcile()?;
    store.record_run(
        &started_at,
        &args.repo.to_string_lossy(),
        revisions.len(),
        observations.len(),
    )?;
    eprintln!(
        "stored {} new observations ({} already known), {} identities minted",
        loaded.inserted, loaded.deduplicated, reconciled.identities_created
    );
    Ok(())
}

fn cmd_merge(config: &ScanConfig, args: MergeArgs) -> Result<(), CliError> {
    let directives = read_merge_directives(&args.directives)?;
    let store = ExceptionStore::open(&config.database)?;

    for directive in &directives {
        let outcome = store.apply_directive(directive)?;
        for identity in &outcome.missing {
            eprintln!("identity {identity} doesn't exist");
        }
        if outcome.rewritten > 0 {
            if let Some(survivor) = outcome.survivor {
                eprintln!(
                    "merged into identity {survivor} ({} observations)",
                    outcome.rewritten
                );
            }
        }
    }
    println!("done");
    Ok(())
}

fn cmd_ranges(config: &ScanConfig, args: RangesArgs) -> Result<(), CliError> {
    let store = ExceptionStore::open(&config.database)?;
    let records = store.identity_records()?;

    if args.json {
        let rows: Vec<Value> = records.iter().map(identity_json).collect();
        return print_json(&Value::Array(rows));
    }

    let mut current_file = "";
    for record in &records {
        if record.filename != current_file {
            current_file = &record.filename;
            println!("{}", record.filename);
        }
        match record.merged_into {
            Some(survivor) => println!(
                "  [{}] {}: {} (merged into {survivor})",
                record.identity, record.range, record.message
            ),
            None => println!("  [{}] {}: {}", record.identity, record.range, record.message),
        }
    }
    Ok(())
}

fn cmd_evolution(config: &ScanConfig) -> Result<(), CliError> {
    let store = ExceptionStore::open(&config.database)?;
    let sequence = store.revision_sequence()?;
    let observations = store.observations()?;
    let by_revision = group_by_revision(&observations);
    for line in evolution_report(&sequence, &by_revision) {
        println!("{line}");
    }
    Ok(())
}

fn identity_json(record: &IdentityRecord) -> Value {
    json!({
        "identity": record.identity,
        "filename": record.filename,
        "message": record.message,
        "start_revision": record.range.start_revision,
        "start_revision_index": record.range.start_revision_index,
        "end_revision": record.range.end_revision,
        "end_revision_index": record.range.end_revision_index,
        "merged_into": record.merged_into,
    })
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string(value)?;
    println!("{rendered}");
    Ok(())
}

fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}
