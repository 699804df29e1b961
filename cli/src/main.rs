//! ezbackup - Command-line front end for the backup engine.
//!
//! Mirrors the configured source directories into the destination with a
//! progress bar. Ctrl-C stops the run before the next file.

mod config;
mod logging;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use engine::{
    spawn_scan, BackupSession, CancelHandle, ChecksumAlgorithm, FileReport, FileState, LogEvent,
    NullSink, ProgressSink, RunOutcome, ScanDirection, ScanResult, ScanTotals, SessionConfig,
    Severity, SourceSet,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use crate::config::{Profile, DEFAULT_PROFILE_PATH};
use crate::logging::DEFAULT_LOG_FILE;

/// ezbackup - Mirror directory trees into a backup location
#[derive(Parser, Debug)]
#[command(name = "ezbackup")]
#[command(version)]
#[command(about = "Back up directory trees with progress tracking")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Also print log lines to stderr
    #[arg(long, global = true)]
    verbose: bool,

    /// Log file path
    #[arg(long, global = true, value_name = "PATH", default_value = DEFAULT_LOG_FILE)]
    log_file: PathBuf,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Back up all sources into the destination
    Run(RunArgs),
    /// Count files and bytes in the sources
    Count(CountArgs),
    /// Write a default profile
    Init(InitArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Profile to read defaults from
    #[arg(long, value_name = "PATH", default_value = DEFAULT_PROFILE_PATH)]
    config: PathBuf,

    /// Source directory (repeatable); replaces the profile's list
    #[arg(long = "source", value_name = "PATH")]
    sources: Vec<PathBuf>,

    /// Destination directory; must exist
    #[arg(long, value_name = "PATH")]
    dest: Option<PathBuf>,

    /// Keep files that already exist in the destination
    #[arg(long)]
    no_overwrite: bool,

    /// Verify each overwritten copy by digest
    #[arg(long)]
    verify: bool,

    /// Digest for verification: sha256 or blake3
    #[arg(long, value_name = "ALGORITHM")]
    digest: Option<ChecksumAlgorithm>,
}

#[derive(Args, Debug)]
struct CountArgs {
    /// Profile to read sources from
    #[arg(long, value_name = "PATH", default_value = DEFAULT_PROFILE_PATH)]
    config: PathBuf,

    /// Source directory (repeatable); replaces the profile's list
    #[arg(long = "source", value_name = "PATH")]
    sources: Vec<PathBuf>,
}

#[derive(Args, Debug)]
struct InitArgs {
    /// Where to write the profile
    #[arg(long, value_name = "PATH", default_value = DEFAULT_PROFILE_PATH)]
    config: PathBuf,

    /// Replace an existing profile
    #[arg(long)]
    force: bool,
}

/// Console sink: drives the bar and prints error logs above it.
struct BarSink {
    bar: ProgressBar,
}

impl ProgressSink for BarSink {
    fn on_file_done(&self, report: &FileReport, processed: u64) {
        if processed > self.bar.length().unwrap_or(0) {
            self.bar.set_length(processed);
        }
        self.bar.set_position(processed);
        if let Some(name) = report.source_path.file_name() {
            self.bar.set_message(name.to_string_lossy().into_owned());
        }
        if report.state == FileState::Failed {
            if let Some(ref msg) = report.error_message {
                self.bar.println(format!("Failed: {}", msg));
            }
        }
    }

    fn on_log(&self, event: &LogEvent) {
        if event.severity() == Severity::Error {
            self.bar.println(event.to_string());
        }
    }

    fn on_finished(&self, outcome: &RunOutcome) {
        if outcome.is_cancelled() {
            self.bar.abandon_with_message(outcome.summary());
        } else {
            self.bar.finish_with_message(outcome.summary());
        }
    }
}

static HANDLER_SET: OnceLock<()> = OnceLock::new();

fn install_ctrlc_handler(cancel: CancelHandle) -> Result<()> {
    if HANDLER_SET.get().is_some() {
        return Ok(());
    }

    ctrlc::set_handler(move || {
        cancel.request_cancel();
        tracing::info!("Cancellation requested (Ctrl+C).");
    })
    .context("Failed to install Ctrl-C handler")?;

    let _ = HANDLER_SET.set(());
    Ok(())
}

/// Parse arguments, run the command and map its result to an exit code
fn main() {
    let cli = Cli::parse();
    let guard = logging::init_logger(&cli.log_file, cli.verbose);

    // 0 completed, 1 cancelled, 2 error
    let exit_code = match dispatch(&cli.command) {
        Ok(Some(outcome)) if outcome.is_cancelled() => 1,
        Ok(_) => 0,
        Err(e) => {
            tracing::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            2
        }
    };

    drop(guard);
    std::process::exit(exit_code);
}

fn dispatch(command: &Command) -> Result<Option<RunOutcome>> {
    match command {
        Command::Run(args) => run_backup(args, true).map(Some),
        Command::Count(args) => {
            let totals = run_count(args)?;
            println!(
                "{} files, {}",
                totals.file_count,
                format_size(totals.total_bytes)
            );
            Ok(None)
        }
        Command::Init(args) => {
            Profile::write_default(&args.config, args.force)?;
            println!("Wrote default profile to {}", args.config.display());
            Ok(None)
        }
    }
}

/// Build the session config from the profile and flag overrides
fn resolve_config(args: &RunArgs) -> Result<SessionConfig> {
    let profile = Profile::load(&args.config)?;

    let sources = if args.sources.is_empty() {
        profile.sources.clone()
    } else {
        args.sources.clone()
    };
    if sources.is_empty() {
        bail!("No source directories given; pass --source or list them in the profile");
    }

    let Some(destination) = args.dest.clone().or_else(|| profile.destination.clone()) else {
        bail!("No destination given; pass --dest or set it in the profile");
    };

    let mut policy = profile.policy();
    if args.no_overwrite {
        policy.overwrite = false;
    }
    if args.verify {
        policy.verify_hash = true;
    }
    if let Some(digest) = args.digest {
        policy.digest = digest;
    }
    if policy.verify_hash && !policy.overwrite {
        tracing::warn!("verification only applies when overwriting; it will be skipped");
    }

    Ok(SessionConfig::new(sources, destination, policy))
}

/// Count the existing roots in parallel
fn precount(config: &SessionConfig) -> ScanResult {
    let totals = ScanTotals::new();
    let sink: Arc<dyn ProgressSink> = Arc::new(NullSink);
    let handles: Vec<_> = config
        .sources
        .iter()
        .filter(|root| root.exists())
        .map(|root| {
            spawn_scan(
                root.path().to_path_buf(),
                ScanDirection::Add,
                totals.clone(),
                Arc::clone(&sink),
            )
        })
        .collect();
    for handle in handles {
        if handle.join().is_err() {
            tracing::error!("file count worker panicked");
        }
    }
    totals.snapshot()
}

/// Main backup logic - `interactive` adds the progress bar and Ctrl-C
fn run_backup(args: &RunArgs, interactive: bool) -> Result<RunOutcome> {
    let config = resolve_config(args)?;
    let expected = precount(&config);
    tracing::info!(
        files = expected.file_count,
        bytes = expected.total_bytes,
        "source trees counted"
    );

    let session = BackupSession::new(config.with_expected_files(expected.file_count));

    let bar = if interactive {
        install_ctrlc_handler(session.cancel_handle())?;
        let bar = ProgressBar::new(expected.file_count);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files {msg}",
            )?
            .progress_chars("=> "),
        );
        bar
    } else {
        ProgressBar::hidden()
    };

    let sink = BarSink { bar };
    let outcome = session.run(&sink).context("Backup could not start")?;
    if !interactive {
        tracing::info!("{}", outcome.summary());
    }
    Ok(outcome)
}

/// Count logic - sources go through the same checks as an edited source list
fn run_count(args: &CountArgs) -> Result<ScanResult> {
    let profile = Profile::load(&args.config)?;
    let sources = if args.sources.is_empty() {
        profile.sources
    } else {
        args.sources.clone()
    };

    let mut set = SourceSet::new(Arc::new(NullSink));
    for source in sources {
        if let Err(e) = set.add(source) {
            eprintln!("Skipping: {}", e);
        }
    }
    if set.is_empty() {
        bail!("No usable source directories");
    }
    Ok(set.wait_for_counts())
}

/// Whole megabytes below 1 GB, whole gigabytes above
fn format_size(bytes: u64) -> String {
    let megabytes = bytes >> 20;
    if megabytes < 1024 {
        format!("{} MB", megabytes)
    } else {
        format!("{} GB", bytes >> 30)
    }
}
