use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use batchprint_dispatch::{
    list_printers_or_empty, BatchResult, DispatchConfig, DispatchObserver, DispatchState,
    Dispatcher, DocumentSet, Job, JobStatus, PrintInvoker, PrinterTarget, Progress,
    SelectionState, SumatraInvoker, TempFileMaterializer,
};
use batchprint_settings::{Settings, SettingsStore};
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_FILE: &str = "batchprint.json";
const EXIT_PARTIAL_FAILURE: i32 = 2;

#[derive(Parser)]
#[command(
    name = "batchprint",
    about = "Send a batch of documents to a printer, one job at a time",
    author,
    version
)]
struct Cli {
    /// Settings file (defaults to ./batchprint.json; missing means defaults).
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print documents sequentially through the configured backend.
    Print(PrintArgs),
    /// List installed printers; `*` marks the suggested default.
    Printers,
    /// Inspect, create, export or import the settings file.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Args)]
struct PrintArgs {
    /// Documents to print, in order.
    #[arg(required = true, value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Printer to use instead of the configured or suggested one.
    #[arg(long, short = 'p', value_name = "NAME")]
    printer: Option<String>,

    /// Leave a document out, by file name or 1-based position. Repeatable;
    /// repeating a name skips the next file that shares it.
    #[arg(long, value_name = "NAME|INDEX")]
    skip: Vec<String>,

    /// Backend executable (overrides settings).
    #[arg(long, value_name = "PATH")]
    backend: Option<PathBuf>,

    /// Pause between jobs in milliseconds (overrides settings).
    #[arg(long, value_name = "MS")]
    delay_ms: Option<u64>,

    /// Kill a backend invocation after this many seconds; 0 waits forever.
    #[arg(long, value_name = "SECS")]
    timeout_secs: Option<u64>,

    /// Show what would be printed without invoking the backend.
    #[arg(long)]
    dry_run: bool,

    /// Emit the final report as JSON instead of progress lines.
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the effective settings as JSON.
    Show,
    /// Write default settings to the settings file.
    Init {
        /// Replace an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Write the effective settings to another file.
    Export {
        #[arg(value_name = "FILE")]
        destination: PathBuf,
    },
    /// Replace the settings file with FILE, keeping the old one as .bak.
    Import {
        #[arg(value_name = "FILE")]
        source: PathBuf,
    },
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("Error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let Cli {
        config,
        verbose,
        command,
    } = Cli::parse();
    init_tracing(verbose);

    let config_path = config.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    match command {
        Commands::Print(args) => {
            let store = load_settings(&config_path)?;
            execute_print(args, store.settings().clone())
        }
        Commands::Printers => {
            let store = load_settings(&config_path)?;
            execute_printers(store.settings());
            Ok(0)
        }
        Commands::Config(subcommand) => execute_config(subcommand, &config_path),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn load_settings(path: &Path) -> Result<SettingsStore> {
    SettingsStore::load(path).with_context(|| format!("loading settings from {}", path.display()))
}

fn execute_print(args: PrintArgs, mut settings: Settings) -> Result<i32> {
    apply_overrides(&args, &mut settings);

    let documents = DocumentSet::load(&args.files, &settings.dispatch.document_suffix)
        .context("loading documents")?;
    let mut selection = SelectionState::for_set(&documents);
    for skip in &args.skip {
        deselect(&documents, &mut selection, skip)?;
    }

    let selected = selection.selected_count();
    if !args.json {
        println!("Total files to print: {selected}");
    }
    if selected == 0 {
        bail!("nothing selected to print");
    }

    let target = resolve_target(args.printer.as_deref(), &settings)?;
    let invoker = SumatraInvoker::new(&settings.backend.path)
        .with_print_settings(settings.backend.print_settings.clone())
        .with_timeout(settings.backend.timeout());

    if args.dry_run {
        invoker.preflight()?;
        println!("Target: {target}");
        println!("Backend: {}", invoker.backend().display());
        let ids = selection.snapshot(&documents);
        for (position, id) in ids.iter().enumerate() {
            if let Some(document) = documents.get(*id) {
                println!("[{}/{}] {}", position + 1, ids.len(), document.name());
            }
        }
        println!("Dry run: nothing was sent to the printer.");
        return Ok(0);
    }

    let mut materializer = TempFileMaterializer::new(settings.dispatch.document_suffix.clone());
    if let Some(dir) = &settings.dispatch.scratch_dir {
        materializer = materializer.in_dir(dir);
    }
    let config = DispatchConfig {
        pacing_delay: settings.dispatch.pacing_delay(),
    };

    let mut dispatcher = Dispatcher::new(materializer, invoker, config);
    dispatcher
        .start(&documents, &selection, target)
        .context("cannot start printing")?;

    let mut reporter = ConsoleReporter { quiet: args.json };
    if dispatcher.state() == DispatchState::Running {
        dispatcher.run(&mut reporter)?;
    }
    let report = dispatcher
        .report()
        .context("dispatch finished without a report")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Finished: {}", report.result);
        if report.result.is_complete_success() {
            println!(
                "All {} files sent to {}.",
                report.result.succeeded, report.target
            );
        } else {
            println!("Completed with failures.");
        }
    }

    Ok(if report.result.has_failures() {
        EXIT_PARTIAL_FAILURE
    } else {
        0
    })
}

fn apply_overrides(args: &PrintArgs, settings: &mut Settings) {
    if let Some(backend) = &args.backend {
        settings.backend.path = backend.clone();
    }
    if let Some(delay) = args.delay_ms {
        settings.dispatch.pacing_delay_ms = delay;
    }
    if let Some(timeout) = args.timeout_secs {
        settings.backend.timeout_secs = Some(timeout);
    }
    settings.sanitize();
}

fn deselect(documents: &DocumentSet, selection: &mut SelectionState, skip: &str) -> Result<()> {
    if selection.deselect_by_name(documents, skip) {
        return Ok(());
    }
    if let Ok(position) = skip.parse::<usize>() {
        if let Some(id) = documents.ids().nth(position.wrapping_sub(1)) {
            selection.set(id, false);
            return Ok(());
        }
        bail!("--skip {position} is out of range (1..={})", documents.len());
    }
    bail!("--skip '{skip}' does not match any document");
}

/// An explicit printer is passed through unchecked; the backend reports an
/// unknown name itself. Otherwise the spooler's list picks a default.
fn resolve_target(requested: Option<&str>, settings: &Settings) -> Result<PrinterTarget> {
    if let Some(name) = requested.or(settings.printer.name.as_deref()) {
        return Ok(PrinterTarget::new(name)?);
    }
    let catalog = list_printers_or_empty();
    debug!(printers = ?catalog.names(), "resolving default printer");
    catalog
        .resolve(None, &settings.printer.default_hints)
        .context("choose a printer with --printer")
}

fn execute_printers(settings: &Settings) {
    let catalog = list_printers_or_empty();
    if catalog.is_empty() {
        println!("No printers found.");
        return;
    }
    let suggested = catalog.suggested_default(&settings.printer.default_hints);
    for (index, name) in catalog.names().iter().enumerate() {
        let marker = if index == suggested { '*' } else { ' ' };
        println!("{marker} {name}");
    }
}

fn execute_config(command: ConfigCommand, path: &Path) -> Result<i32> {
    match command {
        ConfigCommand::Show => {
            let store = load_settings(path)?;
            println!("{}", serde_json::to_string_pretty(store.settings())?);
        }
        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                bail!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                );
            }
            SettingsStore::new(path, Settings::default())
                .save()
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote default settings to {}", path.display());
        }
        ConfigCommand::Export { destination } => {
            load_settings(path)?
                .export_to(&destination)
                .with_context(|| format!("exporting to {}", destination.display()))?;
            println!("Exported settings to {}", destination.display());
        }
        ConfigCommand::Import { source } => {
            let mut store = load_settings(path)?;
            let backup = store
                .import_from(&source)
                .with_context(|| format!("importing {}", source.display()))?;
            println!(
                "Imported {} into {}",
                source.display(),
                store.path().display()
            );
            if let Some(backup) = backup {
                println!("Previous settings kept at {}", backup.display());
            }
        }
    }
    Ok(0)
}

/// Prints one line per job as the run progresses.
struct ConsoleReporter {
    quiet: bool,
}

impl DispatchObserver for ConsoleReporter {
    fn job_started(&mut self, job: &Job, total: usize) {
        if !self.quiet {
            println!("[{}/{}] Printing {}", job.position() + 1, total, job.name());
        }
    }

    fn job_finished(&mut self, job: &Job, progress: Progress, state: DispatchState) {
        if job.status() == JobStatus::Failed {
            eprintln!(
                "Failed to print {}: {}",
                job.name(),
                job.diagnostic().unwrap_or("unknown error")
            );
        }
        debug!(progress = %progress, fraction = progress.fraction(), %state, "job finished");
    }

    fn run_finished(&mut self, result: &BatchResult) {
        debug!(%result, "run finished");
    }
}
