use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use miette::{IntoDiagnostic, Result, WrapErr};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use reclaim::config::Config;
use reclaim::discovery::Language;
use reclaim::engine::{Engine, RunOptions, RunOutcome};
use reclaim::report::{Report, ReportFormat, TerminalReporter};
use reclaim::watch::{FileWatcher, PlanChange};
use reclaim::RunContext;

/// reclaim - find redundant and unreachable code and plan its safe removal
#[derive(Parser, Debug)]
#[command(name = "reclaim")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode - only output results
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Analyze a source tree and plan its cleanup
    Scan(ScanArgs),
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// Path to the project directory to analyze
    #[arg(default_value = ".")]
    root: PathBuf,

    /// Only scan these languages (can be specified multiple times)
    #[arg(long = "language", value_name = "LANG")]
    languages: Vec<Language>,

    /// Minimum Jaccard similarity for near duplicates
    #[arg(long, value_name = "F")]
    similarity_threshold: Option<f64>,

    /// Tokens per shingle for near-duplicate detection
    #[arg(long, value_name = "N")]
    shingle_size: Option<usize>,

    /// Plan only, change nothing (the default)
    #[arg(long, conflicts_with = "apply")]
    dry_run: bool,

    /// Apply pending groups, verifying each with --verify-command
    #[arg(long)]
    apply: bool,

    /// Command run after each applied group; non-zero exit rolls it back
    #[arg(long, value_name = "CMD")]
    verify_command: Option<String>,

    /// Confirm each group before applying it
    #[arg(long, requires = "apply")]
    interactive: bool,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Patterns to exclude (can be specified multiple times)
    #[arg(short, long, value_name = "GLOB")]
    exclude: Vec<String>,

    /// Entry points: file globs when the pattern contains a '/', symbol names otherwise
    #[arg(long = "entry", value_name = "PATTERN")]
    entries: Vec<String>,

    /// Treat every public symbol as exported
    #[arg(long)]
    library: bool,

    /// Output format
    #[arg(short, long, default_value = "terminal")]
    format: ReportFormat,

    /// Report file (JSON, or YAML for .yml/.yaml)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Report of an earlier run to compare the plan against
    #[arg(long, value_name = "FILE")]
    prior: Option<PathBuf>,

    /// Write a shell script that reverts the committed groups
    #[arg(long, value_name = "FILE")]
    undo_script: Option<PathBuf>,

    /// Wall-clock budget for one analysis run
    #[arg(long, value_name = "SECS")]
    max_duration: Option<u64>,

    /// Re-run the dry analysis whenever source files change
    #[arg(long, conflicts_with = "apply")]
    watch: bool,
}

fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    info!("reclaim v{}", env!("CARGO_PKG_VERSION"));

    let result = match &cli.command {
        Command::Scan(args) => run_scan(args, cli.quiet),
    };
    // Exit code 1 means a plan awaits approval; everything that stops a run is 2
    let code = result.unwrap_or_else(|report| {
        eprintln!("{:?}", report);
        2
    });
    std::process::exit(code);
}

fn init_logging(verbose: bool, quiet: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(args: &ScanArgs) -> Result<Config> {
    let mut config = if let Some(config_path) = &args.config {
        Config::from_file(config_path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to load config {}", config_path.display()))?
    } else {
        Config::from_default_locations(&args.root)
            .into_diagnostic()
            .wrap_err("Failed to load config")?
    };

    // Override with CLI arguments
    if !args.languages.is_empty() {
        config.scan.languages = args.languages.clone();
    }
    config.scan.exclude.extend(args.exclude.iter().cloned());
    for pattern in &args.entries {
        if pattern.contains('/') {
            config.entry.files.push(pattern.clone());
        } else {
            config.entry.symbols.push(pattern.clone());
        }
    }
    if args.library {
        config.entry.library_mode = true;
    }
    if let Some(threshold) = args.similarity_threshold {
        config.duplicates.similarity_threshold = threshold;
    }
    if let Some(size) = args.shingle_size {
        config.duplicates.shingle_size = size;
    }
    if let Some(command) = &args.verify_command {
        config.run.verify_command = Some(command.clone());
    }
    if let Some(secs) = args.max_duration {
        config.run.max_duration_secs = Some(secs);
    }

    config.validate().into_diagnostic()?;
    Ok(config)
}

fn run_scan(args: &ScanArgs, quiet: bool) -> Result<i32> {
    let config = load_config(args)?;

    let options = RunOptions {
        root: args.root.clone(),
        dry_run: args.dry_run || !args.apply,
        interactive: args.interactive,
        prior: args.prior.clone(),
        undo_script: args.undo_script.clone(),
        show_progress: !quiet && !args.format.is_structured(),
    };
    let engine = Engine::new(options);
    let mut ctx = RunContext::new(config);

    if args.watch {
        let watcher = FileWatcher::new(&ctx.config).into_diagnostic()?;
        watcher
            .watch(&engine, &mut ctx, |outcome, change| {
                if let Err(e) = emit(args, outcome, quiet, None) {
                    eprintln!("{}: {:?}", "Report error".red(), e);
                }
                let note = match change {
                    PlanChange::First => "Analysis complete.",
                    PlanChange::Unchanged => "Plan unchanged.",
                    PlanChange::Changed => "Plan changed.",
                    PlanChange::Incomplete => "Run incomplete; last plan kept.",
                };
                if !quiet {
                    println!("{}", format!("{} Waiting for changes...", note).green());
                }
                true
            })
            .into_diagnostic()
            .wrap_err("Watch error")?;
        return Ok(0);
    }

    let outcome = engine.run(&mut ctx);
    let report_path = ctx
        .config
        .run
        .report_path
        .as_ref()
        .map(|p| outcome.report.run.root.join(p));
    emit(args, &outcome, quiet, report_path)?;
    Ok(outcome.exit_code())
}

/// Write the report where the flags say
fn emit(args: &ScanArgs, outcome: &RunOutcome, quiet: bool, configured: Option<PathBuf>) -> Result<()> {
    let report = &outcome.report;

    if args.format.is_structured() {
        match &args.output {
            Some(path) => save(report, path)?,
            None => println!("{}", report.render(args.format).into_diagnostic()?),
        }
    } else {
        if !quiet {
            TerminalReporter::new().report(report);
        }
        if let Some(path) = args.output.as_ref().or(configured.as_ref()) {
            save(report, path)?;
        }
    }

    if let Some(error) = &outcome.error {
        warn!("Run incomplete: {}", error);
    }
    Ok(())
}

fn save(report: &Report, path: &Path) -> Result<()> {
    report
        .save(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("Failed to write report {}", path.display()))?;
    info!("Report saved to: {}", path.display());
    Ok(())
}
