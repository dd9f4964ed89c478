use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use loadstats::config::Config;
use loadstats::db::Database;
use loadstats::git::{GitLogSource, RepoInfo};
use loadstats::output::{default_db_path, OutputTarget};
use loadstats::sync::{sync_repository, SyncReport};

#[derive(Parser)]
#[command(name = "loadstats")]
#[command(about = "Load git commit history and per-file line stats into SQLite")]
#[command(version)]
struct Cli {
    /// New database file to create (default: ~/commits.sqlite3, updated in place)
    output: Option<PathBuf>,

    /// Repository to read (default: current directory)
    #[arg(long)]
    repo: Option<PathBuf>,

    /// Remote whose URL names the repository (default: origin)
    #[arg(long)]
    remote: Option<String>,

    /// git executable to run (default: git)
    #[arg(long)]
    git: Option<String>,

    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Do not print a line per commit
    #[arg(short, long)]
    quiet: bool,

    /// Print the sync report as JSON
    #[arg(long)]
    json: bool,

    /// Debug logging on stderr (RUST_LOG takes precedence)
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    execute(cli)
}

/// Environment checks come before anything touches the store path, so a
/// failing check leaves no store behind.
fn execute(cli: Cli) -> Result<()> {
    let config = match cli.config {
        Some(ref path) => {
            Config::load(path).with_context(|| format!("Could not load {}", path.display()))?
        }
        None => Config::default(),
    };

    let repo_dir = cli.repo.clone().unwrap_or_else(|| PathBuf::from("."));
    let remote = cli.remote.clone().unwrap_or_else(|| config.git.remote.clone());
    let repo = RepoInfo::discover(&repo_dir, &remote)?;

    let git = cli.git.clone().unwrap_or_else(|| config.git.binary.clone());
    let source = GitLogSource::new(&repo).with_binary(git);
    source.check()?;

    let default_path = config.database.path.clone().unwrap_or_else(default_db_path);
    let target = OutputTarget::resolve(cli.output.as_deref(), default_path)?;

    let result = cmd_sync(&cli, &repo, source, &target);
    if result.is_err() {
        target.discard();
    }
    result
}

fn cmd_sync(
    cli: &Cli,
    repo: &RepoInfo,
    mut source: GitLogSource,
    target: &OutputTarget,
) -> Result<()> {
    if !cli.json {
        println!(
            "{} {}",
            "Using DB path:".dimmed(),
            target.path().display().to_string().green()
        );
    }

    let mut db = Database::open(target.path())?;

    let show_commits = !cli.quiet && !cli.json;
    let report = sync_repository(&mut db, &mut source, &repo.name, |group| {
        if show_commits {
            println!(
                "  {} Writing data for {} for {}.",
                "•".green(),
                group.commit.id.cyan(),
                repo.name
            );
        }
    })?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    Ok(())
}

fn print_summary(report: &SyncReport) {
    let since = report
        .bound
        .map(|b| format!(" (since {})", b))
        .unwrap_or_default();

    println!(
        "{} Database is up to date for {}{}: {} commits, {} file changes added.",
        "✓".green().bold(),
        report.repo_name.bold(),
        since.dimmed(),
        report.commits_written,
        report.file_changes_written
    );
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
