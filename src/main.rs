use clap::Parser;
use docs_version_sync::sync::{DocsSync, DocsSyncError, DocsSyncOptions, SyncSummary};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
  name = "docs-version-sync",
  about = "Publish a documentation version into the docs site repository",
  author,
  disable_version_flag = true
)]
struct Cli {
  /// Documentation version to publish, e.g. 1.2.0 or development
  #[arg(short = 'v', long)]
  version: String,

  /// Also promote this version to the main docs and sync the examples
  #[arg(short = 'u', long)]
  update_main: bool,

  /// Path to the source repository
  #[arg(short = 'k', long)]
  klt_repo: String,

  /// Path to the documentation site repository
  #[arg(short = 'd', long)]
  klt_docs: String,

  /// Path to the examples repository
  #[arg(short = 'e', long)]
  klt_examples: String,

  /// Report what would change without writing anything
  #[arg(long)]
  dry_run: bool,

  /// Verbose output (--verbose for debug, twice for trace)
  #[arg(long, action = clap::ArgAction::Count)]
  verbose: u8,
}

fn setup_tracing(verbose: u8) {
  use tracing_subscriber::fmt;
  use tracing_subscriber::prelude::*;

  let log_level = match verbose {
    1 => "debug",
    2 => "trace",
    _ => "info",
  };

  tracing_subscriber::registry()
    .with(fmt::layer().with_writer(std::io::stderr))
    .with(tracing_subscriber::EnvFilter::new(
      std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
    ))
    .init();
}

fn print_summary(version: &str, summary: &SyncSummary) {
  let mut line = format!(
    "docs-{version}: {} created, {} updated, {} removed",
    summary.docs.created.len(),
    summary.docs.updated.len(),
    summary.docs.removed.len()
  );
  if summary.version_added {
    line.push_str("; registered new version");
  }
  if let Some(main_docs) = &summary.main_docs {
    line.push_str(&format!(
      "; main docs: {} created, {} updated, {} removed",
      main_docs.created.len(),
      main_docs.updated.len(),
      main_docs.removed.len()
    ));
  }
  if let Some(examples) = &summary.examples {
    line.push_str(&format!(
      "; examples: {} created, {} updated, {} removed",
      examples.created.len(),
      examples.updated.len(),
      examples.removed.len()
    ));
  }
  println!("{line}");
}

fn main() -> ExitCode {
  let cli = Cli::parse();

  setup_tracing(cli.verbose);

  let options = DocsSyncOptions {
    version: cli.version.clone(),
    source_repo: PathBuf::from(cli.klt_repo),
    docs_repo: PathBuf::from(cli.klt_docs),
    examples_repo: PathBuf::from(cli.klt_examples),
    promote_to_main: cli.update_main,
    dry_run: cli.dry_run,
  };

  match DocsSync::sync_with_options(options) {
    Ok(summary) => {
      print_summary(&cli.version, &summary);
      ExitCode::SUCCESS
    }
    Err(err @ DocsSyncError::MissingInput(_)) => {
      eprintln!("{err}. Please provide the version and the paths to the source and docs repositories.");
      ExitCode::FAILURE
    }
    Err(err) => {
      eprintln!("Error: {err}");
      ExitCode::FAILURE
    }
  }
}
