use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use relwatch::application::CheckAction;
use relwatch::checker::CheckerRegistry;
use relwatch::http::HttpClient;
use relwatch::manifest::Manifest;

/// relwatch - release page watcher
///
/// Check upstream release pages for new versions of external artifacts.
///
/// Each record in the manifest names a page to scrape and the pattern
/// rules that extract the latest version and its download URL.
///
/// Examples:
///   relwatch check manifest.json          # report what changed
///   relwatch check manifest.json --write  # and persist the results
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Check all records in a manifest
    Check(CheckArgs),
}

#[derive(clap::Args, Debug)]
struct CheckArgs {
    /// Path to the manifest file (also via RELWATCH_MANIFEST)
    #[arg(value_name = "MANIFEST", env = "RELWATCH_MANIFEST")]
    manifest: PathBuf,

    /// Write discovered versions and states back to the manifest
    #[arg(long)]
    write: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check(args) => check(args).await,
    }
}

async fn check(args: CheckArgs) -> Result<()> {
    let mut manifest = Manifest::load(&args.manifest)?;

    let registry = CheckerRegistry::with_default_checkers(HttpClient::new()?);
    let action = CheckAction::new(&registry);
    let results = action.check_all(&mut manifest).await;

    for result in &results {
        println!("{}: {}", result.filename, result.status);
    }

    if args.write {
        manifest.save(&args.manifest)?;
    }
    Ok(())
}
