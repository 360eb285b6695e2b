use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use databundle::catalogue::{Catalogue, DEFAULT_CATALOGUE};
use databundle::{FetchConfig, InstallOptions, Installer};

/// Download a named dataset bundle and install it into a directory.
#[derive(Debug, Parser)]
#[command(name = "databundle", version)]
struct Args {
    /// Dataset to download (a key of the catalogue).
    #[arg(short = 'd', long = "dataset")]
    dataset: String,

    /// Output folder. Defaults to `./<dataset>`.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Keep existing data in the destination directory.
    #[arg(short, long)]
    keep: bool,

    /// JSON file mapping dataset names to mirror URLs.
    #[arg(short, long, default_value = DEFAULT_CATALOGUE)]
    catalogue: PathBuf,

    /// Give up if the whole install takes longer than this many seconds.
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();

    let args = Args::parse();

    let catalogue = Catalogue::load(&args.catalogue)?;
    let mirrors = catalogue.mirrors(&args.dataset)?.clone();

    let dest = match args.output {
        Some(p) => p,
        None => std::env::current_dir()?.join(&args.dataset),
    };

    let mut options = InstallOptions::default().keep(args.keep);
    if let Some(secs) = args.timeout {
        options = options.timeout(Duration::from_secs(secs));
    }

    let installer = Installer::new(FetchConfig::default())?;
    let report = installer.install(mirrors, &dest, &options).await?;

    tracing::debug!(?report, "install report");
    println!("installed {} into {}", args.dataset, dest.display());
    Ok(())
}
