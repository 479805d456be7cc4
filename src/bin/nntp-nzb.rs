//! Write an NZB for every harvested file whose subject contains a search string.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, ensure};
use clap::Parser;
use nntp_harvest::{DEFAULT_DATABASE, SqliteStore, logging, nzb::Nzb};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(
    name = "nntp-nzb",
    version,
    about = "Build an NZB from harvested headers whose subject contains SEARCH"
)]
struct Args {
    /// Text the subject must contain (SQL LIKE wildcards allowed)
    search: String,

    /// SQLite database written by nntp-harvest
    #[arg(short, long, default_value = DEFAULT_DATABASE)]
    database: PathBuf,

    /// Write the NZB here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    // Logs go to stderr so stdout carries only the document
    if let Err(e) = logging::init(&args.log_level, None) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    ensure!(
        args.database.exists(),
        "Database {} does not exist",
        args.database.display()
    );
    let mut store = SqliteStore::open(&args.database)
        .await
        .with_context(|| format!("Couldn't open database {}", args.database.display()))?;
    let articles = store.articles_matching(&args.search).await;
    store.close().await?;
    let articles = articles.context("Querying articles failed")?;

    let nzb = Nzb::from_articles(&articles);
    if nzb.files.is_empty() {
        warn!("No file found for {:?}", args.search);
    }
    for file in &nzb.files {
        let missing = file.missing_segments();
        if !missing.is_empty() {
            warn!("{} is missing {} of {} parts", file.name, missing.len(), file.total);
        }
    }
    let xml = nzb.to_xml()?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &xml)
                .with_context(|| format!("Couldn't write {}", path.display()))?;
            info!("Wrote {} files to {}", nzb.files.len(), path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(xml.as_bytes())?;
            stdout.flush()?;
        }
    }
    Ok(())
}
