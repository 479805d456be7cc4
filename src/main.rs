//! Command-line harvester: one server, one group, one database.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use nntp_harvest::{
    DEFAULT_BATCH_SIZE, DEFAULT_DATABASE, HarvestReport, HarvestSettings, NntpClient, ServerConfig,
    SqliteStore, harvest_session, logging,
};
use tracing::{debug, error, info};

#[derive(Parser)]
#[command(
    name = "nntp-harvest",
    version,
    about = "Harvest newsgroup article headers into SQLite, resuming where the last run stopped"
)]
struct Args {
    /// Server address, host[:port] (port defaults to 563)
    #[arg(short, long)]
    server: String,

    /// Username for AUTHINFO
    #[arg(short, long)]
    user: String,

    /// Password for AUTHINFO
    #[arg(short, long)]
    password: String,

    /// Newsgroup to harvest
    #[arg(short, long)]
    group: String,

    /// SQLite database file
    #[arg(short, long, default_value = DEFAULT_DATABASE)]
    database: PathBuf,

    /// Append log output to this file instead of stderr
    #[arg(short, long)]
    log: Option<PathBuf>,

    /// Article ids per XZHDR request
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: u64,

    /// Default log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Accept any TLS certificate
    #[arg(long, default_value_t = false)]
    insecure: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = logging::init(&args.log_level, args.log.as_deref()) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(report) => {
            info!(
                "nntp-harvest finished: {} batches, {} articles, watermark {}",
                report.batches, report.articles, report.watermark
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<HarvestReport> {
    let settings = HarvestSettings::with_batch_size(args.batch_size);
    settings.validate()?;

    let mut config = ServerConfig::from_address(&args.server, &args.user, &args.password)?;
    if args.insecure {
        config = config.insecure();
    }

    info!("Started nntp-harvest");
    info!(
        "Server: {}, User: {}, Group: {}",
        args.server, args.user, args.group
    );

    let mut store = SqliteStore::open(&args.database)
        .await
        .with_context(|| format!("Couldn't open database {}", args.database.display()))?;

    let mut client = NntpClient::connect(Arc::new(config))
        .await
        .with_context(|| format!("Couldn't connect to {}", args.server))?;

    let result = harvest_session(&mut client, &mut store, &args.group, settings).await;

    if !client.is_broken() {
        if let Err(e) = client.quit().await {
            debug!("QUIT failed: {}", e);
        }
    }
    if let Err(e) = store.close().await {
        debug!("Closing database failed: {}", e);
    }

    result.with_context(|| format!("Harvesting {} failed", args.group))
}
