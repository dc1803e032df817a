//! dualproof-auditor - dual-proof verification sweep
//!
//! Runs the attribution auditor over the engine database: correlates
//! recent similarity results with partner usage logs and derives royalty
//! events for the pairs that align. One-shot by default; `--poll-seconds`
//! keeps it running on an interval.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use dualproof_common::{db, EngineConfig};
use dualproof_engine::Auditor;

#[derive(Parser, Debug)]
#[command(name = "dualproof-auditor", about = "Dual-proof royalty auditor sweep")]
struct Args {
    /// Engine database path
    #[arg(long, env = "DUALPROOF_DB")]
    db_path: PathBuf,

    /// TOML config path (defaults to ~/.config/dualproof/dualproof.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Correlate but do not derive royalty events
    #[arg(long, default_value_t = false)]
    dry_run: bool,

    /// Keep sweeping on this interval instead of exiting after one pass
    #[arg(long)]
    poll_seconds: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    info!("Starting dualproof-auditor");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Database: {}", args.db_path.display());

    let config = EngineConfig::load(args.config.as_deref())?;
    info!(
        corr_threshold = config.s_corr_threshold,
        window_minutes = config.correlation_window_minutes,
        batch_size = config.batch_size,
        dry_run = args.dry_run,
        "Auditor configuration resolved"
    );

    let pool = db::init::init_database(&args.db_path).await?;
    let auditor = Auditor::new(pool, config).with_dry_run(args.dry_run);

    match args.poll_seconds {
        None => {
            let report = auditor.sweep().await?;
            info!(
                scanned = report.scanned,
                derived = report.derived,
                "Sweep complete"
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Some(seconds) => {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(seconds));
            loop {
                interval.tick().await;
                if let Err(e) = auditor.sweep().await {
                    tracing::warn!(error = %e, "Sweep failed; will retry next interval");
                }
            }
        }
    }

    Ok(())
}
