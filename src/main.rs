//! elsa-crawl: crawl ElsaPro service documentation for one vehicle
//!
//! Credentials come from `ELSA_USERNAME` / `ELSA_PASSWORD` (a `.env` file is
//! honored). Results land in a per-VIN directory under `--output`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use elsa_crawl::auth::{Credentials, OtpSource, PortalLogin, PromptOtp, StaticOtp};
use elsa_crawl::browser_profile::sweep_stale_profiles;
use elsa_crawl::config::DEFAULT_OUTPUT_DIR;
use elsa_crawl::{ChromiumLauncher, CrawlConfig, CrawlController, DocumentFilter, JsonlStore, Vin};

/// Profiles older than this are leftovers of killed runs
const STALE_PROFILE_AGE: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Parser)]
#[command(name = "elsa-crawl")]
#[command(about = "Crawl ElsaPro service documentation for a vehicle")]
#[command(version)]
struct Cli {
    /// Root directory of the document store
    #[arg(long, global = true, env = "ELSA_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
    output: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one crawl to completion (Ctrl-C stops and cleans up)
    Crawl {
        /// Vehicle identification number (17 characters)
        #[arg(long)]
        vin: String,
        /// Parallel workers (1-10)
        #[arg(short, long)]
        workers: Option<usize>,
        /// Show the browser window
        #[arg(long)]
        headful: bool,
        /// One-time password; prompted for when omitted and ELSA_OTP is unset
        #[arg(long)]
        otp: Option<String>,
        /// Document rows taken per category listing
        #[arg(long)]
        max_documents: Option<usize>,
    },

    /// Print stored documents of a vehicle as JSON lines
    Documents {
        #[arg(long)]
        vin: String,
    },

    /// Search stored documents
    Search {
        #[arg(long)]
        vin: Option<String>,
        /// Category id or name
        #[arg(long)]
        category: Option<String>,
        /// Case-insensitive text in title or content
        #[arg(long)]
        text: Option<String>,
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "elsa_crawl=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let store = Arc::new(JsonlStore::new(&cli.output));

    match cli.command {
        Commands::Crawl {
            vin,
            workers,
            headful,
            otp,
            max_documents,
        } => {
            let vin = Vin::parse(&vin).context("Invalid VIN")?;
            let mut builder = CrawlConfig::from_env(vin)?.output_dir(&cli.output);
            if let Some(workers) = workers {
                builder = builder.max_workers(workers);
            }
            if let Some(max) = max_documents {
                builder = builder.max_documents_per_category(max);
            }
            if headful {
                builder = builder.headless(false);
            }
            let config = builder.build()?;
            run_crawl(config, otp, store).await
        }
        Commands::Documents { vin } => {
            let vin = Vin::parse(&vin).context("Invalid VIN")?;
            for record in store.get_documents(vin.as_str()).await? {
                println!("{}", serde_json::to_string(&record)?);
            }
            Ok(())
        }
        Commands::Search {
            vin,
            category,
            text,
            limit,
        } => {
            let filter = DocumentFilter {
                vin,
                category,
                text,
                limit,
            };
            for record in store.search_documents(&filter).await? {
                println!("{}", serde_json::to_string(&record)?);
            }
            Ok(())
        }
    }
}

async fn run_crawl(config: CrawlConfig, otp: Option<String>, store: Arc<JsonlStore>) -> Result<()> {
    match sweep_stale_profiles(&std::env::temp_dir(), STALE_PROFILE_AGE) {
        Ok(0) => {}
        Ok(n) => info!("Removed {n} stale browser profiles"),
        Err(e) => warn!("Profile sweep failed: {e:#}"),
    }

    let otp: Box<dyn OtpSource> = match otp {
        Some(code) => Box::new(StaticOtp::new(&code)?),
        None => match StaticOtp::from_env()? {
            Some(code) => Box::new(code),
            None => Box::new(PromptOtp),
        },
    };
    let login = PortalLogin::new(Credentials::from_env()?, otp);

    let controller = CrawlController::new(ChromiumLauncher, login, store);
    controller.start_with(config).await?;

    let summary = tokio::select! {
        result = controller.wait() => result?,
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, stopping crawl");
            controller.stop().await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&summary)?);
    if !summary.is_clean() {
        warn!(
            "Crawl finished with {} errors and {} failed workers",
            summary.errors,
            summary.failed_workers.len()
        );
    }
    Ok(())
}
