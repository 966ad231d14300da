//! ebsync - Elba → Bitrix24 counterparty sync
//!
//! Creates a Bitrix24 company for every Elba counterparty and a contact for
//! every contact person, linked to its company. Identification is by the
//! `UF_CRM_ELBA_ID` user field on both entity kinds.
//!
//! Required (environment, `.env`, flag, or TOML config):
//!   ELBA_TOKEN=<Elba API key, sent as X-Kontur-ApiKey>
//!   BITRIX_WEBHOOK_URL=https://<domain>.bitrix24.ru/rest/1/<code>/

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

use ebsync_common::config::{ConfigOverrides, BITRIX_WEBHOOK_ENV, ELBA_TOKEN_ENV};
use ebsync_common::SyncConfig;

/// Command-line arguments for ebsync
#[derive(Parser, Debug)]
#[command(name = "ebsync")]
#[command(about = "Sync Kontur Elba counterparties and contacts into Bitrix24")]
#[command(version)]
struct Args {
    /// TOML config file with source/destination/retry/logging sections
    #[arg(short, long, env = "EBSYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Elba API key
    #[arg(long, env = ELBA_TOKEN_ENV, hide_env_values = true)]
    elba_token: Option<String>,

    /// Bitrix24 inbound webhook base URL
    #[arg(long, env = BITRIX_WEBHOOK_ENV, hide_env_values = true)]
    bitrix_webhook_url: Option<String>,

    /// Elba API root URL
    #[arg(long, env = "ELBA_API_BASE")]
    elba_base_url: Option<String>,

    /// Items per Elba page request
    #[arg(long)]
    page_size: Option<usize>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, env = "EBSYNC_LOG_LEVEL")]
    log_level: Option<String>,

    /// Do not draw a progress bar
    #[arg(long)]
    no_progress: bool,
}

impl Args {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            config_file: self.config.clone(),
            elba_token: self.elba_token.clone(),
            bitrix_webhook_url: self.bitrix_webhook_url.clone(),
            elba_base_url: self.elba_base_url.clone(),
            page_size: self.page_size,
            log_level: self.log_level.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env must be loaded before clap reads env fallbacks
    let _ = dotenvy::dotenv();
    let args = Args::parse();

    // Secrets are checked before any network activity
    let config = SyncConfig::load(&args.overrides())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();

    info!(
        "Starting ebsync v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Elba API: {}", config.source.base_url);

    match ebsync::run(&config, !args.no_progress).await {
        Ok(summary) => {
            info!("{}", summary.display_string());
            Ok(())
        }
        Err(e) => {
            tracing::error!(error = %e, "Sync failed");
            Err(e.into())
        }
    }
}
