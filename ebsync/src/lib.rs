//! ebsync library interface
//!
//! Reconciles Kontur Elba counterparties and their contact persons into
//! Bitrix24 companies and contacts. Every source entity gets exactly one CRM
//! record, keyed by a custom identity field; re-runs create nothing new.

pub mod models;
pub mod progress;
pub mod services;
pub mod types;

pub use services::{BitrixClient, ElbaClient, Reconciler, SyncSummary};

use ebsync_common::{Result, SyncConfig};

/// Build the HTTP clients from `config` and run one reconciliation
pub async fn run(config: &SyncConfig, show_progress: bool) -> Result<SyncSummary> {
    let source = ElbaClient::new(&config.source)?;
    let destination = BitrixClient::new(&config.destination, config.retry.clone())?;

    Reconciler::new(&source, &destination, &config.destination)
        .with_progress(show_progress)
        .run()
        .await
}
