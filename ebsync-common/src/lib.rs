//! # ebsync Common Library
//!
//! Shared code for the Elba → Bitrix24 counterparty sync:
//! - Error taxonomy used by every component
//! - Run configuration (secrets, endpoints, tunables)
//! - Retry-with-backoff decorator for remote calls

pub mod config;
pub mod error;
pub mod retry;

pub use config::SyncConfig;
pub use error::{Error, Result};
pub use retry::RetryPolicy;
