//! Common error types for ebsync

use thiserror::Error;

/// Common result type for ebsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the source client, destination client and engine
#[derive(Error, Debug)]
pub enum Error {
    /// Required secret missing, invalid config file, or no operating organization
    #[error("Configuration error: {0}")]
    Config(String),

    /// Identity fields could not be verified or created in the CRM
    #[error("Schema provisioning error: {0}")]
    SchemaProvisioning(String),

    /// Every candidate endpoint for a listing failed or returned nothing
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// Connection, timeout, or server-side (5xx/429) failure of a single call
    #[error("Transport error: {0}")]
    Transport(String),

    /// Structured error payload returned by the CRM
    #[error("Bitrix24 API error {code}: {description}")]
    DestinationApi { code: String, description: String },

    /// Non-success HTTP status that is neither transient nor structured
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// Record lacks a usable external id
    #[error("Skipped record: {0}")]
    MappingSkip(String),

    /// Response body was not the expected JSON shape
    #[error("Parse error: {0}")]
    Parse(String),
}

impl Error {
    /// Only transport-level failures are worth another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}
