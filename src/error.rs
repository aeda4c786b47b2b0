//! Error types for the scrape load generator

use std::net::SocketAddr;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the scrape load generator
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Listener could not be bound (typically: port already in use)
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Metric registration or encoding error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Every requested target failed to start
    #[error("None of the {requested} scrape targets could be started")]
    NoTargetsStarted { requested: usize },

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true if this error came from binding a listener
    pub fn is_bind(&self) -> bool {
        matches!(self, Error::Bind { .. })
    }
}
