//! Startup configuration
//!
//! Every setting can be given as an environment variable (the primary
//! interface) or as the equivalent long flag. Values are read once at startup;
//! malformed values abort the process before any target is started.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::error::{Error, Result};

// =============================================================================
// CLI Arguments
// =============================================================================

/// Scrape Load Generator - fan-out of Prometheus scrape targets
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Log file path
    #[arg(long, env = "LOG_FILE", default_value = "load_generator.log")]
    pub log_file: PathBuf,

    /// Port of the first scrape target
    #[arg(long, env = "START_PORT", default_value = "8000")]
    pub start_port: u16,

    /// Number of scrape targets
    #[arg(long, env = "NUM_TARGETS", default_value = "5")]
    pub num_targets: usize,

    /// Seed for reproducible gauge values
    #[arg(long, env = "SEED", default_value = "42")]
    pub seed: u64,

    /// Interface the scrape targets listen on
    #[arg(long, env = "BIND_HOST", default_value = "0.0.0.0")]
    pub bind_host: IpAddr,

    /// Gauge update interval in milliseconds
    #[arg(long, env = "UPDATE_INTERVAL_MS", default_value = "1000")]
    pub update_interval_ms: u64,

    /// Treat a bind failure on any target as fatal
    #[arg(long, env = "STRICT_BIND")]
    pub strict_bind: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

// =============================================================================
// Generator Configuration
// =============================================================================

/// Validated configuration for the load generator
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Port of target 0
    pub start_port: u16,

    /// Number of targets
    pub num_targets: usize,

    /// Seed for the per-target value samplers
    pub seed: u64,

    /// Listen interface
    pub bind_host: IpAddr,

    /// Gauge update period
    pub update_interval: Duration,

    /// Abort startup if any target fails to bind
    pub strict_bind: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            start_port: 8000,
            num_targets: 5,
            seed: 42,
            bind_host: IpAddr::from([0, 0, 0, 0]),
            update_interval: Duration::from_secs(1),
            strict_bind: false,
        }
    }
}

impl GeneratorConfig {
    /// Build and validate a configuration from parsed arguments
    pub fn from_args(args: &Args) -> Result<Self> {
        let config = Self {
            start_port: args.start_port,
            num_targets: args.num_targets,
            seed: args.seed,
            bind_host: args.bind_host,
            update_interval: Duration::from_millis(args.update_interval_ms),
            strict_bind: args.strict_bind,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the invariants the generator relies on
    pub fn validate(&self) -> Result<()> {
        if self.update_interval.is_zero() {
            return Err(Error::Config(
                "update interval must be greater than zero".to_string(),
            ));
        }

        if self.num_targets > 0 && self.start_port == 0 {
            return Err(Error::Config(
                "start port must be non-zero when targets are configured".to_string(),
            ));
        }

        if self.num_targets > 0 && self.port_for(self.num_targets - 1).is_none() {
            return Err(Error::Config(format!(
                "{} targets starting at port {} exceed the highest port {}",
                self.num_targets,
                self.start_port,
                u16::MAX
            )));
        }

        Ok(())
    }

    /// Port assigned to the target at `index`, if it fits in the port space
    pub fn port_for(&self, index: usize) -> Option<u16> {
        u16::try_from(index)
            .ok()
            .and_then(|offset| self.start_port.checked_add(offset))
    }
}
