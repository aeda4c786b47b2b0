//! Scrape Load Generator
//!
//! Stands up many independent Prometheus scrape targets, each serving one
//! continuously-updating gauge, to exercise scrapers and aggregators under
//! configurable fan-out.
//!
//! # Architecture
//!
//! ```text
//! LoadGenerator ──▶ ScrapeTarget × N ──┬──▶ ExpositionServer (GET /metrics)
//!                                      └──▶ update loop (gauge ← sample)
//! ```
//!
//! # Modules
//!
//! - [`config`] - Environment/CLI configuration
//! - [`error`] - Error types
//! - [`generator`] - Target orchestration
//! - [`logging`] - Log file setup
//! - [`metrics`] - Per-target Prometheus registries
//! - [`server`] - HTTP exposition server
//! - [`target`] - Scrape targets and their update loops

pub mod config;
pub mod error;
pub mod generator;
pub mod logging;
pub mod metrics;
pub mod server;
pub mod target;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export commonly used types
pub use config::{Args, GeneratorConfig};
pub use error::{Error, Result};
pub use generator::LoadGenerator;
pub use metrics::TargetRegistry;
pub use server::ExpositionServer;
pub use target::{ScrapeTarget, TargetHandle, ValueSampler};
