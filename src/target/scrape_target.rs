//! Scrape Target
//!
//! One exposition server plus one update loop around a private registry.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::sampler::ValueSampler;
use crate::config::GeneratorConfig;
use crate::error::{Error, Result};
use crate::metrics::TargetRegistry;
use crate::server::ExpositionServer;

// =============================================================================
// Scrape Target
// =============================================================================

/// A single synthetic scrape target.
#[derive(Debug)]
pub struct ScrapeTarget {
    index: usize,
    port: u16,
    metric_name: String,
    registry: TargetRegistry,
}

impl ScrapeTarget {
    /// Create target `index` exposing `metric_<index>` on `port`.
    pub fn new(index: usize, port: u16) -> Result<Self> {
        let metric_name = Self::metric_name_for(index);
        let registry = TargetRegistry::new(&metric_name)?;

        Ok(Self {
            index,
            port,
            metric_name,
            registry,
        })
    }

    /// Metric name used by the target at `index`.
    pub fn metric_name_for(index: usize) -> String {
        format!("metric_{}", index)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn metric_name(&self) -> &str {
        &self.metric_name
    }

    pub fn registry(&self) -> &TargetRegistry {
        &self.registry
    }

    /// Bind the exposition server and spawn the server and update tasks.
    ///
    /// Both tasks stop when `cancel` fires. An invalid `config` or a bind
    /// failure is returned before anything is spawned.
    pub async fn start(
        &self,
        config: &GeneratorConfig,
        cancel: CancellationToken,
    ) -> Result<TargetHandle> {
        config.validate()?;

        let addr = SocketAddr::new(config.bind_host, self.port);
        let server = ExpositionServer::bind(addr, self.registry.clone()).await?;
        let local_addr = server.local_addr();

        let server_task = tokio::spawn(server.serve(cancel.clone()));
        let updater_task = tokio::spawn(run_updates(
            local_addr.port(),
            self.registry.clone(),
            ValueSampler::new(config.seed, self.index),
            config.update_interval,
            cancel.clone(),
        ));

        info!(
            "Scrape target {} serving {} on {}",
            self.index, self.metric_name, local_addr
        );

        Ok(TargetHandle {
            index: self.index,
            metric_name: self.metric_name.clone(),
            local_addr,
            cancel,
            server_task,
            updater_task,
        })
    }
}

// =============================================================================
// Update Loop
// =============================================================================

/// Write a fresh sample into the gauge once per `interval` until cancelled.
///
/// The first update happens immediately. Late ticks are not caught up.
async fn run_updates(
    port: u16,
    registry: TargetRegistry,
    mut sampler: ValueSampler,
    interval: Duration,
    cancel: CancellationToken,
) {
    let metric_name = registry.metric_name();
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Update loop for {} stopped", metric_name);
                break;
            }
            _ = ticker.tick() => {
                let value = sampler.sample();
                registry.set(value);
                let epoch_ms = Utc::now().timestamp_millis();
                info!(
                    epoch_ms,
                    port,
                    metric = %metric_name,
                    value,
                    "{} - Metric updated: port={}, metric={}, value={:.2}",
                    epoch_ms,
                    port,
                    metric_name,
                    value
                );
            }
        }
    }
}

// =============================================================================
// Target Handle
// =============================================================================

/// A running scrape target.
#[derive(Debug)]
pub struct TargetHandle {
    index: usize,
    metric_name: String,
    local_addr: SocketAddr,
    cancel: CancellationToken,
    server_task: JoinHandle<()>,
    updater_task: JoinHandle<()>,
}

impl TargetHandle {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn metric_name(&self) -> &str {
        &self.metric_name
    }

    /// Address the exposition server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// URL of this target's metrics endpoint.
    pub fn metrics_url(&self) -> String {
        format!("http://{}{}", self.local_addr, crate::server::METRICS_PATH)
    }

    /// True once both tasks have exited.
    pub fn is_finished(&self) -> bool {
        self.server_task.is_finished() && self.updater_task.is_finished()
    }

    /// Stop both tasks and wait for them to exit.
    pub async fn shutdown(self) -> Result<()> {
        self.cancel.cancel();

        let (server, updater) = tokio::join!(self.server_task, self.updater_task);
        server.map_err(|e| {
            Error::Internal(format!("Server task for {} failed: {}", self.metric_name, e))
        })?;
        updater.map_err(|e| {
            Error::Internal(format!("Update task for {} failed: {}", self.metric_name, e))
        })?;

        debug!("Scrape target {} stopped", self.index);
        Ok(())
    }
}
