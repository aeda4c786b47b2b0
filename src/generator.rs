//! Load Generator
//!
//! Creates the scrape targets on consecutive ports, starts them together and
//! keeps them running until told to stop.

use std::future::Future;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::config::GeneratorConfig;
use crate::error::{Error, Result};
use crate::target::{ScrapeTarget, TargetHandle};

/// Owns every scrape target for the lifetime of the process.
#[derive(Debug)]
pub struct LoadGenerator {
    config: GeneratorConfig,
    targets: Vec<ScrapeTarget>,
}

impl LoadGenerator {
    /// Create the generator and its targets.
    ///
    /// Target `i` exposes `metric_<i>` on `start_port + i`.
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        config.validate()?;

        let targets = (0..config.num_targets)
            .map(|index| {
                let port = config.port_for(index).ok_or_else(|| {
                    Error::Config(format!("no port available for target {}", index))
                })?;
                ScrapeTarget::new(index, port)
            })
            .collect::<Result<Vec<_>>>()?;

        info!(
            num_targets = config.num_targets,
            start_port = config.start_port,
            "Load generator started with {} targets, starting at port {}.",
            config.num_targets,
            config.start_port
        );

        Ok(Self { config, targets })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn targets(&self) -> &[ScrapeTarget] {
        &self.targets
    }

    /// Bind and spawn every target concurrently.
    ///
    /// Each target runs under a child of `cancel`. A target that fails to
    /// bind is logged and skipped, unless `strict_bind` is set, in which case
    /// the targets already started are stopped and the bind error returned.
    #[instrument(skip_all)]
    pub async fn start(&self, cancel: &CancellationToken) -> Result<Vec<TargetHandle>> {
        let results = join_all(
            self.targets
                .iter()
                .map(|target| target.start(&self.config, cancel.child_token())),
        )
        .await;

        let mut handles = Vec::with_capacity(self.targets.len());
        let mut first_error = None;

        for (target, result) in self.targets.iter().zip(results) {
            match result {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    error!(
                        "Scrape target {} ({} on port {}) failed to start: {}",
                        target.index(),
                        target.metric_name(),
                        target.port(),
                        e
                    );
                    first_error.get_or_insert(e);
                }
            }
        }

        let Some(err) = first_error else {
            return Ok(handles);
        };

        if self.config.strict_bind || handles.is_empty() {
            shutdown_all(handles).await;
            return Err(if self.config.strict_bind {
                err
            } else {
                Error::NoTargetsStarted {
                    requested: self.targets.len(),
                }
            });
        }

        warn!(
            "Running {} of {} scrape targets",
            handles.len(),
            self.targets.len()
        );
        Ok(handles)
    }

    /// Start all targets, then idle until `shutdown` resolves.
    ///
    /// With zero targets this simply waits for `shutdown`.
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let cancel = CancellationToken::new();
        let handles = self.start(&cancel).await?;
        info!("{} scrape targets running", handles.len());

        shutdown.await;

        cancel.cancel();
        shutdown_all(handles).await;
        Ok(())
    }
}

async fn shutdown_all(handles: Vec<TargetHandle>) {
    for result in join_all(handles.into_iter().map(TargetHandle::shutdown)).await {
        if let Err(e) = result {
            error!("Error stopping scrape target: {}", e);
        }
    }
}
