//! Metrics module
//!
//! Per-target Prometheus registries. Each scrape target owns its own
//! registry so that no two targets ever expose each other's series.

mod registry;

pub use registry::{TargetRegistry, EXPOSITION_CONTENT_TYPE};
