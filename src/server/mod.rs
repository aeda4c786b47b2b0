//! HTTP exposition server
//!
//! One plain HTTP/1 listener per scrape target, serving that target's
//! registry on [`METRICS_PATH`].

mod exposition;

pub use exposition::{respond, ExpositionServer, METRICS_PATH};
