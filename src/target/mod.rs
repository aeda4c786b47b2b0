//! Scrape targets
//!
//! A target pairs a passive, request-driven exposition server with an
//! active, timer-driven update loop. Targets share no mutable state.

mod sampler;
mod scrape_target;

pub use sampler::{ValueSampler, VALUE_RANGE};
pub use scrape_target::{ScrapeTarget, TargetHandle};
