//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! client / facade / watch tasks produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;

use crate::config::ObservabilityConfig;

/// Initialize logging and, when enabled, the metrics endpoint.
pub fn init(config: &ObservabilityConfig) {
    logging::init_logging(config);

    if config.metrics_enabled {
        match config.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }
}
