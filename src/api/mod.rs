//! API layer
//!
//! HTTP handlers for:
//! - Home page and account endpoints
//! - Error pages
//! - Metrics (Prometheus)

pub mod errors;
pub mod metrics;
mod pages;

pub use errors::{expose_error_detail, handle_panic, not_found};
pub use metrics::metrics_router;
pub use pages::pages_router;
