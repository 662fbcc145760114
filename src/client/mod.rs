//! Request executor and client-facing configuration
//!
//! This module handles:
//! * Client configuration (endpoint, secret, timeouts, transport choice)
//! * The per-call request surface ([`ApiRequest`])
//! * Header enrichment, watermark tracking, and delegation to the
//!   transport adapter chosen at construction

mod config;
mod executor;
pub mod headers;
mod request;

pub use config::{ClientConfig, ClientConfigBuilder, TransportMode};
pub use executor::RequestExecutor;
pub use request::ApiRequest;
