//! HTTP server for kaf.
//!
//! Translates the HTTP surface (`/put/<log>`, `/get/<log>`,
//! `/archive/<log>`) into registry and worker requests, frames get windows
//! in the `kaf`, `raw` and `json` formats, and exposes Prometheus metrics.

pub mod config;
pub mod handlers;
pub mod http;
pub mod metrics;
pub mod request;
pub mod response;

pub use config::{CliArgs, ServerConfig};
pub use http::KafServer;
