//! # dompet-server
//!
//! HTTP surface for statement ingestion:
//! - **`POST /upload`** runs a batch of PDF statements through the ingest
//!   pipeline and records one import
//! - **`GET /transactions`** lists stored transactions, newest first, with
//!   optional inclusive `start`/`end` dates
//! - **`GET /summary`** totals income and spending over the same range

pub mod api;
pub mod config;
pub mod error;

pub use api::{build_router, AppState};
pub use config::{ConfigError, ServerConfig};
pub use error::ApiError;
