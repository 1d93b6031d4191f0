//! HTTP front end of the depot Maven repository.
//!
//! This crate provides:
//! - Repository reads (`GET`/`HEAD`) from the local store or a caching proxy
//! - Hosted uploads (`PUT`) with checksum generation, validation and
//!   version-index reconciliation
//! - Health and Prometheus endpoints

pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
