//! HTTP request handlers.

pub mod health;
pub mod maven;

pub use health::health_check;
pub use maven::dispatch;
