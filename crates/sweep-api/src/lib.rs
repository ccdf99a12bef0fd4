//! HTTP control surface of the cleanup agent.
mod error;
pub use error::ApiError;

mod handler;
pub use handler::{ApiHandler, CleanupStatus};

mod adapter;
pub use adapter::EngineApiAdapter;

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
mod middleware;

#[cfg(feature = "http")]
pub use http::{HttpApi, VersionInfo};

#[cfg(feature = "http")]
pub use axum;
