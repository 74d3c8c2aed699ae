//! Remote-control HTTP API.
//!
//! A thin axum layer over the shared [`ChannelManager`](crate::channel::ChannelManager).
//! Every configuration change is written back through the settings store.

pub mod error;
pub mod models;
pub mod routes;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use server::{ApiServer, ApiServerConfig, AppState};
