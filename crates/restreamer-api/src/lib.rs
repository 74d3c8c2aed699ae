//! Restreamer control-plane client.
//!
//! The [`RestreamerApi`] trait is the seam the orchestration core talks to.
//! [`HttpRestreamerClient`] implements it against the Restreamer v3 HTTP API,
//! [`InMemoryRestreamer`] against a local table.

pub mod client;
pub mod error;
pub mod http;
pub mod memory;
pub mod types;

pub use client::RestreamerApi;
pub use error::{ApiError, Result};
pub use http::{ConnectionConfig, HttpRestreamerClient};
pub use memory::{FailPoint, InMemoryRestreamer};
pub use types::{
    EncodingParams, FrameRate, ProcessDetail, ProcessOutputSpec, ProcessSpec, ProcessSummary,
    Resolution,
};
