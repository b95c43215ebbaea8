//! snapbin-core: transport-agnostic building blocks for snapbin.
//!
//! Holds the error taxonomy every layer resolves into and the gateway
//! configuration read at process start.

pub mod config;
pub mod errors;

pub use config::{SnapConfig, DEFAULT_CACHE_CONTROL, DEFAULT_LIST_LIMIT};
pub use errors::{ErrorKind, SnapError, SnapResult, UpstreamError};
