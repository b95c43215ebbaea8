//! snapbin-axum: the HTTP surface of snapbin.
//!
//! Builds a static axum [`Router`](axum::Router) over a [`SnapState`]:
//! authenticated upload/delete/list routes, public conditional retrieval
//! under `/file/*`, and JSON 404s for everything else.

pub mod app;
mod auth;
mod error;
pub mod fetch;
mod handlers;
pub mod state;
pub mod urls;

pub use app::{build_router, snapbin, SnapApp};
pub use auth::{is_authorized, require_auth};
pub use error::{store_failure, SnapAxumError};
pub use state::SnapState;
pub use urls::query_param;
