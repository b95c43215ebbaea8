mod delete;
mod file;
mod list;
mod upload;

pub use delete::delete;
pub use file::{get_file, legacy_upload, missing_id};
pub use list::list;
pub use upload::upload;

use snapbin_core::SnapError;

use crate::SnapAxumError;

/// Catch-all for unknown paths and unsupported methods.
pub async fn not_found() -> SnapAxumError {
    SnapError::not_found("Not Found").into()
}

pub async fn health() -> &'static str {
    "ok"
}
