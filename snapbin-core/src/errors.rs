//! # Errors
//!
//! Every failure a request can hit is resolved into a [`SnapError`] at the
//! handler boundary. Core goals:
//! - one place that maps a failure class to its HTTP status
//! - the JSON envelope shape (`{success: false, ...}`) lives next to the status
//! - byte-oriented outcomes (412, 416) stay plain text
//!
//! The transport crate decides how to write the response; this module only
//! describes it.

use std::fmt;

use serde::Serialize;
use serde_json::json;

/// A convenience result type for handler-facing APIs.
pub type SnapResult<T> = std::result::Result<T, SnapError>;

/// Failure classes and their status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BadRequest,          // 400
    NotAuthenticated,    // 401
    NotFound,            // 404
    PreconditionFailed,  // 412
    RangeNotSatisfiable, // 416
    GeneralError,        // 500
}

/// Which key of the JSON envelope carries the human-readable text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeField {
    Error,
    Message,
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::BadRequest => 400,
            ErrorKind::NotAuthenticated => 401,
            ErrorKind::NotFound => 404,
            ErrorKind::PreconditionFailed => 412,
            ErrorKind::RangeNotSatisfiable => 416,
            ErrorKind::GeneralError => 500,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "BadRequest",
            ErrorKind::NotAuthenticated => "NotAuthenticated",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::PreconditionFailed => "PreconditionFailed",
            ErrorKind::RangeNotSatisfiable => "RangeNotSatisfiable",
            ErrorKind::GeneralError => "GeneralError",
        }
    }

    /// 412 and 416 come from the byte-oriented file endpoint and carry no
    /// JSON envelope.
    pub fn is_plain_text(&self) -> bool {
        matches!(self, ErrorKind::PreconditionFailed | ErrorKind::RangeNotSatisfiable)
    }

    pub fn envelope_field(&self) -> EnvelopeField {
        match self {
            ErrorKind::NotAuthenticated | ErrorKind::NotFound => EnvelopeField::Error,
            _ => EnvelopeField::Message,
        }
    }
}

/// The `{name, message}` pair echoed back when a store call fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpstreamError {
    pub name: String,
    pub message: String,
}

impl UpstreamError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }
}

impl Default for UpstreamError {
    fn default() -> Self {
        Self::new("Error", "Unknown internal error")
    }
}

/// A structured gateway error.
///
/// Fields:
/// - kind (status code + envelope layout)
/// - message (client-facing text)
/// - upstream (optional `{name, message}` of the failing collaborator)
/// - source (kept for logs, never rendered)
#[derive(Debug)]
pub struct SnapError {
    pub kind: ErrorKind,
    pub message: String,
    pub upstream: Option<UpstreamError>,
    pub source: Option<anyhow::Error>,
}

impl SnapError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            upstream: None,
            source: None,
        }
    }

    pub fn with_upstream(mut self, upstream: UpstreamError) -> Self {
        self.upstream = Some(upstream);
        self
    }

    pub fn with_source(mut self, source: anyhow::Error) -> Self {
        self.source = Some(source);
        self
    }

    pub fn code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Turn any error into a `SnapError`:
    /// - if it's already a `SnapError`, keep it
    /// - otherwise wrap as GeneralError with an `Error` upstream
    pub fn normalize(err: anyhow::Error) -> SnapError {
        match err.downcast::<SnapError>() {
            Ok(snap) => snap,
            Err(other) => SnapError::general_error("Unknown internal error")
                .with_upstream(UpstreamError::new("Error", other.to_string()))
                .with_source(other),
        }
    }

    /// JSON envelope for non plain-text kinds.
    pub fn to_json(&self) -> serde_json::Value {
        let mut body = json!({ "success": false });
        match self.kind.envelope_field() {
            EnvelopeField::Error => body["error"] = json!(self.message),
            EnvelopeField::Message => body["message"] = json!(self.message),
        }
        if let Some(upstream) = &self.upstream {
            body["error"] = json!(upstream);
        }
        body
    }

    // ---- Constructors ----

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, msg)
    }
    pub fn not_authenticated(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotAuthenticated, msg)
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }
    pub fn precondition_failed() -> Self {
        Self::new(ErrorKind::PreconditionFailed, "Precondition Failed")
    }
    pub fn range_not_satisfiable() -> Self {
        Self::new(ErrorKind::RangeNotSatisfiable, "Range Not Satisfiable")
    }
    pub fn general_error(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::GeneralError, msg)
    }
    pub fn missing_auth() -> Self {
        Self::not_authenticated("Missing auth")
    }
}

impl fmt::Display for SnapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.name(), self.code(), self.message)?;
        if let Some(upstream) = &self.upstream {
            write!(f, " [{}: {}]", upstream.name, upstream.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for SnapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Convenience helper for "bail with SnapError".
#[macro_export]
macro_rules! bail_snap {
    ($ctor:ident, $msg:expr) => {
        return Err($crate::errors::SnapError::$ctor($msg))
    };
    ($ctor:ident, $fmt:expr, $($arg:tt)*) => {
        return Err($crate::errors::SnapError::$ctor(format!($fmt, $($arg)*)))
    };
}
