//! Request classification: turns raw `range` / `if-*` header values into a
//! [`ResolvedRequest`] the fetch engine can act on. No I/O happens here; the
//! caller supplies blob metadata when the range needs the current size.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{unquote_etag, BlobMetadata, RangeSpec};

/// Retrieval methods the engine serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMethod {
    Get,
    Head,
}

/// Raw header values relevant to retrieval, extracted once per request.
/// `None` means the header was absent (or not valid UTF-8).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestHeaders {
    pub range: Option<String>,
    pub if_match: Option<String>,
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<String>,
    pub if_unmodified_since: Option<String>,
    pub if_range: Option<String>,
}

impl RequestHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_range<S: Into<String>>(mut self, value: S) -> Self {
        self.range = Some(value.into());
        self
    }

    pub fn with_if_match<S: Into<String>>(mut self, value: S) -> Self {
        self.if_match = Some(value.into());
        self
    }

    pub fn with_if_none_match<S: Into<String>>(mut self, value: S) -> Self {
        self.if_none_match = Some(value.into());
        self
    }

    pub fn with_if_modified_since<S: Into<String>>(mut self, value: S) -> Self {
        self.if_modified_since = Some(value.into());
        self
    }

    pub fn with_if_unmodified_since<S: Into<String>>(mut self, value: S) -> Self {
        self.if_unmodified_since = Some(value.into());
        self
    }

    pub fn with_if_range<S: Into<String>>(mut self, value: S) -> Self {
        self.if_range = Some(value.into());
        self
    }
}

/// A client-supplied validator, normalized (trimmed, quotes stripped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTag {
    pub tag: String,
    pub weak: bool,
}

impl EntityTag {
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let (weak, rest) = match raw.strip_prefix("W/") {
            Some(rest) => (true, rest.trim_start()),
            None => (false, raw),
        };
        Self {
            tag: unquote_etag(rest),
            weak,
        }
    }

    /// Strong comparison: weak validators never match.
    pub fn strong_eq(&self, etag: &str) -> bool {
        !self.weak && self.tag == etag
    }

    pub fn weak_eq(&self, etag: &str) -> bool {
        self.tag == etag
    }

    pub fn to_header(&self) -> String {
        if self.weak {
            format!("W/\"{}\"", self.tag)
        } else {
            format!("\"{}\"", self.tag)
        }
    }
}

/// `if-match` / `if-none-match` value: the wildcard or a validator list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EtagCondition {
    Any,
    Tags(Vec<EntityTag>),
}

impl EtagCondition {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }
        if raw == "*" {
            return Some(Self::Any);
        }
        let tags: Vec<EntityTag> = split_etag_list(raw)
            .into_iter()
            .map(EntityTag::parse)
            .filter(|t| !t.tag.is_empty())
            .collect();
        if tags.is_empty() {
            None
        } else {
            Some(Self::Tags(tags))
        }
    }

    pub fn matches_strong(&self, etag: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Tags(tags) => tags.iter().any(|t| t.strong_eq(etag)),
        }
    }

    pub fn matches_weak(&self, etag: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Tags(tags) => tags.iter().any(|t| t.weak_eq(etag)),
        }
    }

    pub fn to_header(&self) -> String {
        match self {
            Self::Any => "*".to_string(),
            Self::Tags(tags) => tags
                .iter()
                .map(EntityTag::to_header)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

/// Split a comma separated validator list, ignoring commas inside quotes.
fn split_etag_list(raw: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (i, c) in raw.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(raw[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(raw[start..].trim());
    parts.into_iter().filter(|p| !p.is_empty()).collect()
}

/// Store-side conditions for a `get` (`onlyIf`). Every present condition
/// must hold; timestamps compare at second precision.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conditional {
    pub etag_matches: Option<EtagCondition>,
    pub etag_does_not_match: Option<EtagCondition>,
    /// Passes when the blob was uploaded at or before this instant
    pub uploaded_before: Option<DateTime<Utc>>,
    /// Passes when the blob was uploaded strictly after this instant
    pub uploaded_after: Option<DateTime<Utc>>,
}

impl Conditional {
    pub fn is_empty(&self) -> bool {
        self.etag_matches.is_none()
            && self.etag_does_not_match.is_none()
            && self.uploaded_before.is_none()
            && self.uploaded_after.is_none()
    }

    pub fn is_satisfied_by(&self, meta: &BlobMetadata) -> bool {
        self.holds(&meta.etag, meta.uploaded)
    }

    fn holds(&self, etag: &str, uploaded: DateTime<Utc>) -> bool {
        if let Some(cond) = &self.etag_matches {
            if !cond.matches_strong(etag) {
                return false;
            }
        }
        if let Some(cond) = &self.etag_does_not_match {
            if cond.matches_weak(etag) {
                return false;
            }
        }
        if let Some(bound) = self.uploaded_before {
            if uploaded.timestamp() > bound.timestamp() {
                return false;
            }
        }
        if let Some(bound) = self.uploaded_after {
            if uploaded.timestamp() <= bound.timestamp() {
                return false;
            }
        }
        true
    }
}

/// `if-range` value: a validator or an HTTP date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IfRange {
    Etag(EntityTag),
    Date(DateTime<Utc>),
}

impl IfRange {
    pub fn parse(raw: &str) -> Self {
        match parse_http_date(raw) {
            Some(date) => Self::Date(date),
            None => Self::Etag(EntityTag::parse(raw)),
        }
    }

    /// Whether the requested range may still be honored for this blob.
    pub fn permits_range(&self, meta: &BlobMetadata) -> bool {
        match self {
            Self::Etag(tag) => tag.strong_eq(&meta.etag),
            Self::Date(date) => meta.uploaded.timestamp() <= date.timestamp(),
        }
    }
}

/// Outcome of evaluating conditional headers against known validators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Proceed,
    PreconditionFailed,
    NotModified,
}

/// Conditional headers of one request, parsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreconditionSet {
    pub if_match: Option<EtagCondition>,
    pub if_none_match: Option<EtagCondition>,
    pub if_modified_since: Option<DateTime<Utc>>,
    pub if_unmodified_since: Option<DateTime<Utc>>,
    pub if_range: Option<IfRange>,
}

impl PreconditionSet {
    /// Unparseable dates are ignored, as HTTP requires.
    pub fn from_headers(headers: &RequestHeaders) -> Self {
        Self {
            if_match: headers.if_match.as_deref().and_then(EtagCondition::parse),
            if_none_match: headers.if_none_match.as_deref().and_then(EtagCondition::parse),
            if_modified_since: headers.if_modified_since.as_deref().and_then(parse_http_date),
            if_unmodified_since: headers.if_unmodified_since.as_deref().and_then(parse_http_date),
            if_range: headers
                .if_range
                .as_deref()
                .filter(|v| !v.trim().is_empty())
                .map(IfRange::parse),
        }
    }

    pub fn has_match_conditions(&self) -> bool {
        self.if_match.is_some() || self.if_unmodified_since.is_some()
    }

    pub fn has_none_match_conditions(&self) -> bool {
        self.if_none_match.is_some() || self.if_modified_since.is_some()
    }

    /// `onlyIf` for the 412 family. `if-unmodified-since` is ignored when
    /// `if-match` is present.
    pub fn match_conditional(&self) -> Conditional {
        Conditional {
            etag_matches: self.if_match.clone(),
            uploaded_before: if self.if_match.is_some() {
                None
            } else {
                self.if_unmodified_since
            },
            ..Conditional::default()
        }
    }

    /// `onlyIf` for the 304 family. `if-none-match` wins over
    /// `if-modified-since`.
    pub fn none_match_conditional(&self) -> Conditional {
        match &self.if_none_match {
            Some(cond) => Conditional {
                etag_does_not_match: Some(cond.clone()),
                ..Conditional::default()
            },
            None => Conditional {
                uploaded_after: self.if_modified_since,
                ..Conditional::default()
            },
        }
    }

    /// Evaluate against validators already at hand (e.g. a cached response),
    /// in the same order the engine consults the store.
    pub fn evaluate(&self, etag: &str, uploaded: DateTime<Utc>) -> Verdict {
        if self.has_match_conditions() {
            if self.match_conditional().holds(etag, uploaded) {
                Verdict::Proceed
            } else {
                Verdict::PreconditionFailed
            }
        } else if self.has_none_match_conditions() {
            if self.none_match_conditional().holds(etag, uploaded) {
                Verdict::Proceed
            } else {
                Verdict::NotModified
            }
        } else {
            Verdict::Proceed
        }
    }
}

/// Why a `range` header cannot be served
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("range unit is not bytes")]
    UnsupportedUnit,
    #[error("malformed range")]
    Malformed,
    #[error("only a single range is supported")]
    MultipleRanges,
    #[error("range lies outside the blob")]
    Unsatisfiable,
}

/// Parse a `range` header against the blob's current size.
///
/// Accepts `bytes=a-b` (end clamped), `bytes=a-` and `bytes=-n` (suffix).
pub fn parse_range(header: &str, size: u64) -> Result<RangeSpec, RangeError> {
    let (unit, set) = header.split_once('=').ok_or(RangeError::Malformed)?;
    if !unit.trim().eq_ignore_ascii_case("bytes") {
        return Err(RangeError::UnsupportedUnit);
    }

    let specs: Vec<&str> = set.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    let spec = match specs.as_slice() {
        [] => return Err(RangeError::Malformed),
        [single] => *single,
        _ => return Err(RangeError::MultipleRanges),
    };

    let (first, last) = spec.split_once('-').ok_or(RangeError::Malformed)?;
    let (first, last) = (first.trim(), last.trim());

    let (start, end) = if first.is_empty() {
        let suffix: u64 = last.parse().map_err(|_| RangeError::Malformed)?;
        if suffix == 0 || size == 0 {
            return Err(RangeError::Unsatisfiable);
        }
        (size.saturating_sub(suffix), size - 1)
    } else {
        let start: u64 = first.parse().map_err(|_| RangeError::Malformed)?;
        let requested_end = if last.is_empty() {
            None
        } else {
            Some(last.parse::<u64>().map_err(|_| RangeError::Malformed)?)
        };
        if matches!(requested_end, Some(end) if end < start) {
            return Err(RangeError::Malformed);
        }
        if start >= size {
            return Err(RangeError::Unsatisfiable);
        }
        let end = requested_end.map_or(size - 1, |end| end.min(size - 1));
        (start, end)
    };

    Ok(RangeSpec::new(start, end - start + 1))
}

/// Immutable classification of one retrieval request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRequest {
    pub method: FetchMethod,
    pub key: String,
    pub range: Option<RangeSpec>,
    pub preconditions: PreconditionSet,
}

pub struct PreconditionParser;

impl PreconditionParser {
    /// Whether [`resolve`](Self::resolve) needs current metadata first.
    pub fn needs_metadata(method: FetchMethod, headers: &RequestHeaders) -> bool {
        method == FetchMethod::Get && headers.range.is_some()
    }

    /// Classify a request. The range is only considered for `GET` with
    /// metadata supplied; `if-range` may discard it.
    pub fn resolve(
        method: FetchMethod,
        key: impl Into<String>,
        headers: &RequestHeaders,
        metadata: Option<&BlobMetadata>,
    ) -> Result<ResolvedRequest, RangeError> {
        let preconditions = PreconditionSet::from_headers(headers);

        let mut range = None;
        if method == FetchMethod::Get {
            if let (Some(raw), Some(meta)) = (headers.range.as_deref(), metadata) {
                let parsed = parse_range(raw, meta.size)?;
                range = match &preconditions.if_range {
                    Some(if_range) if !if_range.permits_range(meta) => None,
                    _ => Some(parsed),
                };
            }
        }

        Ok(ResolvedRequest {
            method,
            key: key.into(),
            range,
            preconditions,
        })
    }
}

/// Parse any of the three HTTP date formats.
pub fn parse_http_date(raw: &str) -> Option<DateTime<Utc>> {
    httpdate::parse_http_date(raw.trim()).ok().map(DateTime::<Utc>::from)
}

/// IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`.
pub fn format_http_date(date: &DateTime<Utc>) -> String {
    date.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
