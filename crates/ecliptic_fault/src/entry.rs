//! Tagged error values carried across component boundaries.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

use serde::Serialize;

/// Fallback language for external messages.
pub const DEFAULT_LOCALE: &str = "en";

/// Result type used by all effectful Ecliptic operations.
pub type Result<T> = std::result::Result<T, ErrorEntry>;

/// A structured error value.
///
/// Carries a dotted error code, an internal (operator-facing) message, a map
/// of external (user-facing) messages keyed by language, the HTTP status the
/// error maps to, and whether the error should be persisted to the log table.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEntry {
    /// Dotted error code, e.g. `datastore.not_found`.
    pub code: String,
    /// Internal message, never shown to end users.
    pub internal: String,
    /// External messages keyed by language tag.
    pub external: BTreeMap<String, String>,
    /// HTTP status this error maps to.
    pub status: u16,
    /// Whether the error is persisted to the catalog log.
    pub should_log: bool,
    /// Structured parameters attached to the log record.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_params: Option<serde_json::Value>,
}

impl ErrorEntry {
    /// Create a bare entry. Defaults to HTTP 500, not logged.
    pub fn new(code: impl Into<String>, internal: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            internal: internal.into(),
            external: BTreeMap::new(),
            status: 500,
            should_log: false,
            log_params: None,
        }
    }

    /// Input-shape error: HTTP 400, not logged.
    pub fn bad_request(code: impl Into<String>, internal: impl Into<String>) -> Self {
        Self::new(code, internal).with_status(400)
    }

    /// Missing resource under the active organization: HTTP 404, not logged.
    pub fn not_found(code: impl Into<String>, internal: impl Into<String>) -> Self {
        Self::new(code, internal).with_status(404)
    }

    /// Uniqueness conflict: HTTP 409, not logged.
    pub fn conflict(code: impl Into<String>, internal: impl Into<String>) -> Self {
        Self::new(code, internal).with_status(409)
    }

    /// Permission denied: HTTP 403, not logged as an error.
    pub fn forbidden(code: impl Into<String>, internal: impl Into<String>) -> Self {
        Self::new(code, internal).with_status(403)
    }

    /// Engine (SQL) failure: HTTP 500, logged.
    pub fn engine(internal: impl Into<String>) -> Self {
        Self::new("engine.failure", internal).loggable()
    }

    /// Unexpected internal failure: HTTP 500, logged.
    pub fn internal(internal: impl Into<String>) -> Self {
        Self::new("internal.unexpected", internal).loggable()
    }

    /// Set the HTTP status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Attach an external message for a language.
    pub fn with_external(mut self, lang: impl Into<String>, message: impl Into<String>) -> Self {
        self.external.insert(lang.into(), message.into());
        self
    }

    /// Mark the entry for persistence to the log table.
    pub fn loggable(mut self) -> Self {
        self.should_log = true;
        self
    }

    /// Attach structured log parameters.
    pub fn with_params(mut self, params: serde_json::Value) -> Self {
        self.log_params = Some(params);
        self
    }

    /// External message in the requested language.
    ///
    /// Falls back to `en`, then to the internal message.
    pub fn external_message(&self, locale: &str) -> &str {
        self.external
            .get(locale)
            .or_else(|| self.external.get(DEFAULT_LOCALE))
            .map(String::as_str)
            .unwrap_or(&self.internal)
    }
}

impl fmt::Display for ErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.internal)
    }
}

impl Error for ErrorEntry {}

impl From<sqlx::Error> for ErrorEntry {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => {
                ErrorEntry::not_found("catalog.not_found", "row not found")
            }
            other => ErrorEntry::engine(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ErrorEntry {
    fn from(err: std::io::Error) -> Self {
        ErrorEntry::engine(format!("io error: {err}"))
    }
}

impl From<serde_json::Error> for ErrorEntry {
    fn from(err: serde_json::Error) -> Self {
        ErrorEntry::internal(format!("serialization error: {err}"))
    }
}
