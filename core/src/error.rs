//! Error types for the Lightfeed records client.
//!
//! # Design
//! Server and transport failures are normalized into a single
//! [`LightfeedError`] whose status is always one of six known codes. Problems
//! detected locally before any request is built are [`ValidationError`]s and
//! never carry a status. [`ApiError`] is what client operations return and
//! keeps the two apart.

use std::fmt;
use std::time::Duration;

use crate::filter::Operator;
use crate::http::HttpResponse;

/// The statuses a [`LightfeedError`] can carry. Anything else observed on the
/// wire is coerced to `InternalServerError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorStatus {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    RateLimitExceeded,
    InternalServerError,
}

impl ErrorStatus {
    pub const ALL: [ErrorStatus; 6] = [
        ErrorStatus::BadRequest,
        ErrorStatus::Unauthorized,
        ErrorStatus::Forbidden,
        ErrorStatus::NotFound,
        ErrorStatus::RateLimitExceeded,
        ErrorStatus::InternalServerError,
    ];

    /// Map an observed HTTP status onto the known set.
    pub fn from_code(code: u16) -> Self {
        match code {
            400 => ErrorStatus::BadRequest,
            401 => ErrorStatus::Unauthorized,
            403 => ErrorStatus::Forbidden,
            404 => ErrorStatus::NotFound,
            429 => ErrorStatus::RateLimitExceeded,
            _ => ErrorStatus::InternalServerError,
        }
    }

    pub fn code(self) -> u16 {
        match self {
            ErrorStatus::BadRequest => 400,
            ErrorStatus::Unauthorized => 401,
            ErrorStatus::Forbidden => 403,
            ErrorStatus::NotFound => 404,
            ErrorStatus::RateLimitExceeded => 429,
            ErrorStatus::InternalServerError => 500,
        }
    }

    pub fn default_message(self) -> &'static str {
        match self {
            ErrorStatus::BadRequest => "Invalid request parameters",
            ErrorStatus::Unauthorized => "Invalid or missing API key",
            ErrorStatus::Forbidden => "The API key doesn't have permission to access the resource",
            ErrorStatus::NotFound => "The requested resource doesn't exist",
            ErrorStatus::RateLimitExceeded => "Rate limit exceeded",
            ErrorStatus::InternalServerError => "Something went wrong on our end",
        }
    }
}

impl fmt::Display for ErrorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A failed call, normalized. Constructed once per failure and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Lightfeed API Error ({status}): {message}")]
pub struct LightfeedError {
    pub status: ErrorStatus,
    pub message: String,
    /// `Retry-After` of a 429 response, when the server sent one.
    pub retry_after: Option<Duration>,
}

impl LightfeedError {
    /// Build an error from a raw status code; unknown codes become 500.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: ErrorStatus::from_code(status),
            message: message.into(),
            retry_after: None,
        }
    }

    /// Normalize a non-2xx response.
    ///
    /// Message precedence: the JSON body's `message` field, then the raw
    /// body text, then the default message for the normalized status.
    pub fn from_response(response: &HttpResponse) -> Self {
        let status = ErrorStatus::from_code(response.status);
        let message = message_from_json(&response.body)
            .or_else(|| {
                let text = response.body.trim();
                (!text.is_empty()).then(|| response.body.clone())
            })
            .unwrap_or_else(|| status.default_message().to_string());

        let retry_after = if status == ErrorStatus::RateLimitExceeded {
            response
                .header("retry-after")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
        } else {
            None
        };

        Self {
            status,
            message,
            retry_after,
        }
    }

    /// Normalize a failure where no response exists (connect, DNS, timeout).
    pub fn from_transport(err: &dyn std::error::Error) -> Self {
        Self::new(500, err.to_string())
    }

    pub fn code(&self) -> u16 {
        self.status.code()
    }
}

fn message_from_json(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("message")? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// What went wrong in a locally validated value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationErrorKind {
    #[error("expected {0}")]
    InvalidType(&'static str),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("rule group has no `condition`")]
    MissingCondition,

    #[error("unknown condition `{0}` (expected AND or OR)")]
    UnknownCondition(String),

    #[error("unknown operator `{0}`")]
    UnknownOperator(String),

    #[error("rule group must contain at least one rule")]
    EmptyRules,

    #[error("column name must not be empty")]
    EmptyColumn,

    #[error("operator `{0}` requires a value")]
    MissingValue(Operator),

    #[error("operator `{0}` does not take a value")]
    UnexpectedValue(Operator),

    #[error("node mixes rule-group and column-rule fields")]
    AmbiguousNode,

    #[error("filter nesting exceeds {0} levels")]
    TooDeep(usize),

    #[error("limit {0} is outside 1..={max}", max = crate::params::MAX_LIMIT)]
    LimitOutOfRange(u32),

    #[error("threshold {0} is outside 0..=1")]
    ThresholdOutOfRange(f64),

    #[error("must not be blank")]
    Blank,
}

/// A locally detected problem, raised before any request is built.
///
/// `path` names the offending location, e.g. `filter.rules[1].operator`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid {path}: {kind}")]
pub struct ValidationError {
    pub path: String,
    pub kind: ValidationErrorKind,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, kind: ValidationErrorKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Errors returned by `RecordsClient` and `LightfeedClient` operations.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Rejected locally; no request was sent.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The server (or the transport) reported a failure.
    #[error(transparent)]
    Lightfeed(#[from] LightfeedError),

    /// A 2xx body did not decode into the expected shape.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl ApiError {
    /// Normalized status, only for server/transport failures.
    pub fn status(&self) -> Option<ErrorStatus> {
        match self {
            ApiError::Lightfeed(e) => Some(e.status),
            _ => None,
        }
    }
}

/// Invalid client configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("API key is required")]
    MissingApiKey,

    #[error("invalid base URL `{0}`: expected an http:// or https:// URL")]
    InvalidBaseUrl(String),

    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
}
