//! Request parameters for the three records endpoints.
//!
//! Values are checked locally with `validate` before a request is built;
//! the server applies its own defaults for anything left unset.

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationErrorKind};
use crate::filter::Filter;

/// Page size the server uses when no limit is sent.
pub const DEFAULT_LIMIT: u32 = 100;
/// Largest page size the server accepts.
pub const MAX_LIMIT: u32 = 500;
/// Relevance threshold the server uses when none is sent.
pub const DEFAULT_THRESHOLD: f64 = 0.2;

/// Opaque pagination token. Only ever obtained from a previous response.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bounds on a record's last-seen time. `start_time <= end_time` is expected
/// by the server but not checked here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start_time: Some(start),
            end_time: Some(end),
        }
    }

    pub fn since(start: DateTime<Utc>) -> Self {
        Self {
            start_time: Some(start),
            end_time: None,
        }
    }

    pub fn until(end: DateTime<Utc>) -> Self {
        Self {
            start_time: None,
            end_time: Some(end),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start_time.is_none() && self.end_time.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
}

impl PaginationParams {
    pub fn with_limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            cursor: None,
        }
    }

    /// Continue after `cursor`, keeping this page size.
    pub fn after(mut self, cursor: Cursor) -> Self {
        self.cursor = Some(cursor);
        self
    }

    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_limit(self.limit, "pagination.limit")
    }
}

/// Query parameters of the list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetRecordsParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Cursor>,
}

impl GetRecordsParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn time_range(mut self, range: TimeRange) -> Self {
        self.start_time = range.start_time;
        self.end_time = range.end_time;
        self
    }

    pub fn pagination(mut self, pagination: PaginationParams) -> Self {
        self.limit = pagination.limit;
        self.cursor = pagination.cursor;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        check_limit(self.limit, "limit")
    }

    /// Query-string pairs for the fields that are set, unencoded, in wire order.
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(start) = &self.start_time {
            pairs.push(("start_time", format_timestamp(start)));
        }
        if let Some(end) = &self.end_time {
            pairs.push(("end_time", format_timestamp(end)));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(cursor) = &self.cursor {
            pairs.push(("cursor", cursor.as_str().to_string()));
        }
        pairs
    }
}

/// Semantic search input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParams {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

impl SearchParams {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            threshold: None,
        }
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }

    pub fn effective_threshold(&self) -> f64 {
        self.threshold.unwrap_or(DEFAULT_THRESHOLD)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.text.trim().is_empty() {
            return Err(ValidationError::new("search.text", ValidationErrorKind::Blank));
        }
        match self.threshold {
            Some(t) if !(0.0..=1.0).contains(&t) => Err(ValidationError::new(
                "search.threshold",
                ValidationErrorKind::ThresholdOutOfRange(t),
            )),
            _ => Ok(()),
        }
    }
}

/// Body of the search endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecordsParams {
    pub search: SearchParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Filter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationParams>,
}

impl SearchRecordsParams {
    pub fn new(search: SearchParams) -> Self {
        Self {
            search,
            filter: None,
            time_range: None,
            pagination: None,
        }
    }

    pub fn filter(mut self, filter: impl Into<Filter>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn time_range(mut self, range: TimeRange) -> Self {
        self.time_range = Some(range);
        self
    }

    pub fn pagination(mut self, pagination: PaginationParams) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.search.validate()?;
        if let Some(filter) = &self.filter {
            filter.validate()?;
        }
        if let Some(pagination) = &self.pagination {
            pagination.validate()?;
        }
        Ok(())
    }
}

/// Body of the filter endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterRecordsParams {
    pub filter: Filter,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationParams>,
}

impl FilterRecordsParams {
    pub fn new(filter: impl Into<Filter>) -> Self {
        Self {
            filter: filter.into(),
            time_range: None,
            pagination: None,
        }
    }

    pub fn time_range(mut self, range: TimeRange) -> Self {
        self.time_range = Some(range);
        self
    }

    pub fn pagination(mut self, pagination: PaginationParams) -> Self {
        self.pagination = Some(pagination);
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.filter.validate()?;
        if let Some(pagination) = &self.pagination {
            pagination.validate()?;
        }
        Ok(())
    }
}

fn check_limit(limit: Option<u32>, path: &str) -> Result<(), ValidationError> {
    match limit {
        Some(l) if l == 0 || l > MAX_LIMIT => Err(ValidationError::new(
            path,
            ValidationErrorKind::LimitOutOfRange(l),
        )),
        _ => Ok(()),
    }
}

/// RFC 3339 in UTC with a `Z` suffix and only as many fraction digits as needed.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}
