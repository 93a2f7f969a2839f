//! Synchronous client core for the Lightfeed records API.
//!
//! # Overview
//! Builds `HttpRequest` values and parses `HttpResponse` values without
//! touching the network (host-does-IO pattern). `LightfeedClient` is the
//! blocking host: it executes the round trip over a `Transport`.
//!
//! # Design
//! - `RecordsClient` is stateless; it holds only the immutable
//!   `LightfeedConfig` (API key, base URL, timeout).
//! - Filter expressions are a typed tree (`RuleGroup` / `Rule` /
//!   `ColumnRule`) validated before any request is built.
//! - Every non-2xx response and every transport failure is normalized into a
//!   `LightfeedError` with one of six statuses.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod http;
pub mod params;
pub mod types;

pub use client::RecordsClient;
pub use config::{LightfeedConfig, DEFAULT_BASE_URL, DEFAULT_TIMEOUT};
#[cfg(feature = "blocking")]
pub use dispatch::UreqTransport;
pub use dispatch::{LightfeedClient, Transport, TransportError};
pub use error::{
    ApiError, ConfigError, ErrorStatus, LightfeedError, ValidationError, ValidationErrorKind,
};
pub use filter::{ColumnRule, Condition, Filter, Operator, Rule, RuleGroup};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use params::{
    format_timestamp, Cursor, FilterRecordsParams, GetRecordsParams, PaginationParams, SearchParams,
    SearchRecordsParams, TimeRange, DEFAULT_LIMIT, DEFAULT_THRESHOLD, MAX_LIMIT,
};
pub use types::{Pagination, Record, RecordsResponse, Timestamps};
