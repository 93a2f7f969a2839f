//! Response DTOs for the records API.
//!
//! # Design
//! These types mirror the server's schema but are defined independently of
//! the mock-server crate; the integration tests catch schema drift.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::params::{Cursor, PaginationParams};

/// When a record was first seen, last changed and last seen by the crawler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timestamps {
    #[serde(alias = "created_at")]
    pub first_seen_time: DateTime<Utc>,
    #[serde(alias = "changed_at")]
    pub last_changed_time: DateTime<Utc>,
    #[serde(alias = "synced_at")]
    pub last_seen_time: DateTime<Utc>,
}

/// One extracted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,
    pub data: Map<String, Value>,
    pub timestamps: Timestamps,
    /// Only present when semantic search ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
}

impl Record {
    /// Look up a field of `data`; dots descend into nested objects.
    pub fn field(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.data.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    pub next_cursor: Option<Cursor>,
    pub has_more: bool,
}

/// A page of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordsResponse {
    pub results: Vec<Record>,
    pub pagination: Pagination,
}

impl RecordsResponse {
    /// Pagination that fetches the following page with the same limit, or
    /// `None` once the server reports no more results.
    pub fn next_page(&self) -> Option<PaginationParams> {
        if !self.pagination.has_more {
            return None;
        }
        let cursor = self.pagination.next_cursor.clone()?;
        Some(PaginationParams::with_limit(self.pagination.limit).after(cursor))
    }
}
