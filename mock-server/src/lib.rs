//! In-memory stand-in for the Lightfeed records API.
//!
//! Implements the three records endpoints with API-key checks, single-use
//! UUID cursors, filter evaluation and a token-overlap relevance score, plus
//! per-database failure injection so clients can exercise error handling
//! end to end.

pub mod eval;

use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

pub const DEFAULT_API_KEY: &str = "test-api-key";
pub const SAMPLE_DATABASE: &str = "test-db-id";

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 500;
const DEFAULT_THRESHOLD: f64 = 0.2;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Timestamps {
    pub first_seen_time: DateTime<Utc>,
    pub last_changed_time: DateTime<Utc>,
    pub last_seen_time: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: u64,
    pub data: Map<String, Value>,
    pub timestamps: Timestamps,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: usize,
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordsPage {
    pub results: Vec<Record>,
    pub pagination: Pagination,
}

/// A canned response returned for every request to one database.
#[derive(Clone, Debug)]
pub struct Failure {
    pub status: u16,
    pub body: String,
    pub retry_after: Option<u64>,
}

impl Failure {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            retry_after: None,
        }
    }

    pub fn retry_after(mut self, secs: u64) -> Self {
        self.retry_after = Some(secs);
        self
    }
}

#[derive(Debug, Default)]
pub struct MockState {
    api_key: String,
    databases: HashMap<String, Vec<Record>>,
    failures: HashMap<String, Failure>,
    cursors: RwLock<HashMap<Uuid, usize>>,
}

impl MockState {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    /// `DEFAULT_API_KEY` and `SAMPLE_DATABASE` seeded with `sample_records()`.
    pub fn sample() -> Self {
        Self::new(DEFAULT_API_KEY).with_database(SAMPLE_DATABASE, sample_records())
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn with_database(mut self, id: impl Into<String>, records: Vec<Record>) -> Self {
        self.databases.insert(id.into(), records);
        self
    }

    pub fn with_failure(mut self, id: impl Into<String>, failure: Failure) -> Self {
        self.failures.insert(id.into(), failure);
        self
    }
}

pub type SharedState = Arc<MockState>;

/// Five records, ids 1..=5, last seen at noon on 2024-01-01..=05.
pub fn sample_records() -> Vec<Record> {
    let rows = [
        json!({"name": "Acme Widget", "category": "Test", "price": 19.99, "brand": "Acme", "tags": ["tools", "widgets"]}),
        json!({"name": "Bolt Gadget", "category": "Hardware", "price": 5.5, "brand": "Bolt", "notes": ""}),
        json!({"name": "Acme Sprocket", "category": "Test", "price": 42.0, "brand": "Acme", "notes": "limited edition"}),
        json!({"name": "Cog Deluxe", "category": "Parts", "price": 120.0, "brand": "Cogworks"}),
        json!({"name": "Widget Mini", "category": "Test", "price": 9.5, "brand": "Minis"}),
    ];
    rows.into_iter()
        .zip(1u32..)
        .map(|(data, day)| Record {
            id: u64::from(day),
            data: data.as_object().cloned().unwrap_or_default(),
            timestamps: Timestamps {
                first_seen_time: at(2023, 12, day, 0),
                last_changed_time: at(2024, 1, day, 6),
                last_seen_time: at(2024, 1, day, 12),
            },
            relevance_score: None,
        })
        .collect()
}

fn at(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, hour, 0, 0)
        .single()
        .unwrap_or_default()
}

pub fn app() -> Router {
    app_with(MockState::sample())
}

pub fn app_with(state: MockState) -> Router {
    Router::new()
        .route("/v1/databases/{database_id}/records", get(get_records))
        .route("/v1/databases/{database_id}/records/search", post(search_records))
        .route("/v1/databases/{database_id}/records/filter", post(filter_records))
        .with_state(Arc::new(state))
}

pub async fn run_with(listener: TcpListener, state: MockState) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(state)).await
}

// ---------------------------------------------------------------------------
// Error responses
// ---------------------------------------------------------------------------

pub struct ApiFailure {
    status: StatusCode,
    body: String,
    json: bool,
    retry_after: Option<u64>,
}

impl ApiFailure {
    fn message(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({"message": message.into()}).to_string(),
            json: true,
            retry_after: None,
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::message(StatusCode::BAD_REQUEST, message)
    }

    fn injected(failure: &Failure) -> Self {
        Self {
            status: StatusCode::from_u16(failure.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            body: failure.body.clone(),
            json: serde_json::from_str::<Value>(&failure.body).is_ok(),
            retry_after: failure.retry_after,
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body).into_response();
        let headers = response.headers_mut();
        if self.json {
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if let Some(secs) = self.retry_after {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

type ApiResult<T> = Result<T, ApiFailure>;

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_records(
    State(state): State<SharedState>,
    Path(database_id): Path<String>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> ApiResult<Json<RecordsPage>> {
    debug!(%database_id, ?query, "get records");
    let records = authorize(&state, &headers, &database_id)?;
    let start = parse_time(query.get("start_time"), "start_time")?;
    let end = parse_time(query.get("end_time"), "end_time")?;
    let limit = match query.get("limit") {
        Some(raw) => Some(raw.parse::<usize>().map_err(|_| limit_error())?),
        None => None,
    };
    let selected = within(records, start, end);
    paginate(&state, selected, limit, query.get("cursor").map(String::as_str))
        .await
        .map(Json)
}

async fn search_records(
    State(state): State<SharedState>,
    Path(database_id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<Json<RecordsPage>> {
    debug!(%database_id, "search records");
    let records = authorize(&state, &headers, &database_id)?;
    let body = parse_body(&body)?;

    let text = body
        .pointer("/search/text")
        .and_then(Value::as_str)
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| ApiFailure::bad_request("search.text is required"))?;
    let threshold = match body.pointer("/search/threshold") {
        None | Some(Value::Null) => DEFAULT_THRESHOLD,
        Some(v) => v
            .as_f64()
            .filter(|t| (0.0..=1.0).contains(t))
            .ok_or_else(|| ApiFailure::bad_request("search.threshold must be between 0 and 1"))?,
    };

    let (start, end, limit, cursor) = common_sections(&body)?;
    let mut hits = Vec::new();
    for record in within(records, start, end) {
        if let Some(filter) = body.get("filter").filter(|f| !f.is_null()) {
            if !eval::matches_group(filter, &record.data).map_err(ApiFailure::bad_request)? {
                continue;
            }
        }
        let score = eval::relevance(text, &record.data);
        if score >= threshold {
            hits.push(Record {
                relevance_score: Some(score),
                ..record
            });
        }
    }
    hits.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.id.cmp(&b.id))
    });

    paginate(&state, hits, limit, cursor.as_deref()).await.map(Json)
}

async fn filter_records(
    State(state): State<SharedState>,
    Path(database_id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> ApiResult<Json<RecordsPage>> {
    debug!(%database_id, "filter records");
    let records = authorize(&state, &headers, &database_id)?;
    let body = parse_body(&body)?;
    let filter = body
        .get("filter")
        .filter(|f| f.is_object())
        .ok_or_else(|| ApiFailure::bad_request("filter is required"))?;

    let (start, end, limit, cursor) = common_sections(&body)?;
    let mut hits = Vec::new();
    for record in within(records, start, end) {
        if eval::matches_group(filter, &record.data).map_err(ApiFailure::bad_request)? {
            hits.push(record);
        }
    }
    paginate(&state, hits, limit, cursor.as_deref()).await.map(Json)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn authorize<'a>(
    state: &'a MockState,
    headers: &HeaderMap,
    database_id: &str,
) -> ApiResult<&'a [Record]> {
    match headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        None => return Err(ApiFailure::message(StatusCode::UNAUTHORIZED, "Missing API key")),
        Some(key) if key != state.api_key => {
            warn!(%database_id, "rejected API key");
            return Err(ApiFailure::message(StatusCode::UNAUTHORIZED, "Invalid API key"));
        }
        Some(_) => {}
    }
    if let Some(failure) = state.failures.get(database_id) {
        return Err(ApiFailure::injected(failure));
    }
    state
        .databases
        .get(database_id)
        .map(Vec::as_slice)
        .ok_or_else(|| ApiFailure::message(StatusCode::NOT_FOUND, "Database not found"))
}

fn parse_body(raw: &str) -> ApiResult<Value> {
    serde_json::from_str(raw).map_err(|e| ApiFailure::bad_request(format!("Malformed JSON body: {e}")))
}

fn parse_time(raw: Option<&String>, name: &str) -> ApiResult<Option<DateTime<Utc>>> {
    raw.map(|s| {
        DateTime::parse_from_rfc3339(s)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|_| ApiFailure::bad_request(format!("Invalid {name}")))
    })
    .transpose()
}

fn limit_error() -> ApiFailure {
    ApiFailure::bad_request(format!("limit must be an integer between 1 and {MAX_LIMIT}"))
}

type Sections = (Option<DateTime<Utc>>, Option<DateTime<Utc>>, Option<usize>, Option<String>);

/// `time_range` and `pagination` of a search or filter body.
fn common_sections(body: &Value) -> ApiResult<Sections> {
    let text = |ptr: &str| body.pointer(ptr).and_then(Value::as_str).map(str::to_string);
    let start = parse_time(text("/time_range/start_time").as_ref(), "time_range.start_time")?;
    let end = parse_time(text("/time_range/end_time").as_ref(), "time_range.end_time")?;
    let limit = match body.pointer("/pagination/limit") {
        None | Some(Value::Null) => None,
        Some(v) => Some(v.as_u64().ok_or_else(limit_error)? as usize),
    };
    Ok((start, end, limit, text("/pagination/cursor")))
}

fn within(records: &[Record], start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Vec<Record> {
    records
        .iter()
        .filter(|r| start.map_or(true, |s| r.timestamps.last_seen_time >= s))
        .filter(|r| end.map_or(true, |e| r.timestamps.last_seen_time <= e))
        .cloned()
        .collect()
}

async fn paginate(
    state: &MockState,
    items: Vec<Record>,
    limit: Option<usize>,
    cursor: Option<&str>,
) -> ApiResult<RecordsPage> {
    let limit = limit.unwrap_or(DEFAULT_LIMIT);
    if limit == 0 || limit > MAX_LIMIT {
        return Err(limit_error());
    }
    let offset = match cursor {
        None => 0,
        // Cursors are single use so the table only holds live pages.
        Some(raw) => {
            let mut cursors = state.cursors.write().await;
            Uuid::parse_str(raw)
                .ok()
                .and_then(|id| cursors.remove(&id))
                .ok_or_else(|| ApiFailure::bad_request("Invalid cursor"))?
        }
    };

    let results: Vec<Record> = items.iter().skip(offset).take(limit).cloned().collect();
    let next = offset + results.len();
    let has_more = next < items.len();
    let next_cursor = if has_more {
        let id = Uuid::new_v4();
        state.cursors.write().await.insert(id, next);
        Some(id.to_string())
    } else {
        None
    };

    Ok(RecordsPage {
        results,
        pagination: Pagination {
            limit,
            next_cursor,
            has_more,
        },
    })
}
