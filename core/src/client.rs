//! Stateless HTTP request builder and response parser for the records API.
//!
//! # Design
//! `RecordsClient` holds only its immutable configuration and carries no
//! state between calls. Each operation is split into a `build_*` method that
//! validates the parameters and produces an `HttpRequest`, and
//! `parse_records` which consumes the `HttpResponse`. Executing the round
//! trip is the caller's job (see `dispatch` for the blocking host).

use tracing::debug;

use crate::config::LightfeedConfig;
use crate::error::{ApiError, LightfeedError, ValidationError, ValidationErrorKind};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::params::{FilterRecordsParams, GetRecordsParams, SearchRecordsParams};
use crate::types::RecordsResponse;

/// Synchronous, stateless client core for the records API.
#[derive(Debug, Clone)]
pub struct RecordsClient {
    config: LightfeedConfig,
}

impl RecordsClient {
    pub fn new(config: LightfeedConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LightfeedConfig {
        &self.config
    }

    /// `GET /v1/databases/{id}/records` with the set parameters as query string.
    pub fn build_get_records(
        &self,
        database_id: &str,
        params: &GetRecordsParams,
    ) -> Result<HttpRequest, ApiError> {
        params.validate()?;
        let mut url = self.records_url(database_id, "")?;
        let pairs = params.to_query_pairs();
        if !pairs.is_empty() {
            let query = pairs
                .iter()
                .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&");
            url.push('?');
            url.push_str(&query);
        }
        Ok(self.request(HttpMethod::Get, url, None))
    }

    /// `POST /v1/databases/{id}/records/search`.
    pub fn build_search_records(
        &self,
        database_id: &str,
        params: &SearchRecordsParams,
    ) -> Result<HttpRequest, ApiError> {
        params.validate()?;
        let url = self.records_url(database_id, "/search")?;
        let body = serde_json::to_string(params).map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(self.request(HttpMethod::Post, url, Some(body)))
    }

    /// `POST /v1/databases/{id}/records/filter`.
    pub fn build_filter_records(
        &self,
        database_id: &str,
        params: &FilterRecordsParams,
    ) -> Result<HttpRequest, ApiError> {
        params.validate()?;
        let url = self.records_url(database_id, "/filter")?;
        let body = serde_json::to_string(params).map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(self.request(HttpMethod::Post, url, Some(body)))
    }

    /// Decode a 2xx response into a page of records; normalize anything else.
    ///
    /// Shared by all three operations since they return the same shape.
    pub fn parse_records(&self, response: HttpResponse) -> Result<RecordsResponse, ApiError> {
        check_status(&response)?;
        serde_json::from_str(&response.body).map_err(|e| ApiError::Deserialization(e.to_string()))
    }

    fn records_url(&self, database_id: &str, suffix: &str) -> Result<String, ValidationError> {
        if database_id.trim().is_empty() {
            return Err(ValidationError::new("database_id", ValidationErrorKind::Blank));
        }
        Ok(format!(
            "{}/v1/databases/{}/records{suffix}",
            self.config.base_url(),
            urlencoding::encode(database_id)
        ))
    }

    fn request(&self, method: HttpMethod, url: String, body: Option<String>) -> HttpRequest {
        debug!(method = method.as_str(), %url, "built records request");
        HttpRequest {
            method,
            url,
            headers: vec![
                ("x-api-key".to_string(), self.config.api_key().to_string()),
                ("Content-Type".to_string(), "application/json".to_string()),
            ],
            body,
            timeout: self.config.timeout(),
        }
    }
}

/// Map non-2xx responses to a normalized `LightfeedError`.
fn check_status(response: &HttpResponse) -> Result<(), LightfeedError> {
    if response.is_success() {
        return Ok(());
    }
    Err(LightfeedError::from_response(response))
}
