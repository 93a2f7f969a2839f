//! Blocking request dispatch.
//!
//! # Design
//! `Transport` is the single I/O seam: it executes an `HttpRequest` and
//! returns whatever response came back, or a `TransportError` when there is
//! no response at all. `LightfeedClient` composes `RecordsClient`'s build and
//! parse steps around one transport call. Nothing is retried; a failure is
//! normalized and returned immediately.

use tracing::{debug, warn};

use crate::client::RecordsClient;
use crate::config::LightfeedConfig;
use crate::error::{ApiError, LightfeedError};
use crate::http::{HttpRequest, HttpResponse};
use crate::params::{FilterRecordsParams, GetRecordsParams, SearchRecordsParams};
use crate::types::RecordsResponse;

/// No response was received (connect failure, DNS, TLS, timeout).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Executes one HTTP round trip.
///
/// Non-2xx statuses are responses, not errors: implementations must return
/// them as `Ok` so the status and body reach error normalization.
pub trait Transport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        (**self).execute(request)
    }
}

/// Client for the records API that performs the HTTP calls itself.
#[derive(Debug, Clone)]
pub struct LightfeedClient<T = DefaultTransport> {
    core: RecordsClient,
    transport: T,
}

#[cfg(feature = "blocking")]
pub type DefaultTransport = UreqTransport;

#[cfg(not(feature = "blocking"))]
pub type DefaultTransport = NoTransport;

/// Placeholder transport type when the `blocking` feature is disabled.
#[cfg(not(feature = "blocking"))]
#[derive(Debug, Clone, Copy)]
pub enum NoTransport {}

#[cfg(not(feature = "blocking"))]
impl Transport for NoTransport {
    fn execute(&self, _: &HttpRequest) -> Result<HttpResponse, TransportError> {
        match *self {}
    }
}

#[cfg(feature = "blocking")]
impl LightfeedClient<UreqTransport> {
    /// Client backed by a ureq agent; each call uses the configured timeout.
    pub fn new(config: LightfeedConfig) -> Self {
        Self::with_transport(config, UreqTransport::new())
    }
}

impl<T: Transport> LightfeedClient<T> {
    pub fn with_transport(config: LightfeedConfig, transport: T) -> Self {
        Self {
            core: RecordsClient::new(config),
            transport,
        }
    }

    pub fn records(&self) -> &RecordsClient {
        &self.core
    }

    /// Fetch records, optionally bounded by time and paginated.
    pub fn get_records(
        &self,
        database_id: &str,
        params: &GetRecordsParams,
    ) -> Result<RecordsResponse, ApiError> {
        let request = self.core.build_get_records(database_id, params)?;
        self.dispatch(request)
    }

    /// Semantic search with optional filter, time range and pagination.
    pub fn search_records(
        &self,
        database_id: &str,
        params: &SearchRecordsParams,
    ) -> Result<RecordsResponse, ApiError> {
        let request = self.core.build_search_records(database_id, params)?;
        self.dispatch(request)
    }

    /// Records matching a filter expression.
    pub fn filter_records(
        &self,
        database_id: &str,
        params: &FilterRecordsParams,
    ) -> Result<RecordsResponse, ApiError> {
        let request = self.core.build_filter_records(database_id, params)?;
        self.dispatch(request)
    }

    fn dispatch(&self, request: HttpRequest) -> Result<RecordsResponse, ApiError> {
        debug!(method = request.method.as_str(), url = %request.url, "dispatching");
        let response = match self.transport.execute(&request) {
            Ok(response) => response,
            Err(err) => {
                let err = LightfeedError::from_transport(&err);
                warn!(url = %request.url, error = %err, "transport failure");
                return Err(err.into());
            }
        };
        debug!(status = response.status, "response received");
        self.core.parse_records(response).inspect_err(|err| {
            if let ApiError::Lightfeed(e) = err {
                warn!(url = %request.url, status = e.code(), message = %e.message, "request failed");
            }
        })
    }
}

#[cfg(feature = "blocking")]
pub use ureq_transport::UreqTransport;

#[cfg(feature = "blocking")]
mod ureq_transport {
    use super::{Transport, TransportError};
    use crate::http::{HttpMethod, HttpRequest, HttpResponse};

    /// `Transport` over a blocking ureq agent.
    ///
    /// The agent returns 4xx/5xx as responses rather than errors so the core
    /// can normalize them. Each call is bounded by `HttpRequest::timeout`.
    #[derive(Clone)]
    pub struct UreqTransport {
        agent: ureq::Agent,
    }

    impl std::fmt::Debug for UreqTransport {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("UreqTransport").finish_non_exhaustive()
        }
    }

    impl Default for UreqTransport {
        fn default() -> Self {
            Self::new()
        }
    }

    impl UreqTransport {
        pub fn new() -> Self {
            let agent = ureq::Agent::config_builder()
                .http_status_as_error(false)
                .build()
                .new_agent();
            Self { agent }
        }
    }

    impl Transport for UreqTransport {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
            let result = match request.method {
                HttpMethod::Get => {
                    let mut builder = self
                        .agent
                        .get(&request.url)
                        .config()
                        .timeout_global(Some(request.timeout))
                        .build();
                    for (k, v) in &request.headers {
                        builder = builder.header(k.as_str(), v.as_str());
                    }
                    builder.call()
                }
                HttpMethod::Post => {
                    let mut builder = self
                        .agent
                        .post(&request.url)
                        .config()
                        .timeout_global(Some(request.timeout))
                        .build();
                    for (k, v) in &request.headers {
                        builder = builder.header(k.as_str(), v.as_str());
                    }
                    builder.send(request.body.as_deref().unwrap_or("").as_bytes())
                }
            };
            let mut response = result.map_err(|e| TransportError::new(e.to_string()))?;

            let status = response.status().as_u16();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(k, v)| Some((k.as_str().to_string(), v.to_str().ok()?.to_string())))
                .collect();
            // A body cut short is a transport failure, not an empty response.
            let body = response
                .body_mut()
                .read_to_string()
                .map_err(|e| TransportError::new(e.to_string()))?;

            Ok(HttpResponse {
                status,
                headers,
                body,
            })
        }
    }
}
