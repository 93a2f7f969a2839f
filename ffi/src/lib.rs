//! C-ABI wrapper around `lightfeed-core`.
//!
//! # Overview
//! Exposes the records API's build/parse surface through `extern "C"`
//! functions so any language with a C FFI can build requests and parse
//! responses while executing the HTTP round trip itself.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Parameters cross as JSON text: filter trees are recursive and the
//!   core's decoders already validate them with path-aware messages.
//! - A single `FfiLightfeedResult` envelope with `FfiDataTag` + `void* data`
//!   conveys built requests, parsed pages and errors uniformly.
//! - The C caller owns all returned pointers and must call the matching
//!   `lightfeed_free_*` function to release them.

pub mod types;

use std::ffi::CStr;
use std::os::raw::c_char;
use std::panic::catch_unwind;
use std::time::Duration;

use lightfeed_core::{
    ApiError, FilterRecordsParams, GetRecordsParams, HttpResponse, LightfeedConfig, LightfeedError,
    RecordsClient, SearchRecordsParams, TransportError,
};
use serde::de::DeserializeOwned;

use types::*;

/// Borrow a C string as `&str`; `Err` carries a ready-made error result.
fn read_str<'a>(ptr: *const c_char, name: &str) -> Result<&'a str, *mut FfiLightfeedResult> {
    if ptr.is_null() {
        return Err(FfiLightfeedResult::null_arg(name));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|_| FfiLightfeedResult::error(FfiErrorCode::InvalidUtf8, format!("{name} is not valid UTF-8")))
}

/// Decode JSON parameters; decoding runs the same validation as `validate`.
fn read_params<T: DeserializeOwned>(ptr: *const c_char) -> Result<T, *mut FfiLightfeedResult> {
    let raw = read_str(ptr, "params_json")?;
    serde_json::from_str(raw).map_err(|e| FfiLightfeedResult::error(FfiErrorCode::Validation, e.to_string()))
}

fn client_ref<'a>(client: *const FfiLightfeedClient) -> Result<&'a RecordsClient, *mut FfiLightfeedResult> {
    if client.is_null() {
        return Err(FfiLightfeedResult::null_arg("client"));
    }
    Ok(&unsafe { &*client }.inner)
}

fn into_result(built: Result<lightfeed_core::HttpRequest, ApiError>) -> *mut FfiLightfeedResult {
    match built {
        Ok(req) => FfiLightfeedResult::ok_request(req),
        Err(e) => FfiLightfeedResult::from_error(e),
    }
}

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Create a client for `api_key`.
///
/// `base_url` may be null for the production endpoint; `timeout_secs` of 0
/// keeps the 30 second default. Returns null if `api_key` is null or blank,
/// if either string is not UTF-8, if `base_url` is not an http(s) URL, or if
/// an internal panic occurs. Free with `lightfeed_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn lightfeed_client_new(
    api_key: *const c_char,
    base_url: *const c_char,
    timeout_secs: u64,
) -> *mut FfiLightfeedClient {
    catch_unwind(|| {
        if api_key.is_null() {
            return std::ptr::null_mut();
        }
        let Ok(key) = unsafe { CStr::from_ptr(api_key) }.to_str() else {
            return std::ptr::null_mut();
        };
        let Ok(mut config) = LightfeedConfig::new(key) else {
            return std::ptr::null_mut();
        };
        if !base_url.is_null() {
            let url = unsafe { CStr::from_ptr(base_url) }.to_str().unwrap_or("");
            config = match config.with_base_url(url) {
                Ok(c) => c,
                Err(_) => return std::ptr::null_mut(),
            };
        }
        if timeout_secs > 0 {
            config = match config.with_timeout(Duration::from_secs(timeout_secs)) {
                Ok(c) => c,
                Err(_) => return std::ptr::null_mut(),
            };
        }
        let client = RecordsClient::new(config);
        Box::into_raw(Box::new(FfiLightfeedClient { inner: client }))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a client created by `lightfeed_client_new`. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn lightfeed_client_free(client: *mut FfiLightfeedClient) {
    if !client.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(client) });
        });
    }
}

// ---------------------------------------------------------------------------
// Build request functions
// ---------------------------------------------------------------------------

/// Build `GET /v1/databases/{database_id}/records`.
///
/// `params_json` is a `GetRecordsParams` object
/// (`start_time`, `end_time`, `limit`, `cursor`) or null for none.
/// On success `data_tag` is `Request`.
#[unsafe(no_mangle)]
pub extern "C" fn lightfeed_build_get_records(
    client: *const FfiLightfeedClient,
    database_id: *const c_char,
    params_json: *const c_char,
) -> *mut FfiLightfeedResult {
    catch_unwind(|| {
        let run = || -> Result<*mut FfiLightfeedResult, *mut FfiLightfeedResult> {
            let client = client_ref(client)?;
            let database_id = read_str(database_id, "database_id")?;
            let params = if params_json.is_null() {
                GetRecordsParams::new()
            } else {
                read_params(params_json)?
            };
            Ok(into_result(client.build_get_records(database_id, &params)))
        };
        run().unwrap_or_else(|err| err)
    })
    .unwrap_or_else(|_| FfiLightfeedResult::panic("panic in lightfeed_build_get_records"))
}

/// Build `POST /v1/databases/{database_id}/records/search`.
///
/// `params_json` is a `SearchRecordsParams` object; `search.text` is required.
#[unsafe(no_mangle)]
pub extern "C" fn lightfeed_build_search_records(
    client: *const FfiLightfeedClient,
    database_id: *const c_char,
    params_json: *const c_char,
) -> *mut FfiLightfeedResult {
    catch_unwind(|| {
        let run = || -> Result<*mut FfiLightfeedResult, *mut FfiLightfeedResult> {
            let client = client_ref(client)?;
            let database_id = read_str(database_id, "database_id")?;
            let params: SearchRecordsParams = read_params(params_json)?;
            Ok(into_result(client.build_search_records(database_id, &params)))
        };
        run().unwrap_or_else(|err| err)
    })
    .unwrap_or_else(|_| FfiLightfeedResult::panic("panic in lightfeed_build_search_records"))
}

/// Build `POST /v1/databases/{database_id}/records/filter`.
///
/// `params_json` is a `FilterRecordsParams` object; `filter` is required.
#[unsafe(no_mangle)]
pub extern "C" fn lightfeed_build_filter_records(
    client: *const FfiLightfeedClient,
    database_id: *const c_char,
    params_json: *const c_char,
) -> *mut FfiLightfeedResult {
    catch_unwind(|| {
        let run = || -> Result<*mut FfiLightfeedResult, *mut FfiLightfeedResult> {
            let client = client_ref(client)?;
            let database_id = read_str(database_id, "database_id")?;
            let params: FilterRecordsParams = read_params(params_json)?;
            Ok(into_result(client.build_filter_records(database_id, &params)))
        };
        run().unwrap_or_else(|err| err)
    })
    .unwrap_or_else(|_| FfiLightfeedResult::panic("panic in lightfeed_build_filter_records"))
}

// ---------------------------------------------------------------------------
// Parse response functions
// ---------------------------------------------------------------------------

/// Convert an `FfiHttpResponse` to a core `HttpResponse`.
///
/// A null or non-UTF-8 body is read as empty, which falls back to the
/// default message for error statuses.
fn ffi_response_to_core(resp: &FfiHttpResponse) -> HttpResponse {
    let read = |ptr: *const c_char| {
        if ptr.is_null() {
            None
        } else {
            unsafe { CStr::from_ptr(ptr) }.to_str().ok().map(str::to_string)
        }
    };
    let response = HttpResponse::new(resp.status, read(resp.body).unwrap_or_default());
    match read(resp.retry_after) {
        Some(value) => response.with_header("Retry-After", value),
        None => response,
    }
}

/// Parse the response to any of the three records requests.
///
/// Returns a result with `data_tag = Records` on success, or an `Api` error
/// carrying the normalized status and message.
#[unsafe(no_mangle)]
pub extern "C" fn lightfeed_parse_records(
    client: *const FfiLightfeedClient,
    response: *const FfiHttpResponse,
) -> *mut FfiLightfeedResult {
    catch_unwind(|| {
        let client = match client_ref(client) {
            Ok(c) => c,
            Err(err) => return err,
        };
        if response.is_null() {
            return FfiLightfeedResult::null_arg("response");
        }
        let core_resp = ffi_response_to_core(unsafe { &*response });
        match client.parse_records(core_resp) {
            Ok(page) => FfiLightfeedResult::ok_records(page),
            Err(e) => FfiLightfeedResult::from_error(e),
        }
    })
    .unwrap_or_else(|_| FfiLightfeedResult::panic("panic in lightfeed_parse_records"))
}

/// Normalize a host-side transport failure (no response received).
///
/// Always yields an `Api` error with status 500 and `message` as its text.
#[unsafe(no_mangle)]
pub extern "C" fn lightfeed_transport_failure(message: *const c_char) -> *mut FfiLightfeedResult {
    catch_unwind(|| {
        let message = match read_str(message, "message") {
            Ok(m) => m,
            Err(err) => return err,
        };
        let err = LightfeedError::from_transport(&TransportError::new(message));
        FfiLightfeedResult::from_error(err.into())
    })
    .unwrap_or_else(|_| FfiLightfeedResult::panic("panic in lightfeed_transport_failure"))
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free a result returned by any `lightfeed_build_*` / `lightfeed_parse_records`
/// / `lightfeed_transport_failure` call. Safe to call with null. Uses
/// `data_tag` to determine what `data` points to.
#[unsafe(no_mangle)]
pub extern "C" fn lightfeed_free_result(result: *mut FfiLightfeedResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let result = unsafe { Box::from_raw(result) };
        drop_c_string(result.error_message);
        if result.data.is_null() {
            return;
        }
        match result.data_tag {
            FfiDataTag::Request => {
                let mut req = unsafe { Box::from_raw(result.data as *mut FfiHttpRequest) };
                req.free_fields();
            }
            FfiDataTag::Records => {
                let mut page = unsafe { Box::from_raw(result.data as *mut FfiRecordsPage) };
                page.free_fields();
            }
            FfiDataTag::None => {}
        }
    });
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn lightfeed_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| drop_c_string(s));
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn new_client() -> *mut FfiLightfeedClient {
        let key = CString::new("test-api-key").unwrap();
        let url = CString::new("http://localhost:3000").unwrap();
        lightfeed_client_new(key.as_ptr(), url.as_ptr(), 0)
    }

    fn text(ptr: *const c_char) -> String {
        unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string()
    }

    fn request(result: *mut FfiLightfeedResult) -> &'static FfiHttpRequest {
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Ok, "{}", message(result));
        assert_eq!(r.data_tag, FfiDataTag::Request);
        unsafe { &*(r.data as *const FfiHttpRequest) }
    }

    fn message(result: *mut FfiLightfeedResult) -> String {
        let r = unsafe { &*result };
        if r.error_message.is_null() {
            String::new()
        } else {
            text(r.error_message)
        }
    }

    fn response(status: u16, body: &CString) -> FfiHttpResponse {
        FfiHttpResponse {
            status,
            body: body.as_ptr(),
            retry_after: std::ptr::null(),
        }
    }

    #[test]
    fn client_new_and_free() {
        let client = new_client();
        assert!(!client.is_null());
        lightfeed_client_free(client);
    }

    #[test]
    fn client_new_rejects_bad_input() {
        assert!(lightfeed_client_new(std::ptr::null(), std::ptr::null(), 0).is_null());

        let blank = CString::new("  ").unwrap();
        assert!(lightfeed_client_new(blank.as_ptr(), std::ptr::null(), 0).is_null());

        let key = CString::new("k").unwrap();
        let url = CString::new("ftp://example.com").unwrap();
        assert!(lightfeed_client_new(key.as_ptr(), url.as_ptr(), 0).is_null());
    }

    #[test]
    fn client_free_null_is_safe() {
        lightfeed_client_free(std::ptr::null_mut());
    }

    #[test]
    fn build_get_records_without_params() {
        let client = new_client();
        let db = CString::new("test-db-id").unwrap();
        let result = lightfeed_build_get_records(client, db.as_ptr(), std::ptr::null());
        let req = request(result);

        assert!(matches!(req.method, FfiHttpMethod::Get));
        assert_eq!(text(req.url), "http://localhost:3000/v1/databases/test-db-id/records");
        assert!(req.body.is_null());
        assert_eq!(req.headers_len, 2);
        assert_eq!(req.timeout_ms, 30_000);

        let headers = unsafe { std::slice::from_raw_parts(req.headers, req.headers_len as usize) };
        assert_eq!(text(headers[0].key), "x-api-key");
        assert_eq!(text(headers[0].value), "test-api-key");

        lightfeed_free_result(result);
        lightfeed_client_free(client);
    }

    #[test]
    fn build_get_records_with_query() {
        let client = new_client();
        let db = CString::new("test-db-id").unwrap();
        let params = CString::new(r#"{"limit":10,"cursor":"abc"}"#).unwrap();
        let result = lightfeed_build_get_records(client, db.as_ptr(), params.as_ptr());
        let req = request(result);
        assert_eq!(
            text(req.url),
            "http://localhost:3000/v1/databases/test-db-id/records?limit=10&cursor=abc"
        );
        lightfeed_free_result(result);
        lightfeed_client_free(client);
    }

    #[test]
    fn build_filter_records_body() {
        let client = new_client();
        let db = CString::new("test-db-id").unwrap();
        let params = CString::new(
            r#"{"filter":{"condition":"AND","rules":[{"column":"category","operator":"equals","value":"Test"}]}}"#,
        )
        .unwrap();
        let result = lightfeed_build_filter_records(client, db.as_ptr(), params.as_ptr());
        let req = request(result);
        assert!(matches!(req.method, FfiHttpMethod::Post));
        assert_eq!(text(req.body), params.to_str().unwrap());
        lightfeed_free_result(result);
        lightfeed_client_free(client);
    }

    #[test]
    fn build_filter_records_rejects_empty_group() {
        let client = new_client();
        let db = CString::new("test-db-id").unwrap();
        let params = CString::new(r#"{"filter":{"condition":"OR","rules":[]}}"#).unwrap();
        let result = lightfeed_build_filter_records(client, db.as_ptr(), params.as_ptr());
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Validation);
        assert!(r.data.is_null());
        assert!(message(result).contains("filter.rules"), "{}", message(result));
        lightfeed_free_result(result);
        lightfeed_client_free(client);
    }

    #[test]
    fn build_search_records_rejects_threshold() {
        let client = new_client();
        let db = CString::new("test-db-id").unwrap();
        let params = CString::new(r#"{"search":{"text":"q","threshold":1.5}}"#).unwrap();
        let result = lightfeed_build_search_records(client, db.as_ptr(), params.as_ptr());
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::Validation);
        lightfeed_free_result(result);
        lightfeed_client_free(client);
    }

    #[test]
    fn build_null_arguments() {
        let client = new_client();
        let result = lightfeed_build_search_records(client, std::ptr::null(), std::ptr::null());
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::NullArg);
        assert_eq!(message(result), "null argument: database_id");
        lightfeed_free_result(result);

        let db = CString::new("db").unwrap();
        let result = lightfeed_build_get_records(std::ptr::null(), db.as_ptr(), std::ptr::null());
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::NullArg);
        lightfeed_free_result(result);
        lightfeed_client_free(client);
    }

    #[test]
    fn invalid_utf8_is_reported() {
        let client = new_client();
        let bad = [0xffu8, 0xfe, 0];
        let result = lightfeed_build_get_records(client, bad.as_ptr() as *const c_char, std::ptr::null());
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::InvalidUtf8);
        lightfeed_free_result(result);
        lightfeed_client_free(client);
    }

    #[test]
    fn parse_records_page() {
        let client = new_client();
        let body = CString::new(
            r#"{"results":[{"id":1,"data":{"name":"Test Record"},"timestamps":{"first_seen_time":"2023-01-01T00:00:00Z","last_changed_time":"2023-01-02T00:00:00Z","last_seen_time":"2023-01-03T00:00:00Z"},"relevance_score":0.75}],"pagination":{"limit":100,"next_cursor":"n1","has_more":true}}"#,
        )
        .unwrap();
        let result = lightfeed_parse_records(client, &response(200, &body));
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Ok);
        assert_eq!(r.data_tag, FfiDataTag::Records);

        let page = unsafe { &*(r.data as *const FfiRecordsPage) };
        assert_eq!(page.len, 1);
        assert_eq!(page.limit, 100);
        assert!(page.has_more);
        assert_eq!(text(page.next_cursor), "n1");

        let record = unsafe { &*page.items };
        assert_eq!(record.id, 1);
        assert_eq!(text(record.data_json), r#"{"name":"Test Record"}"#);
        assert_eq!(text(record.last_seen_time), "2023-01-03T00:00:00Z");
        assert!(record.has_relevance_score);
        assert_eq!(record.relevance_score, 0.75);

        lightfeed_free_result(result);
        lightfeed_client_free(client);
    }

    #[test]
    fn parse_records_normalizes_errors() {
        let client = new_client();

        let body = CString::new("").unwrap();
        let result = lightfeed_parse_records(client, &response(404, &body));
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Api);
        assert_eq!(r.http_status, 404);
        assert_eq!(message(result), "The requested resource doesn't exist");
        lightfeed_free_result(result);

        let body = CString::new(r#"{"message":"teapot"}"#).unwrap();
        let result = lightfeed_parse_records(client, &response(418, &body));
        assert_eq!(unsafe { &*result }.http_status, 500);
        assert_eq!(message(result), "teapot");
        lightfeed_free_result(result);

        let retry = CString::new("12").unwrap();
        let resp = FfiHttpResponse {
            status: 429,
            body: std::ptr::null(),
            retry_after: retry.as_ptr(),
        };
        let result = lightfeed_parse_records(client, &resp);
        let r = unsafe { &*result };
        assert_eq!(r.http_status, 429);
        assert_eq!(r.retry_after_secs, 12);
        lightfeed_free_result(result);

        lightfeed_client_free(client);
    }

    #[test]
    fn parse_records_bad_json() {
        let client = new_client();
        let body = CString::new("not json").unwrap();
        let result = lightfeed_parse_records(client, &response(200, &body));
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::Deserialization);
        lightfeed_free_result(result);
        lightfeed_client_free(client);
    }

    #[test]
    fn parse_records_rejects_cursor_with_nul() {
        let client = new_client();
        let body = CString::new(
            r#"{"results":[],"pagination":{"limit":10,"next_cursor":"abc\u0000def","has_more":true}}"#,
        )
        .unwrap();
        let result = lightfeed_parse_records(client, &response(200, &body));
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Deserialization);
        assert_eq!(r.data_tag, FfiDataTag::None);
        assert!(r.data.is_null());
        assert_eq!(message(result), "next_cursor contains a NUL byte");
        lightfeed_free_result(result);
        lightfeed_client_free(client);
    }

    #[test]
    fn parse_null_response_returns_null_arg() {
        let client = new_client();
        let result = lightfeed_parse_records(client, std::ptr::null());
        assert_eq!(unsafe { &*result }.error_code, FfiErrorCode::NullArg);
        lightfeed_free_result(result);
        lightfeed_client_free(client);
    }

    #[test]
    fn transport_failure_is_500() {
        let msg = CString::new("Connection refused").unwrap();
        let result = lightfeed_transport_failure(msg.as_ptr());
        let r = unsafe { &*result };
        assert_eq!(r.error_code, FfiErrorCode::Api);
        assert_eq!(r.http_status, 500);
        assert_eq!(message(result), "Connection refused");
        lightfeed_free_result(result);
    }

    #[test]
    fn free_null_is_safe() {
        lightfeed_free_result(std::ptr::null_mut());
        lightfeed_free_string(std::ptr::null_mut());
    }
}
