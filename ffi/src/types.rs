//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Each type mirrors a core type but uses C-compatible representations:
//! `*mut c_char` instead of `String`, raw pointers instead of `Vec`, and
//! tagged enums with explicit discriminants. Conversion functions live here
//! to keep `lib.rs` focused on the `extern "C"` surface.

use std::ffi::{c_void, CString};
use std::os::raw::c_char;

use lightfeed_core::{format_timestamp, ApiError, HttpMethod, Record, RecordsResponse};

/// Opaque handle to a `RecordsClient`. C callers receive a pointer to this
/// and pass it back into every FFI function.
pub struct FfiLightfeedClient {
    pub(crate) inner: lightfeed_core::RecordsClient,
}

/// Owned C string. Interior NULs are dropped, so only text that cannot carry
/// one, or that is purely diagnostic, goes through here. Server data that
/// the caller echoes back is checked first; see `ok_records`.
pub(crate) fn c_string(s: impl Into<String>) -> *mut c_char {
    let s: String = s.into();
    CString::new(s.replace('\0', ""))
        .unwrap_or_default()
        .into_raw()
}

/// Free a string produced by `c_string`. Null is ignored.
pub(crate) fn drop_c_string(s: *mut c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}

/// Hand a vector to C as pointer + length; empty vectors become null.
fn into_raw_parts<T>(items: Vec<T>) -> (*mut T, u32) {
    if items.is_empty() {
        return (std::ptr::null_mut(), 0);
    }
    let boxed = items.into_boxed_slice();
    let len = boxed.len() as u32;
    (Box::into_raw(boxed) as *mut T, len)
}

/// Reclaim a buffer produced by `into_raw_parts`.
pub(crate) unsafe fn from_raw_parts<T>(ptr: *mut T, len: u32) -> Vec<T> {
    if ptr.is_null() || len == 0 {
        return Vec::new();
    }
    let slice = std::ptr::slice_from_raw_parts_mut(ptr, len as usize);
    unsafe { Box::from_raw(slice) }.into_vec()
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// HTTP method as a C enum.
#[repr(C)]
pub enum FfiHttpMethod {
    Get = 0,
    Post = 1,
}

impl From<HttpMethod> for FfiHttpMethod {
    fn from(m: HttpMethod) -> Self {
        match m {
            HttpMethod::Get => FfiHttpMethod::Get,
            HttpMethod::Post => FfiHttpMethod::Post,
        }
    }
}

/// A single HTTP header as a key-value pair of C strings.
#[repr(C)]
pub struct FfiHeader {
    pub key: *mut c_char,
    pub value: *mut c_char,
}

/// An HTTP request described as C-compatible plain data.
///
/// Returned inside a result by the `lightfeed_build_*` functions. The C
/// caller executes it, honoring `timeout_ms`, and passes the response back
/// through `lightfeed_parse_records`.
#[repr(C)]
pub struct FfiHttpRequest {
    pub method: FfiHttpMethod,
    pub url: *mut c_char,
    pub headers: *mut FfiHeader,
    pub headers_len: u32,
    /// Null for GET.
    pub body: *mut c_char,
    pub timeout_ms: u64,
}

impl FfiHttpRequest {
    pub(crate) fn from_core(req: lightfeed_core::HttpRequest) -> Self {
        let headers = req
            .headers
            .into_iter()
            .map(|(k, v)| FfiHeader {
                key: c_string(k),
                value: c_string(v),
            })
            .collect();
        let (headers, headers_len) = into_raw_parts(headers);
        FfiHttpRequest {
            method: req.method.into(),
            url: c_string(req.url),
            headers,
            headers_len,
            body: req.body.map_or(std::ptr::null_mut(), c_string),
            timeout_ms: u64::try_from(req.timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub(crate) fn free_fields(&mut self) {
        drop_c_string(self.url);
        drop_c_string(self.body);
        for header in unsafe { from_raw_parts(self.headers, self.headers_len) } {
            drop_c_string(header.key);
            drop_c_string(header.value);
        }
    }
}

// ---------------------------------------------------------------------------
// Response input (caller-provided, not heap-allocated by us)
// ---------------------------------------------------------------------------

/// An HTTP response described as C-compatible plain data.
///
/// The C caller constructs this on the stack after executing a request and
/// passes a pointer to `lightfeed_parse_records`. The FFI layer reads but
/// does not free these fields. `body` and `retry_after` may be null.
#[repr(C)]
pub struct FfiHttpResponse {
    pub status: u16,
    pub body: *const c_char,
    /// Raw `Retry-After` header value, if the response had one.
    pub retry_after: *const c_char,
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Error codes returned in `FfiLightfeedResult`.
#[repr(C)]
#[derive(Debug, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    /// Parameters were rejected before any request was built.
    Validation = 1,
    /// Normalized server or transport failure; see `http_status`.
    Api = 2,
    Deserialization = 3,
    Serialization = 4,
    Panic = 5,
    NullArg = 6,
    InvalidUtf8 = 7,
}

/// Tag that tells `lightfeed_free_result` what `FfiLightfeedResult::data` points to.
#[repr(C)]
#[derive(Debug, PartialEq, Eq)]
pub enum FfiDataTag {
    None = 0,
    Request = 1,
    Records = 2,
}

/// A single record exposed to C. Timestamps are RFC 3339 strings.
#[repr(C)]
pub struct FfiRecord {
    pub id: u64,
    /// The record's `data` object as JSON text.
    pub data_json: *mut c_char,
    pub first_seen_time: *mut c_char,
    pub last_changed_time: *mut c_char,
    pub last_seen_time: *mut c_char,
    pub has_relevance_score: bool,
    pub relevance_score: f64,
}

impl FfiRecord {
    fn from_core(record: Record) -> Self {
        let data = serde_json::Value::Object(record.data).to_string();
        FfiRecord {
            id: record.id,
            data_json: c_string(data),
            first_seen_time: c_string(format_timestamp(&record.timestamps.first_seen_time)),
            last_changed_time: c_string(format_timestamp(&record.timestamps.last_changed_time)),
            last_seen_time: c_string(format_timestamp(&record.timestamps.last_seen_time)),
            has_relevance_score: record.relevance_score.is_some(),
            relevance_score: record.relevance_score.unwrap_or(0.0),
        }
    }

    fn free_fields(&self) {
        drop_c_string(self.data_json);
        drop_c_string(self.first_seen_time);
        drop_c_string(self.last_changed_time);
        drop_c_string(self.last_seen_time);
    }
}

/// One page of records plus its pagination state.
#[repr(C)]
pub struct FfiRecordsPage {
    pub items: *mut FfiRecord,
    pub len: u32,
    pub limit: u32,
    /// Null when there is no further page.
    pub next_cursor: *mut c_char,
    pub has_more: bool,
}

impl FfiRecordsPage {
    fn from_core(page: RecordsResponse) -> Self {
        let records = page.results.into_iter().map(FfiRecord::from_core).collect();
        let (items, len) = into_raw_parts(records);
        FfiRecordsPage {
            items,
            len,
            limit: page.pagination.limit,
            next_cursor: page
                .pagination
                .next_cursor
                .map_or(std::ptr::null_mut(), |c| c_string(c.as_str())),
            has_more: page.pagination.has_more,
        }
    }

    pub(crate) fn free_fields(&mut self) {
        drop_c_string(self.next_cursor);
        for record in unsafe { from_raw_parts(self.items, self.len) } {
            record.free_fields();
        }
    }
}

/// Result envelope for every build and parse operation.
///
/// On success `error_code` is `Ok`, `error_message` is null, and `data`
/// points to the payload tagged by `data_tag`.
/// On failure `error_code` describes the category, `error_message` is a
/// C string, `data` is null, and for `Api` errors `http_status` holds one
/// of 400, 401, 403, 404, 429 or 500. `retry_after_secs` is non-zero only
/// for a 429 that carried `Retry-After`. NUL bytes in a server-supplied
/// error message are removed from `error_message`.
#[repr(C)]
pub struct FfiLightfeedResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub http_status: u16,
    pub retry_after_secs: u64,
    pub data_tag: FfiDataTag,
    pub data: *mut c_void,
}

impl FfiLightfeedResult {
    fn boxed(error_code: FfiErrorCode, error_message: *mut c_char, tag: FfiDataTag, data: *mut c_void) -> *mut Self {
        Box::into_raw(Box::new(FfiLightfeedResult {
            error_code,
            error_message,
            http_status: 0,
            retry_after_secs: 0,
            data_tag: tag,
            data,
        }))
    }

    /// Success carrying a built request.
    pub(crate) fn ok_request(req: lightfeed_core::HttpRequest) -> *mut Self {
        let data = Box::into_raw(Box::new(FfiHttpRequest::from_core(req)));
        Self::boxed(FfiErrorCode::Ok, std::ptr::null_mut(), FfiDataTag::Request, data as *mut c_void)
    }

    /// Success carrying a parsed page.
    ///
    /// A cursor with an interior NUL cannot cross as a C string without
    /// changing it, and a changed cursor would fetch the wrong page, so the
    /// page is rejected instead. Record data is re-serialized JSON, which
    /// escapes NUL, and timestamps are formatted here.
    pub(crate) fn ok_records(page: RecordsResponse) -> *mut Self {
        if page
            .pagination
            .next_cursor
            .as_ref()
            .is_some_and(|c| c.as_str().contains('\0'))
        {
            return Self::error(FfiErrorCode::Deserialization, "next_cursor contains a NUL byte");
        }
        let data = Box::into_raw(Box::new(FfiRecordsPage::from_core(page)));
        Self::boxed(FfiErrorCode::Ok, std::ptr::null_mut(), FfiDataTag::Records, data as *mut c_void)
    }

    /// Build an error result from an `ApiError`.
    pub(crate) fn from_error(err: ApiError) -> *mut Self {
        let (code, status, retry_after, message) = match err {
            ApiError::Validation(e) => (FfiErrorCode::Validation, 0, 0, e.to_string()),
            ApiError::Lightfeed(e) => (
                FfiErrorCode::Api,
                e.code(),
                e.retry_after.map_or(0, |d| d.as_secs()),
                e.message,
            ),
            e @ ApiError::Deserialization(_) => (FfiErrorCode::Deserialization, 0, 0, e.to_string()),
            e @ ApiError::Serialization(_) => (FfiErrorCode::Serialization, 0, 0, e.to_string()),
        };
        let result = Self::boxed(code, c_string(message), FfiDataTag::None, std::ptr::null_mut());
        unsafe {
            (*result).http_status = status;
            (*result).retry_after_secs = retry_after;
        }
        result
    }

    /// Error result for a rejected argument (null pointer, bad UTF-8, bad config).
    pub(crate) fn error(code: FfiErrorCode, message: impl Into<String>) -> *mut Self {
        Self::boxed(code, c_string(message), FfiDataTag::None, std::ptr::null_mut())
    }

    /// Build an error result for a null argument.
    pub(crate) fn null_arg(name: &str) -> *mut Self {
        Self::error(FfiErrorCode::NullArg, format!("null argument: {name}"))
    }

    /// Build an error result for a caught panic.
    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::error(FfiErrorCode::Panic, msg)
    }
}
