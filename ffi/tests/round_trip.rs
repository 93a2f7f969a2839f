//! Drive the C ABI the way a foreign host would: build through the FFI,
//! execute with ureq, hand the raw response back, and read the result.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;

use lightfeed_ffi::types::{
    FfiDataTag, FfiErrorCode, FfiHttpMethod, FfiHttpRequest, FfiHttpResponse, FfiLightfeedClient,
    FfiLightfeedResult, FfiRecordsPage,
};
use lightfeed_ffi::*;
use mock_server::{MockState, DEFAULT_API_KEY, SAMPLE_DATABASE};

fn spawn_server() -> String {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run_with(listener, MockState::sample()).await
        })
        .unwrap();
    });

    format!("http://{addr}")
}

fn text(ptr: *const c_char) -> String {
    unsafe { CStr::from_ptr(ptr) }.to_str().unwrap().to_string()
}

/// Execute the request described by an FFI build result and parse the
/// response back through the FFI. The build result is freed here.
fn round_trip(client: *const FfiLightfeedClient, built: *mut FfiLightfeedResult) -> *mut FfiLightfeedResult {
    let r = unsafe { &*built };
    assert_eq!(r.error_code, FfiErrorCode::Ok);
    assert_eq!(r.data_tag, FfiDataTag::Request);
    let req = unsafe { &*(r.data as *const FfiHttpRequest) };

    let agent = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .build()
        .new_agent();
    let headers = unsafe { std::slice::from_raw_parts(req.headers, req.headers_len as usize) };
    let url = text(req.url);

    let mut response = match req.method {
        FfiHttpMethod::Get => {
            let mut builder = agent.get(&url);
            for h in headers {
                builder = builder.header(text(h.key), text(h.value));
            }
            builder.call()
        }
        FfiHttpMethod::Post => {
            let mut builder = agent.post(&url);
            for h in headers {
                builder = builder.header(text(h.key), text(h.value));
            }
            builder.send(text(req.body).as_bytes())
        }
    }
    .expect("HTTP transport error");

    let status = response.status().as_u16();
    let body = CString::new(response.body_mut().read_to_string().unwrap_or_default()).unwrap();
    lightfeed_free_result(built);

    let ffi_response = FfiHttpResponse {
        status,
        body: body.as_ptr(),
        retry_after: std::ptr::null(),
    };
    lightfeed_parse_records(client, &ffi_response)
}

fn page_ids(result: *mut FfiLightfeedResult) -> Vec<u64> {
    let r = unsafe { &*result };
    assert_eq!(r.error_code, FfiErrorCode::Ok);
    assert_eq!(r.data_tag, FfiDataTag::Records);
    let page = unsafe { &*(r.data as *const FfiRecordsPage) };
    if page.items.is_null() {
        return Vec::new();
    }
    unsafe { std::slice::from_raw_parts(page.items, page.len as usize) }
        .iter()
        .map(|record| record.id)
        .collect()
}

#[test]
fn every_operation_round_trips() {
    let base = CString::new(spawn_server()).unwrap();
    let key = CString::new(DEFAULT_API_KEY).unwrap();
    let client = lightfeed_client_new(key.as_ptr(), base.as_ptr(), 5);
    assert!(!client.is_null());
    let db = CString::new(SAMPLE_DATABASE).unwrap();

    // Get, two pages.
    let params = CString::new(r#"{"limit":3}"#).unwrap();
    let result = round_trip(client, lightfeed_build_get_records(client, db.as_ptr(), params.as_ptr()));
    assert_eq!(page_ids(result), vec![1, 2, 3]);
    let page = unsafe { &*((*result).data as *const FfiRecordsPage) };
    assert!(page.has_more);
    let cursor = text(page.next_cursor);
    lightfeed_free_result(result);

    let params = CString::new(format!(r#"{{"limit":3,"cursor":"{cursor}"}}"#)).unwrap();
    let result = round_trip(client, lightfeed_build_get_records(client, db.as_ptr(), params.as_ptr()));
    assert_eq!(page_ids(result), vec![4, 5]);
    lightfeed_free_result(result);

    // Search.
    let params = CString::new(r#"{"search":{"text":"acme"}}"#).unwrap();
    let result = round_trip(client, lightfeed_build_search_records(client, db.as_ptr(), params.as_ptr()));
    assert_eq!(page_ids(result), vec![1, 3]);
    lightfeed_free_result(result);

    // Filter.
    let params = CString::new(
        r#"{"filter":{"condition":"AND","rules":[{"column":"category","operator":"equals","value":"Test"}]},"pagination":{"limit":100}}"#,
    )
    .unwrap();
    let result = round_trip(client, lightfeed_build_filter_records(client, db.as_ptr(), params.as_ptr()));
    assert_eq!(page_ids(result), vec![1, 3, 5]);
    lightfeed_free_result(result);

    lightfeed_client_free(client);
}

#[test]
fn server_errors_come_back_normalized() {
    let base = CString::new(spawn_server()).unwrap();
    let key = CString::new("wrong-key").unwrap();
    let client = lightfeed_client_new(key.as_ptr(), base.as_ptr(), 5);
    let db = CString::new(SAMPLE_DATABASE).unwrap();

    let result = round_trip(client, lightfeed_build_get_records(client, db.as_ptr(), std::ptr::null()));
    let r = unsafe { &*result };
    assert_eq!(r.error_code, FfiErrorCode::Api);
    assert_eq!(r.http_status, 401);
    assert_eq!(text(r.error_message), "Invalid API key");
    lightfeed_free_result(result);

    lightfeed_client_free(client);
}
