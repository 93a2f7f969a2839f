//! Verify build/parse methods against JSON test vectors stored in `test-vectors/`.
//!
//! Each vector file describes inputs, expected requests, simulated responses,
//! and expected parse results. Request bodies are compared as parsed JSON,
//! except filter trees whose key and rule order is checked byte for byte.

use std::time::Duration;

use lightfeed_core::{
    ErrorStatus, FilterRecordsParams, GetRecordsParams, HttpMethod, HttpRequest, HttpResponse,
    LightfeedConfig, LightfeedError, RecordsClient, RecordsResponse, SearchRecordsParams,
};
use serde_json::Value;

const BASE_URL: &str = "http://localhost:3000";

fn client() -> RecordsClient {
    let config = LightfeedConfig::new("test-api-key")
        .unwrap()
        .with_base_url(BASE_URL)
        .unwrap();
    RecordsClient::new(config)
}

/// Parse the method string from test vectors into `HttpMethod`.
fn parse_method(s: &str) -> HttpMethod {
    match s {
        "GET" => HttpMethod::Get,
        "POST" => HttpMethod::Post,
        other => panic!("unknown method: {other}"),
    }
}

fn pairs(value: &Value) -> Vec<(String, String)> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|h| {
                    let arr = h.as_array().unwrap();
                    (arr[0].as_str().unwrap().to_string(), arr[1].as_str().unwrap().to_string())
                })
                .collect()
        })
        .unwrap_or_default()
}

fn simulated(sim: &Value) -> HttpResponse {
    HttpResponse {
        status: sim["status"].as_u64().unwrap() as u16,
        headers: pairs(&sim["headers"]),
        body: sim["body"].as_str().unwrap().to_string(),
    }
}

fn check_request(name: &str, req: &HttpRequest, expected: &Value) {
    assert_eq!(req.method, parse_method(expected["method"].as_str().unwrap()), "{name}: method");
    assert_eq!(req.url, format!("{BASE_URL}{}", expected["path"].as_str().unwrap()), "{name}: url");
    assert_eq!(req.headers, pairs(&expected["headers"]), "{name}: headers");
    assert_eq!(req.timeout, Duration::from_secs(30), "{name}: timeout");

    match expected.get("body") {
        Some(body) => {
            let sent: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
            assert_eq!(&sent, body, "{name}: body");
            if let Some(filter) = body.get("filter") {
                let raw = req.body.as_deref().unwrap();
                assert!(raw.contains(&filter.to_string()), "{name}: filter serialized out of order");
            }
        }
        None => assert!(req.body.is_none(), "{name}: unexpected body"),
    }
}

fn check_parse(name: &str, c: &RecordsClient, case: &Value) {
    let page = c.parse_records(simulated(&case["simulated_response"])).unwrap();
    let expected: RecordsResponse = serde_json::from_value(case["expected_result"].clone()).unwrap();
    assert_eq!(page, expected, "{name}: parsed result");
}

fn cases(raw: &str) -> Vec<Value> {
    let vectors: Value = serde_json::from_str(raw).unwrap();
    vectors["cases"].as_array().unwrap().clone()
}

// ---------------------------------------------------------------------------
// Get
// ---------------------------------------------------------------------------

#[test]
fn get_test_vectors() {
    let c = client();
    for case in cases(include_str!("../../test-vectors/get.json")) {
        let name = case["name"].as_str().unwrap();
        let input: GetRecordsParams = serde_json::from_value(case["input"].clone()).unwrap();
        let req = c.build_get_records(case["database_id"].as_str().unwrap(), &input).unwrap();
        check_request(name, &req, &case["expected_request"]);
        check_parse(name, &c, &case);
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[test]
fn search_test_vectors() {
    let c = client();
    for case in cases(include_str!("../../test-vectors/search.json")) {
        let name = case["name"].as_str().unwrap();
        let input: SearchRecordsParams = serde_json::from_value(case["input"].clone()).unwrap();
        let req = c.build_search_records(case["database_id"].as_str().unwrap(), &input).unwrap();
        check_request(name, &req, &case["expected_request"]);
        check_parse(name, &c, &case);
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

#[test]
fn filter_test_vectors() {
    let c = client();
    for case in cases(include_str!("../../test-vectors/filter.json")) {
        let name = case["name"].as_str().unwrap();
        let input: FilterRecordsParams = serde_json::from_value(case["input"].clone()).unwrap();
        let req = c.build_filter_records(case["database_id"].as_str().unwrap(), &input).unwrap();
        check_request(name, &req, &case["expected_request"]);
        check_parse(name, &c, &case);
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[test]
fn error_test_vectors() {
    let c = client();
    for case in cases(include_str!("../../test-vectors/errors.json")) {
        let name = case["name"].as_str().unwrap();
        let response = simulated(&case["response"]);
        let expected = &case["expected"];

        let direct = LightfeedError::from_response(&response);
        let status = expected["status"].as_u64().unwrap() as u16;
        assert_eq!(direct.status, ErrorStatus::from_code(status), "{name}: status");
        assert_eq!(direct.code(), status, "{name}: code");
        assert_eq!(direct.message, expected["message"].as_str().unwrap(), "{name}: message");
        assert_eq!(
            direct.retry_after,
            expected["retry_after_secs"].as_u64().map(Duration::from_secs),
            "{name}: retry_after"
        );

        let err = c.parse_records(response).unwrap_err();
        assert_eq!(err.status(), Some(direct.status), "{name}: parse_records status");
    }
}
