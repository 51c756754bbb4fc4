// Test assertions for HTTP responses

use crate::TestResponse;

/// Assert that a response has a specific status code
pub fn assert_status(response: &TestResponse, expected: u16) {
    let actual = response.status();
    assert_eq!(
        actual, expected,
        "Expected status {}, got {} (body: {})",
        expected,
        actual,
        response.body_string().unwrap_or_default()
    );
}

/// Assert that a response has a specific header (name is case-insensitive)
pub fn assert_header(response: &TestResponse, key: &str, expected: &str) {
    let actual = response.header(key);
    assert_eq!(
        actual,
        Some(expected),
        "Expected header '{}' to be '{}', got {:?}",
        key,
        expected,
        actual
    );
}

/// Assert the exact response body
pub fn assert_body(response: &TestResponse, expected: &str) {
    let body = response.body_string().unwrap_or_default();
    assert_eq!(body, expected, "Response body does not match");
}

pub fn assert_body_contains(response: &TestResponse, expected: &str) {
    let body = response.body_string().unwrap_or_default();
    assert!(
        body.contains(expected),
        "Expected body to contain '{}', but it didn't. Body: {}",
        expected,
        body
    );
}

/// Assert that a response body contains JSON matching expected value
pub fn assert_json<T>(response: &TestResponse, expected: &T)
where
    T: serde::de::DeserializeOwned + PartialEq + std::fmt::Debug,
{
    let actual: T = match response.body_json() {
        Ok(actual) => actual,
        Err(err) => panic!("Failed to deserialize response body: {}", err),
    };
    assert_eq!(actual, *expected, "JSON bodies do not match");
}

/// Assert that a response is successful (2xx status)
pub fn assert_success(response: &TestResponse) {
    let status = response.status();
    assert!(
        (200..300).contains(&status),
        "Expected successful status (2xx), got {}",
        status
    );
}

/// Assert that a response is a client error (4xx status)
pub fn assert_client_error(response: &TestResponse) {
    let status = response.status();
    assert!(
        (400..500).contains(&status),
        "Expected client error status (4xx), got {}",
        status
    );
}

/// Assert that a response is a server error (5xx status)
pub fn assert_server_error(response: &TestResponse) {
    let status = response.status();
    assert!(
        (500..600).contains(&status),
        "Expected server error status (5xx), got {}",
        status
    );
}

/// Assert that an error body carries the given `error` field
pub fn assert_error_kind(response: &TestResponse, expected: &str) {
    let body: serde_json::Value = match response.body_json() {
        Ok(body) => body,
        Err(err) => panic!("Expected a JSON error body: {}", err),
    };
    assert_eq!(
        body["error"].as_str(),
        Some(expected),
        "Unexpected error body: {}",
        body
    );
}
