// Test assertions for responses

use crate::TestResponse;
use shallot_core::ChainState;

/// Assert that a response has a specific status code
pub fn assert_status(response: &TestResponse, expected: u16) {
    let actual = response.status_code();
    assert_eq!(
        actual, expected,
        "Expected status {}, got {}",
        expected, actual
    );
}

/// Assert that the body is exactly `expected`
pub fn assert_body(response: &TestResponse, expected: &str) {
    assert_eq!(response.body_string(), expected, "Response body mismatch");
}

/// Assert that a response body contains a string
pub fn assert_body_contains(response: &TestResponse, expected: &str) {
    let body = response.body_string();
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
    let actual: T = response
        .body_json()
        .unwrap_or_else(|e| panic!("Failed to deserialize response body: {}", e));
    assert_eq!(actual, *expected, "JSON bodies do not match");
}

/// Assert that a response has a specific header
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

/// Assert the chain finished in `expected` without error
pub fn assert_state(response: &TestResponse, expected: ChainState) {
    let actual = response.assert_ok();
    assert_eq!(
        actual, expected,
        "Expected chain state {:?}, got {:?}",
        expected, actual
    );
}

/// Assert that a response is successful (2xx status)
pub fn assert_success(response: &TestResponse) {
    let status = response.status_code();
    assert!(
        (200..300).contains(&status),
        "Expected successful status (2xx), got {}",
        status
    );
}

/// Assert that a response is a client error (4xx status)
pub fn assert_client_error(response: &TestResponse) {
    let status = response.status_code();
    assert!(
        (400..500).contains(&status),
        "Expected client error status (4xx), got {}",
        status
    );
}

/// Assert that a response is a server error (5xx status)
pub fn assert_server_error(response: &TestResponse) {
    let status = response.status_code();
    assert!(
        (500..600).contains(&status),
        "Expected server error status (5xx), got {}",
        status
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TestClient;
    use http::StatusCode;
    use shallot_core::{Application, Error};

    fn client() -> TestClient {
        let mut app = Application::new();
        app.get("/ok", || "OK").unwrap();
        app.get("/json", || -> Result<shallot_core::Render, Error> {
            shallot_core::Render::new("status").data(&serde_json::json!({"status": "ok"}))
        })
        .unwrap();
        app.get("/created", || (StatusCode::CREATED, "made")).unwrap();
        app.get("/teapot", || StatusCode::IM_A_TEAPOT).unwrap();
        app.get("/fail", || -> Result<(), Error> { Err(Error::Internal("db down".into())) })
            .unwrap();
        app.bind_as::<dyn shallot_core::Renderer>(std::sync::Arc::new(
            shallot_core::JsonRenderer::default(),
        ));
        TestClient::new(app)
    }

    #[test]
    fn test_assert_status() {
        let response = client().get("/ok");
        assert_status(&response, 200);
        assert_body(&response, "OK");
        assert_state(&response, ChainState::EarlyExit);
    }

    #[test]
    fn test_assert_status_ranges() {
        let client = client();
        assert_success(&client.get("/ok"));
        assert_success(&client.get("/created"));
        assert_client_error(&client.get("/teapot"));
        assert_client_error(&client.get("/missing"));
        assert_server_error(&client.get("/fail"));
    }

    #[test]
    fn test_assert_body_contains() {
        let response = client().get("/fail");
        assert_body_contains(&response, "Internal");
        assert!(!response.body_string().contains("db down"));
    }

    #[test]
    fn test_assert_json_and_header() {
        let response = client().get("/json");
        assert_json(&response, &serde_json::json!({"status": "ok"}));
        assert_header(&response, "content-type", "application/json; charset=utf-8");
    }

    #[test]
    #[should_panic(expected = "Expected status 404")]
    fn test_assert_status_failure() {
        assert_status(&client().get("/ok"), 404);
    }
}
