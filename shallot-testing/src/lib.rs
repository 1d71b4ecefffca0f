//! Testing utilities for Shallot applications.
//!
//! - **TestClient** drives an [`Application`](shallot_core::Application)
//!   in-process, without a socket
//! - **Trail** records the order middleware runs in
//! - **MockService** counts calls made through an injected service
//! - **Assertions** for status, body and headers
//!
//! ## Quick Start
//!
//! ```
//! use shallot_core::Application;
//! use shallot_testing::*;
//!
//! let mut app = Application::new();
//! app.get("/hello", || "Hello!").unwrap();
//!
//! let client = TestClient::new(app);
//! let response = client.get("/hello");
//! assert_status(&response, 200);
//! assert_body(&response, "Hello!");
//! ```
//!
//! ## Recording middleware order
//!
//! ```
//! use shallot_core::Application;
//! use shallot_testing::*;
//!
//! let trail = Trail::new();
//! let mut app = Application::new();
//! app.use_handler(trail.marker("auth"));
//! app.use_handler(trail.marker("session"));
//! app.action(trail.action());
//! app.get("/", trail.marker("route")).unwrap();
//!
//! TestClient::new(app).get("/");
//! assert_eq!(
//!     trail.joined(),
//!     "before_auth before_session before_route action after_route after_session after_auth"
//! );
//! ```

mod assertions;
mod mock;
mod test_client;

pub use assertions::{
    assert_body, assert_body_contains, assert_client_error, assert_header, assert_json,
    assert_server_error, assert_state, assert_status, assert_success,
};
pub use mock::{MockService, Trail};
pub use test_client::{TestClient, TestRequestBuilder, TestResponse};

/// Route `tracing` output through the test harness's captured writer.
///
/// Safe to call from every test; only the first call installs a subscriber.
/// The filter comes from `RUST_LOG`, defaulting to `debug`.
pub fn init_test_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
