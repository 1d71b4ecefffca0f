// In-process test client

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use shallot_core::{Application, ChainState, Error, Recorder, Request, Router, Routing};
use std::sync::Arc;

/// Sends requests straight into [`Application::serve`] and captures the
/// response with a [`Recorder`].
///
/// The client is cheap to clone and can be shared between threads.
pub struct TestClient<R: Routing = Router> {
    app: Arc<Application<R>>,
}

impl<R: Routing> Clone for TestClient<R> {
    fn clone(&self) -> Self {
        Self {
            app: self.app.clone(),
        }
    }
}

impl<R: Routing> TestClient<R> {
    pub fn new(app: Application<R>) -> Self {
        Self { app: Arc::new(app) }
    }

    /// Share an application that is also served elsewhere.
    pub fn from_shared(app: Arc<Application<R>>) -> Self {
        Self { app }
    }

    pub fn app(&self) -> &Application<R> {
        &self.app
    }

    pub fn get(&self, path: &str) -> TestResponse {
        self.send(TestRequestBuilder::new(Method::GET, path))
    }

    pub fn post(&self, path: &str, body: impl Into<Bytes>) -> TestResponse {
        self.send(TestRequestBuilder::new(Method::POST, path).body(body))
    }

    pub fn put(&self, path: &str, body: impl Into<Bytes>) -> TestResponse {
        self.send(TestRequestBuilder::new(Method::PUT, path).body(body))
    }

    pub fn patch(&self, path: &str, body: impl Into<Bytes>) -> TestResponse {
        self.send(TestRequestBuilder::new(Method::PATCH, path).body(body))
    }

    pub fn delete(&self, path: &str) -> TestResponse {
        self.send(TestRequestBuilder::new(Method::DELETE, path))
    }

    /// Build and send a request.
    pub fn send(&self, builder: TestRequestBuilder) -> TestResponse {
        match builder.build() {
            Ok(request) => self.request(request),
            Err(err) => TestResponse::unsent(Error::from(err)),
        }
    }

    /// Send a prepared request.
    pub fn request(&self, request: Request) -> TestResponse {
        let recorder = Recorder::new();
        let outcome = self.app.serve(request, recorder.clone());
        TestResponse {
            status: recorder.status(),
            headers: recorder.headers(),
            body: recorder.body(),
            committed: recorder.committed(),
            outcome,
        }
    }
}

/// Builder for test requests.
#[derive(Debug)]
pub struct TestRequestBuilder {
    method: Method,
    path: String,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    body: Bytes,
}

impl TestRequestBuilder {
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.to_string(),
            headers: Vec::new(),
            query: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Append a query parameter. Values are used as given, without escaping.
    pub fn query(mut self, name: &str, value: &str) -> Self {
        self.query.push((name.to_string(), value.to_string()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Serialize `data` as the body and set a JSON content type.
    pub fn json<T: serde::Serialize>(self, data: &T) -> Result<Self, Error> {
        let body = serde_json::to_vec(data).map_err(|e| Error::BadRequest(e.to_string()))?;
        Ok(self.header(CONTENT_TYPE.as_str(), "application/json").body(body))
    }

    pub fn build(self) -> Result<Request, http::Error> {
        let uri = if self.query.is_empty() {
            self.path
        } else {
            let pairs: Vec<String> = self
                .query
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect();
            let separator = if self.path.contains('?') { '&' } else { '?' };
            format!("{}{}{}", self.path, separator, pairs.join("&"))
        };

        let mut builder = http::Request::builder().method(self.method).uri(uri);
        for (name, value) in &self.headers {
            builder = builder.header(
                HeaderName::try_from(name.as_str())?,
                HeaderValue::try_from(value.as_str())?,
            );
        }
        builder.body(self.body)
    }
}

/// What the application wrote, plus the outcome `serve` returned.
#[derive(Debug)]
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    committed: bool,
    outcome: Result<ChainState, Error>,
}

impl TestResponse {
    fn unsent(err: Error) -> Self {
        Self {
            status: err.status_code(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            committed: false,
            outcome: Err(err),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Whether anything (status or body) was written.
    pub fn committed(&self) -> bool {
        self.committed
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn body_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    pub fn outcome(&self) -> &Result<ChainState, Error> {
        &self.outcome
    }

    /// Final chain state, `None` when the request failed.
    pub fn state(&self) -> Option<ChainState> {
        self.outcome.as_ref().ok().copied()
    }

    pub fn error(&self) -> Option<&Error> {
        self.outcome.as_ref().err()
    }

    /// Panic unless the request finished without error.
    pub fn assert_ok(&self) -> ChainState {
        match &self.outcome {
            Ok(state) => *state,
            Err(err) => panic!("Expected request to succeed, got error: {:?}", err),
        }
    }

    /// Panic unless the request failed.
    pub fn assert_error(&self) -> &Error {
        match &self.outcome {
            Err(err) => err,
            Ok(state) => panic!("Expected request to fail, it finished as {:?}", state),
        }
    }
}
