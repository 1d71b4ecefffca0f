// Mock utilities for testing

use parking_lot::Mutex;
use shallot_core::{BoxedHandler, Context, Error, handler};
use std::sync::Arc;

/// Records the order handlers ran in.
///
/// Clones share one log, so a trail can be handed to many handlers and read
/// back after the request.
#[derive(Clone, Default)]
pub struct Trail {
    markers: Arc<Mutex<Vec<String>>>,
}

impl Trail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, marker: impl Into<String>) {
        self.markers.lock().push(marker.into());
    }

    pub fn markers(&self) -> Vec<String> {
        self.markers.lock().clone()
    }

    /// Markers joined with single spaces.
    pub fn joined(&self) -> String {
        self.markers.lock().join(" ")
    }

    pub fn len(&self) -> usize {
        self.markers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.lock().is_empty()
    }

    pub fn clear(&self) {
        self.markers.lock().clear();
    }

    /// Middleware recording `before_{name}`, continuing the chain, then
    /// recording `after_{name}`.
    pub fn marker(&self, name: &str) -> BoxedHandler {
        let trail = self.clone();
        let name = name.to_string();
        handler(move |ctx: &mut Context<'_>| -> Result<(), Error> {
            trail.push(format!("before_{}", name));
            ctx.next()?;
            trail.push(format!("after_{}", name));
            Ok(())
        })
        .with_name("trail_marker")
    }

    /// Middleware recording `before_{name}` and ending the chain there.
    pub fn stop(&self, name: &str) -> BoxedHandler {
        let trail = self.clone();
        let name = name.to_string();
        handler(move |_ctx: &mut Context<'_>| {
            trail.push(format!("before_{}", name));
        })
        .with_name("trail_stop")
    }

    /// Terminal handler recording `action`.
    pub fn action(&self) -> BoxedHandler {
        let trail = self.clone();
        handler(move || trail.push("action")).with_name("trail_action")
    }
}

/// Mock service for testing.
///
/// Bind it into an application and resolve it from handlers to count the
/// calls a request makes.
#[derive(Clone)]
pub struct MockService<T> {
    calls: Arc<Mutex<Vec<String>>>,
    return_value: Arc<Mutex<Option<T>>>,
}

impl<T> MockService<T> {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            return_value: Arc::new(Mutex::new(None)),
        }
    }

    /// Set the value handed out by [`MockService::call`].
    pub fn with_return(self, value: T) -> Self {
        *self.return_value.lock() = Some(value);
        self
    }

    pub fn record_call(&self, method: &str) {
        self.calls.lock().push(method.to_string());
    }

    /// Record `method` and return the configured value.
    pub fn call(&self, method: &str) -> Option<T>
    where
        T: Clone,
    {
        self.record_call(method);
        self.return_value.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn get_calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.calls.lock().iter().any(|m| m == method)
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }
}

impl<T> Default for MockService<T> {
    fn default() -> Self {
        Self::new()
    }
}
