// Routing collaborator: maps (method, path) to route handlers and parameters

use crate::Error;
use crate::handler::{BoxedHandler, IntoHandler};
use crate::logging::debug;
use crate::request::Params;
use http::Method;
use std::collections::HashMap;
use std::sync::Arc;

/// Result of a successful route lookup.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub handlers: Vec<BoxedHandler>,
    pub params: Params,
}

/// Anything that can pick the handlers for a request.
pub trait Routing: Send + Sync + 'static {
    fn route(&self, method: &Method, path: &str) -> Option<RouteMatch>;
}

type Routes = matchit::Router<Arc<[BoxedHandler]>>;

/// Default router: one radix tree per method plus one for any method.
///
/// Patterns use `{name}` for a segment and `{*name}` for the remainder;
/// `:name` and `*name` segments are accepted and rewritten.
#[derive(Default)]
pub struct Router {
    methods: HashMap<Method, Routes>,
    any: Routes,
    count: usize,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handlers` for `method` and `path`. `None` matches any method.
    pub fn add_route(
        &mut self,
        method: Option<Method>,
        path: &str,
        handlers: Vec<BoxedHandler>,
    ) -> Result<(), Error> {
        if handlers.is_empty() {
            return Err(Error::Registration(format!(
                "route {} has no handlers",
                path
            )));
        }
        if !path.starts_with('/') {
            return Err(Error::Registration(format!(
                "route path must start with '/': {}",
                path
            )));
        }

        let pattern = normalize_pattern(path);
        let tree = match &method {
            Some(method) => self.methods.entry(method.clone()).or_default(),
            None => &mut self.any,
        };
        tree.insert(pattern.as_str(), Arc::from(handlers))
            .map_err(|e| Error::Registration(format!("route {}: {}", path, e)))?;

        self.count += 1;
        debug!(
            method = method.as_ref().map(Method::as_str).unwrap_or("*"),
            path = pattern.as_str(),
            "Route registered"
        );
        Ok(())
    }

    pub fn get<M, H: IntoHandler<M>>(&mut self, path: &str, handler: H) -> Result<(), Error> {
        self.add_route(Some(Method::GET), path, vec![handler.into_handler()])
    }

    pub fn post<M, H: IntoHandler<M>>(&mut self, path: &str, handler: H) -> Result<(), Error> {
        self.add_route(Some(Method::POST), path, vec![handler.into_handler()])
    }

    pub fn put<M, H: IntoHandler<M>>(&mut self, path: &str, handler: H) -> Result<(), Error> {
        self.add_route(Some(Method::PUT), path, vec![handler.into_handler()])
    }

    pub fn patch<M, H: IntoHandler<M>>(&mut self, path: &str, handler: H) -> Result<(), Error> {
        self.add_route(Some(Method::PATCH), path, vec![handler.into_handler()])
    }

    pub fn delete<M, H: IntoHandler<M>>(&mut self, path: &str, handler: H) -> Result<(), Error> {
        self.add_route(Some(Method::DELETE), path, vec![handler.into_handler()])
    }

    pub fn any<M, H: IntoHandler<M>>(&mut self, path: &str, handler: H) -> Result<(), Error> {
        self.add_route(None, path, vec![handler.into_handler()])
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl Routing for Router {
    fn route(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        let found = self
            .methods
            .get(method)
            .and_then(|tree| tree.at(path).ok())
            .or_else(|| self.any.at(path).ok())?;

        let params = found.params.iter().collect();
        Some(RouteMatch {
            handlers: found.value.to_vec(),
            params,
        })
    }
}

/// Rewrite `:name` / `*name` segments into matchit's `{name}` / `{*name}`.
fn normalize_pattern(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if let Some(name) = segment.strip_prefix(':') {
                format!("{{{}}}", name)
            } else if let Some(name) = segment.strip_prefix('*') {
                format!("{{*{}}}", name)
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}
