// Application: container, gates, global handlers and routing composed per request

use crate::Error;
use crate::container::Container;
use crate::context::{ChainState, Context};
use crate::handler::{BoxedHandler, Chain, IntoHandler, handler};
use crate::invoker::caught;
use crate::logging::{Logger, debug, error, info_span};
use crate::middleware::{gzip, recovery, request_logger, write_status_page};
use crate::request::{Params, Request};
use crate::response::{ResponseSink, ResponseWriter};
use crate::routing::{Router, Routing};
use http::uri::{PathAndQuery, Uri};
use http::{Method, StatusCode};
use shallot_config::{AppConfig, LogLevel};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Runs before any context exists. Returning `true` ends the request.
pub type BeforeHandler = Box<dyn Fn(&Request, &ResponseWriter) -> bool + Send + Sync>;

/// Body written by the default not-found handler.
pub const NOT_FOUND_BODY: &str = "404 page not found";

/// The top-level application.
///
/// Setup methods take `&mut self`; [`Application::serve`] takes `&self`, so
/// once an application is shared between threads its container can no longer
/// change.
///
/// ```
/// use shallot_core::{Application, Context, Error, Recorder};
///
/// let mut app = Application::new();
/// app.bind(String::from("world"));
/// app.use_handler(|ctx: &mut Context<'_>| -> Result<(), Error> {
///     ctx.response().write(b"[")?;
///     ctx.next()?;
///     ctx.response().write(b"]")?;
///     Ok(())
/// });
/// app.get("/hello", |name: shallot_core::Inject<String>| format!("hello {}", *name))
///     .unwrap();
///
/// let recorder = Recorder::new();
/// let request = http::Request::get("/hello").body(bytes::Bytes::new()).unwrap();
/// app.serve(request, recorder.clone()).unwrap();
///
/// assert_eq!(recorder.body_string(), "[hello world]");
/// ```
pub struct Application<R: Routing = Router> {
    container: Container<'static>,
    befores: Vec<BeforeHandler>,
    handlers: Vec<BoxedHandler>,
    action: BoxedHandler,
    not_found: BoxedHandler,
    routing: R,
    url_prefix: String,
}

impl Application<Router> {
    /// Bare application: a default `Logger` bound, no middleware.
    pub fn new() -> Self {
        Self::with_routing(Router::new())
    }

    /// Request logging, panic recovery and gzip on top of the default settings.
    pub fn classic() -> Self {
        Self::with_config(AppConfig::default())
    }

    /// The classic stack, configured from `config`.
    pub fn with_config(config: AppConfig) -> Self {
        let mut app = Self::new();
        app.apply_config(config);
        app
    }

    pub fn router(&self) -> &Router {
        &self.routing
    }

    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.routing
    }

    /// Register several handlers for one route; they run in order after the
    /// global handlers.
    pub fn route(
        &mut self,
        method: Option<Method>,
        path: &str,
        handlers: Vec<BoxedHandler>,
    ) -> Result<(), Error> {
        self.routing.add_route(method, path, handlers)
    }

    pub fn get<M, H: IntoHandler<M>>(&mut self, path: &str, handler: H) -> Result<(), Error> {
        self.routing.get(path, handler)
    }

    pub fn post<M, H: IntoHandler<M>>(&mut self, path: &str, handler: H) -> Result<(), Error> {
        self.routing.post(path, handler)
    }

    pub fn put<M, H: IntoHandler<M>>(&mut self, path: &str, handler: H) -> Result<(), Error> {
        self.routing.put(path, handler)
    }

    pub fn patch<M, H: IntoHandler<M>>(&mut self, path: &str, handler: H) -> Result<(), Error> {
        self.routing.patch(path, handler)
    }

    pub fn delete<M, H: IntoHandler<M>>(&mut self, path: &str, handler: H) -> Result<(), Error> {
        self.routing.delete(path, handler)
    }

    pub fn any<M, H: IntoHandler<M>>(&mut self, path: &str, handler: H) -> Result<(), Error> {
        self.routing.any(path, handler)
    }
}

impl Default for Application<Router> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Routing> Application<R> {
    /// Bare application over a custom routing layer.
    pub fn with_routing(routing: R) -> Self {
        let mut container = Container::new();
        container.bind(Logger::default());

        Self {
            container,
            befores: Vec::new(),
            handlers: Vec::new(),
            action: handler(|| ()).with_name("action"),
            not_found: default_not_found(),
            routing,
            url_prefix: String::new(),
        }
    }

    fn apply_config(&mut self, config: AppConfig) {
        self.container.bind(Logger::from_app_config(&config));
        if let Err(e) = self.set_url_prefix(config.url_prefix.clone()) {
            debug!(error = %e, "Ignoring configured URL prefix");
        }
        if config.log_level() != LogLevel::Off {
            self.handlers.push(request_logger());
        }
        self.handlers.push(recovery());
        if config.enable_gzip {
            self.handlers.push(gzip(config.force_gzip));
        }
        self.container.bind(config);
    }

    /// Bind a value for every request.
    pub fn bind<T: Send + Sync + 'static>(&mut self, value: T) -> &mut Self {
        self.container.bind(value);
        self
    }

    pub fn bind_as<T: ?Sized + Send + Sync + 'static>(&mut self, value: Arc<T>) -> &mut Self {
        self.container.bind_as(value);
        self
    }

    pub fn container(&self) -> &Container<'static> {
        &self.container
    }

    /// Settings bound by [`Application::with_config`], if any.
    pub fn config(&self) -> Option<Arc<AppConfig>> {
        self.container.resolve::<AppConfig>()
    }

    pub fn routing(&self) -> &R {
        &self.routing
    }

    pub fn routing_mut(&mut self) -> &mut R {
        &mut self.routing
    }

    /// Append a gate. Gates run in order; the first returning `true` ends
    /// the request before routing.
    pub fn before<F>(&mut self, gate: F) -> &mut Self
    where
        F: Fn(&Request, &ResponseWriter) -> bool + Send + Sync + 'static,
    {
        self.befores.push(Box::new(gate));
        self
    }

    /// Append a global handler; global handlers run before route handlers.
    pub fn use_handler<M, H: IntoHandler<M>>(&mut self, handler: H) -> &mut Self {
        let handler = handler.into_handler();
        debug!(handler = handler.name(), position = self.handlers.len(), "Global handler added");
        self.handlers.push(handler);
        self
    }

    /// Type-erased registration. Anything but a [`BoxedHandler`] is refused.
    pub fn try_use(&mut self, candidate: Box<dyn Any + Send + Sync>) -> Result<&mut Self, Error> {
        match candidate.downcast::<BoxedHandler>() {
            Ok(handler) => Ok(self.use_handler(*handler)),
            Err(_) => Err(Error::Registration(
                "handler must be a callable function (BoxedHandler)".to_string(),
            )),
        }
    }

    /// Replace the global handler list.
    pub fn set_handlers(&mut self, handlers: Vec<BoxedHandler>) -> &mut Self {
        self.handlers = handlers;
        self
    }

    pub fn handlers(&self) -> &[BoxedHandler] {
        &self.handlers
    }

    /// Terminal handler of every routed chain. Defaults to a no-op.
    pub fn action<M, H: IntoHandler<M>>(&mut self, handler: H) -> &mut Self {
        self.action = handler.into_handler();
        self
    }

    /// Terminal handler when nothing routes. Runs after the global handlers.
    pub fn not_found<M, H: IntoHandler<M>>(&mut self, handler: H) -> &mut Self {
        self.not_found = handler.into_handler();
        self
    }

    /// Strip `prefix` from request paths before anything else sees them.
    pub fn set_url_prefix(&mut self, prefix: impl Into<String>) -> Result<&mut Self, Error> {
        let prefix = prefix.into();
        let prefix = prefix.trim_end_matches('/');
        if !prefix.is_empty() && !prefix.starts_with('/') {
            return Err(Error::Registration(format!(
                "URL prefix must start with '/': {}",
                prefix
            )));
        }
        self.url_prefix = prefix.to_string();
        Ok(self)
    }

    pub fn url_prefix(&self) -> &str {
        &self.url_prefix
    }

    /// Handle one request, writing the response into `sink`.
    ///
    /// Returns the final chain state, or `ChainState::Pending` when a gate
    /// ended the request. On error the status of the error has already been
    /// written (unless a handler committed a response first); the error is
    /// returned for the transport's benefit. Either way the response is
    /// finished: a head nobody committed goes out as `200 OK` with whatever
    /// headers were set.
    pub fn serve(
        &self,
        request: Request,
        sink: impl ResponseSink + 'static,
    ) -> Result<ChainState, Error> {
        let response = ResponseWriter::new(sink);
        let span = info_span!(
            "request",
            method = %request.method(),
            path = %request.uri().path()
        );
        let _enter = span.enter();

        let outcome = self.dispatch(request, &response);
        if let Err(err) = response.finish() {
            error!(error = %err, "Failed to finish response");
        }
        outcome
    }

    fn dispatch(&self, request: Request, response: &ResponseWriter) -> Result<ChainState, Error> {
        let request = match self.strip_prefix(request) {
            Ok(request) => request,
            Err(err) => return self.fail(response, err),
        };

        for (position, gate) in self.befores.iter().enumerate() {
            match panic::catch_unwind(AssertUnwindSafe(|| gate(&request, response))) {
                Ok(false) => {}
                Ok(true) => {
                    debug!(gate = position, "Request ended by before gate");
                    return Ok(ChainState::Pending);
                }
                Err(payload) => return self.fail(response, caught("before", payload)),
            }
        }

        let (chain, params) = match self.routing.route(request.method(), request.uri().path()) {
            Some(found) => (
                Chain::new(
                    self.handlers.iter().cloned().chain(found.handlers),
                    self.action.clone(),
                ),
                found.params,
            ),
            None => {
                debug!("No route matched");
                (
                    Chain::new(self.handlers.iter().cloned(), self.not_found.clone()),
                    Params::new(),
                )
            }
        };

        let mut ctx = Context::new(&self.container, chain, request, response.clone(), params);
        match ctx.run() {
            Ok(()) => Ok(ctx.state()),
            Err(err) => self.fail(response, err),
        }
    }

    fn fail(&self, response: &ResponseWriter, err: Error) -> Result<ChainState, Error> {
        if err.is_server_error() {
            error!(error = %err, "Request failed");
        } else {
            debug!(error = %err, "Request rejected");
        }
        if let Err(write_err) = write_status_page(response, err.status_code()) {
            error!(error = %write_err, "Failed to write error response");
        }
        Err(err)
    }

    fn strip_prefix(&self, request: Request) -> Result<Request, Error> {
        if self.url_prefix.is_empty() {
            return Ok(request);
        }

        let path = request.uri().path();
        let Some(rest) = path.strip_prefix(self.url_prefix.as_str()) else {
            return Ok(request);
        };
        if !rest.is_empty() && !rest.starts_with('/') {
            return Ok(request);
        }

        let rest = if rest.is_empty() { "/" } else { rest };
        let path_and_query = match request.uri().query() {
            Some(query) => format!("{}?{}", rest, query),
            None => rest.to_string(),
        };

        let (mut parts, body) = request.into_parts();
        let mut uri_parts = parts.uri.into_parts();
        uri_parts.path_and_query = Some(
            PathAndQuery::try_from(path_and_query)
                .map_err(|e| Error::BadRequest(format!("invalid path: {}", e)))?,
        );
        parts.uri = Uri::from_parts(uri_parts)
            .map_err(|e| Error::BadRequest(format!("invalid uri: {}", e)))?;

        Ok(Request::from_parts(parts, body))
    }
}

fn default_not_found() -> BoxedHandler {
    handler(|response: ResponseWriter| -> Result<(), Error> {
        if response.written() {
            return Ok(());
        }
        response.write_header(StatusCode::NOT_FOUND)?;
        response.write(NOT_FOUND_BODY.as_bytes())?;
        Ok(())
    })
    .with_name("not_found")
}
