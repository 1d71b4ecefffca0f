// Per-request execution context and chain control

use crate::Error;
use crate::container::Container;
use crate::handler::Chain;
use crate::invoker;
use crate::logging::{debug, trace};
use crate::request::{Params, Request};
use crate::response::ResponseWriter;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Where a context is in running its chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    /// Not run yet.
    Pending,
    /// Inside `run`.
    Running,
    /// The terminal action was reached.
    Completed,
    /// The chain stopped before the action: a handler returned without
    /// calling `next`, or wrote a response.
    EarlyExit,
    /// `run` returned an error.
    Faulted,
}

/// Everything one request's handlers share.
///
/// Owns a container forked from the application container, so bindings made
/// here shadow application bindings for this request only. Handlers that take
/// `&mut Context` drive the chain with [`Context::next`]; one that returns
/// without calling it ends the chain there. Handlers without a context move
/// on to the next handler by themselves unless they wrote to the response.
///
/// ```
/// use shallot_core::{handler, Chain, Container, Context, Recorder, ResponseWriter};
///
/// let app = Container::new();
/// let chain = Chain::new(
///     vec![handler(|ctx: &mut Context<'_>| -> Result<(), shallot_core::Error> {
///         ctx.response().write(b"<")?;
///         ctx.next()?;
///         ctx.response().write(b">")?;
///         Ok(())
///     })],
///     handler(|| "action"),
/// );
/// let recorder = Recorder::new();
/// let request = http::Request::new(bytes::Bytes::new());
/// let response = ResponseWriter::new(recorder.clone());
/// let mut ctx = Context::new(&app, chain, request, response, Default::default());
/// ctx.run().unwrap();
///
/// assert_eq!(recorder.body_string(), "<action>");
/// ```
pub struct Context<'a> {
    container: Container<'a>,
    chain: Chain,
    index: usize,
    state: ChainState,
    action_reached: bool,
    request: Arc<Request>,
    response: ResponseWriter,
    params: Params,
    data: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl<'a> Context<'a> {
    pub fn new(
        parent: &'a Container<'a>,
        chain: Chain,
        request: Request,
        response: ResponseWriter,
        params: Params,
    ) -> Self {
        let request = Arc::new(request);
        let mut container = Container::fork(parent);
        container.bind_as::<Request>(request.clone());
        container.bind(response.clone());
        container.bind(params.clone());

        Self {
            container,
            chain,
            index: 0,
            state: ChainState::Pending,
            action_reached: false,
            request,
            response,
            params,
            data: HashMap::new(),
        }
    }

    /// Run the chain from the first handler. A context runs once.
    pub fn run(&mut self) -> Result<(), Error> {
        if self.state != ChainState::Pending {
            return Err(Error::Internal(format!(
                "context already run (state {:?})",
                self.state
            )));
        }
        self.state = ChainState::Running;

        let result = if self.chain.is_empty() {
            Ok(())
        } else {
            self.invoke_current()
        };

        self.state = match &result {
            Err(_) => ChainState::Faulted,
            Ok(()) if self.action_reached => ChainState::Completed,
            Ok(()) => ChainState::EarlyExit,
        };
        debug!(
            state = ?self.state,
            handlers = self.chain.len(),
            reached = self.index,
            "Chain finished"
        );
        result
    }

    /// Advance to the next handler and run it, returning once everything
    /// downstream has unwound. Past the end this does nothing.
    pub fn next(&mut self) -> Result<(), Error> {
        if self.index + 1 >= self.chain.len() {
            self.index = self.chain.len();
            trace!("next() past the end of the chain");
            return Ok(());
        }
        self.index += 1;
        self.invoke_current()
    }

    fn invoke_current(&mut self) -> Result<(), Error> {
        let Some(handler) = self.chain.get(self.index).cloned() else {
            return Ok(());
        };
        if self.index + 1 == self.chain.len() {
            self.action_reached = true;
        }
        invoker::invoke(&handler, self)?;

        // A plain handler cannot call next; it passes control on unless it wrote.
        if handler.continues() && !self.response.written() {
            return self.next();
        }
        Ok(())
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    /// Cursor position in the chain.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Whether the response status has been committed.
    pub fn written(&self) -> bool {
        self.response.written()
    }

    pub fn container(&self) -> &Container<'a> {
        &self.container
    }

    /// Bind for the rest of this request, shadowing any application binding.
    pub fn bind<T: Send + Sync + 'static>(&mut self, value: T) {
        self.container.bind(value);
    }

    pub fn bind_as<T: ?Sized + Send + Sync + 'static>(&mut self, value: Arc<T>) {
        self.container.bind_as(value);
    }

    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.container.resolve::<T>()
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub(crate) fn request_arc(&self) -> Arc<Request> {
        self.request.clone()
    }

    pub fn response(&self) -> &ResponseWriter {
        &self.response
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Store a value in the request's key/value bag.
    pub fn set_data<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.data.insert(key.into(), Box::new(value));
    }

    /// `None` when the key is absent or holds another type.
    pub fn data<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.data.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn data_mut<T: Any + Send + Sync>(&mut self, key: &str) -> Option<&mut T> {
        self.data.get_mut(key).and_then(|v| v.downcast_mut::<T>())
    }

    pub fn remove_data<T: Any + Send + Sync>(&mut self, key: &str) -> Option<T> {
        let value = self.data.remove(key)?;
        match value.downcast::<T>() {
            Ok(value) => Some(*value),
            Err(value) => {
                self.data.insert(key.to_string(), value);
                None
            }
        }
    }
}

impl std::fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("method", self.request.method())
            .field("path", &self.request.uri().path())
            .field("index", &self.index)
            .field("chain", &self.chain.len())
            .field("state", &self.state)
            .finish()
    }
}
