//! Core of the Shallot request runtime.
//!
//! Every request gets a [`Context`]: a [`Container`] forked from the
//! application container, the chain of handlers to run, and a
//! [`ResponseWriter`] that knows whether anything has been written. Handlers
//! are plain functions whose parameters are resolved from the container by
//! type; those that take `&mut Context` drive the chain with
//! [`Context::next`] and see everything downstream unwind before they
//! continue.

pub mod application;
pub mod container;
pub mod context;
pub mod error;
pub mod extractors;
pub mod handler;
mod invoker;
pub mod logging;
pub mod middleware;
pub mod render;
pub mod reply;
pub mod request;
pub mod response;
pub mod routing;
pub mod server;

pub use application::{Application, BeforeHandler, NOT_FOUND_BODY};
pub use container::Container;
pub use context::{ChainState, Context};
pub use error::Error;
pub use extractors::{FromContext, Inject, Json, Req};
pub use handler::{BoxedHandler, Chain, Handler, IntoHandler, handler};
pub use logging::{LogConfig, LogFormat, LogOutput, Logger, Rotation};
pub use middleware::{gzip, recovery, request_logger};
pub use render::{JsonRenderer, Render, Renderer};
pub use reply::{IntoReply, Reply};
pub use request::{Params, RemoteAddr, Request, json_body, remote_addr};
pub use response::{Recorder, ResponseSink, ResponseWriter};
pub use routing::{RouteMatch, Router, Routing};

pub use shallot_config::{AppConfig, LogLevel, RunMode};

/// Result alias used throughout the runtime.
pub type Result<T> = std::result::Result<T, Error>;
