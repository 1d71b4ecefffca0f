// Shallot - a small HTTP framework built around a type-keyed injector
//
// Requests run through an onion of handlers: each one may do work, hand
// control to the rest of the chain with `next()`, and do more work once the
// chain has unwound. Handler arguments are resolved from the injector.

// Re-export core functionality
pub use shallot_core::*;

// Settings loading
pub use shallot_config;

// Re-export optional crates
#[cfg(feature = "testing")]
pub use shallot_testing;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        AppConfig, Application, ChainState, Container, Context, Error, Inject, IntoReply, Json,
        LogLevel, Logger, Params, Render, Renderer, Reply, Req, ResponseWriter, RunMode, gzip,
        handler, recovery, request_logger,
    };
    pub use http::{Method, StatusCode};
}
