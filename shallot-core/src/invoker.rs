// Invocation of a single handler: panic isolation, error attribution, reply

use crate::Error;
use crate::context::Context;
use crate::handler::BoxedHandler;
use crate::logging::{error, trace};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Run `handler` against `ctx` and apply what it returned.
///
/// A panic in the handler or while its reply is written (a bound `Renderer`,
/// for one) is caught here and surfaces as `HandlerPanic`, so upstream
/// handlers observe it through the `Result` of their `next()`.
pub(crate) fn invoke(handler: &BoxedHandler, ctx: &mut Context<'_>) -> Result<(), Error> {
    let name = handler.name();
    trace!(handler = name, index = ctx.index(), "Invoking handler");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let reply = handler.call(ctx)?;
        reply.apply(ctx)
    }));

    match outcome {
        Ok(result) => result.map_err(|e| e.attribute(name)),
        Err(payload) => Err(caught(name, payload)),
    }
}

/// Log a caught panic and turn it into `HandlerPanic`.
pub(crate) fn caught(name: &'static str, payload: Box<dyn Any + Send>) -> Error {
    let message = panic_message(payload.as_ref());
    error!(handler = name, panic = %message, "Handler panicked");
    Error::HandlerPanic {
        handler: name,
        message,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
