// Classification of handler return values

use crate::Error;
use crate::context::Context;
use crate::logging::trace;
use crate::render::{Render, Renderer};
use bytes::Bytes;
use http::StatusCode;

/// What a handler's return value asks the runtime to do.
#[derive(Debug)]
pub enum Reply {
    /// Nothing to write.
    Empty,
    /// Raw body bytes, optionally preceded by a status.
    Bytes {
        status: Option<StatusCode>,
        body: Bytes,
    },
    /// Hand off to the [`Renderer`] bound in the container.
    Render(Render),
}

impl Reply {
    pub fn bytes(body: impl Into<Bytes>) -> Self {
        Reply::Bytes {
            status: None,
            body: body.into(),
        }
    }

    pub fn with_status(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Reply::Bytes {
            status: Some(status),
            body: body.into(),
        }
    }

    pub(crate) fn apply(self, ctx: &Context<'_>) -> Result<(), Error> {
        match self {
            Reply::Empty => Ok(()),
            Reply::Bytes { status, body } => {
                let response = ctx.response();
                if let Some(status) = status {
                    response.write_header(status)?;
                }
                response.write(&body)?;
                trace!(bytes = body.len(), "Handler reply written");
                Ok(())
            }
            Reply::Render(render) => {
                let renderer = ctx
                    .resolve::<dyn Renderer>()
                    .ok_or_else(Error::unsatisfied::<dyn Renderer>)?;
                trace!(template = %render.template, "Handing reply to renderer");
                renderer.render(&render, ctx.response())
            }
        }
    }
}

/// Conversion of a handler's return value into a [`Reply`].
pub trait IntoReply {
    fn into_reply(self) -> Result<Reply, Error>;
}

impl IntoReply for Reply {
    fn into_reply(self) -> Result<Reply, Error> {
        Ok(self)
    }
}

impl IntoReply for () {
    fn into_reply(self) -> Result<Reply, Error> {
        Ok(Reply::Empty)
    }
}

impl IntoReply for Bytes {
    fn into_reply(self) -> Result<Reply, Error> {
        Ok(Reply::bytes(self))
    }
}

impl IntoReply for Vec<u8> {
    fn into_reply(self) -> Result<Reply, Error> {
        Ok(Reply::bytes(self))
    }
}

impl IntoReply for String {
    fn into_reply(self) -> Result<Reply, Error> {
        Ok(Reply::bytes(self))
    }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> Result<Reply, Error> {
        Ok(Reply::bytes(self))
    }
}

impl IntoReply for &'static [u8] {
    fn into_reply(self) -> Result<Reply, Error> {
        Ok(Reply::bytes(self))
    }
}

impl IntoReply for StatusCode {
    fn into_reply(self) -> Result<Reply, Error> {
        Ok(Reply::with_status(self, Bytes::new()))
    }
}

impl<B: Into<Bytes>> IntoReply for (StatusCode, B) {
    fn into_reply(self) -> Result<Reply, Error> {
        Ok(Reply::with_status(self.0, self.1))
    }
}

impl IntoReply for Render {
    fn into_reply(self) -> Result<Reply, Error> {
        Ok(Reply::Render(self))
    }
}

impl<T: IntoReply> IntoReply for Option<T> {
    fn into_reply(self) -> Result<Reply, Error> {
        match self {
            Some(value) => value.into_reply(),
            None => Ok(Reply::Empty),
        }
    }
}

impl<T, E> IntoReply for Result<T, E>
where
    T: IntoReply,
    E: Into<Error>,
{
    fn into_reply(self) -> Result<Reply, Error> {
        match self {
            Ok(value) => value.into_reply(),
            Err(err) => Err(err.into()),
        }
    }
}
