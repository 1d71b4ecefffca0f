//! Handler parameter extractors
//!
//! Every parameter of a handler is produced by [`FromContext`]. The central
//! one is [`Inject<T>`], which resolves `T` from the request container and
//! its parents; the rest expose the request itself.
//!
//! ```
//! use shallot_core::{Inject, Params, Req};
//!
//! struct Repo;
//! impl Repo {
//!     fn title(&self, id: &str) -> String {
//!         format!("post {id}")
//!     }
//! }
//!
//! fn show(repo: Inject<Repo>, params: Params, req: Req) -> String {
//!     let id = params.get("id").unwrap_or("0");
//!     format!("{} {}", req.method(), repo.title(id))
//! }
//! # let _ = shallot_core::handler(show);
//! ```

use crate::Error;
use crate::context::Context;
use crate::request::{Params, Request, json_body};
use crate::response::ResponseWriter;
use serde::de::DeserializeOwned;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

/// Produces a handler argument from the active context.
pub trait FromContext: Sized {
    fn from_context(ctx: &Context<'_>) -> Result<Self, Error>;
}

/// A value resolved from the container chain.
///
/// Fails with `DependencyUnsatisfied` when nothing is bound for `T`; wrap it
/// in `Option` to make the dependency optional.
pub struct Inject<T: ?Sized>(pub Arc<T>);

impl<T: ?Sized> Inject<T> {
    pub fn into_inner(self) -> Arc<T> {
        self.0
    }
}

impl<T: ?Sized> Deref for Inject<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: ?Sized> Clone for Inject<T> {
    fn clone(&self) -> Self {
        Inject(self.0.clone())
    }
}

impl<T: ?Sized + fmt::Debug> fmt::Debug for Inject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Inject").field(&&*self.0).finish()
    }
}

impl<T: ?Sized + Send + Sync + 'static> FromContext for Inject<T> {
    fn from_context(ctx: &Context<'_>) -> Result<Self, Error> {
        ctx.resolve::<T>()
            .map(Inject)
            .ok_or_else(Error::unsatisfied::<T>)
    }
}

/// Optional extraction: a missing dependency yields `None`, any other
/// failure still propagates.
impl<T: FromContext> FromContext for Option<T> {
    fn from_context(ctx: &Context<'_>) -> Result<Self, Error> {
        match T::from_context(ctx) {
            Ok(value) => Ok(Some(value)),
            Err(Error::DependencyUnsatisfied { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// The inbound request.
#[derive(Clone, Debug)]
pub struct Req(pub Arc<Request>);

impl Deref for Req {
    type Target = Request;

    fn deref(&self) -> &Request {
        &self.0
    }
}

impl FromContext for Req {
    fn from_context(ctx: &Context<'_>) -> Result<Self, Error> {
        Ok(Req(ctx.request_arc()))
    }
}

impl FromContext for ResponseWriter {
    fn from_context(ctx: &Context<'_>) -> Result<Self, Error> {
        Ok(ctx.response().clone())
    }
}

impl FromContext for Params {
    fn from_context(ctx: &Context<'_>) -> Result<Self, Error> {
        Ok(ctx.params().clone())
    }
}

/// The request body deserialized from JSON. A malformed body is a
/// `BadRequest`.
#[derive(Debug, Clone)]
pub struct Json<T>(pub T);

impl<T> Deref for Json<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: DeserializeOwned> FromContext for Json<T> {
    fn from_context(ctx: &Context<'_>) -> Result<Self, Error> {
        json_body(ctx.request()).map(Json)
    }
}
