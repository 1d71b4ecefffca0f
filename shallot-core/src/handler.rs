// Handler registration and type-directed invocation
//
// A handler is any `Fn` whose parameters all implement `FromContext`, with
// an optional leading `&mut Context`. The argument types are captured by the
// `IntoHandler` impl chosen at registration time; at request time each one is
// pulled out of the context's container chain, the function is called, and
// its return value is classified through `IntoReply`.

use crate::Error;
use crate::context::Context;
use crate::extractors::FromContext;
use crate::reply::{IntoReply, Reply};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Something that can run against a request context.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, ctx: &mut Context<'_>) -> Result<Reply, Error>;
}

/// Wraps a closure that already speaks the erased calling convention.
struct FnHandler<F> {
    f: F,
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&mut Context<'_>) -> Result<Reply, Error> + Send + Sync + 'static,
{
    #[inline]
    fn call(&self, ctx: &mut Context<'_>) -> Result<Reply, Error> {
        (self.f)(ctx)
    }
}

/// Type-erased, cheaply clonable handler.
#[derive(Clone)]
pub struct BoxedHandler {
    inner: Arc<dyn Handler>,
    name: &'static str,
    continues: bool,
}

impl BoxedHandler {
    pub fn new<H: Handler>(handler: H) -> Self {
        Self {
            inner: Arc::new(handler),
            name: std::any::type_name::<H>(),
            continues: false,
        }
    }

    pub fn from_fn<F>(name: &'static str, f: F) -> Self
    where
        F: Fn(&mut Context<'_>) -> Result<Reply, Error> + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(FnHandler { f }),
            name,
            continues: false,
        }
    }

    fn continuing(mut self) -> Self {
        self.continues = true;
        self
    }

    /// Name used in logs and in `DependencyUnsatisfied` / `HandlerPanic`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Whether the chain moves on by itself after this handler returns
    /// without writing. True for handlers that take no `&mut Context` and so
    /// cannot call `next`.
    pub fn continues(&self) -> bool {
        self.continues
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Call without panic isolation or reply handling. The chain goes
    /// through the invoker instead.
    #[inline]
    pub fn call(&self, ctx: &mut Context<'_>) -> Result<Reply, Error> {
        self.inner.call(ctx)
    }
}

impl fmt::Debug for BoxedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoxedHandler")
            .field("name", &self.name)
            .field("continues", &self.continues)
            .finish()
    }
}

/// Conversion into a [`BoxedHandler`]. `M` only exists to keep the impls for
/// different function shapes apart; it is always inferred.
pub trait IntoHandler<M>: Send + Sync + 'static {
    fn into_handler(self) -> BoxedHandler;
}

/// Marker for functions taking only extractors.
pub struct Plain<Args>(PhantomData<fn() -> Args>);

/// Marker for functions taking `&mut Context` followed by extractors.
pub struct WithContext<Args>(PhantomData<fn() -> Args>);

/// Marker for types implementing [`Handler`] directly.
pub struct Direct;

/// Marker for handlers that are already boxed.
pub struct Erased;

impl IntoHandler<Erased> for BoxedHandler {
    fn into_handler(self) -> BoxedHandler {
        self
    }
}

impl<H: Handler> IntoHandler<Direct> for H {
    fn into_handler(self) -> BoxedHandler {
        BoxedHandler::new(self)
    }
}

macro_rules! impl_into_handler {
    ($($arg:ident),*) => {
        #[allow(non_snake_case, unused_variables)]
        impl<F, R, $($arg,)*> IntoHandler<Plain<($($arg,)*)>> for F
        where
            F: Fn($($arg),*) -> R + Send + Sync + 'static,
            R: IntoReply,
            $($arg: FromContext + 'static,)*
        {
            fn into_handler(self) -> BoxedHandler {
                BoxedHandler::from_fn(std::any::type_name::<F>(), move |ctx: &mut Context<'_>| {
                    $(let $arg = $arg::from_context(ctx)?;)*
                    (self)($($arg),*).into_reply()
                })
                .continuing()
            }
        }

        #[allow(non_snake_case, unused_variables)]
        impl<F, R, $($arg,)*> IntoHandler<WithContext<($($arg,)*)>> for F
        where
            F: for<'c, 'a> Fn(&'c mut Context<'a>, $($arg),*) -> R + Send + Sync + 'static,
            R: IntoReply,
            $($arg: FromContext + 'static,)*
        {
            fn into_handler(self) -> BoxedHandler {
                BoxedHandler::from_fn(std::any::type_name::<F>(), move |ctx: &mut Context<'_>| {
                    $(let $arg = $arg::from_context(ctx)?;)*
                    (self)(ctx, $($arg),*).into_reply()
                })
            }
        }
    };
}

impl_into_handler!();
impl_into_handler!(A1);
impl_into_handler!(A1, A2);
impl_into_handler!(A1, A2, A3);
impl_into_handler!(A1, A2, A3, A4);
impl_into_handler!(A1, A2, A3, A4, A5);
impl_into_handler!(A1, A2, A3, A4, A5, A6);
impl_into_handler!(A1, A2, A3, A4, A5, A6, A7);
impl_into_handler!(A1, A2, A3, A4, A5, A6, A7, A8);

/// Box any supported handler shape.
///
/// ```
/// use shallot_core::{handler, Context, Inject, Logger};
///
/// let action = handler(|| "hello");
/// let with_logger = handler(|log: Inject<Logger>| log.info("hit"));
/// let middleware = handler(|ctx: &mut Context<'_>| ctx.next());
/// # let _ = (action, with_logger, middleware);
/// ```
#[inline]
pub fn handler<M, H>(h: H) -> BoxedHandler
where
    H: IntoHandler<M>,
{
    h.into_handler()
}

/// Ordered handlers of one request: global handlers, route handlers, and the
/// terminal action last.
#[derive(Clone, Debug, Default)]
pub struct Chain {
    handlers: Vec<BoxedHandler>,
}

impl Chain {
    pub fn new(handlers: impl IntoIterator<Item = BoxedHandler>, action: BoxedHandler) -> Self {
        let mut handlers: Vec<BoxedHandler> = handlers.into_iter().collect();
        handlers.push(action);
        Self { handlers }
    }

    /// A chain without a distinguished action; the last handler plays its part.
    pub fn from_handlers(handlers: Vec<BoxedHandler>) -> Self {
        Self { handlers }
    }

    pub fn get(&self, index: usize) -> Option<&BoxedHandler> {
        self.handlers.get(index)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.iter().map(BoxedHandler::name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed;

    impl Handler for Fixed {
        fn call(&self, _ctx: &mut Context<'_>) -> Result<Reply, Error> {
            Ok(Reply::Empty)
        }
    }

    #[test]
    fn test_names() {
        let h = handler(Fixed);
        assert!(h.name().ends_with("Fixed"));
        assert_eq!(h.with_name("fixed").name(), "fixed");
    }

    #[test]
    fn test_boxed_handler_passes_through() {
        let h = handler(|| ()).with_name("noop");
        let again = handler(h.clone());
        assert_eq!(again.name(), "noop");
    }

    #[test]
    fn test_only_plain_functions_continue() {
        assert!(handler(|| ()).continues());
        assert!(handler(|_p: crate::request::Params| ()).continues());
        assert!(!handler(|ctx: &mut Context<'_>| ctx.next()).continues());
        assert!(!handler(Fixed).continues());
        assert!(handler(handler(|| ()).with_name("renamed")).continues());
    }

    #[test]
    fn test_chain_puts_action_last() {
        let chain = Chain::new(
            vec![handler(|| ()).with_name("a"), handler(|| ()).with_name("b")],
            handler(|| ()).with_name("action"),
        );
        assert_eq!(chain.len(), 3);
        assert_eq!(chain.names().collect::<Vec<_>>(), ["a", "b", "action"]);
    }

    #[test]
    fn test_handler_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BoxedHandler>();
        assert_send_sync::<Chain>();
    }
}
