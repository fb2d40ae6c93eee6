//! Handler abstractions shared by routes, middleware and the dispatcher.

use std::sync::Arc;

use crate::context::Context;

/// Outcome of a handler. Errors are routed to the dispatcher's error handler.
pub type HandlerResult = anyhow::Result<()>;

/// Processes one request through its [`Context`].
pub trait Handler: Send + Sync {
    fn call(&self, ctx: &mut Context) -> HandlerResult;
}

impl<F> Handler for F
where
    F: Fn(&mut Context) -> HandlerResult + Send + Sync,
{
    fn call(&self, ctx: &mut Context) -> HandlerResult {
        self(ctx)
    }
}

/// Shared, type-erased handler as stored in the route table.
pub type BoxHandler = Arc<dyn Handler>;

/// Wrap a handler for storage in the route table.
pub fn boxed<H: Handler + 'static>(handler: H) -> BoxHandler {
    Arc::new(handler)
}

/// Receives every error a handler returned or a panic was converted into.
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, ctx: &mut Context, err: &anyhow::Error);
}

impl<F> ErrorHandler for F
where
    F: Fn(&mut Context, &anyhow::Error) + Send + Sync,
{
    fn handle(&self, ctx: &mut Context, err: &anyhow::Error) {
        self(ctx, err);
    }
}
