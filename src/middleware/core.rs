use std::fmt;
use std::sync::Arc;

use crate::context::Context;
use crate::handler::{BoxHandler, Handler, HandlerResult};

/// Wraps a handler with cross-cutting behavior.
///
/// `wrap` runs once per route when the chain is assembled, never per request.
/// The returned handler decides whether, and when, to call `next`.
pub trait Middleware: Send + Sync {
    fn wrap(&self, next: BoxHandler) -> BoxHandler;
}

impl<F> Middleware for F
where
    F: Fn(BoxHandler) -> BoxHandler + Send + Sync,
{
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        self(next)
    }
}

pub type BoxMiddleware = Arc<dyn Middleware>;

/// Apply `chain` around `handler` so that `chain[0]` is outermost.
///
/// For `[m1, m2]` the result is `m1(m2(handler))`: `m1` sees the request
/// first and the response last.
pub fn compose(chain: &[BoxMiddleware], handler: BoxHandler) -> BoxHandler {
    chain
        .iter()
        .rev()
        .fold(handler, |next, middleware| middleware.wrap(next))
}

/// Build a middleware from a function receiving the context and the next handler.
///
/// ```rust
/// use brrtmux::middleware::from_fn;
///
/// let stamp = from_fn(|ctx, next| {
///     ctx.set("stamped", true);
///     next.call(ctx)
/// });
/// # let _ = stamp;
/// ```
pub fn from_fn<F>(f: F) -> FnMiddleware<F>
where
    F: Fn(&mut Context, &dyn Handler) -> HandlerResult + Send + Sync + 'static,
{
    FnMiddleware { f: Arc::new(f) }
}

/// Middleware returned by [`from_fn`].
pub struct FnMiddleware<F> {
    f: Arc<F>,
}

impl<F> fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnMiddleware")
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut Context, &dyn Handler) -> HandlerResult + Send + Sync + 'static,
{
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        Arc::new(FnLayer {
            f: Arc::clone(&self.f),
            next,
        })
    }
}

struct FnLayer<F> {
    f: Arc<F>,
    next: BoxHandler,
}

impl<F> Handler for FnLayer<F>
where
    F: Fn(&mut Context, &dyn Handler) -> HandlerResult + Send + Sync,
{
    fn call(&self, ctx: &mut Context) -> HandlerResult {
        (self.f)(ctx, self.next.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::boxed;
    use http::StatusCode;
    use parking_lot::Mutex;

    fn recorder(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> BoxMiddleware {
        let log = Arc::clone(log);
        Arc::new(from_fn(move |ctx, next| {
            log.lock().push(format!("before{name}"));
            let result = next.call(ctx);
            log.lock().push(format!("after{name}"));
            result
        }))
    }

    #[test]
    fn test_compose_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let inner_log = Arc::clone(&log);
        let handler = boxed(move |_: &mut Context| -> HandlerResult {
            inner_log.lock().push("handler".to_string());
            Ok(())
        });
        let chain = vec![recorder(&log, "1"), recorder(&log, "2")];
        let composed = compose(&chain, handler);

        let mut ctx = Context::new();
        composed.call(&mut ctx).unwrap();
        assert_eq!(
            *log.lock(),
            ["before1", "before2", "handler", "after2", "after1"]
        );
    }

    #[test]
    fn test_empty_chain_is_identity() {
        let handler = boxed(|ctx: &mut Context| ctx.status(StatusCode::ACCEPTED));
        let composed = compose(&[], Arc::clone(&handler));
        assert!(Arc::ptr_eq(&handler, &composed));
    }

    #[test]
    fn test_short_circuit_skips_rest() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let inner_log = Arc::clone(&log);
        let handler = boxed(move |_: &mut Context| -> HandlerResult {
            inner_log.lock().push("handler".to_string());
            Ok(())
        });
        let deny: BoxMiddleware = Arc::new(from_fn(|ctx, _next| {
            ctx.string(StatusCode::UNAUTHORIZED, "denied")
        }));
        let composed = compose(&[deny, recorder(&log, "2")], handler);

        let mut ctx = Context::new();
        composed.call(&mut ctx).unwrap();
        assert!(log.lock().is_empty());
        assert_eq!(ctx.response().status(), Some(StatusCode::UNAUTHORIZED));
    }

    #[test]
    fn test_closure_middleware() {
        let tag: BoxMiddleware = Arc::new(|next: BoxHandler| -> BoxHandler {
            boxed(move |ctx: &mut Context| {
                ctx.set("wrapped", true);
                next.call(ctx)
            })
        });
        let composed = compose(&[tag], boxed(|_: &mut Context| -> HandlerResult { Ok(()) }));
        let mut ctx = Context::new();
        composed.call(&mut ctx).unwrap();
        assert_eq!(ctx.get_bool("wrapped"), Ok(true));
    }
}
