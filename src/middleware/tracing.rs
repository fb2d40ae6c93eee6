use std::sync::Arc;
use std::time::Instant;

use http::StatusCode;
use tracing::{info, info_span, warn};

use super::Middleware;
use crate::context::Context;
use crate::handler::{BoxHandler, Handler, HandlerResult};

/// Request logger: one `info` event per request inside a `request` span.
///
/// Emits method, path, status, response size and latency. A handler that
/// returned an error is logged at `warn`; its response is written later by
/// the error handler, so the status recorded here may still be unset.
#[derive(Debug, Clone, Copy, Default)]
pub struct Logger;

impl Logger {
    pub fn new() -> Self {
        Self
    }
}

impl Middleware for Logger {
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        Arc::new(LoggerLayer { next })
    }
}

struct LoggerLayer {
    next: BoxHandler,
}

impl Handler for LoggerLayer {
    fn call(&self, ctx: &mut Context) -> HandlerResult {
        let span = info_span!("request", method = %ctx.method(), path = %ctx.path());
        let _guard = span.enter();
        let start = Instant::now();

        let result = self.next.call(ctx);

        let latency_us = u64::try_from(start.elapsed().as_micros()).unwrap_or(u64::MAX);
        let size = ctx.response().size();
        match &result {
            Ok(()) => {
                let status = ctx.response().wire_status().unwrap_or(StatusCode::OK);
                info!(
                    method = %ctx.method(),
                    path = %ctx.path(),
                    status = status.as_u16(),
                    size,
                    latency_us,
                    "request completed"
                );
            }
            Err(err) => {
                warn!(
                    method = %ctx.method(),
                    path = %ctx.path(),
                    size,
                    latency_us,
                    error = %err,
                    "request failed"
                );
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::boxed;
    use crate::middleware::compose;

    #[test]
    fn test_logger_passes_result_through() {
        let mw: Vec<crate::middleware::BoxMiddleware> = vec![Arc::new(Logger::new())];
        let ok = compose(&mw, boxed(|ctx: &mut Context| ctx.status(StatusCode::CREATED)));
        let mut ctx = Context::new();
        ok.call(&mut ctx).unwrap();
        assert_eq!(ctx.response().status(), Some(StatusCode::CREATED));

        let failing = compose(
            &mw,
            boxed(|_: &mut Context| -> HandlerResult { Err(anyhow::anyhow!("nope")) }),
        );
        let mut ctx = Context::new();
        let err = failing.call(&mut ctx).unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }
}
