//! Panic containment and error routing.

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use serde_json::json;
use tracing::{error, warn};

use crate::context::Context;
use crate::handler::{ErrorHandler, Handler};

/// Error produced when a handler or middleware panics.
///
/// Displays as `panic: <payload>`. Error handlers can `downcast_ref` the
/// `anyhow::Error` they receive to tell panics from returned errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicError {
    pub message: String,
}

impl fmt::Display for PanicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panic: {}", self.message)
    }
}

impl std::error::Error for PanicError {}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Run `handler`, converting a panic into a [`PanicError`].
pub(crate) fn invoke(handler: &dyn Handler, ctx: &mut Context) -> anyhow::Result<()> {
    match catch_unwind(AssertUnwindSafe(|| handler.call(ctx))) {
        Ok(result) => result,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(
                method = %ctx.method(),
                path = %ctx.path(),
                panic_message = %message,
                "handler panicked"
            );
            Err(anyhow::Error::new(PanicError { message }))
        }
    }
}

/// Hand `err` to the error handler inside its own recovery boundary.
///
/// A panicking error handler is logged and swallowed. If it left no response
/// behind, a bare 500 is written so the request is still answered.
pub(crate) fn route_error(error_handler: &dyn ErrorHandler, ctx: &mut Context, err: &anyhow::Error) {
    let outcome = catch_unwind(AssertUnwindSafe(|| error_handler.handle(ctx, err)));
    if let Err(payload) = outcome {
        error!(
            method = %ctx.method(),
            path = %ctx.path(),
            original_error = %err,
            panic_message = %panic_message(payload.as_ref()),
            "error handler panicked"
        );
        if !ctx.response().is_written() {
            if let Err(e) =
                ctx.internal_server_error(&json!({ "error": "internal server error" }))
            {
                warn!(error = %e, "failed to write fallback error response");
            }
        }
    }
}

/// Default error handler: `500 {"error":"internal server error","details":"<message>"}`.
///
/// Leaves an already written response untouched.
pub fn default_error_handler(ctx: &mut Context, err: &anyhow::Error) {
    if ctx.response().is_written() {
        warn!(
            error = %err,
            status = ?ctx.response().wire_status(),
            "handler failed after writing a response"
        );
        return;
    }
    let body = json!({
        "error": "internal server error",
        "details": err.to_string(),
    });
    if let Err(e) = ctx.internal_server_error(&body) {
        warn!(error = %e, "failed to write error response");
    }
}
