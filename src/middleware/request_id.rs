use std::sync::Arc;

use super::Middleware;
use crate::context::Context;
use crate::handler::{BoxHandler, Handler, HandlerResult};
use crate::ids;

/// Default header carrying the request id.
pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Propagates a request id.
///
/// Reads the configured header from the request, generating a ULID when it
/// is absent or empty, echoes it as a response header and stores it as a
/// context local under the header name.
#[derive(Debug, Clone)]
pub struct RequestId {
    header: Arc<str>,
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestId {
    pub fn new() -> Self {
        Self::with_header(REQUEST_ID_HEADER)
    }

    pub fn with_header(header: &str) -> Self {
        Self {
            header: Arc::from(header),
        }
    }
}

impl Middleware for RequestId {
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        Arc::new(RequestIdLayer {
            header: Arc::clone(&self.header),
            next,
        })
    }
}

struct RequestIdLayer {
    header: Arc<str>,
    next: BoxHandler,
}

impl Handler for RequestIdLayer {
    fn call(&self, ctx: &mut Context) -> HandlerResult {
        let id = match ctx.header(&self.header).map(str::trim) {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => ids::RequestId::new().to_string(),
        };
        ctx.set_header(&self.header, &id)?;
        ctx.set(&self.header, id);
        self.next.call(ctx)
    }
}
