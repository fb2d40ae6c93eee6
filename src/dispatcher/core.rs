use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use http::header::{HeaderValue, ALLOW};
use http::Method;
use serde_json::json;
use tracing::{debug, error, warn};

use super::recovery::{self, panic_message};
use crate::context::{Context, ContextPool, PoolStats};
use crate::handler::{BoxHandler, ErrorHandler, HandlerResult};
use crate::router::radix::{Lookup, RadixTree};
use crate::router::ParamVec;
use crate::runtime_config::DispatcherConfig;
use crate::server::{CapturedResponse, Request, ResponseSink};

/// Outcome of resolving a (method, path) pair, without running anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Matched { pattern: String, params: ParamVec },
    /// The path exists under other methods, sorted alphabetically.
    PathExists { allowed: Vec<Method> },
    NoMatch,
}

/// Frozen route table plus the default handlers and the context pool.
///
/// Built by [`Router::build`](crate::Router::build). Immutable and shared
/// across worker threads behind an `Arc`; the pool is the only state touched
/// per request.
pub struct Dispatcher {
    tree: RadixTree<BoxHandler>,
    not_found: BoxHandler,
    method_not_allowed: BoxHandler,
    error_handler: Arc<dyn ErrorHandler>,
    pool: Arc<ContextPool>,
    config: DispatcherConfig,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.tree.len())
            .field("pool", &self.pool.stats())
            .field("config", &self.config)
            .finish()
    }
}

pub(crate) struct DispatcherParts {
    pub tree: RadixTree<BoxHandler>,
    pub not_found: BoxHandler,
    pub method_not_allowed: BoxHandler,
    pub error_handler: Arc<dyn ErrorHandler>,
    pub config: DispatcherConfig,
}

impl Dispatcher {
    pub(crate) fn from_parts(parts: DispatcherParts) -> Self {
        Self {
            pool: ContextPool::new(parts.config.pool_capacity),
            tree: parts.tree,
            not_found: parts.not_found,
            method_not_allowed: parts.method_not_allowed,
            error_handler: parts.error_handler,
            config: parts.config,
        }
    }

    /// Serve one request, writing exactly one response to `sink`.
    ///
    /// Never panics: handler and error-handler panics are contained, and sink
    /// failures are logged.
    pub fn serve(&self, req: Request, sink: &mut dyn ResponseSink) {
        let mut ctx = self.pool.acquire();
        ctx.attach(req, self.config.max_body_bytes);

        let handler = self.select(&mut ctx);
        if let Err(err) = recovery::invoke(handler.as_ref(), &mut ctx) {
            error!(
                method = %ctx.method(),
                path = %ctx.path(),
                error = %err,
                "request handler failed"
            );
            recovery::route_error(self.error_handler.as_ref(), &mut ctx, &err);
        }

        match catch_unwind(AssertUnwindSafe(|| ctx.response().flush_to(sink))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(
                method = %ctx.method(),
                path = %ctx.path(),
                error = %e,
                "failed to write response"
            ),
            Err(payload) => error!(
                panic_message = %panic_message(payload.as_ref()),
                "response sink panicked"
            ),
        }
    }

    /// Serve `req` into an in-memory [`CapturedResponse`].
    pub fn handle(&self, req: Request) -> CapturedResponse {
        let mut captured = CapturedResponse::new();
        self.serve(req, &mut captured);
        captured
    }

    /// Pick the handler for the request and prime the context for it.
    fn select(&self, ctx: &mut Context) -> BoxHandler {
        match self.tree.lookup(ctx.method(), ctx.path()) {
            Lookup::Matched { endpoint, params } => {
                debug!(
                    method = %ctx.method(),
                    path = %ctx.path(),
                    pattern = %endpoint.pattern,
                    "route matched"
                );
                ctx.set_params(params);
                Arc::clone(&endpoint.value)
            }
            Lookup::PathExists { allowed } => {
                let allow = join_methods(&allowed);
                debug!(
                    method = %ctx.method(),
                    path = %ctx.path(),
                    allow = %allow,
                    "method not allowed"
                );
                match HeaderValue::from_str(&allow) {
                    Ok(value) => ctx.response_mut().set_header(ALLOW, value),
                    Err(e) => warn!(error = %e, "invalid Allow header"),
                }
                Arc::clone(&self.method_not_allowed)
            }
            Lookup::NoMatch => {
                debug!(method = %ctx.method(), path = %ctx.path(), "no route matched");
                Arc::clone(&self.not_found)
            }
        }
    }

    /// Resolve without invoking any handler.
    pub fn resolve(&self, method: &Method, path: &str) -> Resolution {
        match self.tree.lookup(method, path) {
            Lookup::Matched { endpoint, params } => Resolution::Matched {
                pattern: endpoint.pattern.to_string(),
                params,
            },
            Lookup::PathExists { allowed } => Resolution::PathExists { allowed },
            Lookup::NoMatch => Resolution::NoMatch,
        }
    }

    /// Registered (method, pattern) pairs.
    pub fn routes(&self) -> Vec<(Method, String)> {
        self.tree
            .entries()
            .into_iter()
            .map(|(m, e)| (m.clone(), e.pattern.to_string()))
            .collect()
    }

    #[must_use]
    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    #[must_use]
    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }
}

/// Methods joined the way the `Allow` header lists them.
pub fn join_methods(methods: &[Method]) -> String {
    methods
        .iter()
        .map(Method::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Default not-found handler: `404 {"error":"not found"}`.
pub fn default_not_found(ctx: &mut Context) -> HandlerResult {
    ctx.not_found(&json!({ "error": "not found" }))
}

/// Default method-not-allowed handler: `405 {"error":"method not allowed"}`.
pub fn default_method_not_allowed(ctx: &mut Context) -> HandlerResult {
    ctx.method_not_allowed(&json!({ "error": "method not allowed" }))
}
