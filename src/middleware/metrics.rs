use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use http::StatusCode;

use super::Middleware;
use crate::context::Context;
use crate::handler::{BoxHandler, Handler, HandlerResult};

/// Middleware collecting request counters.
///
/// Tracks request count, average latency and 4xx / 5xx responses with atomic
/// counters. Clones share the same counters, so keep one clone to read them
/// after handing another to the router.
///
/// A handler returning an error is counted as a 5xx: its response is written
/// later by the error handler.
#[derive(Debug, Clone, Default)]
pub struct MetricsMiddleware {
    inner: Arc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    request_count: AtomicU64,
    total_latency_ns: AtomicU64,
    client_errors: AtomicU64,
    server_errors: AtomicU64,
}

impl MetricsMiddleware {
    /// Create a new metrics middleware with all counters initialized to zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the total number of requests processed
    pub fn request_count(&self) -> u64 {
        self.inner.request_count.load(Ordering::Relaxed)
    }

    /// Calculate the average request latency
    ///
    /// Returns zero duration if no requests have been processed yet.
    pub fn average_latency(&self) -> Duration {
        let count = self.request_count();
        if count == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(self.inner.total_latency_ns.load(Ordering::Relaxed) / count)
        }
    }

    /// Responses with a 4xx status
    pub fn client_errors(&self) -> u64 {
        self.inner.client_errors.load(Ordering::Relaxed)
    }

    /// Responses with a 5xx status, plus handler errors
    pub fn server_errors(&self) -> u64 {
        self.inner.server_errors.load(Ordering::Relaxed)
    }
}

impl Middleware for MetricsMiddleware {
    fn wrap(&self, next: BoxHandler) -> BoxHandler {
        Arc::new(MetricsLayer {
            counters: Arc::clone(&self.inner),
            next,
        })
    }
}

struct MetricsLayer {
    counters: Arc<Counters>,
    next: BoxHandler,
}

impl Handler for MetricsLayer {
    fn call(&self, ctx: &mut Context) -> HandlerResult {
        let start = Instant::now();
        let result = self.next.call(ctx);
        let latency = u64::try_from(start.elapsed().as_nanos()).unwrap_or(u64::MAX);

        let c = &self.counters;
        c.request_count.fetch_add(1, Ordering::Relaxed);
        c.total_latency_ns.fetch_add(latency, Ordering::Relaxed);
        let status = match &result {
            Ok(()) => ctx.response().wire_status().unwrap_or(StatusCode::OK),
            Err(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_client_error() {
            c.client_errors.fetch_add(1, Ordering::Relaxed);
        } else if status.is_server_error() {
            c.server_errors.fetch_add(1, Ordering::Relaxed);
        }
        result
    }
}
