//! # Context Module
//!
//! [`Context`] is the per-request handle given to handlers and middleware. It
//! wraps the inbound request, the captured path parameters, a buffered
//! response recorder and request-scoped [`Locals`].
//!
//! Contexts are recycled through a [`ContextPool`]. A released context is
//! wiped completely, so no request ever observes another request's locals,
//! headers or body.

mod core;
mod locals;
mod pool;

pub use core::{mime, Context};
pub use locals::{Local, LocalError, Locals};
pub use pool::{ContextPool, PoolStats, PooledContext, DEFAULT_POOL_CAPACITY};
