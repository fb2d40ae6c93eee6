//! # Middleware Module
//!
//! A middleware turns a handler into a wrapping handler. Chains are composed
//! once, when routes are registered or the router is frozen, so a request
//! pays only for the calls themselves.
//!
//! For a chain `[m1, m2]` around handler `h`, execution is
//! `m1 before → m2 before → h → m2 after → m1 after`. A middleware that
//! returns without calling `next` short-circuits everything inside it.
//!
//! Stock middleware:
//! - [`Logger`]: one tracing event per request
//! - [`RequestId`]: request id propagation through `X-Request-ID`
//! - [`MetricsMiddleware`]: request and error counters

mod core;
mod metrics;
mod request_id;
mod tracing;

pub use core::{compose, from_fn, BoxMiddleware, FnMiddleware, Middleware};
pub use metrics::MetricsMiddleware;
pub use request_id::{RequestId, REQUEST_ID_HEADER};
pub use tracing::Logger;
