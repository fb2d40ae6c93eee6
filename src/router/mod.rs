//! # Router Module
//!
//! Route registration and resolution.
//!
//! ## Patterns
//!
//! Patterns are `/`-separated segments of three kinds:
//!
//! - literal: `users` matches exactly `users`
//! - capture: `{id}` matches exactly one segment and binds it to `id`
//! - catch-all: `{path...}` matches every remaining segment joined by `/`,
//!   including none at all. Only legal as the final segment.
//!
//! A trailing slash is significant: `/users/` and `/users` are different
//! patterns.
//!
//! ## Resolution
//!
//! Resolution walks a segment tree ([`radix`]). At each level literal
//! children are tried before the capture child, and the capture child before
//! the catch-all child, backtracking when a branch yields no handler for the
//! request method. The most specific match therefore wins regardless of
//! registration order.
//!
//! Each request resolves to exactly one of:
//!
//! - a handler for (method, path), with its captured parameters
//! - "path exists": some pattern matches the path under other methods (405).
//!   `Allow` lists the union of the methods bound to every pattern matching
//!   the path, sorted.
//! - no match (404)
//!
//! Routes are bound per method. A `GET` route does not answer `HEAD` or
//! `OPTIONS`; register those explicitly where they are needed.
//!
//! ## Registration
//!
//! [`Router`] collects routes, middleware and default handlers, and
//! [`Router::build`] freezes them into an immutable
//! [`Dispatcher`](crate::Dispatcher). [`Group`] scopes a path prefix and a
//! middleware chain.

mod core;
mod pattern;
pub mod radix;

pub use core::{Group, ParamVec, Router, MAX_INLINE_PARAMS};
pub use pattern::{Pattern, RouteError, Segment};
