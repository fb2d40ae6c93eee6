//! # brrtmux
//!
//! **brrtmux** is a small HTTP request dispatcher: it maps a (method, path)
//! pair to a registered handler, tells "no such path" (404) apart from "path
//! exists, wrong method" (405), wraps handlers in onion-ordered middleware,
//! recycles per-request contexts through a bounded pool, and keeps handler
//! panics from reaching the serving loop.
//!
//! ## Architecture
//!
//! - **[`router`]** - pattern parsing, the segment tree and the [`Router`] / [`Group`] registration API
//! - **[`dispatcher`]** - the frozen [`Dispatcher`], panic recovery and error routing
//! - **[`middleware`]** - the [`Middleware`](middleware::Middleware) trait, chain composition and stock middleware
//! - **[`context`]** - per-request [`Context`], typed locals and the context pool
//! - **[`binding`]** - size-limited JSON body decoding with a classified [`DecodeError`]
//! - **[`server`]** - request/response types and the `tiny_http` listener adapter
//! - **[`logging`]** / **[`runtime_config`]** - `tracing` setup and environment configuration
//! - **[`cli`]** - the `brrtmux` binary
//!
//! ## Request flow
//!
//! ```text
//! listener ──► Dispatcher::serve
//!                ├─ acquire pooled Context (released on every exit path)
//!                ├─ resolve: Matched │ PathExists (405 + Allow) │ NoMatch (404)
//!                ├─ run handler chain inside a recovery boundary
//!                ├─ route Err / panic to the error handler (itself guarded)
//!                └─ flush the recorded response to the sink exactly once
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use brrtmux::{Body, Router};
//! use http::StatusCode;
//!
//! let mut router = Router::new();
//! router.get("/hello/{name}", |ctx| {
//!     let greeting = format!("hello {}", ctx.param("name").unwrap_or("stranger"));
//!     ctx.string(StatusCode::OK, &greeting)
//! })?;
//! let dispatcher = router.build();
//!
//! let res = dispatcher.handle(http::Request::get("/hello/ada").body(Body::empty())?);
//! assert_eq!(res.body_str(), "hello ada");
//!
//! let res = dispatcher.handle(http::Request::post("/hello/ada").body(Body::empty())?);
//! assert_eq!(res.code(), 405);
//! assert_eq!(res.header("Allow"), Some("GET"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod binding;
pub mod cli;
pub mod context;
pub mod dispatcher;
pub mod handler;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod router;
pub mod runtime_config;
pub mod server;

pub use binding::DecodeError;
pub use context::{Context, Local, LocalError};
pub use dispatcher::{Dispatcher, Resolution};
pub use handler::{BoxHandler, ErrorHandler, Handler, HandlerResult};
pub use router::{Group, RouteError, Router};
pub use runtime_config::DispatcherConfig;
pub use server::{Body, CapturedResponse, Request, ResponseSink};
