//! # Dispatcher Module
//!
//! The dispatcher turns a raw request into exactly one response.
//!
//! ## Request Flow
//!
//! 1. A context is taken from the pool and attached to the request
//! 2. The route table resolves the request to one of: a matched handler,
//!    "path exists under other methods" (405 with `Allow`), or no match (404)
//! 3. The selected handler chain runs inside a recovery boundary
//! 4. A returned error or a recovered panic (`panic: <payload>`) goes to the
//!    error handler, itself guarded against panics
//! 5. The recorded response is flushed to the sink once
//! 6. The context is wiped and returned to the pool on every path
//!
//! ## Example
//!
//! ```rust
//! use brrtmux::{Router, Body};
//!
//! let mut router = Router::new();
//! router.get("/ping", |ctx| ctx.string(http::StatusCode::OK, "pong")).unwrap();
//! let dispatcher = router.build();
//!
//! let req = http::Request::get("/ping").body(Body::empty()).unwrap();
//! let res = dispatcher.handle(req);
//! assert_eq!(res.code(), 200);
//! assert_eq!(res.body_str(), "pong");
//! ```

mod core;
mod recovery;

pub use core::{
    default_method_not_allowed, default_not_found, join_methods, Dispatcher, Resolution,
};
pub(crate) use core::DispatcherParts;
pub use recovery::{default_error_handler, panic_message, PanicError};
