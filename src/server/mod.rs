//! Request and response plumbing between the listener and the dispatcher.

pub mod http_server;
pub mod request;
pub mod response;

pub use http_server::{HttpServer, RemoteAddr, ServerHandle};
pub use request::{Body, Request};
pub use response::{status_reason, CapturedResponse, ResponseRecorder, ResponseSink};
