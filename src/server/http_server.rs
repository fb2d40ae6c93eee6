//! Blocking HTTP listener backed by `tiny_http`.
//!
//! A fixed set of worker threads pull requests from one shared listener and
//! hand each to the shared [`Dispatcher`]. One request is processed per worker
//! at a time; the dispatcher itself holds no per-request state outside the
//! pooled context.

use std::io::{self, Read};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use http::{HeaderMap, StatusCode};
use tracing::{debug, error, info, warn};

use super::request::{Body, Request};
use super::response::ResponseSink;
use crate::dispatcher::Dispatcher;

/// Peer address of the connection, stored in request extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteAddr(pub SocketAddr);

/// Listener configuration and entry point.
pub struct HttpServer {
    dispatcher: Arc<Dispatcher>,
    workers: usize,
}

impl HttpServer {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            workers: 4,
        }
    }

    /// Number of worker threads (minimum 1).
    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Bind `addr` and start serving on background threads.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or the port cannot be bound.
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid address"))?;
        let server = tiny_http::Server::http(addr).map_err(io::Error::other)?;
        let local = server
            .server_addr()
            .to_ip()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "not an IP listener"))?;
        let server = Arc::new(server);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::with_capacity(self.workers);
        for id in 0..self.workers {
            let server = Arc::clone(&server);
            let dispatcher = Arc::clone(&self.dispatcher);
            let shutdown = Arc::clone(&shutdown);
            let handle = thread::Builder::new()
                .name(format!("brrtmux-worker-{id}"))
                .spawn(move || worker_loop(&server, &dispatcher, &shutdown))?;
            handles.push(handle);
        }

        info!(addr = %local, workers = self.workers, "listening");
        Ok(ServerHandle {
            addr: local,
            server,
            shutdown,
            handles,
        })
    }
}

fn worker_loop(server: &tiny_http::Server, dispatcher: &Dispatcher, shutdown: &AtomicBool) {
    loop {
        match server.recv() {
            Ok(request) => serve_one(dispatcher, request),
            Err(e) => {
                if shutdown.load(Ordering::Acquire) {
                    break;
                }
                warn!(error = %e, "accept failed");
            }
        }
    }
    debug!("worker stopped");
}

fn serve_one(dispatcher: &Dispatcher, mut raw: tiny_http::Request) {
    let limit = dispatcher.config().max_body_bytes;
    match convert(&mut raw, limit) {
        Ok(req) => {
            let mut sink = TinyHttpSink { request: Some(raw) };
            dispatcher.serve(req, &mut sink);
        }
        Err(e) => {
            warn!(error = %e, url = raw.url(), "rejecting unparsable request");
            let response = tiny_http::Response::from_string("bad request").with_status_code(400);
            if let Err(e) = raw.respond(response) {
                warn!(error = %e, "failed to write response");
            }
        }
    }
}

/// Convert a `tiny_http` request into an `http::Request`.
///
/// The body is read up to one byte past `limit` so the decoder still sees an
/// oversized body as such, without buffering an unbounded stream.
fn convert(raw: &mut tiny_http::Request, limit: u64) -> anyhow::Result<Request> {
    let mut builder = http::Request::builder()
        .method(raw.method().as_str())
        .uri(raw.url());
    for header in raw.headers() {
        builder = builder.header(header.field.as_str().as_str(), header.value.as_str());
    }
    if let Some(peer) = raw.remote_addr() {
        builder = builder.extension(RemoteAddr(*peer));
    }

    let mut body = Vec::new();
    raw.as_reader()
        .take(limit.saturating_add(1))
        .read_to_end(&mut body)?;

    Ok(builder.body(Body::from(body))?)
}

/// Writes the dispatcher's response back through `tiny_http`.
struct TinyHttpSink {
    request: Option<tiny_http::Request>,
}

impl ResponseSink for TinyHttpSink {
    fn send(&mut self, status: StatusCode, headers: &HeaderMap, body: &[u8]) -> io::Result<()> {
        let request = self
            .request
            .take()
            .ok_or_else(|| io::Error::other("response already sent"))?;
        let mut response = tiny_http::Response::from_data(body.to_vec())
            .with_status_code(status.as_u16());
        for (name, value) in headers {
            match tiny_http::Header::from_bytes(name.as_str().as_bytes(), value.as_bytes()) {
                Ok(header) => response.add_header(header),
                Err(()) => warn!(header = %name, "dropping header tiny_http cannot encode"),
            }
        }
        request.respond(response)
    }
}

/// Handle to a running listener.
pub struct ServerHandle {
    addr: SocketAddr,
    server: Arc<tiny_http::Server>,
    shutdown: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl ServerHandle {
    /// Bound address, with the real port when started on port 0.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait for the server to accept connections.
    ///
    /// # Errors
    ///
    /// Returns `TimedOut` if the server doesn't become ready within ~250ms.
    pub fn wait_ready(&self) -> io::Result<()> {
        for _ in 0..50 {
            if TcpStream::connect(self.addr).is_ok() {
                return Ok(());
            }
            thread::sleep(Duration::from_millis(5));
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"))
    }

    /// Stop accepting requests and wait for the workers to finish.
    pub fn stop(self) {
        self.shutdown.store(true, Ordering::Release);
        for _ in 0..self.handles.len() {
            self.server.unblock();
        }
        self.join_workers();
    }

    /// Block until every worker exits.
    pub fn join(self) {
        self.join_workers();
    }

    fn join_workers(self) {
        for handle in self.handles {
            if handle.join().is_err() {
                error!("worker thread panicked");
            }
        }
    }
}
