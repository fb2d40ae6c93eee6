mod common;

use brrtmux::middleware::{from_fn, Logger, MetricsMiddleware, Middleware, RequestId};
use brrtmux::{BoxHandler, Context, Handler, HandlerResult, Router};
use common::requests::get;
use common::tracing_capture::TestTracing;
use http::StatusCode;
use parking_lot::Mutex;
use std::sync::Arc;

type Trace = Arc<Mutex<Vec<String>>>;

/// Records "<name> before" / "<name> after" around `next`.
fn recording(name: &'static str, trace: &Trace) -> impl Middleware + 'static {
    let trace = Arc::clone(trace);
    from_fn(move |ctx: &mut Context, next: &dyn Handler| {
        trace.lock().push(format!("{name} before"));
        let result = next.call(ctx);
        trace.lock().push(format!("{name} after"));
        result
    })
}

#[test]
fn test_onion_order() {
    let trace: Trace = Arc::default();
    let inner = Arc::clone(&trace);

    let mut router = Router::new();
    router
        .use_middleware(recording("m1", &trace))
        .use_middleware(recording("m2", &trace));
    router
        .get("/x", move |ctx| {
            inner.lock().push("handler".to_string());
            ctx.status(StatusCode::OK)
        })
        .unwrap();
    let d = router.build();

    d.handle(get("/x"));
    assert_eq!(
        *trace.lock(),
        ["m1 before", "m2 before", "handler", "m2 after", "m1 after"]
    );
}

#[test]
fn test_short_circuit_skips_inner_layers() {
    let trace: Trace = Arc::default();
    let inner = Arc::clone(&trace);

    let mut router = Router::new();
    router.use_middleware(recording("outer", &trace));
    router.use_middleware(from_fn(|ctx: &mut Context, next: &dyn Handler| {
        if ctx.header("Authorization").is_none() {
            return ctx.string(StatusCode::UNAUTHORIZED, "unauthorized");
        }
        next.call(ctx)
    }));
    router.use_middleware(recording("inner", &trace));
    router
        .get("/secret", move |ctx| {
            inner.lock().push("handler".to_string());
            ctx.string(StatusCode::OK, "secret")
        })
        .unwrap();
    let d = router.build();

    let res = d.handle(get("/secret"));
    assert_eq!(res.code(), 401);
    assert_eq!(*trace.lock(), ["outer before", "outer after"]);

    trace.lock().clear();
    let res = d.handle(
        http::Request::get("/secret")
            .header("Authorization", "Bearer t")
            .body(brrtmux::Body::empty())
            .unwrap(),
    );
    assert_eq!(res.body_str(), "secret");
    assert_eq!(trace.lock().len(), 5);
}

#[test]
fn test_closure_middleware_wraps_boxed_handler() {
    struct Stamp;
    impl Handler for Stamp {
        fn call(&self, ctx: &mut Context) -> HandlerResult {
            ctx.set_header("X-Stamp", "1")
        }
    }

    let mut router = Router::new();
    router.use_middleware(|next: BoxHandler| -> BoxHandler {
        Arc::new(move |ctx: &mut Context| -> HandlerResult {
            Stamp.call(ctx)?;
            next.call(ctx)
        })
    });
    router.get("/x", |ctx| ctx.no_content()).unwrap();
    let d = router.build();

    let res = d.handle(get("/x"));
    assert_eq!(res.code(), 204);
    assert_eq!(res.header("X-Stamp"), Some("1"));
}

#[test]
fn test_global_middleware_added_after_routes_still_applies() {
    let mut router = Router::new();
    router.get("/early", |ctx| ctx.no_content()).unwrap();
    router.use_middleware(from_fn(|ctx: &mut Context, next: &dyn Handler| {
        ctx.set_header("X-Global", "yes")?;
        next.call(ctx)
    }));
    let d = router.build();

    assert_eq!(d.handle(get("/early")).header("X-Global"), Some("yes"));
    // Also wraps the 404 handler.
    let res = d.handle(get("/missing"));
    assert_eq!(res.code(), 404);
    assert_eq!(res.header("X-Global"), Some("yes"));
}

#[test]
fn test_request_id_generated_and_propagated() {
    let seen: Arc<Mutex<Option<String>>> = Arc::default();
    let sink = Arc::clone(&seen);

    let mut router = Router::new();
    router.use_middleware(RequestId::new());
    router
        .get("/id", move |ctx| {
            *sink.lock() = ctx.get_str("X-Request-ID").ok().map(str::to_string);
            ctx.no_content()
        })
        .unwrap();
    let d = router.build();

    let res = d.handle(get("/id"));
    let header = res.header("X-Request-ID").unwrap().to_string();
    assert_eq!(header.len(), 26);
    assert_eq!(seen.lock().as_deref(), Some(header.as_str()));

    let res = d.handle(
        http::Request::get("/id")
            .header("X-Request-ID", "client-supplied")
            .body(brrtmux::Body::empty())
            .unwrap(),
    );
    assert_eq!(res.header("X-Request-ID"), Some("client-supplied"));
}

#[test]
fn test_metrics_observe_every_outcome() {
    let metrics = MetricsMiddleware::new();
    let mut router = Router::new();
    router.use_middleware(metrics.clone());
    router.get("/ok", |ctx| ctx.no_content()).unwrap();
    router.get("/fail", |_ctx| anyhow::bail!("nope")).unwrap();
    let d = router.build();

    d.handle(get("/ok"));
    d.handle(get("/fail"));
    d.handle(get("/missing"));
    d.handle(http::Request::post("/ok").body(brrtmux::Body::empty()).unwrap());

    assert_eq!(metrics.request_count(), 4);
    assert_eq!(metrics.server_errors(), 1);
    assert_eq!(metrics.client_errors(), 2);
}

#[test]
fn test_logger_emits_one_event_per_request() {
    let tracing = TestTracing::init();

    let mut router = Router::new();
    router.use_middleware(Logger::new());
    router
        .get("/hello", |ctx| ctx.string(StatusCode::OK, "hello"))
        .unwrap();
    let d = router.build();

    d.handle(get("/hello"));

    let events = tracing.find("request completed");
    assert_eq!(events.len(), 1);
    let fields = &events[0]["fields"];
    assert_eq!(fields["status"], 200);
    assert_eq!(fields["size"], 5);
    assert_eq!(fields["path"], "/hello");
    assert_eq!(fields["method"], "GET");
}
