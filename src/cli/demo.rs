//! The demo API served by `brrtmux serve`.

use serde_json::{json, Map, Value};

use super::config::ServerConfig;
use crate::middleware::{Logger, MetricsMiddleware, RequestId, REQUEST_ID_HEADER};
use crate::router::{RouteError, Router};

/// Build the demo router.
///
/// - `GET /health`: liveness check
/// - `GET /metrics`: counters collected by [`MetricsMiddleware`]
/// - `GET /echo/{rest...}`: echoes the tail of the path and the query string
/// - `POST /echo`: echoes a JSON body, 400 with the decode error otherwise
pub fn router(config: &ServerConfig) -> Result<Router, RouteError> {
    let metrics = MetricsMiddleware::new();
    let mut router = Router::with_config(config.dispatcher_config());
    router
        .use_middleware(RequestId::new())
        .use_middleware(Logger::new())
        .use_middleware(metrics.clone());

    router.get("/health", |ctx| ctx.ok(&json!({"status": "ok"})))?;

    router.get("/metrics", move |ctx| {
        let average = u64::try_from(metrics.average_latency().as_micros()).unwrap_or(u64::MAX);
        ctx.ok(&json!({
            "requests": metrics.request_count(),
            "average_latency_us": average,
            "client_errors": metrics.client_errors(),
            "server_errors": metrics.server_errors(),
        }))
    })?;

    let mut echo = router.group("/echo");
    echo.get("/{rest...}", |ctx| {
        let query: Map<String, Value> = ctx
            .queries()
            .into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect();
        let request_id = ctx.get_str(REQUEST_ID_HEADER).ok().map(str::to_string);
        let body = json!({
            "path": ctx.param("rest").unwrap_or_default(),
            "query": query,
            "request_id": request_id,
        });
        ctx.ok(&body)
    })?;
    echo.post("", |ctx| match ctx.decode_json::<Value>() {
        Ok(value) => ctx.ok(&value),
        Err(err) => {
            let status = err.status();
            ctx.json(status, &json!({"error": err.to_string()}))
        }
    })?;

    Ok(router)
}

