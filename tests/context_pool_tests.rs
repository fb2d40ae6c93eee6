mod common;

use brrtmux::Router;
use common::requests::get;
use http::StatusCode;
use std::sync::Arc;
use std::thread;

/// Each request stores its own marker and fails loudly if it sees anyone else's.
fn bleed_checking_router() -> Router {
    let mut router = Router::new();
    router
        .get("/mark/{id}", |ctx| {
            if ctx.get("marker").is_some() || !ctx.locals().is_empty() {
                return ctx.string(StatusCode::CONFLICT, "stale locals");
            }
            if ctx.response().is_written() || !ctx.response().headers().is_empty() {
                return ctx.string(StatusCode::CONFLICT, "stale response");
            }
            let id = ctx.param("id").unwrap_or_default().to_string();
            ctx.set("marker", id.clone());
            ctx.set_header("X-Marker", &id)?;
            ctx.string(StatusCode::OK, &id)
        })
        .unwrap();
    router
        .get("/boom/{id}", |ctx| {
            ctx.set("marker", "poison");
            ctx.set_header("X-Poison", "1")?;
            panic!("mid-request panic");
        })
        .unwrap();
    router
}

#[test]
fn test_no_bleed_between_sequential_requests() {
    let d = bleed_checking_router().build();
    for i in 0..50 {
        let res = d.handle(get(&format!("/mark/{i}")));
        assert_eq!(res.code(), 200);
        assert_eq!(res.body_str(), i.to_string());
        assert_eq!(res.header("X-Marker"), Some(i.to_string().as_str()));
    }
    let stats = d.pool_stats();
    assert_eq!(stats.created, 1);
    assert_eq!(stats.reused, 49);
}

#[test]
fn test_context_released_after_panic() {
    let d = bleed_checking_router().build();
    for i in 0..10 {
        assert_eq!(d.handle(get(&format!("/boom/{i}"))).code(), 500);
        let res = d.handle(get(&format!("/mark/{i}")));
        assert_eq!(res.code(), 200, "{}", res.body_str());
        assert!(res.header("X-Poison").is_none());
    }
    assert_eq!(d.pool_stats().created, 1);
}

#[test]
fn test_no_bleed_under_concurrency() {
    let d = Arc::new(bleed_checking_router().build());
    let workers: Vec<_> = (0..8)
        .map(|t| {
            let d = Arc::clone(&d);
            thread::spawn(move || {
                for i in 0..200 {
                    let path = if i % 17 == 0 {
                        format!("/boom/{t}-{i}")
                    } else {
                        format!("/mark/{t}-{i}")
                    };
                    let res = d.handle(get(&path));
                    if path.starts_with("/mark") {
                        assert_eq!(res.code(), 200, "{}", res.body_str());
                        assert_eq!(res.body_str(), format!("{t}-{i}"));
                    } else {
                        assert_eq!(res.code(), 500);
                    }
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    let stats = d.pool_stats();
    assert_eq!(stats.created + stats.reused, 1600);
    assert!(stats.created <= 8);
    assert_eq!(stats.idle as u64, stats.created - stats.discarded);
}

#[test]
fn test_small_pool_discards_surplus() {
    let mut router = Router::with_config(brrtmux::DispatcherConfig {
        pool_capacity: 1,
        ..brrtmux::DispatcherConfig::default()
    });
    router
        .get("/slow", |ctx| {
            thread::sleep(std::time::Duration::from_millis(20));
            ctx.no_content()
        })
        .unwrap();
    let d = Arc::new(router.build());

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let d = Arc::clone(&d);
            thread::spawn(move || d.handle(get("/slow")).code())
        })
        .collect();
    for h in handles {
        assert_eq!(h.join().unwrap(), 204);
    }
    let stats = d.pool_stats();
    assert_eq!(stats.capacity, 1);
    assert!(stats.idle <= 1);
    assert_eq!(stats.created, stats.discarded + stats.idle as u64);
}
