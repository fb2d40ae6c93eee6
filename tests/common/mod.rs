#![allow(dead_code)]

pub mod requests {
    use brrtmux::{Body, Request};
    use http::Method;

    pub fn request(method: Method, path: &str, body: impl Into<Body>) -> Request {
        http::Request::builder()
            .method(method)
            .uri(path)
            .body(body.into())
            .unwrap()
    }

    pub fn get(path: &str) -> Request {
        request(Method::GET, path, Body::empty())
    }

    pub fn post_json(path: &str, json: &str) -> Request {
        http::Request::post(path)
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }
}

pub mod tracing_capture {
    use parking_lot::Mutex;
    use std::io;
    use std::sync::Arc;
    use tracing_subscriber::fmt::MakeWriter;

    /// Shared in-memory log sink.
    #[derive(Clone, Default)]
    pub struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// JSON log capture scoped to the current thread.
    pub struct TestTracing {
        logs: CapturedLogs,
        _guard: tracing::subscriber::DefaultGuard,
    }

    impl TestTracing {
        pub fn init() -> Self {
            let logs = CapturedLogs::default();
            let subscriber = tracing_subscriber::fmt()
                .json()
                .with_max_level(tracing::Level::DEBUG)
                .with_writer(logs.clone())
                .finish();
            let guard = tracing::subscriber::set_default(subscriber);
            Self {
                logs,
                _guard: guard,
            }
        }

        pub fn contents(&self) -> String {
            String::from_utf8_lossy(&self.logs.0.lock()).into_owned()
        }

        /// Parsed log lines.
        pub fn events(&self) -> Vec<serde_json::Value> {
            self.contents()
                .lines()
                .filter_map(|line| serde_json::from_str(line).ok())
                .collect()
        }

        /// Events whose message equals `message`.
        pub fn find(&self, message: &str) -> Vec<serde_json::Value> {
            self.events()
                .into_iter()
                .filter(|e| e["fields"]["message"] == message)
                .collect()
        }
    }
}
