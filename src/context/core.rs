use http::header::{HeaderName, HeaderValue, CONTENT_TYPE, COOKIE, SET_COOKIE};
use http::request::Parts;
use http::{HeaderMap, Method, StatusCode, Uri};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Read;

use super::locals::{Local, LocalError, Locals};
use crate::binding::{self, DecodeError, DEFAULT_MAX_BODY_BYTES};
use crate::handler::HandlerResult;
use crate::router::ParamVec;
use crate::server::request::{parse_cookies, parse_query_params};
use crate::server::{Body, Request, ResponseRecorder};

/// Content types used by the response helpers.
pub mod mime {
    pub const APPLICATION_JSON: &str = "application/json";
    pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
    pub const TEXT_HTML: &str = "text/html; charset=utf-8";
    pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
}

/// Per-request handle: the inbound request, captured path parameters, the
/// response recorder and request-scoped locals.
///
/// Contexts are pooled. A context handed to a handler always starts with no
/// locals and no response state; everything is wiped when the request ends.
#[derive(Debug)]
pub struct Context {
    parts: Parts,
    body: Option<Body>,
    params: ParamVec,
    response: ResponseRecorder,
    locals: Locals,
    form: Option<Vec<(String, String)>>,
    max_body_bytes: u64,
}

fn empty_parts() -> Parts {
    http::Request::new(()).into_parts().0
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    #[must_use]
    pub fn new() -> Self {
        Self {
            parts: empty_parts(),
            body: None,
            params: ParamVec::new(),
            response: ResponseRecorder::new(),
            locals: Locals::new(),
            form: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Build a standalone context around `req`, outside any pool.
    #[must_use]
    pub fn for_request(req: Request) -> Self {
        let mut ctx = Self::new();
        ctx.attach(req, DEFAULT_MAX_BODY_BYTES);
        ctx
    }

    pub(crate) fn attach(&mut self, req: Request, max_body_bytes: u64) {
        let (parts, body) = req.into_parts();
        self.parts = parts;
        self.body = Some(body);
        self.max_body_bytes = max_body_bytes;
    }

    /// Drop every reference to the finished request and wipe per-request state.
    pub(crate) fn reset(&mut self) {
        self.parts = empty_parts();
        self.body = None;
        self.params.clear();
        self.response.reset();
        self.locals.clear();
        self.form = None;
        self.max_body_bytes = DEFAULT_MAX_BODY_BYTES;
    }

    pub(crate) fn set_params(&mut self, params: ParamVec) {
        self.params = params;
    }

    // Request info

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    #[must_use]
    pub fn path(&self) -> &str {
        self.parts.uri.path()
    }

    #[must_use]
    pub fn request_headers(&self) -> &HeaderMap {
        &self.parts.headers
    }

    /// Typed request extensions set by the listener (peer address and similar).
    #[must_use]
    pub fn extensions(&self) -> &http::Extensions {
        &self.parts.extensions
    }

    // Path parameters

    /// Path parameter captured by `{name}` or `{name...}`.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn params(&self) -> &ParamVec {
        &self.params
    }

    // Query parameters

    /// First value of query parameter `key`.
    #[must_use]
    pub fn query(&self, key: &str) -> Option<String> {
        self.queries()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Query parameter `key`, or `fallback` when absent.
    #[must_use]
    pub fn query_or(&self, key: &str, fallback: &str) -> String {
        self.query(key).unwrap_or_else(|| fallback.to_string())
    }

    /// Query parameter `key` as an integer, or `fallback` when absent or not a number.
    #[must_use]
    pub fn query_int(&self, key: &str, fallback: i64) -> i64 {
        self.query(key)
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(fallback)
    }

    #[must_use]
    pub fn queries(&self) -> Vec<(String, String)> {
        self.parts
            .uri
            .query()
            .map(parse_query_params)
            .unwrap_or_default()
    }

    // Headers and cookies

    /// Request header value, `None` when absent or not valid UTF-8.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.parts.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Media type of the request without parameters, lowercased.
    #[must_use]
    pub fn content_type(&self) -> Option<String> {
        let raw = self.parts.headers.get(CONTENT_TYPE)?.to_str().ok()?;
        let media = raw.split(';').next()?.trim();
        if media.is_empty() {
            None
        } else {
            Some(media.to_ascii_lowercase())
        }
    }

    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.parts
            .headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(parse_cookies)
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    #[must_use]
    pub fn cookie_or(&self, name: &str, fallback: &str) -> String {
        self.cookie(name).unwrap_or_else(|| fallback.to_string())
    }

    /// Append a `Set-Cookie: name=value; Path=/` response header. Earlier
    /// cookies are kept.
    pub fn set_cookie(&mut self, name: &str, value: &str) -> HandlerResult {
        anyhow::ensure!(
            !name.is_empty()
                && !name
                    .bytes()
                    .any(|b| b == b'=' || b == b';' || b.is_ascii_whitespace()),
            "invalid cookie name {name:?}"
        );
        let value = HeaderValue::from_str(&format!("{name}={value}; Path=/"))?;
        self.response.headers_mut().append(SET_COOKIE, value);
        Ok(())
    }

    /// Set a response header. Invalid names or values are rejected with an error.
    pub fn set_header(&mut self, name: &str, value: &str) -> HandlerResult {
        let name = HeaderName::from_bytes(name.as_bytes())?;
        let value = HeaderValue::from_str(value)?;
        self.response.set_header(name, value);
        Ok(())
    }

    // Locals

    pub fn set(&mut self, key: &str, value: impl Into<Local>) {
        self.locals.set(key, value);
    }

    pub fn set_opt(&mut self, key: &str, value: Option<Local>) {
        self.locals.set_opt(key, value);
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Local> {
        self.locals.get(key)
    }

    pub fn get_str(&self, key: &str) -> Result<&str, LocalError> {
        self.locals.get_str(key)
    }

    pub fn get_int(&self, key: &str) -> Result<i64, LocalError> {
        self.locals.get_int(key)
    }

    pub fn get_bool(&self, key: &str) -> Result<bool, LocalError> {
        self.locals.get_bool(key)
    }

    pub fn get_handle<T: std::any::Any + Send + Sync>(
        &self,
        key: &str,
    ) -> Result<std::sync::Arc<T>, LocalError> {
        self.locals.get_handle(key)
    }

    #[must_use]
    pub fn locals(&self) -> &Locals {
        &self.locals
    }

    // Body

    /// Take the raw body stream. Subsequent calls return `None`.
    pub fn take_body(&mut self) -> Option<Body> {
        self.body.take()
    }

    /// Read the whole body, bounded by the configured limit.
    pub fn body_bytes(&mut self) -> Result<Vec<u8>, DecodeError> {
        let limit = self.max_body_bytes;
        let body = self.take_body().ok_or(DecodeError::ProgrammerMisuse {
            reason: "request body already consumed",
        })?;
        let mut reader = binding::LimitedReader::new(body, limit);
        let mut out = Vec::new();
        match reader.read_to_end(&mut out) {
            Ok(_) => Ok(out),
            Err(_) if reader.exceeded() => Err(DecodeError::BodyTooLarge { limit }),
            Err(e) => Err(DecodeError::Io {
                message: e.to_string(),
            }),
        }
    }

    /// First value of `key` in an `application/x-www-form-urlencoded` body.
    ///
    /// The body is read on the first call and the parsed form kept for later
    /// lookups. Other content types yield `Ok(None)` and leave the body unread.
    pub fn form_value(&mut self, key: &str) -> Result<Option<String>, DecodeError> {
        if self.form.is_none() {
            if self.content_type().as_deref() != Some(mime::FORM_URLENCODED) {
                return Ok(None);
            }
            let raw = self.body_bytes()?;
            let fields = url::form_urlencoded::parse(&raw)
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            self.form = Some(fields);
        }
        Ok(self
            .form
            .as_ref()
            .and_then(|fields| fields.iter().find(|(k, _)| k == key))
            .map(|(_, v)| v.clone()))
    }

    /// Decode the body as exactly one JSON document.
    pub fn decode_json<T: DeserializeOwned>(&mut self) -> Result<T, DecodeError> {
        let limit = self.max_body_bytes;
        let body = self.take_body().ok_or(DecodeError::ProgrammerMisuse {
            reason: "request body already consumed",
        })?;
        binding::decode_json(body, limit)
    }

    /// Decode the body into `target`, leaving it untouched on failure.
    pub fn bind<T: DeserializeOwned>(&mut self, target: &mut T) -> Result<(), DecodeError> {
        *target = self.decode_json()?;
        Ok(())
    }

    // Response

    #[must_use]
    pub fn response(&self) -> &ResponseRecorder {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut ResponseRecorder {
        &mut self.response
    }

    /// Write raw bytes with an optional content type.
    pub fn blob(&mut self, status: StatusCode, content_type: &str, data: &[u8]) -> HandlerResult {
        if !content_type.is_empty() {
            self.response
                .set_header(CONTENT_TYPE, HeaderValue::from_str(content_type)?);
        }
        self.response.write_header(status);
        if !data.is_empty() {
            self.response.write(data);
        }
        Ok(())
    }

    /// Write a status with an empty body.
    pub fn status(&mut self, status: StatusCode) -> HandlerResult {
        self.blob(status, "", &[])
    }

    pub fn no_content(&mut self) -> HandlerResult {
        self.status(StatusCode::NO_CONTENT)
    }

    pub fn json<T: Serialize + ?Sized>(&mut self, status: StatusCode, value: &T) -> HandlerResult {
        let data = serde_json::to_vec(value)?;
        self.blob(status, mime::APPLICATION_JSON, &data)
    }

    pub fn ok<T: Serialize + ?Sized>(&mut self, value: &T) -> HandlerResult {
        self.json(StatusCode::OK, value)
    }

    pub fn created<T: Serialize + ?Sized>(&mut self, value: &T) -> HandlerResult {
        self.json(StatusCode::CREATED, value)
    }

    pub fn bad_request<T: Serialize + ?Sized>(&mut self, value: &T) -> HandlerResult {
        self.json(StatusCode::BAD_REQUEST, value)
    }

    pub fn unauthorized<T: Serialize + ?Sized>(&mut self, value: &T) -> HandlerResult {
        self.json(StatusCode::UNAUTHORIZED, value)
    }

    pub fn forbidden<T: Serialize + ?Sized>(&mut self, value: &T) -> HandlerResult {
        self.json(StatusCode::FORBIDDEN, value)
    }

    pub fn not_found<T: Serialize + ?Sized>(&mut self, value: &T) -> HandlerResult {
        self.json(StatusCode::NOT_FOUND, value)
    }

    pub fn method_not_allowed<T: Serialize + ?Sized>(&mut self, value: &T) -> HandlerResult {
        self.json(StatusCode::METHOD_NOT_ALLOWED, value)
    }

    pub fn internal_server_error<T: Serialize + ?Sized>(&mut self, value: &T) -> HandlerResult {
        self.json(StatusCode::INTERNAL_SERVER_ERROR, value)
    }

    pub fn string(&mut self, status: StatusCode, s: &str) -> HandlerResult {
        self.blob(status, mime::TEXT_PLAIN, s.as_bytes())
    }

    pub fn html(&mut self, status: StatusCode, html: &str) -> HandlerResult {
        self.blob(status, mime::TEXT_HTML, html.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Arc;

    fn request(method: &str, uri: &str, body: &'static str) -> Request {
        http::Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json; charset=utf-8")
            .header("cookie", "session=abc; theme=dark")
            .header("x-api-key", "k1")
            .body(Body::from(body))
            .unwrap()
    }

    #[test]
    fn test_request_accessors() {
        let ctx = Context::for_request(request("POST", "/users?page=2&q=a%20b", ""));
        assert_eq!(ctx.method(), Method::POST);
        assert_eq!(ctx.path(), "/users");
        assert_eq!(ctx.query("page").as_deref(), Some("2"));
        assert_eq!(ctx.query("q").as_deref(), Some("a b"));
        assert_eq!(ctx.query("missing"), None);
        assert_eq!(ctx.header("X-Api-Key"), Some("k1"));
        assert_eq!(ctx.cookie("theme").as_deref(), Some("dark"));
        assert_eq!(ctx.content_type().as_deref(), Some("application/json"));
    }

    #[test]
    fn test_params_last_write_wins() {
        let mut ctx = Context::new();
        let mut params = ParamVec::new();
        params.push((Arc::from("id"), "org".to_string()));
        params.push((Arc::from("id"), "user".to_string()));
        ctx.set_params(params);
        assert_eq!(ctx.param("id"), Some("user"));
        assert_eq!(ctx.param("nope"), None);
    }

    #[test]
    fn test_decode_json_twice_is_misuse() {
        #[derive(Deserialize)]
        struct P {
            #[allow(dead_code)]
            name: String,
        }
        let mut ctx = Context::for_request(request("POST", "/", r#"{"name":"john"}"#));
        assert!(ctx.decode_json::<P>().is_ok());
        let err = ctx.decode_json::<P>().err();
        assert!(matches!(err, Some(DecodeError::ProgrammerMisuse { .. })));
    }

    #[test]
    fn test_bind_leaves_target_on_error() {
        let mut ctx = Context::for_request(request("POST", "/", "{bad"));
        let mut target = json!({"keep": true});
        assert_eq!(ctx.bind(&mut target), Err(DecodeError::MalformedSyntax));
        assert_eq!(target, json!({"keep": true}));
    }

    #[test]
    fn test_json_response_helpers() {
        let mut ctx = Context::new();
        ctx.created(&json!({"id": 1})).unwrap();
        assert_eq!(ctx.response().status(), Some(StatusCode::CREATED));
        assert_eq!(
            ctx.response().headers().get(CONTENT_TYPE).unwrap(),
            "application/json"
        );
        assert_eq!(ctx.response().body(), br#"{"id":1}"#);
    }

    #[test]
    fn test_status_has_no_body() {
        let mut ctx = Context::new();
        ctx.no_content().unwrap();
        assert_eq!(ctx.response().status(), Some(StatusCode::NO_CONTENT));
        assert_eq!(ctx.response().size(), 0);
    }

    #[test]
    fn test_set_header_rejects_invalid_name() {
        let mut ctx = Context::new();
        assert!(ctx.set_header("bad header", "v").is_err());
        assert!(ctx.set_header("X-Custom", "value").is_ok());
        assert_eq!(ctx.response().headers().get("x-custom").unwrap(), "value");
    }

    fn form_request(content_type: &str, body: &'static str) -> Request {
        http::Request::builder()
            .method("POST")
            .uri("/login")
            .header("content-type", content_type)
            .body(Body::from(body))
            .unwrap()
    }

    #[test]
    fn test_query_fallbacks() {
        let ctx = Context::for_request(request("GET", "/list?page=3&size=ten&q=", ""));
        assert_eq!(ctx.query_int("page", 1), 3);
        assert_eq!(ctx.query_int("size", 20), 20);
        assert_eq!(ctx.query_int("missing", 7), 7);
        assert_eq!(ctx.query_or("q", "all"), "");
        assert_eq!(ctx.query_or("sort", "name"), "name");
    }

    #[test]
    fn test_cookie_or_falls_back() {
        let ctx = Context::for_request(request("GET", "/", ""));
        assert_eq!(ctx.cookie_or("session", "none"), "abc");
        assert_eq!(ctx.cookie_or("lang", "en"), "en");
    }

    #[test]
    fn test_set_cookie_appends_headers() {
        let mut ctx = Context::new();
        ctx.set_cookie("session", "abc").unwrap();
        ctx.set_cookie("theme", "dark").unwrap();
        let cookies: Vec<_> = ctx
            .response()
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect();
        assert_eq!(cookies, vec!["session=abc; Path=/", "theme=dark; Path=/"]);

        assert!(ctx.set_cookie("bad name", "v").is_err());
        assert!(ctx.set_cookie("", "v").is_err());
        assert!(ctx.set_cookie("ok", "line\nbreak").is_err());
    }

    #[test]
    fn test_unauthorized_and_forbidden() {
        let mut ctx = Context::new();
        ctx.unauthorized(&json!({"error": "login required"})).unwrap();
        assert_eq!(ctx.response().status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(ctx.response().body(), br#"{"error":"login required"}"#);

        let mut ctx = Context::new();
        ctx.forbidden(&json!({"error": "no access"})).unwrap();
        assert_eq!(ctx.response().status(), Some(StatusCode::FORBIDDEN));
    }

    #[test]
    fn test_form_value_reads_urlencoded_body_once() {
        let mut ctx = Context::for_request(form_request(
            "application/x-www-form-urlencoded; charset=utf-8",
            "user=ann+lee&pass=p%26w&user=second",
        ));
        assert_eq!(ctx.form_value("user").unwrap().as_deref(), Some("ann lee"));
        assert_eq!(ctx.form_value("pass").unwrap().as_deref(), Some("p&w"));
        assert_eq!(ctx.form_value("missing").unwrap(), None);
        assert!(ctx.take_body().is_none());
    }

    #[test]
    fn test_form_value_ignores_other_content_types() {
        let mut ctx = Context::for_request(form_request("application/json", r#"{"user":"x"}"#));
        assert_eq!(ctx.form_value("user").unwrap(), None);
        assert!(ctx.take_body().is_some());
    }

    #[test]
    fn test_form_value_respects_body_limit() {
        let mut ctx = Context::new();
        ctx.attach(
            form_request("application/x-www-form-urlencoded", "user=a-very-long-name"),
            8,
        );
        assert_eq!(
            ctx.form_value("user"),
            Err(DecodeError::BodyTooLarge { limit: 8 })
        );
    }

    #[test]
    fn test_reset_detaches_request() {
        let mut ctx = Context::for_request(request("DELETE", "/secret?token=1", "{}"));
        ctx.set("user", "alice");
        ctx.string(StatusCode::OK, "bye").unwrap();
        ctx.reset();
        assert_eq!(ctx.method(), Method::GET);
        assert_eq!(ctx.path(), "/");
        assert!(ctx.header("cookie").is_none());
        assert!(ctx.take_body().is_none());
        assert!(ctx.locals().is_empty());
        assert!(!ctx.response().is_written());
    }

    #[test]
    fn test_reset_forgets_parsed_form() {
        let mut ctx = Context::for_request(form_request(
            "application/x-www-form-urlencoded",
            "user=ann",
        ));
        assert_eq!(ctx.form_value("user").unwrap().as_deref(), Some("ann"));
        ctx.reset();
        assert_eq!(ctx.form_value("user").unwrap(), None);
    }
}
