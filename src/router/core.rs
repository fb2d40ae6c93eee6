//! Route registration: [`Router`] and [`Group`].

use http::Method;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use super::pattern::{Pattern, RouteError};
use super::radix::RadixTree;
use crate::context::Context;
use crate::dispatcher::{
    default_error_handler, default_method_not_allowed, default_not_found, Dispatcher,
    DispatcherParts,
};
use crate::handler::{boxed, BoxHandler, ErrorHandler, HandlerResult};
use crate::middleware::{compose, BoxMiddleware, Middleware};
use crate::runtime_config::DispatcherConfig;

/// Maximum number of path parameters before heap allocation.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Captured path parameters in path order.
///
/// Names are `Arc<str>` shared with the route table; values are per-request.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// Generates the per-method shorthands shared by [`Router`] and [`Group`].
macro_rules! method_shorthands {
    ($($name:ident => $method:ident),* $(,)?) => {
        $(
            #[doc = concat!("Register a `", stringify!($method), "` handler.")]
            pub fn $name<F>(&mut self, pattern: &str, handler: F) -> Result<(), RouteError>
            where
                F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
            {
                self.route(Method::$method, pattern, handler)
            }
        )*
    };
}

/// Route registry under construction.
///
/// Registration happens through `&mut self`, so it cannot overlap with serving:
/// [`build`](Self::build) consumes the router and returns an immutable
/// [`Dispatcher`].
///
/// ```rust
/// use brrtmux::{Router, middleware::Logger};
/// use http::StatusCode;
///
/// let mut router = Router::new();
/// router.use_middleware(Logger::new());
/// router.get("/health", |ctx| ctx.ok(&serde_json::json!({"status": "ok"})))?;
///
/// let mut api = router.group("/api");
/// api.get("/users/{id}", |ctx| {
///     let id = ctx.param("id").unwrap_or_default().to_string();
///     ctx.string(StatusCode::OK, &id)
/// })?;
///
/// let dispatcher = router.build();
/// # Ok::<(), brrtmux::RouteError>(())
/// ```
pub struct Router {
    tree: RadixTree<BoxHandler>,
    middleware: Vec<BoxMiddleware>,
    not_found: BoxHandler,
    method_not_allowed: BoxHandler,
    error_handler: Arc<dyn ErrorHandler>,
    config: DispatcherConfig,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.tree.len())
            .field("middleware", &self.middleware.len())
            .field("config", &self.config)
            .finish()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DispatcherConfig::default())
    }

    #[must_use]
    pub fn with_config(config: DispatcherConfig) -> Self {
        Self {
            tree: RadixTree::new(),
            middleware: Vec::new(),
            not_found: boxed(default_not_found),
            method_not_allowed: boxed(default_method_not_allowed),
            error_handler: Arc::new(default_error_handler),
            config,
        }
    }

    /// Bind `handler` to (method, pattern).
    pub fn route<F>(&mut self, method: Method, pattern: &str, handler: F) -> Result<(), RouteError>
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.route_handler(method, pattern, boxed(handler))
    }

    /// Bind an already boxed handler to (method, pattern).
    pub fn route_handler(
        &mut self,
        method: Method,
        pattern: &str,
        handler: BoxHandler,
    ) -> Result<(), RouteError> {
        let parsed = Pattern::parse(pattern)?;
        self.tree.insert(method.clone(), &parsed, handler)?;
        debug!(
            method = %method,
            pattern = %pattern,
            literal_prefix = parsed.literal_prefix_len(),
            "route registered"
        );
        Ok(())
    }

    method_shorthands! {
        get => GET,
        post => POST,
        put => PUT,
        patch => PATCH,
        delete => DELETE,
        head => HEAD,
        options => OPTIONS,
    }

    /// Append global middleware.
    ///
    /// Global middleware wraps every route, including routes registered
    /// before this call and through groups, as well as the not-found and
    /// method-not-allowed handlers. It is applied when the router is built.
    pub fn use_middleware(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Open a sub-scope whose patterns are prefixed with `prefix`.
    pub fn group(&mut self, prefix: &str) -> Group<'_> {
        Group {
            router: self,
            prefix: prefix.to_string(),
            middleware: Vec::new(),
        }
    }

    pub fn on_not_found<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.not_found = boxed(handler);
        self
    }

    /// Replace the 405 handler. The `Allow` header is already set when it runs.
    pub fn on_method_not_allowed<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.method_not_allowed = boxed(handler);
        self
    }

    /// Replace the handler receiving handler errors and recovered panics.
    pub fn on_error<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&mut Context, &anyhow::Error) + Send + Sync + 'static,
    {
        self.error_handler = Arc::new(handler);
        self
    }

    /// Registered (method, pattern) pairs.
    pub fn routes(&self) -> Vec<(Method, String)> {
        self.tree
            .entries()
            .into_iter()
            .map(|(m, e)| (m.clone(), e.pattern.to_string()))
            .collect()
    }

    /// Freeze the registry into a dispatcher.
    #[must_use]
    pub fn build(self) -> Dispatcher {
        let Router {
            mut tree,
            middleware,
            not_found,
            method_not_allowed,
            error_handler,
            config,
        } = self;

        if !middleware.is_empty() {
            tree.for_each_value_mut(|handler| {
                *handler = compose(&middleware, Arc::clone(handler));
            });
        }

        info!(
            routes_count = tree.len(),
            global_middleware = middleware.len(),
            max_body_bytes = config.max_body_bytes,
            pool_capacity = config.pool_capacity,
            "route table frozen"
        );

        Dispatcher::from_parts(DispatcherParts {
            tree,
            not_found: compose(&middleware, not_found),
            method_not_allowed: compose(&middleware, method_not_allowed),
            error_handler,
            config,
        })
    }
}

/// A registration scope sharing a path prefix and a middleware chain.
///
/// Routes registered through a group get the group's middleware composed in
/// at registration time, inside any global middleware. Nested groups start
/// with a copy of their parent's middleware.
pub struct Group<'r> {
    router: &'r mut Router,
    prefix: String,
    middleware: Vec<BoxMiddleware>,
}

impl fmt::Debug for Group<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Group")
            .field("prefix", &self.prefix)
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

impl Group<'_> {
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Append middleware for routes registered through this group from now on.
    pub fn use_middleware(&mut self, middleware: impl Middleware + 'static) -> &mut Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Open a nested group; the prefix is appended to this group's prefix.
    pub fn group(&mut self, prefix: &str) -> Group<'_> {
        Group {
            prefix: format!("{}{}", self.prefix, prefix),
            middleware: self.middleware.clone(),
            router: &mut *self.router,
        }
    }

    pub fn route<F>(&mut self, method: Method, pattern: &str, handler: F) -> Result<(), RouteError>
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        self.route_handler(method, pattern, boxed(handler))
    }

    pub fn route_handler(
        &mut self,
        method: Method,
        pattern: &str,
        handler: BoxHandler,
    ) -> Result<(), RouteError> {
        let full = format!("{}{}", self.prefix, pattern);
        let handler = compose(&self.middleware, handler);
        self.router.route_handler(method, &full, handler)
    }

    method_shorthands! {
        get => GET,
        post => POST,
        put => PUT,
        patch => PATCH,
        delete => DELETE,
        head => HEAD,
        options => OPTIONS,
    }
}
