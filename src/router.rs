//! Route table and global middleware.
//!
//! One radix tree per HTTP method, each leaf pointing into a flat list of
//! [`Route`]s. Static paths match exactly on the (method, path) pair;
//! `{name}` segments capture into [`Request::param`](crate::Request::param).
//!
//! The router is built by value during startup and then moved into the
//! [`App`](crate::App). Nothing hands out `&mut Router` after that, which is
//! what makes concurrent [`resolve`](Router::resolve) calls lock-free.

use std::collections::HashMap;

use http::Method;
use matchit::Router as MatchitRouter;

use crate::chain;
use crate::context::RequestContext;
use crate::error::{Error, ErrorKind};
use crate::handler::{BoxedHandler, Handler};
use crate::middleware::{BoxedMiddleware, Middleware};
use crate::response::ApiResponse;

// ── Route ─────────────────────────────────────────────────────────────────────

/// A (method, path) → (handler, local middleware) binding.
///
/// Local middleware runs after every global middleware, in the order it was
/// added:
///
/// ```rust
/// use sprig::{middleware, ApiResponse, RequestContext, Route};
///
/// fn login(_ctx: &mut RequestContext<'_>) -> ApiResponse {
///     ApiResponse::success()
/// }
///
/// let route = Route::post("/api/login", login)
///     .middleware(middleware::require_json_body)
///     .middleware(middleware::require_fields(["username", "password"]));
///
/// assert_eq!(route.middlewares().len(), 2);
/// ```
pub struct Route {
    method: Method,
    path: String,
    handler: BoxedHandler,
    middleware: Vec<BoxedMiddleware>,
}

impl Route {
    pub fn new(method: Method, path: impl Into<String>, handler: impl Handler) -> Self {
        Self {
            method,
            path: path.into(),
            handler: handler.into_boxed_handler(),
            middleware: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::GET, path, handler)
    }

    pub fn post(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::POST, path, handler)
    }

    pub fn put(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::PUT, path, handler)
    }

    pub fn patch(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::PATCH, path, handler)
    }

    pub fn delete(path: impl Into<String>, handler: impl Handler) -> Self {
        Self::new(Method::DELETE, path, handler)
    }

    /// Appends a local middleware.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(crate::middleware::boxed(middleware));
        self
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn path(&self) -> &str { &self.path }
    pub fn middlewares(&self) -> &[BoxedMiddleware] { &self.middleware }

    pub(crate) fn handler(&self) -> &BoxedHandler {
        &self.handler
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// The application router.
///
/// ```rust
/// use http::Method;
/// use sprig::{middleware, ApiResponse, RequestContext, Router};
///
/// fn list(_: &mut RequestContext<'_>) -> ApiResponse { ApiResponse::success() }
/// fn create(_: &mut RequestContext<'_>) -> ApiResponse { ApiResponse::success() }
///
/// let router = Router::new()
///     .middleware(middleware::trace)
///     .get("/api/items", list)
///     .post("/api/items", create);
///
/// assert!(router.resolve(&Method::GET, "/api/items").is_some());
/// assert!(router.resolve(&Method::DELETE, "/api/items").is_none());
/// ```
pub struct Router {
    trees: HashMap<Method, MatchitRouter<usize>>,
    routes: Vec<Route>,
    global: Vec<BoxedMiddleware>,
}

impl Router {
    pub fn new() -> Self {
        Self { trees: HashMap::new(), routes: Vec::new(), global: Vec::new() }
    }

    /// Appends a global middleware, applied to every route in registration
    /// order.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.global.push(crate::middleware::boxed(middleware));
        self
    }

    /// Inserts `route`.
    ///
    /// Fails with [`ErrorKind::InvalidArgument`] if the path is malformed or
    /// already registered for the same method.
    pub fn register(&mut self, route: Route) -> Result<(), Error> {
        let index = self.routes.len();
        self.trees
            .entry(route.method.clone())
            .or_default()
            .insert(route.path.clone(), index)
            .map_err(|e| Error::with_source(ErrorKind::InvalidArgument, e.to_string()))?;
        self.routes.push(route);
        Ok(())
    }

    /// Chaining form of [`register`](Router::register).
    ///
    /// # Panics
    ///
    /// Panics on an invalid or duplicate route. Routes are registered at
    /// startup, so this surfaces immediately.
    pub fn route(mut self, route: Route) -> Self {
        let desc = format!("{} {}", route.method, route.path);
        if let Err(e) = self.register(route) {
            panic!("invalid route `{desc}`: {e}");
        }
        self
    }

    /// Registers `handler` for a method + path pair, without local middleware.
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.route(Route::new(method, path, handler))
    }

    pub fn get(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::GET, path, handler)
    }

    pub fn post(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::POST, path, handler)
    }

    pub fn put(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PUT, path, handler)
    }

    pub fn patch(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::PATCH, path, handler)
    }

    pub fn delete(self, path: &str, handler: impl Handler) -> Self {
        self.on(Method::DELETE, path, handler)
    }

    /// Finds the route for `method` and `path`, with any captured path
    /// parameters.
    pub fn resolve(&self, method: &Method, path: &str) -> Option<(&Route, HashMap<String, String>)> {
        let tree = self.trees.get(method)?;
        let matched = tree.at(path).ok()?;
        let route = &self.routes[*matched.value];
        let params = matched.params.iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        Some((route, params))
    }

    pub fn global_middleware(&self) -> &[BoxedMiddleware] {
        &self.global
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Runs `ctx` through this router's own global middleware and the
    /// matching route. See [`dispatch`](crate::dispatch).
    pub fn dispatch(&self, ctx: &mut RequestContext<'_>) -> ApiResponse {
        chain::dispatch(self, &self.global, ctx)
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h1(_: &mut RequestContext<'_>) -> ApiResponse {
        ApiResponse::ok("h1")
    }

    fn h2(_: &mut RequestContext<'_>) -> ApiResponse {
        ApiResponse::ok("h2")
    }

    #[test]
    fn resolves_on_method_and_path() {
        let router = Router::new().get("/x", h1).post("/x", h2);
        let app = crate::App::new(Router::new());
        let mut ctx = RequestContext::new(&app, crate::Request::new(Method::GET, "/x"));

        let (get, _) = router.resolve(&Method::GET, "/x").unwrap();
        assert_eq!(*get.method(), Method::GET);
        assert_eq!(get.path(), "/x");
        assert_eq!(get.handler().call(&mut ctx), ApiResponse::ok("h1"));

        let (post, _) = router.resolve(&Method::POST, "/x").unwrap();
        assert_eq!(*post.method(), Method::POST);
        assert_eq!(post.handler().call(&mut ctx), ApiResponse::ok("h2"));

        assert!(router.resolve(&Method::GET, "/y").is_none());
        assert!(router.resolve(&Method::PUT, "/x").is_none());
    }

    #[test]
    fn static_paths_match_exactly() {
        let router = Router::new().get("/x", h1);
        assert!(router.resolve(&Method::GET, "/x/").is_none());
        assert!(router.resolve(&Method::GET, "/xy").is_none());
        assert!(router.resolve(&Method::GET, "/X").is_none());
    }

    #[test]
    fn captures_path_parameters() {
        let router = Router::new().get("/users/{id}", h1);
        let (_, params) = router.resolve(&Method::GET, "/users/42").unwrap();
        assert_eq!(params.get("id").map(String::as_str), Some("42"));
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut router = Router::new();
        router.register(Route::get("/x", h1)).unwrap();
        let err = router.register(Route::get("/x", h2)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(router.len(), 1);

        // Same path under another method is a different route.
        router.register(Route::post("/x", h2)).unwrap();
        assert_eq!(router.len(), 2);
    }

    #[test]
    #[should_panic(expected = "invalid route `GET /x`")]
    fn chaining_panics_on_duplicates() {
        let _ = Router::new().get("/x", h1).get("/x", h2);
    }

    #[test]
    fn keeps_middleware_order() {
        fn pass(ctx: &mut RequestContext<'_>, next: crate::Next<'_>) -> ApiResponse {
            next.run(ctx)
        }

        let router = Router::new()
            .middleware(pass)
            .middleware(pass)
            .route(Route::get("/x", h1).middleware(pass));

        assert_eq!(router.global_middleware().len(), 2);
        assert_eq!(router.routes()[0].middlewares().len(), 1);
        assert!(!router.is_empty());
    }
}
