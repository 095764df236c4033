//! The middleware chain.
//!
//! For a resolved route the dispatcher runs one ordered sequence of steps:
//!
//! ```text
//! global[0] → global[1] → … → route[0] → route[1] → … → handler
//! ```
//!
//! Each middleware receives the context and a [`Next`] continuation. Calling
//! [`Next::run`] executes the following step and hands its response back, so
//! a middleware can inspect or replace it on the way out. Returning without
//! calling `run` short-circuits: every later step is skipped and that
//! response becomes the result of the whole chain.
//!
//! `Next` is consumed by `run`, so a continuation is invoked at most once.
//! The handler is always the last step and receives no continuation.

use tracing::{debug, trace};

use crate::context::RequestContext;
use crate::handler::BoxedHandler;
use crate::middleware::BoxedMiddleware;
use crate::response::ApiResponse;
use crate::router::Router;

/// The continuation handed to each middleware: "everything after me".
pub struct Next<'a> {
    global: &'a [BoxedMiddleware],
    local: &'a [BoxedMiddleware],
    handler: &'a BoxedHandler,
    step: usize,
}

impl<'a> Next<'a> {
    fn new(
        global: &'a [BoxedMiddleware],
        local: &'a [BoxedMiddleware],
        handler: &'a BoxedHandler,
    ) -> Self {
        Self { global, local, handler, step: 0 }
    }

    /// Index of the step this continuation will execute.
    pub fn step(&self) -> usize {
        self.step
    }

    /// Steps left to run, the handler included.
    pub fn remaining(&self) -> usize {
        self.global.len() + self.local.len() + 1 - self.step
    }

    /// Runs the rest of the chain and returns its response.
    pub fn run(self, ctx: &mut RequestContext<'_>) -> ApiResponse {
        let Self { global, local, handler, step } = self;
        let next = Next { global, local, handler, step: step + 1 };

        if let Some(middleware) = global.get(step) {
            trace!(step, "global middleware");
            return middleware.handle(ctx, next);
        }
        if let Some(middleware) = local.get(step - global.len()) {
            trace!(step, "route middleware");
            return middleware.handle(ctx, next);
        }
        trace!(step, "handler");
        handler.call(ctx)
    }
}

/// Dispatches one request.
///
/// Resolves the context's (method, path) against `router`. No match yields
/// [`ApiResponse::not_found`] without running any middleware. Otherwise the
/// chain `global → route middleware → handler` runs and the first step that
/// does not continue supplies the response.
///
/// Most callers want [`Router::dispatch`], which passes the router's own
/// global middleware.
pub fn dispatch(
    router: &Router,
    global: &[BoxedMiddleware],
    ctx: &mut RequestContext<'_>,
) -> ApiResponse {
    let Some((route, params)) = router.resolve(ctx.request().method(), ctx.request().path()) else {
        debug!(method = %ctx.request().method(), path = ctx.request().path(), "no route matched");
        return ApiResponse::not_found();
    };
    ctx.request_mut().set_params(params);
    Next::new(global, route.middlewares(), route.handler()).run(ctx)
}
