//! Middleware layer.
//!
//! Middleware intercepts a request on its way to the handler and is the right
//! place for cross-cutting concerns: request logging, body guards, field
//! validation, authentication-header inspection.
//!
//! Any function or closure with this signature is a middleware:
//!
//! ```text
//! fn name(ctx: &mut RequestContext<'_>, next: Next<'_>) -> ApiResponse
//! ```
//!
//! Call `next.run(ctx)` to continue, or return a response to short-circuit:
//!
//! ```rust
//! use sprig::{ApiResponse, Next, RequestContext};
//!
//! fn require_api_key(ctx: &mut RequestContext<'_>, next: Next<'_>) -> ApiResponse {
//!     match ctx.request().header("x-api-key") {
//!         Some("secret") => next.run(ctx),
//!         _ => ApiResponse::failure("Missing or invalid API key."),
//!     }
//! }
//! ```
//!
//! Types carrying configuration implement [`Middleware`] directly, as
//! [`RequireFields`] does.
//!
//! Built-in middleware:
//! - [`trace`]: one log line per request
//! - [`require_json_body`]: rejects requests without a parsed JSON body
//! - [`require_fields`]: rejects bodies missing any of the listed fields

mod json_body;
mod request_log;

use std::sync::Arc;

use crate::chain::Next;
use crate::context::RequestContext;
use crate::response::ApiResponse;

pub use json_body::{RequireFields, require_fields, require_json_body};
pub use request_log::trace;

/// A step in the request chain that may continue or short-circuit.
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, ctx: &mut RequestContext<'_>, next: Next<'_>) -> ApiResponse;
}

impl<F> Middleware for F
where
    F: Fn(&mut RequestContext<'_>, Next<'_>) -> ApiResponse + Send + Sync + 'static,
{
    fn handle(&self, ctx: &mut RequestContext<'_>, next: Next<'_>) -> ApiResponse {
        self(ctx, next)
    }
}

/// A type-erased middleware, shared by every worker.
pub type BoxedMiddleware = Arc<dyn Middleware>;

pub(crate) fn boxed(middleware: impl Middleware) -> BoxedMiddleware {
    Arc::new(middleware)
}
