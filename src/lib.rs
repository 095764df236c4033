//! # sprig
//!
//! The request-processing core of a minimal JSON-over-HTTP framework.
//!
//! ## The contract
//!
//! sprig decides what happens to a request between "the bytes arrived" and
//! "the response envelope is ready":
//!
//! - **Routing**: exact (method, path) lookup, plus `{name}` captures, via
//!   [`matchit`]
//! - **Middleware chain**: global, then per-route, then the handler. Any
//!   step may short-circuit.
//! - **Per-request arena**: a bump allocator handed to every handler and
//!   torn down when the request concludes
//! - **Validation**: required-field rules over the JSON body
//! - **Envelope**: every reply is `{"success":…,"data"|"message":…}`
//!
//! TLS, rate limiting and body-size limits belong to the reverse proxy in
//! front of it.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use serde_json::json;
//! use sprig::{middleware, ApiResponse, App, RequestContext, Route, Router, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), sprig::Error> {
//!     let router = Router::new()
//!         .middleware(middleware::trace)
//!         .get("/users/{id}", get_user)
//!         .route(
//!             Route::post("/api/login", login)
//!                 .middleware(middleware::require_json_body)
//!                 .middleware(middleware::require_fields(["username", "password"])),
//!         );
//!
//!     Server::bind("0.0.0.0:3000")?.serve(App::new(router)).await
//! }
//!
//! fn get_user(ctx: &mut RequestContext<'_>) -> ApiResponse {
//!     let id = ctx.request().param("id").unwrap_or("unknown");
//!     ApiResponse::ok(json!({ "id": id }))
//! }
//!
//! fn login(ctx: &mut RequestContext<'_>) -> ApiResponse {
//!     // `require_fields` ran first, so both keys are present.
//!     let user = ctx.body().and_then(|b| b["username"].as_str()).unwrap_or_default();
//!     ApiResponse::ok(json!({ "welcome": user }))
//! }
//! ```

mod app;
mod arena;
mod chain;
mod context;
mod error;
mod handler;
mod request;
mod response;
mod router;
mod server;
mod validator;

pub mod middleware;

pub use app::{App, AppBuilder};
pub use arena::{ALIGNMENT, Arena, DEFAULT_BLOCK_SIZE};
pub use chain::{Next, dispatch};
pub use context::RequestContext;
pub use error::{Error, ErrorKind};
pub use handler::Handler;
pub use middleware::Middleware;
pub use request::Request;
pub use response::{ApiResponse, IntoApiResponse};
pub use router::{Route, Router};
pub use server::Server;
pub use validator::{Rule, Validator};
