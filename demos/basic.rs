//! Minimal sprig example: login/register with required-field validation.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -X POST http://localhost:3000/api/login \
//!        -H 'content-type: application/json' \
//!        -d '{"username":"alice"}'
//!   curl -X POST http://localhost:3000/api/login \
//!        -H 'content-type: application/json' \
//!        -d '{"username":"alice","password":"hunter2"}'
//!   curl http://localhost:3000/users/42
//!   curl http://localhost:3000/missing

use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::json;
use sprig::{middleware, ApiResponse, App, RequestContext, Route, Router, Server};

/// Process-wide state shared with every handler through the context.
struct Stats {
    logins: AtomicU64,
}

#[tokio::main]
async fn main() -> Result<(), sprig::Error> {
    tracing_subscriber::fmt::init();

    let router = Router::new()
        .middleware(middleware::trace)
        .get("/users/{id}", get_user)
        .route(
            Route::post("/api/login", login)
                .middleware(middleware::require_json_body)
                .middleware(middleware::require_fields(["username", "password"])),
        )
        .route(
            Route::post("/api/register", register)
                .middleware(middleware::require_fields(["username", "password", "email"])),
        );

    let app = App::builder()
        .router(router)
        .data(Stats { logins: AtomicU64::new(0) })
        .arena_block_size(16 * 1024)
        .build()?;

    Server::bind("0.0.0.0:3000")?.serve(app).await
}

// GET /users/{id}
fn get_user(ctx: &mut RequestContext<'_>) -> ApiResponse {
    let id = ctx.request().param("id").unwrap_or("unknown");
    ApiResponse::ok(json!({ "id": id, "name": "alice" }))
}

// POST /api/login
//
// Scratch strings live in the request arena and vanish with the request.
fn login(ctx: &mut RequestContext<'_>) -> ApiResponse {
    let username = ctx.body().and_then(|b| b["username"].as_str()).unwrap_or_default();
    let greeting = ctx
        .arena()
        .and_then(|arena| arena.strdup(&format!("welcome back, {username}")))
        .unwrap_or("welcome back");

    let logins = ctx
        .data::<Stats>()
        .map(|s| s.logins.fetch_add(1, Ordering::Relaxed) + 1)
        .unwrap_or_default();

    ApiResponse::ok(json!({ "message": greeting, "logins": logins }))
}

// POST /api/register → 201
fn register(ctx: &mut RequestContext<'_>) -> ApiResponse {
    let username = ctx.body().and_then(|b| b["username"].as_str()).unwrap_or_default();
    ApiResponse::ok(json!({ "username": username })).with_status(http::StatusCode::CREATED)
}
