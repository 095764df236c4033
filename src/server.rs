//! HTTP server, request serving and graceful shutdown.
//!
//! Every request goes through [`App::handle`]:
//!
//! 1. collect the body bytes,
//! 2. build a [`RequestContext`] and attach a fresh [`Arena`],
//! 3. parse a non-empty body as JSON (a malformed body leaves the context
//!    without one, and validation reports it as missing),
//! 4. dispatch through the router's middleware chain,
//! 5. release the arena and encode the [`ApiResponse`] as JSON.
//!
//! A panicking handler or middleware yields `500` for that request only.
//!
//! # Graceful shutdown
//!
//! On SIGTERM or Ctrl-C the server stops accepting connections, lets every
//! in-flight connection run to completion, then returns from
//! [`Server::serve`].

use std::convert::Infallible;
use std::fmt::Display;
use std::future::Future;
use std::net::SocketAddr;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder as ConnBuilder;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::app::App;
use crate::arena::Arena;
use crate::context::RequestContext;
use crate::error::{Error, ErrorKind};
use crate::request::Request;
use crate::response::ApiResponse;

/// The HTTP server.
#[derive(Debug, Clone, Copy)]
pub struct Server {
    addr: SocketAddr,
}

impl Server {
    /// Configures the server to bind to `addr` when [`serve`](Server::serve)
    /// is called.
    ///
    /// Fails with [`ErrorKind::InvalidArgument`] if `addr` is not a valid
    /// `host:port` string.
    ///
    /// ```rust
    /// use sprig::{ErrorKind, Server};
    ///
    /// assert!(Server::bind("0.0.0.0:3000").is_ok());
    /// assert_eq!(Server::bind("nope").unwrap_err().kind(), ErrorKind::InvalidArgument);
    /// ```
    pub fn bind(addr: &str) -> Result<Self, Error> {
        let addr = addr
            .parse()
            .map_err(|e| Error::with_source(ErrorKind::InvalidArgument, e))?;
        Ok(Self { addr })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serves `app` until SIGTERM or Ctrl-C, then drains in-flight
    /// connections.
    pub async fn serve(self, app: App) -> Result<(), Error> {
        self.serve_with_shutdown(app, shutdown_signal()).await
    }

    /// Serves `app` until `signal` resolves, then drains in-flight
    /// connections.
    pub async fn serve_with_shutdown<S>(self, app: App, signal: S) -> Result<(), Error>
    where
        S: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.addr).await?;
        let app = Arc::new(app);

        info!(addr = %self.addr, routes = app.router().len(), "sprig listening");

        let mut tasks = tokio::task::JoinSet::new();

        tokio::pin!(signal);

        loop {
            tokio::select! {
                // Shutdown wins over queued connections.
                biased;

                () = &mut signal => {
                    info!(in_flight = tasks.len(), "shutdown signal received, draining connections");
                    break;
                }

                res = listener.accept() => {
                    let (stream, remote_addr) = match res {
                        Ok(v) => v,
                        Err(e) => {
                            error!("accept error: {e}");
                            continue;
                        }
                    };

                    let app = Arc::clone(&app);
                    let io = TokioIo::new(stream);

                    tasks.spawn(async move {
                        let svc = service_fn(move |req| {
                            let app = Arc::clone(&app);
                            async move { Ok::<_, Infallible>(app.handle(req).await) }
                        });

                        if let Err(e) = ConnBuilder::new(TokioExecutor::new())
                            .serve_connection(io, svc)
                            .await
                        {
                            error!(peer = %remote_addr, "connection error: {e}");
                        }
                    });
                }

                Some(_) = tasks.join_next(), if !tasks.is_empty() => {}
            }
        }

        while tasks.join_next().await.is_some() {}

        info!("sprig stopped");
        Ok(())
    }
}

// ── Request serving ───────────────────────────────────────────────────────────

impl App {
    /// Serves one HTTP request end to end. Never fails: every problem maps to
    /// a JSON error envelope.
    pub async fn handle<B>(&self, req: http::Request<B>) -> http::Response<Full<Bytes>>
    where
        B: Body,
        B::Error: Display,
    {
        let (parts, body) = req.into_parts();
        let body = match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                warn!(path = parts.uri.path(), "failed to read request body: {e}");
                return ApiResponse::failure("Could not read request body.").into_http();
            }
        };

        self.respond(Request::from_parts(parts, body)).into_http()
    }

    /// Runs an already-collected request through the arena lifecycle and the
    /// middleware chain.
    pub fn respond(&self, request: Request) -> ApiResponse {
        let arena = match Arena::with_block_size(self.arena_block_size()) {
            Ok(arena) => arena,
            Err(e) => {
                error!(error = %e, "failed to create request arena");
                return ApiResponse::internal_error();
            }
        };

        let mut ctx = RequestContext::new(self, request);
        ctx.attach_arena(arena);

        if !ctx.request().body().is_empty() {
            match ctx.request().json() {
                Ok(body) => ctx.set_body(body),
                Err(e) => debug!(path = ctx.request().path(), error = %e, "request body is not JSON"),
            }
        }

        let router = self.router();
        let response = panic::catch_unwind(AssertUnwindSafe(|| router.dispatch(&mut ctx)))
            .unwrap_or_else(|payload| {
                let reason = payload
                    .downcast_ref::<&str>()
                    .copied()
                    .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                    .unwrap_or("<non-string panic>");
                error!(method = %ctx.request().method(), path = ctx.request().path(), reason, "handler panicked");
                ApiResponse::internal_error()
            });

        ctx.release_arena();
        response
    }
}

// ── Shutdown signal ───────────────────────────────────────────────────────────

/// Resolves on the first SIGTERM or SIGINT (Ctrl-C). On Windows only Ctrl-C
/// is available. A handler that cannot be installed is logged and never
/// fires.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl-C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c   => {}
        () = sigterm  => {}
    }
}

#[cfg(test)]
mod tests {
    use http::Method;
    use serde_json::json;

    use super::*;
    use crate::router::Router;

    fn echo(ctx: &mut RequestContext<'_>) -> ApiResponse {
        let in_arena = ctx.arena().and_then(|a| a.strdup("scratch")).is_some();
        ApiResponse::ok(json!({ "body": ctx.body().cloned(), "arena": in_arena }))
    }

    #[test]
    fn respond_parses_json_and_attaches_an_arena() {
        let app = App::new(Router::new().post("/echo", echo));
        let res = app.respond(Request::new(Method::POST, "/echo").with_body(r#"{"a":1}"#));
        assert_eq!(res.data(), Some(&json!({ "body": { "a": 1 }, "arena": true })));
    }

    #[test]
    fn malformed_body_leaves_context_without_body() {
        let app = App::new(Router::new().post("/echo", echo));
        let res = app.respond(Request::new(Method::POST, "/echo").with_body("{not json"));
        assert_eq!(res.data(), Some(&json!({ "body": null, "arena": true })));
    }

    #[test]
    fn panics_become_internal_errors() {
        fn boom(_: &mut RequestContext<'_>) -> ApiResponse {
            panic!("boom")
        }
        let app = App::new(Router::new().get("/boom", boom));
        let res = app.respond(Request::new(Method::GET, "/boom"));
        assert_eq!(res, ApiResponse::internal_error());
    }

    #[test]
    fn bind_rejects_garbage() {
        assert!(Server::bind("127.0.0.1:0").is_ok());
        assert_eq!(Server::bind("localhost").unwrap_err().kind(), ErrorKind::InvalidArgument);
    }
}
