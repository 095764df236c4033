use std::time::Instant;

use tracing::info;

use crate::chain::Next;
use crate::context::RequestContext;
use crate::response::ApiResponse;

/// Logs method, path, final status and latency of every request at `INFO`.
///
/// Register it first so the latency covers the rest of the chain.
pub fn trace(ctx: &mut RequestContext<'_>, next: Next<'_>) -> ApiResponse {
    let method = ctx.request().method().clone();
    let path = ctx.request().path().to_owned();
    let started = Instant::now();

    let response = next.run(ctx);

    info!(
        %method,
        %path,
        status = response.status().as_u16(),
        latency_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX),
        "request"
    );
    response
}
