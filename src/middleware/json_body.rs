use tracing::{debug, error};

use super::Middleware;
use crate::chain::Next;
use crate::context::RequestContext;
use crate::error::ErrorKind;
use crate::response::ApiResponse;
use crate::validator::Validator;

/// Short-circuits with `400` unless the request carried a JSON body.
pub fn require_json_body(ctx: &mut RequestContext<'_>, next: Next<'_>) -> ApiResponse {
    if !ctx.has_body() {
        return ApiResponse::failure("No JSON body provided.");
    }
    next.run(ctx)
}

/// Middleware that rejects bodies missing any of a fixed set of fields.
///
/// A fresh [`Validator`] is built per request. The first missing field (in
/// the order given) becomes the failure message, e.g.
/// `The field 'password' is required.`
#[derive(Clone, Debug)]
pub struct RequireFields {
    fields: Vec<String>,
}

/// Builds a [`RequireFields`] middleware.
pub fn require_fields<I, S>(fields: I) -> RequireFields
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    RequireFields { fields: fields.into_iter().map(Into::into).collect() }
}

impl RequireFields {
    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

impl Middleware for RequireFields {
    fn handle(&self, ctx: &mut RequestContext<'_>, next: Next<'_>) -> ApiResponse {
        let mut validator = Validator::new();
        for field in &self.fields {
            if let Err(e) = validator.try_required(field) {
                error!(field = field.as_str(), error = %e, "validator rule rejected");
                return ApiResponse::internal_error();
            }
        }

        if !validator.validate(ctx.body()) {
            let message = validator.error().unwrap_or(ErrorKind::ValidationFailed.as_str());
            debug!(path = ctx.request().path(), message, "validation failed");
            return ApiResponse::failure(message);
        }
        next.run(ctx)
    }
}
