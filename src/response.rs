//! The terminal value of every dispatch: [`ApiResponse`], and the
//! [`IntoApiResponse`] conversion trait.
//!
//! Every middleware and handler returns one. The serving layer turns it into
//! an HTTP response with a JSON envelope:
//!
//! ```text
//! Success → 200  {"success":true,"data":…}       ("data" omitted when absent)
//! Failure → 400  {"success":false,"message":"…"}
//! ```

use bytes::Bytes;
use http::StatusCode;
use http::header::CONTENT_TYPE;
use http_body_util::Full;
use serde_json::{Map, Value};

/// A tagged result: success with an optional payload, or failure with a
/// message. Each side carries the HTTP status the serving layer will use.
///
/// ```rust
/// use sprig::ApiResponse;
/// use http::StatusCode;
/// use serde_json::json;
///
/// let ok = ApiResponse::ok(json!({"id": 42}));
/// assert!(ok.is_success());
///
/// let denied = ApiResponse::failure("Invalid credentials.").with_status(StatusCode::UNAUTHORIZED);
/// assert_eq!(denied.message(), Some("Invalid credentials."));
/// assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub enum ApiResponse {
    Success { data: Option<Value>, status: StatusCode },
    Failure { message: String, status: StatusCode },
}

impl ApiResponse {
    /// `200 OK` without a payload.
    pub fn success() -> Self {
        Self::Success { data: None, status: StatusCode::OK }
    }

    /// `200 OK` carrying `data`.
    pub fn ok(data: impl Into<Value>) -> Self {
        Self::Success { data: Some(data.into()), status: StatusCode::OK }
    }

    /// `400 Bad Request` with `message`.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure { message: message.into(), status: StatusCode::BAD_REQUEST }
    }

    /// `404 Not Found`: the dispatcher's answer when no route matches.
    pub fn not_found() -> Self {
        Self::Failure { message: "Not found.".to_owned(), status: StatusCode::NOT_FOUND }
    }

    /// `500 Internal Server Error`.
    pub fn internal_error() -> Self {
        Self::Failure {
            message: "Internal server error.".to_owned(),
            status: StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn with_status(mut self, code: StatusCode) -> Self {
        match &mut self {
            Self::Success { status, .. } | Self::Failure { status, .. } => *status = code,
        }
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Success { status, .. } | Self::Failure { status, .. } => *status,
        }
    }

    pub fn data(&self) -> Option<&Value> {
        match self {
            Self::Success { data, .. } => data.as_ref(),
            Self::Failure { .. } => None,
        }
    }

    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Failure { message, .. } => Some(message.as_str()),
            Self::Success { .. } => None,
        }
    }

    /// The JSON envelope sent to the client.
    pub fn to_json(&self) -> Value {
        let mut envelope = Map::new();
        match self {
            Self::Success { data, .. } => {
                envelope.insert("success".to_owned(), Value::Bool(true));
                if let Some(data) = data {
                    envelope.insert("data".to_owned(), data.clone());
                }
            }
            Self::Failure { message, .. } => {
                envelope.insert("success".to_owned(), Value::Bool(false));
                envelope.insert("message".to_owned(), Value::String(message.clone()));
            }
        }
        Value::Object(envelope)
    }

    /// Converts into a `hyper`-ready response.
    pub fn into_http(self) -> http::Response<Full<Bytes>> {
        // Serialising a `Value` with string keys cannot fail.
        let body = serde_json::to_vec(&self.to_json()).unwrap_or_default();
        let mut response = http::Response::new(Full::new(Bytes::from(body)));
        *response.status_mut() = self.status();
        response
            .headers_mut()
            .insert(CONTENT_TYPE, http::HeaderValue::from_static("application/json"));
        response
    }
}

// ── IntoApiResponse ───────────────────────────────────────────────────────────

/// Conversion into an [`ApiResponse`].
///
/// Handlers may return anything implementing this trait. `Result` is covered
/// so handlers can use `?` with an `ApiResponse` as the error:
///
/// ```rust
/// use sprig::{ApiResponse, RequestContext};
/// use serde_json::Value;
///
/// fn whoami(ctx: &mut RequestContext<'_>) -> Result<Value, ApiResponse> {
///     let name = ctx.request()
///         .header("x-user")
///         .ok_or_else(|| ApiResponse::failure("Missing x-user header."))?;
///     Ok(Value::from(name))
/// }
/// ```
pub trait IntoApiResponse {
    fn into_api_response(self) -> ApiResponse;
}

impl IntoApiResponse for ApiResponse {
    fn into_api_response(self) -> ApiResponse { self }
}

/// A bare JSON value is a successful payload.
impl IntoApiResponse for Value {
    fn into_api_response(self) -> ApiResponse { ApiResponse::ok(self) }
}

/// `()` is a success without payload.
impl IntoApiResponse for () {
    fn into_api_response(self) -> ApiResponse { ApiResponse::success() }
}

impl<T, E> IntoApiResponse for Result<T, E>
where
    T: IntoApiResponse,
    E: IntoApiResponse,
{
    fn into_api_response(self) -> ApiResponse {
        match self {
            Ok(v) => v.into_api_response(),
            Err(e) => e.into_api_response(),
        }
    }
}
