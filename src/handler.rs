//! Handler trait and type erasure.
//!
//! # How handlers are stored
//!
//! A [`Route`](crate::Route) must hold handlers of *different* types, so the
//! concrete type is hidden behind a trait object (`dyn ErasedHandler`) and
//! stored uniformly:
//!
//! ```text
//! fn login(ctx: &mut RequestContext<'_>) -> ApiResponse { … }  ← user writes this
//!        ↓ Route::post("/api/login", login)
//! login.into_boxed_handler()                                   ← Handler blanket impl
//!        ↓
//! Arc::new(FnHandler(login))                                   ← heap-allocated wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn ErasedHandler>
//! handler.call(ctx)  at request time                           ← one vtable dispatch
//! ```
//!
//! Handlers are the terminal step of a chain: they receive the context but no
//! continuation.

use std::sync::Arc;

use crate::context::RequestContext;
use crate::response::{ApiResponse, IntoApiResponse};

/// Internal dispatch interface.
///
/// `#[doc(hidden)] pub` rather than `pub(crate)` because it appears in the
/// return type of the public `Handler` trait's `into_boxed_handler` method.
#[doc(hidden)]
pub trait ErasedHandler {
    fn call(&self, ctx: &mut RequestContext<'_>) -> ApiResponse;
}

/// A type-erased handler shared by every worker.
#[doc(hidden)]
pub type BoxedHandler = Arc<dyn ErasedHandler + Send + Sync + 'static>;

/// Implemented for every valid route handler.
///
/// You never implement this yourself. It is satisfied by any function or
/// closure with the signature:
///
/// ```text
/// fn name(ctx: &mut RequestContext<'_>) -> impl IntoApiResponse
/// ```
///
/// The trait is sealed: only the blanket impl below can satisfy it.
pub trait Handler: private::Sealed + Send + Sync + 'static {
    #[doc(hidden)]
    fn into_boxed_handler(self) -> BoxedHandler;
}

mod private {
    pub trait Sealed {}
}

impl<F, R> private::Sealed for F
where
    F: Fn(&mut RequestContext<'_>) -> R + Send + Sync + 'static,
    R: IntoApiResponse,
{
}

impl<F, R> Handler for F
where
    F: Fn(&mut RequestContext<'_>) -> R + Send + Sync + 'static,
    R: IntoApiResponse,
{
    fn into_boxed_handler(self) -> BoxedHandler {
        Arc::new(FnHandler(self))
    }
}

/// Bridges a concrete handler `F` to the trait-object world.
struct FnHandler<F>(F);

impl<F, R> ErasedHandler for FnHandler<F>
where
    F: Fn(&mut RequestContext<'_>) -> R,
    R: IntoApiResponse,
{
    fn call(&self, ctx: &mut RequestContext<'_>) -> ApiResponse {
        (self.0)(ctx).into_api_response()
    }
}
