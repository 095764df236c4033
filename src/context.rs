//! The per-request value threaded through every middleware and handler.

use std::any::Any;
use std::fmt;

use serde_json::Value;
use tracing::trace;

use crate::app::App;
use crate::arena::Arena;
use crate::request::Request;

/// Everything one in-flight request needs.
///
/// A context borrows process-wide services from the [`App`] (their lifetime
/// `'a` exceeds the request), and owns the per-request state: the parsed
/// [`Request`], the optional JSON body, and the request's [`Arena`].
///
/// A fresh context has no body and no arena. The serving layer attaches an
/// arena immediately after construction and releases it when the request
/// concludes; dropping the context releases it too, so the arena is torn
/// down on every exit path.
///
/// A context is never shared across threads: one context, one request.
pub struct RequestContext<'a> {
    app: &'a App,
    data: Option<&'a (dyn Any + Send + Sync)>,
    request: Request,
    body: Option<Value>,
    has_body: bool,
    arena: Option<Arena>,
}

impl<'a> RequestContext<'a> {
    pub fn new(app: &'a App, request: Request) -> Self {
        Self {
            app,
            data: app.data_handle(),
            request,
            body: None,
            has_body: false,
            arena: None,
        }
    }

    pub fn app(&self) -> &'a App {
        self.app
    }

    /// The application's data-access handle, if it is a `T`.
    ///
    /// The returned reference borrows the application, not the context, so it
    /// can be held across calls that need `&mut self`.
    pub fn data<T: Any>(&self) -> Option<&'a T> {
        self.data?.downcast_ref::<T>()
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut Request {
        &mut self.request
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn has_body(&self) -> bool {
        self.has_body
    }

    pub fn set_body(&mut self, body: Value) {
        self.body = Some(body);
        self.has_body = true;
    }

    pub fn take_body(&mut self) -> Option<Value> {
        self.has_body = false;
        self.body.take()
    }

    /// The request's arena, once the serving layer has attached one.
    pub fn arena(&self) -> Option<&Arena> {
        self.arena.as_ref()
    }

    /// Attaches `arena`, returning any arena that was attached before.
    pub fn attach_arena(&mut self, arena: Arena) -> Option<Arena> {
        self.arena.replace(arena)
    }

    /// Destroys the attached arena. Calling it again, or on a context that
    /// never had an arena, does nothing.
    pub fn release_arena(&mut self) {
        if let Some(arena) = self.arena.take() {
            trace!(path = self.request.path(), "releasing request arena");
            arena.destroy();
        }
    }
}

impl fmt::Debug for RequestContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("request", &self.request)
            .field("body", &self.body)
            .field("has_body", &self.has_body)
            .field("arena", &self.arena)
            .finish_non_exhaustive()
    }
}
