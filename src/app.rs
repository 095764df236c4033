//! The application handle: the frozen router plus shared services.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::arena::DEFAULT_BLOCK_SIZE;
use crate::error::{Error, ErrorKind};
use crate::router::Router;

/// The application handle every request borrows.
///
/// Built once at startup by [`AppBuilder`]. From then on it is read-only:
/// the router cannot be modified and the data handle is shared, so any
/// number of workers may dispatch through `&App` (or `Arc<App>`) without a
/// lock.
pub struct App {
    router: Router,
    data: Option<Arc<dyn Any + Send + Sync>>,
    arena_block_size: usize,
}

impl App {
    /// An app with `router`, no data handle and default settings.
    pub fn new(router: Router) -> Self {
        Self { router, data: None, arena_block_size: DEFAULT_BLOCK_SIZE }
    }

    pub fn builder() -> AppBuilder {
        AppBuilder::default()
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// The data-access handle, if one was configured and it is a `T`.
    pub fn data<T: Any>(&self) -> Option<&T> {
        self.data.as_deref()?.downcast_ref::<T>()
    }

    pub(crate) fn data_handle(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.data.as_deref()
    }

    /// Block size of the arena created for each request.
    pub fn arena_block_size(&self) -> usize {
        self.arena_block_size
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("routes", &self.router.len())
            .field("has_data", &self.data.is_some())
            .field("arena_block_size", &self.arena_block_size)
            .finish()
    }
}

/// Startup-time configuration for an [`App`].
///
/// ```rust
/// use sprig::{App, Router};
///
/// struct Db;
///
/// let app = App::builder()
///     .router(Router::new())
///     .data(Db)
///     .arena_block_size(16 * 1024)
///     .build()
///     .unwrap();
///
/// assert!(app.data::<Db>().is_some());
/// ```
pub struct AppBuilder {
    router: Router,
    data: Option<Arc<dyn Any + Send + Sync>>,
    arena_block_size: usize,
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self { router: Router::new(), data: None, arena_block_size: DEFAULT_BLOCK_SIZE }
    }
}

impl AppBuilder {
    pub fn router(mut self, router: Router) -> Self {
        self.router = router;
        self
    }

    /// Sets the data-access handle shared by every request.
    pub fn data<T: Any + Send + Sync>(mut self, data: T) -> Self {
        self.data = Some(Arc::new(data));
        self
    }

    /// Like [`data`](AppBuilder::data), for a handle already behind an `Arc`.
    pub fn shared_data<T: Any + Send + Sync>(mut self, data: Arc<T>) -> Self {
        self.data = Some(data);
        self
    }

    pub fn arena_block_size(mut self, size: usize) -> Self {
        self.arena_block_size = size;
        self
    }

    /// Fails with [`ErrorKind::InvalidArgument`] for a zero arena block size.
    pub fn build(self) -> Result<App, Error> {
        if self.arena_block_size == 0 {
            return Err(ErrorKind::InvalidArgument.into());
        }
        Ok(App {
            router: self.router,
            data: self.data,
            arena_block_size: self.arena_block_size,
        })
    }
}
