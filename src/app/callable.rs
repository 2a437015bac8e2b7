//! # Application abstraction and function-backed implementation.
//!
//! [`App`] is the embedded request handler: synchronous, possibly blocking,
//! invoked once per request. The session layer runs it on tokio's blocking
//! pool so a slow app never stalls the runtime.
//!
//! [`AppFn`] wraps a closure; [`AppRef`] is the shared handle every slot holds.

use std::borrow::Cow;
use std::sync::Arc;

use crate::app::{AppResponse, Environ};
use crate::error::AppError;

/// Shared handle to an application.
pub type AppRef = Arc<dyn App>;

/// # Request-handling application.
///
/// # Example
/// ```
/// use hubworker::{App, AppError, AppResponse, Environ};
///
/// struct Ping;
///
/// impl App for Ping {
///     fn name(&self) -> &str { "ping" }
///
///     fn call(&self, env: &Environ) -> Result<AppResponse, AppError> {
///         Ok(AppResponse::text(format!("pong from slot {}\n", env.slot)))
///     }
/// }
/// ```
pub trait App: Send + Sync + 'static {
    /// Stable, human-readable name.
    fn name(&self) -> &str;

    /// Produces the response for one request.
    fn call(&self, env: &Environ) -> Result<AppResponse, AppError>;
}

/// Closure-backed application.
pub struct AppFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> AppFn<F>
where
    F: Fn(&Environ) -> Result<AppResponse, AppError> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the app and returns it as an [`AppRef`].
    ///
    /// ```rust
    /// use hubworker::{AppFn, AppRef, AppResponse};
    ///
    /// let app: AppRef = AppFn::arc("hello", |_env: &hubworker::Environ| Ok(AppResponse::text("hi\n")));
    /// assert_eq!(app.name(), "hello");
    /// ```
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

impl<F> App for AppFn<F>
where
    F: Fn(&Environ) -> Result<AppResponse, AppError> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn call(&self, env: &Environ) -> Result<AppResponse, AppError> {
        (self.f)(env)
    }
}
