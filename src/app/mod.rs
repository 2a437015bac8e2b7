//! # Embedded application.
//!
//! - [`App`] - trait for the synchronous request handler
//! - [`AppFn`] - closure-backed implementation
//! - [`AppRef`] - shared handle (`Arc<dyn App>`)
//! - [`Environ`] - per-request environment
//! - [`AppResponse`] - what the app returns
//! - [`AppCatalog`] - `MODULE:SYMBOL` resolution

mod callable;
mod catalog;
mod environ;
mod response;

pub use callable::{App, AppFn, AppRef};
pub use catalog::{AppCatalog, DEFAULT_APP};
pub use environ::Environ;
pub use response::AppResponse;
