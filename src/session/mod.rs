//! Request handling on an established hub connection.
//!
//! - [`Handler`] the seam the worker loop serves through
//! - [`HttpHandler`] HTTP/1.1 implementation on top of hyper
//! - [`SessionContext`] / [`SessionSummary`] inputs and clean outcome

mod handler;
mod http;

pub use handler::{Handler, SessionContext, SessionSummary};
pub use http::HttpHandler;
