//! # Application catalog.
//!
//! The CLI names the application as `MODULE:SYMBOL`. Rust has no runtime
//! module loader, so references resolve against an [`AppCatalog`]: a map from
//! reference to [`AppRef`]. [`AppCatalog::builtin`] ships the demo apps;
//! embedders build their own binary and [`register`](AppCatalog::register)
//! their applications before resolving.
//!
//! | reference    | behavior                                              |
//! |--------------|-------------------------------------------------------|
//! | `demo:hello` | `Hello world!` followed by the sorted environ listing |
//! | `demo:echo`  | echoes method, path and body                          |
//! | `demo:fail`  | always fails (exercises the error path)               |

use std::collections::BTreeMap;

use hyper::header::HeaderValue;

use crate::app::{AppFn, AppRef, AppResponse, Environ};
use crate::error::{AppError, StartupError};

/// Reference used when the CLI gets no `APP` argument.
pub const DEFAULT_APP: &str = "demo:hello";

/// Named applications resolvable from `MODULE:SYMBOL` references.
#[derive(Clone, Default)]
pub struct AppCatalog {
    apps: BTreeMap<String, AppRef>,
}

impl AppCatalog {
    /// Empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding the demo applications.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register("demo:hello", AppFn::arc("demo:hello", hello));
        catalog.register("demo:echo", AppFn::arc("demo:echo", echo));
        catalog.register(
            "demo:fail",
            AppFn::arc("demo:fail", |_env: &Environ| {
                Err(AppError::failed("demo:fail always fails"))
            }),
        );
        catalog
    }

    /// Adds or replaces an application.
    pub fn register(&mut self, reference: impl Into<String>, app: AppRef) -> &mut Self {
        self.apps.insert(reference.into(), app);
        self
    }

    /// Resolves a `MODULE:SYMBOL` reference.
    pub fn resolve(&self, reference: &str) -> Result<AppRef, StartupError> {
        let valid = reference
            .split_once(':')
            .is_some_and(|(module, symbol)| !module.is_empty() && !symbol.is_empty());
        if !valid {
            return Err(StartupError::InvalidAppReference {
                reference: reference.to_string(),
            });
        }

        self.apps
            .get(reference)
            .cloned()
            .ok_or_else(|| StartupError::UnknownApp {
                reference: reference.to_string(),
                available: self.references().join(", "),
            })
    }

    /// Registered references in sorted order.
    pub fn references(&self) -> Vec<&str> {
        self.apps.keys().map(String::as_str).collect()
    }
}

fn hello(env: &Environ) -> Result<AppResponse, AppError> {
    let mut body = String::from("Hello world!\n\n");
    for (key, value) in env.to_pairs() {
        body.push_str(&format!("{key} = {value:?}\n"));
    }
    Ok(AppResponse::text(body))
}

fn echo(env: &Environ) -> Result<AppResponse, AppError> {
    let mut body = format!("{} {}", env.method, env.path).into_bytes();
    if let Some(q) = &env.query {
        body.push(b'?');
        body.extend_from_slice(q.as_bytes());
    }
    body.push(b'\n');
    body.extend_from_slice(&env.body);

    let content_type = env
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or_else(|| HeaderValue::from_static("application/octet-stream"));
    Ok(AppResponse::new(hyper::StatusCode::OK, body)
        .with_header(hyper::header::CONTENT_TYPE, content_type))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hub::HubAddress;
    use bytes::Bytes;
    use hyper::Request;

    fn env(body: &'static [u8]) -> Environ {
        let (parts, ()) = Request::put("/echo?x=1").body(()).unwrap().into_parts();
        Environ::from_parts(&HubAddress::default(), 0, &parts, Bytes::from_static(body))
    }

    #[test]
    fn test_resolve_builtin() {
        let catalog = AppCatalog::builtin();
        let app = catalog.resolve(DEFAULT_APP).unwrap();
        assert_eq!(app.name(), "demo:hello");

        let res = app.call(&env(b"")).unwrap();
        assert!(res.body.starts_with(b"Hello world!\n\n"));
        assert!(
            String::from_utf8_lossy(&res.body).contains("SERVER_PORT = \"4040\"")
        );
    }

    #[test]
    fn test_echo_body() {
        let app = AppCatalog::builtin().resolve("demo:echo").unwrap();
        let res = app.call(&env(b"payload")).unwrap();
        assert_eq!(&res.body[..], b"PUT /echo?x=1\npayload");
    }

    #[test]
    fn test_invalid_and_unknown_references() {
        let catalog = AppCatalog::builtin();

        let err = catalog.resolve("hello").err().unwrap();
        assert_eq!(err.as_label(), "startup_invalid_app_reference");

        let err = catalog.resolve("demo:").err().unwrap();
        assert_eq!(err.as_label(), "startup_invalid_app_reference");

        let err = catalog.resolve("myapp:application").err().unwrap();
        assert_eq!(err.as_label(), "startup_unknown_app");
        assert!(err.to_string().contains("demo:echo, demo:fail, demo:hello"));
    }

    #[test]
    fn test_register_custom_app() {
        let mut catalog = AppCatalog::new();
        catalog.register(
            "site:wsgi",
            AppFn::arc("site", |_env: &Environ| Ok(AppResponse::text("ok"))),
        );
        assert_eq!(catalog.references(), vec!["site:wsgi"]);
        assert!(catalog.resolve("site:wsgi").is_ok());
    }
}
