//! # Per-request environment.
//!
//! [`Environ`] is what the application sees of a request: the server identity
//! (the hub address the worker dialed), the request line, headers and body.
//! Fields the hub does not tell us ahead of time are placeholders (`None`):
//! `content_length` without a `Content-Length` header, `remote_addr` unless the
//! hub forwards `X-Forwarded-For` or `X-Real-IP`.

use bytes::Bytes;
use hyper::header::{self, HeaderMap};
use hyper::{Method, Version};

use crate::hub::HubAddress;

/// Request environment handed to an [`App`](crate::App).
#[derive(Clone, Debug)]
pub struct Environ {
    /// Host part of the hub address.
    pub server_name: String,
    /// Port of the hub address.
    pub server_port: u16,
    /// Index of the worker slot serving the request.
    pub slot: usize,
    /// Request method.
    pub method: Method,
    /// Request path, without the query string.
    pub path: String,
    /// Raw query string, without the leading `?`.
    pub query: Option<String>,
    /// Protocol version of the request line.
    pub version: Version,
    /// Request headers.
    pub headers: HeaderMap,
    /// `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// `Content-Length` header, if any.
    pub content_length: Option<u64>,
    /// Original client address as forwarded by the hub.
    pub remote_addr: Option<String>,
    /// Full request body.
    pub body: Bytes,
}

impl Environ {
    /// Builds the environment for one request.
    pub(crate) fn from_parts(
        hub: &HubAddress,
        slot: usize,
        parts: &hyper::http::request::Parts,
        body: Bytes,
    ) -> Self {
        let headers = parts.headers.clone();
        let text = |name: &header::HeaderName| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        let content_length = text(&header::CONTENT_LENGTH).and_then(|v| v.trim().parse().ok());
        let content_type = text(&header::CONTENT_TYPE);
        let remote_addr = headers
            .get("x-forwarded-for")
            .or_else(|| headers.get("x-real-ip"))
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        Self {
            server_name: hub.host().to_string(),
            server_port: hub.port(),
            slot,
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            version: parts.version,
            headers,
            content_type,
            content_length,
            remote_addr,
            body,
        }
    }

    /// Returns a header as text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Flattens the environment into sorted `KEY=value` pairs, CGI style.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = vec![
            ("SERVER_NAME".to_string(), self.server_name.clone()),
            ("SERVER_PORT".to_string(), self.server_port.to_string()),
            ("SERVER_PROTOCOL".to_string(), format!("{:?}", self.version)),
            ("REQUEST_METHOD".to_string(), self.method.to_string()),
            ("PATH_INFO".to_string(), self.path.clone()),
            ("QUERY_STRING".to_string(), self.query.clone().unwrap_or_default()),
            ("CONTENT_TYPE".to_string(), self.content_type.clone().unwrap_or_default()),
            (
                "CONTENT_LENGTH".to_string(),
                self.content_length.map(|n| n.to_string()).unwrap_or_default(),
            ),
            ("REMOTE_ADDR".to_string(), self.remote_addr.clone().unwrap_or_default()),
            ("WORKER_SLOT".to_string(), self.slot.to_string()),
        ];
        for (name, value) in &self.headers {
            let key = format!("HTTP_{}", name.as_str().to_ascii_uppercase().replace('-', "_"));
            pairs.push((key, String::from_utf8_lossy(value.as_bytes()).into_owned()));
        }
        pairs.sort();
        pairs
    }
}
