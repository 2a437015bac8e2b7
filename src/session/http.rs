//! # HTTP/1.1 session over a hub connection.
//!
//! The worker dialed the hub, but on the wire the roles are reversed: the hub
//! is the HTTP client and pushes requests down the connection, the worker
//! answers them. [`HttpHandler`] runs a hyper HTTP/1.1 server connection on
//! the outbound socket.
//!
//! ## Request flow
//! ```text
//! hub ── request bytes ──► hyper (parse, keep-alive, pipelining)
//!                            └─► collect body (up to max_body, else 413 + close)
//!                            └─► Environ::from_parts(hub, slot, head, body)
//!                            └─► spawn_blocking(app.call(&env))
//!                                   ├─ Ok(res)  ──► status/headers/body, Content-Length framing
//!                                   └─ Err/panic ─► 500 + Connection: close, remember failure
//! hub ◄── response bytes ──┘
//! ```
//!
//! ## Rules
//! - One request at a time per connection; hyper does not read the next
//!   request head until the current response is written.
//! - The session ends when the hub closes the connection between requests,
//!   when a response carries `Connection: close`, or on a protocol/I/O error.
//! - On cancellation the request in flight is answered, then the connection
//!   is closed (hyper graceful shutdown).
//! - An application failure ends the session with [`SessionError::App`] after
//!   the 500 is written.
//! - Responses are always framed from the body; framing headers set by the
//!   app are dropped so the connection stays in sync.

use std::error::Error as _;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::header::{CONTENT_LENGTH, TRANSFER_ENCODING};
use hyper::{Request, Response};
use hyper_util::rt::{TokioIo, TokioTimer};
use tokio_util::sync::CancellationToken;

use crate::app::{AppRef, AppResponse, Environ};
use crate::config::DEFAULT_MAX_REQUEST_BODY;
use crate::error::{AppError, SessionError, panic_message};
use crate::net::Connection;
use crate::session::{Handler, SessionContext, SessionSummary};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Concrete service error wrapping [`BoxError`] transparently.
///
/// hyper bounds the service error by `Into<BoxError>`; with `BoxError` itself
/// as the error type that bound cannot be proven inside the `Send` check of
/// the async-trait future, so the error is carried in a sized wrapper.
#[derive(Debug)]
struct ServiceError(BoxError);

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.0, f)
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.source()
    }
}

/// HTTP/1.1 request handler for TCP hub connections.
#[derive(Clone, Copy, Debug)]
pub struct HttpHandler {
    max_body: usize,
}

impl Default for HttpHandler {
    fn default() -> Self {
        Self {
            max_body: DEFAULT_MAX_REQUEST_BODY,
        }
    }
}

impl HttpHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the largest request body buffered for the app, in bytes.
    #[must_use]
    pub fn with_max_body(mut self, bytes: usize) -> Self {
        self.max_body = bytes;
        self
    }
}

#[async_trait]
impl Handler<Connection> for HttpHandler {
    async fn serve(
        &self,
        conn: Connection,
        ctx: &SessionContext,
        token: CancellationToken,
    ) -> Result<SessionSummary, SessionError> {
        let max_body = self.max_body;
        let requests = Arc::new(AtomicU64::new(0));
        let failure: Arc<OnceLock<AppError>> = Arc::new(OnceLock::new());

        let service = {
            let ctx = ctx.clone();
            let requests = Arc::clone(&requests);
            let failure = Arc::clone(&failure);
            service_fn(move |req: Request<Incoming>| {
                let ctx = ctx.clone();
                let requests = Arc::clone(&requests);
                let failure = Arc::clone(&failure);
                async move {
                    requests.fetch_add(1, Ordering::Relaxed);
                    let (parts, body) = req.into_parts();
                    let body = match Limited::new(body, max_body).collect().await {
                        Ok(collected) => collected.to_bytes(),
                        Err(err) if err.is::<LengthLimitError>() => {
                            tracing::warn!(
                                slot = ctx.slot,
                                method = %parts.method,
                                path = parts.uri.path(),
                                limit = max_body,
                                "request body too large"
                            );
                            return Ok(into_response(AppResponse::payload_too_large()));
                        }
                        Err(err) => return Err(ServiceError(err)),
                    };
                    let env = Environ::from_parts(&ctx.hub, ctx.slot, &parts, body);

                    let res = match invoke(Arc::clone(&ctx.app), env).await {
                        Ok(res) => res,
                        Err(err) => {
                            tracing::error!(
                                slot = ctx.slot,
                                app = ctx.app.name(),
                                method = %parts.method,
                                path = parts.uri.path(),
                                error = %err,
                                "application failed"
                            );
                            let _ = failure.set(err);
                            AppResponse::internal_error()
                        }
                    };
                    Ok::<_, ServiceError>(into_response(res))
                }
            })
        };

        let mut builder = http1::Builder::new();
        builder
            .keep_alive(true)
            .pipeline_flush(true)
            .timer(TokioTimer::new())
            // The hub may leave a connection idle indefinitely between requests.
            .header_read_timeout(None);

        let connection = builder.serve_connection(TokioIo::new(conn.into_stream()), service);
        tokio::pin!(connection);

        let result = tokio::select! {
            res = connection.as_mut() => res,
            _ = token.cancelled() => {
                tracing::trace!(slot = ctx.slot, "draining session for shutdown");
                connection.as_mut().graceful_shutdown();
                connection.as_mut().await
            }
        };

        if let Some(err) = failure.get() {
            return Err(SessionError::App(err.clone()));
        }
        result.map_err(classify)?;

        Ok(SessionSummary {
            requests: requests.load(Ordering::Relaxed),
        })
    }
}

/// Runs the app on the blocking pool, turning a panic into an [`AppError`].
async fn invoke(app: AppRef, env: Environ) -> Result<AppResponse, AppError> {
    match tokio::task::spawn_blocking(move || app.call(&env)).await {
        Ok(res) => res,
        Err(join) if join.is_panic() => Err(AppError::Panicked {
            info: panic_message(join.into_panic().as_ref()),
        }),
        Err(join) => Err(AppError::failed(format!("application call aborted: {join}"))),
    }
}

fn into_response(res: AppResponse) -> Response<Full<Bytes>> {
    let AppResponse {
        status,
        mut headers,
        body,
    } = res;
    // hyper frames the response from the body length.
    headers.remove(CONTENT_LENGTH);
    headers.remove(TRANSFER_ENCODING);

    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Maps a hyper connection error onto the session taxonomy.
fn classify(err: hyper::Error) -> SessionError {
    if let Some(io_err) = err.source().and_then(|s| s.downcast_ref::<io::Error>()) {
        return SessionError::Io(io::Error::new(io_err.kind(), err.to_string()));
    }
    SessionError::Protocol {
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppFn;
    use crate::hub::HubAddress;
    use crate::net::{Connector, TcpConnector};
    use hyper::StatusCode;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Returns (worker side, hub side) of a loopback connection.
    async fn pair() -> (Connection, TcpStream, HubAddress) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let hub = HubAddress::new("127.0.0.1", listener.local_addr().unwrap().port());
        let conn = TcpConnector::default().connect(&hub, 0).await.unwrap();
        let (hub_side, _) = listener.accept().await.unwrap();
        (conn, hub_side, hub)
    }

    fn spawn_session(
        conn: Connection,
        hub: HubAddress,
        app: AppRef,
        token: CancellationToken,
    ) -> tokio::task::JoinHandle<Result<SessionSummary, SessionError>> {
        spawn_with(HttpHandler::new(), conn, hub, app, token)
    }

    fn spawn_with(
        handler: HttpHandler,
        conn: Connection,
        hub: HubAddress,
        app: AppRef,
        token: CancellationToken,
    ) -> tokio::task::JoinHandle<Result<SessionSummary, SessionError>> {
        tokio::spawn(async move {
            let ctx = SessionContext { hub, slot: 0, app };
            handler.serve(conn, &ctx, token).await
        })
    }

    /// Reads one response with a Content-Length body: (status code, body).
    async fn read_response(stream: &mut TcpStream, buf: &mut Vec<u8>) -> (u16, Vec<u8>) {
        let (head, body) = read_head_and_body(stream, buf).await;
        (head[9..12].parse().unwrap(), body)
    }

    /// Reads one response with a Content-Length body: (raw head, body).
    async fn read_head_and_body(stream: &mut TcpStream, buf: &mut Vec<u8>) -> (String, Vec<u8>) {
        loop {
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_string();
                let len: usize = head
                    .lines()
                    .find_map(|l| {
                        let (k, v) = l.split_once(':')?;
                        k.eq_ignore_ascii_case("content-length")
                            .then(|| v.trim().parse().unwrap())
                    })
                    .unwrap_or(0);
                let total = end + 4 + len;
                while buf.len() < total {
                    let mut chunk = [0u8; 4096];
                    let n = stream.read(&mut chunk).await.unwrap();
                    assert!(n > 0, "eof inside body");
                    buf.extend_from_slice(&chunk[..n]);
                }
                let body = buf[end + 4..total].to_vec();
                buf.drain(..total);
                return (head, body);
            }
            let mut chunk = [0u8; 4096];
            let n = stream.read(&mut chunk).await.unwrap();
            assert!(n > 0, "eof before response head");
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    fn echo_path() -> AppRef {
        AppFn::arc("echo-path", |env: &Environ| {
            Ok(AppResponse::text(format!("{} {}", env.method, env.path)))
        })
    }

    #[tokio::test]
    async fn test_pipelined_requests_then_peer_close() {
        let (conn, mut hub_side, hub) = pair().await;
        let session = spawn_session(conn, hub, echo_path(), CancellationToken::new());

        hub_side
            .write_all(b"GET /one HTTP/1.1\r\nHost: hub\r\n\r\nPOST /two HTTP/1.1\r\nHost: hub\r\nContent-Length: 3\r\n\r\nabc")
            .await
            .unwrap();

        let mut buf = Vec::new();
        let (status, body) = read_response(&mut hub_side, &mut buf).await;
        assert_eq!(status, 200);
        assert_eq!(body, b"GET /one");
        let (status, body) = read_response(&mut hub_side, &mut buf).await;
        assert_eq!(status, 200);
        assert_eq!(body, b"POST /two");

        drop(hub_side);
        let summary = session.await.unwrap().unwrap();
        assert_eq!(summary.requests, 2);
    }

    #[tokio::test]
    async fn test_app_error_writes_500_and_ends_session() {
        let (conn, mut hub_side, hub) = pair().await;
        let failing: AppRef =
            AppFn::arc("failing", |_env: &Environ| Err(AppError::failed("boom")));
        let session = spawn_session(conn, hub, failing, CancellationToken::new());

        hub_side
            .write_all(b"GET / HTTP/1.1\r\nHost: hub\r\n\r\n")
            .await
            .unwrap();
        let mut buf = Vec::new();
        let (status, _) = read_response(&mut hub_side, &mut buf).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR.as_u16());

        let err = session.await.unwrap().unwrap_err();
        assert_eq!(err.as_label(), "session_app");
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_app_panic_is_contained() {
        let (conn, mut hub_side, hub) = pair().await;
        let panicking: AppRef = AppFn::arc("panicking", |_env: &Environ| -> Result<AppResponse, AppError> {
            panic!("kaboom")
        });
        let session = spawn_session(conn, hub, panicking, CancellationToken::new());

        hub_side
            .write_all(b"GET / HTTP/1.1\r\nHost: hub\r\n\r\n")
            .await
            .unwrap();
        let mut buf = Vec::new();
        let (status, _) = read_response(&mut hub_side, &mut buf).await;
        assert_eq!(status, 500);

        match session.await.unwrap() {
            Err(SessionError::App(AppError::Panicked { info })) => assert_eq!(info, "kaboom"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_malformed_request_ends_session() {
        let (conn, mut hub_side, hub) = pair().await;
        let session = spawn_session(conn, hub, echo_path(), CancellationToken::new());

        hub_side.write_all(b"\x00\x01garbage\r\n\r\n").await.unwrap();
        let _ = hub_side.shutdown().await;

        let mut answer = Vec::new();
        let _ = hub_side.read_to_end(&mut answer).await;
        assert!(
            answer.starts_with(b"HTTP/1.1 400"),
            "{}",
            String::from_utf8_lossy(&answer)
        );

        let err = session.await.unwrap().unwrap_err();
        assert!(
            matches!(err, SessionError::Protocol { .. } | SessionError::Io(_)),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn test_app_framing_headers_are_replaced() {
        use hyper::header::HeaderValue;

        let (conn, mut hub_side, hub) = pair().await;
        let lying: AppRef = AppFn::arc("lying", |_env: &Environ| {
            Ok(AppResponse::text("hi")
                .with_header(CONTENT_LENGTH, HeaderValue::from_static("100"))
                .with_header(TRANSFER_ENCODING, HeaderValue::from_static("chunked")))
        });
        let session = spawn_session(conn, hub, lying, CancellationToken::new());

        hub_side
            .write_all(b"GET /a HTTP/1.1\r\nHost: hub\r\n\r\nGET /b HTTP/1.1\r\nHost: hub\r\n\r\n")
            .await
            .unwrap();

        let mut buf = Vec::new();
        for _ in 0..2 {
            let (head, body) = read_head_and_body(&mut hub_side, &mut buf).await;
            let head = head.to_ascii_lowercase();
            assert!(head.starts_with("http/1.1 200"), "{head}");
            assert!(head.contains("content-length: 2"), "{head}");
            assert!(!head.contains("content-length: 100"), "{head}");
            assert!(!head.contains("transfer-encoding"), "{head}");
            assert_eq!(body, b"hi");
        }

        drop(hub_side);
        let summary = session.await.unwrap().unwrap();
        assert_eq!(summary.requests, 2);
    }

    #[tokio::test]
    async fn test_oversized_body_gets_413_without_calling_app() {
        let (conn, mut hub_side, hub) = pair().await;
        let called = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let app: AppRef = {
            let called = Arc::clone(&called);
            AppFn::arc("recording", move |_env: &Environ| {
                called.store(true, Ordering::SeqCst);
                Ok(AppResponse::text("ok"))
            })
        };
        let handler = HttpHandler::new().with_max_body(8);
        let session = spawn_with(handler, conn, hub, app, CancellationToken::new());

        hub_side
            .write_all(b"POST /upload HTTP/1.1\r\nHost: hub\r\nContent-Length: 100\r\n\r\n0123456789abcdefghij")
            .await
            .unwrap();

        let mut buf = Vec::new();
        let (head, _) = read_head_and_body(&mut hub_side, &mut buf).await;
        let head = head.to_ascii_lowercase();
        assert!(head.starts_with("http/1.1 413"), "{head}");
        assert!(head.contains("connection: close"), "{head}");

        let summary = session.await.unwrap().unwrap();
        assert_eq!(summary.requests, 1);
        assert!(!called.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_idle_close_is_clean() {
        let (conn, hub_side, hub) = pair().await;
        let session = spawn_session(conn, hub, echo_path(), CancellationToken::new());

        drop(hub_side);
        assert_eq!(session.await.unwrap().unwrap(), SessionSummary { requests: 0 });
    }

    #[tokio::test]
    async fn test_cancel_closes_idle_session() {
        let (conn, mut hub_side, hub) = pair().await;
        let token = CancellationToken::new();
        let session = spawn_session(conn, hub, echo_path(), token.clone());

        hub_side
            .write_all(b"GET /before HTTP/1.1\r\nHost: hub\r\n\r\n")
            .await
            .unwrap();
        let mut buf = Vec::new();
        let (status, _) = read_response(&mut hub_side, &mut buf).await;
        assert_eq!(status, 200);

        token.cancel();
        let summary = session.await.unwrap().unwrap();
        assert_eq!(summary.requests, 1);

        let mut rest = [0u8; 16];
        assert_eq!(hub_side.read(&mut rest).await.unwrap(), 0);
    }
}
