//! Minimal HTTP/1.1 JSON bridge.
//!
//! Browsers post programs here and get an [`ExecutionResult`] back:
//!
//! | request            | response                                        |
//! |--------------------|-------------------------------------------------|
//! | `POST /`           | `200` + result JSON                             |
//! | `POST /execute`    | same as `POST /`                                |
//! | `GET /health`      | `{"status":"ok","interpreter_available":bool}`  |
//! | `OPTIONS <any>`    | `204` CORS preflight                            |
//!
//! Every response carries permissive CORS headers and `Connection: close`;
//! each connection serves exactly one request.
//!
//! Request decoding lives in [`read_request`] and routing in [`respond`],
//! neither of which touches a socket, so both are testable on byte slices.
//! [`Server`] only owns the listener and the per-connection tasks.

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::executor::Executor;
use crate::script::ExecutionResult;

/// Upper bound on the request line plus headers.
const MAX_HEAD_BYTES: u64 = 16 * 1024;

const CORS_HEADERS: &str = "Access-Control-Allow-Origin: *\r\n\
     Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
     Access-Control-Allow-Headers: Content-Type\r\n";

// ── Errors ────────────────────────────────────────────────────────────────────

/// Why a request could not be served.  Each maps to an HTTP status.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("malformed request line")]
    BadRequestLine,
    #[error("malformed header line")]
    BadHeader,
    #[error("request head exceeds {MAX_HEAD_BYTES} bytes")]
    HeadTooLarge,
    #[error("invalid Content-Length")]
    BadContentLength,
    #[error("chunked request bodies are not supported")]
    Chunked,
    #[error("request body exceeds {limit} bytes")]
    BodyTooLarge { limit: usize },
    #[error("empty request body")]
    EmptyBody,
    #[error("request body is not valid UTF-8")]
    NotUtf8,
    #[error("No code provided")]
    NoCode,
    #[error("request not received within {0:?}")]
    Timeout(Duration),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no route for {0}")]
    NotFound(String),
    #[error("method {0} not allowed")]
    MethodNotAllowed(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl RequestError {
    pub fn status(&self) -> u16 {
        match self {
            RequestError::NotFound(_) => 404,
            RequestError::MethodNotAllowed(_) => 405,
            RequestError::Timeout(_) => 408,
            RequestError::BodyTooLarge { .. } => 413,
            RequestError::HeadTooLarge => 431,
            _ => 400,
        }
    }
}

// ── Requests and responses ────────────────────────────────────────────────────

/// A decoded request.  The body is only read for routes that take one.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub method: String,
    /// Path without the query string.
    pub path: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct ExecuteBody {
    #[serde(default)]
    code: String,
    /// Milliseconds.  Clients send plain JSON numbers, sometimes fractional.
    #[serde(default)]
    timeout: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub status: u16,
    /// JSON body; `None` for `204`.
    pub body: Option<String>,
}

impl Response {
    fn json(status: u16, value: &impl serde::Serialize) -> Self {
        let body = serde_json::to_string(value)
            .unwrap_or_else(|e| format!(r#"{{"success":false,"error":"{e}"}}"#));
        Response {
            status,
            body: Some(body),
        }
    }

    fn error(e: &RequestError) -> Self {
        Self::json(
            e.status(),
            &serde_json::json!({ "success": false, "error": e.to_string() }),
        )
    }

    fn no_content() -> Self {
        Response {
            status: 204,
            body: None,
        }
    }

    /// Serialise status line, headers and body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = format!("HTTP/1.1 {} {}\r\n{CORS_HEADERS}", self.status, reason(self.status));
        match &self.body {
            Some(body) => {
                out.push_str("Content-Type: application/json\r\n");
                out.push_str(&format!("Content-Length: {}\r\n", body.len()));
                out.push_str("Connection: close\r\n\r\n");
                out.push_str(body);
            }
            None => out.push_str("Content-Length: 0\r\nConnection: close\r\n\r\n"),
        }
        out.into_bytes()
    }
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        413 => "Payload Too Large",
        431 => "Request Header Fields Too Large",
        _ => "Internal Server Error",
    }
}

// ── Decoding ──────────────────────────────────────────────────────────────────

fn takes_body(method: &str, path: &str) -> bool {
    method == "POST" && matches!(path, "/" | "/execute")
}

/// Read one request.  Returns `Ok(None)` if the peer closed before sending
/// anything.
pub async fn read_request<R>(
    reader: &mut R,
    max_body_bytes: usize,
) -> Result<Option<Request>, RequestError>
where
    R: AsyncBufRead + Unpin,
{
    let mut head = (&mut *reader).take(MAX_HEAD_BYTES);
    let mut buf = Vec::new();

    if head.read_until(b'\n', &mut buf).await? == 0 {
        return Ok(None);
    }
    let line = std::str::from_utf8(&buf).map_err(|_| RequestError::BadRequestLine)?;
    let mut parts = line.split_whitespace();
    let (method, target) = match (parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(t), Some(v)) if v.starts_with("HTTP/1.") => (m.to_owned(), t),
        _ => return Err(RequestError::BadRequestLine),
    };
    let path = target.split('?').next().unwrap_or(target).to_owned();

    let mut content_length: Option<usize> = None;
    let mut chunked = false;
    loop {
        buf.clear();
        head.read_until(b'\n', &mut buf).await?;
        if !buf.ends_with(b"\n") {
            // Either the peer hung up mid-head or the head limit was hit.
            return Err(if head.limit() == 0 {
                RequestError::HeadTooLarge
            } else {
                RequestError::BadHeader
            });
        }
        let header = std::str::from_utf8(&buf)
            .map_err(|_| RequestError::BadHeader)?
            .trim_end();
        if header.is_empty() {
            break;
        }
        let (name, value) = header.split_once(':').ok_or(RequestError::BadHeader)?;
        let value = value.trim();
        if name.eq_ignore_ascii_case("content-length") {
            let len = value
                .parse()
                .map_err(|_| RequestError::BadContentLength)?;
            content_length = Some(len);
        } else if name.eq_ignore_ascii_case("transfer-encoding") {
            chunked = value.to_ascii_lowercase().contains("chunked");
        }
    }

    let mut body = Vec::new();
    if takes_body(&method, &path) {
        if chunked {
            return Err(RequestError::Chunked);
        }
        let len = content_length.unwrap_or(0);
        if len > max_body_bytes {
            return Err(RequestError::BodyTooLarge {
                limit: max_body_bytes,
            });
        }
        body.resize(len, 0);
        reader.read_exact(&mut body).await?;
    }

    Ok(Some(Request { method, path, body }))
}

/// [`read_request`] with a deadline on the whole request.
pub async fn read_request_within<R>(
    reader: &mut R,
    max_body_bytes: usize,
    deadline: Duration,
) -> Result<Option<Request>, RequestError>
where
    R: AsyncBufRead + Unpin,
{
    tokio::time::timeout(deadline, read_request(reader, max_body_bytes))
        .await
        .unwrap_or_else(|_| Err(RequestError::Timeout(deadline)))
}

// ── Routing ───────────────────────────────────────────────────────────────────

/// Produce the response for a decoded request.
pub async fn respond(executor: &Executor, req: &Request) -> Response {
    if req.method == "OPTIONS" {
        return Response::no_content();
    }
    let routed = match req.path.as_str() {
        "/" | "/execute" if req.method == "POST" => execute(executor, &req.body).await,
        "/health" if req.method == "GET" => Ok(Response::json(
            200,
            &serde_json::json!({
                "status": "ok",
                "interpreter_available": executor.interpreter_available(),
            }),
        )),
        "/" | "/execute" | "/health" => Err(RequestError::MethodNotAllowed(req.method.clone())),
        other => Err(RequestError::NotFound(other.to_owned())),
    };
    routed.unwrap_or_else(|e| {
        debug!(error = %e, "request rejected");
        Response::error(&e)
    })
}

async fn execute(executor: &Executor, body: &[u8]) -> Result<Response, RequestError> {
    let text = std::str::from_utf8(body).map_err(|_| RequestError::NotUtf8)?;
    if text.trim().is_empty() {
        return Err(RequestError::EmptyBody);
    }
    let req: ExecuteBody = serde_json::from_str(text)?;
    if req.code.is_empty() {
        return Err(RequestError::NoCode);
    }
    let timeout_ms = req
        .timeout
        .filter(|t| t.is_finite() && *t > 0.0)
        .map(|t| t as u64);
    let result: ExecutionResult = executor.execute(&req.code, timeout_ms).await;
    Ok(Response::json(200, &result))
}

// ── Server ────────────────────────────────────────────────────────────────────

struct Shared {
    executor: Executor,
    max_body_bytes: usize,
    read_timeout: Duration,
}

/// A bound listener, ready to serve.
pub struct Server {
    listener: TcpListener,
    shared: Arc<Shared>,
}

impl Server {
    pub async fn bind(
        addr: SocketAddr,
        executor: Executor,
        max_body_bytes: usize,
        read_timeout: Duration,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Server {
            listener,
            shared: Arc::new(Shared {
                executor,
                max_body_bytes,
                read_timeout,
            }),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serve until `shutdown` resolves.  In-flight connections are left to
    /// finish on their own tasks.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> io::Result<()> {
        info!(addr = %self.local_addr()?, "listening");
        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutting down");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let shared = Arc::clone(&self.shared);
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(stream, &shared).await {
                                debug!(%peer, error = %e, "connection error");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                },
            }
        }
    }
}

async fn serve_connection(stream: TcpStream, shared: &Shared) -> io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let request =
        read_request_within(&mut reader, shared.max_body_bytes, shared.read_timeout).await;
    let response = match request {
        Ok(None) => return Ok(()),
        Ok(Some(req)) => {
            debug!(method = %req.method, path = %req.path, bytes = req.body.len(), "request");
            respond(&shared.executor, &req).await
        }
        Err(RequestError::Io(e)) => return Err(e),
        Err(e) => {
            warn!(error = %e, "bad request");
            Response::error(&e)
        }
    };

    write_half.write_all(&response.to_bytes()).await?;
    write_half.shutdown().await
}

// ── Tests ─────────────────────────────────────────────────────────────────────
