//! # Dockyard Daemon Connection (`engine::connection`)
//!
//! File: cli/src/engine/connection.rs
//!
//! ## Overview
//!
//! One HTTP/1.1 exchange with the engine daemon, over TCP or a unix domain
//! socket. A `DockerConnection` is a builder: it collects method, path,
//! query, headers and an optional entity, and `request()` opens the socket,
//! sends the request and hands back a `DockerResponse`. Nothing touches the
//! network before `request()`, and `request()` consumes the builder, so each
//! connection carries exactly one exchange.
//!
//! ## Architecture
//!
//! - `DaemonUri`: parsed daemon address (`unix://`, `tcp://`, `http://`).
//! - `DockerConnection`: the request builder.
//! - `DockerResponse`: status, headers and a `ResponseBody`.
//! - `ResponseBody`: `AsyncRead` over the response payload. It owns the task
//!   driving the underlying hyper connection; dropping the body aborts that
//!   task and closes the socket. That is how a stream is released on every
//!   path, and how a blocked reader elsewhere gets unblocked.
//!
//! No retries happen here. Transport failures surface as `Connect`, `Http`
//! or `Io` errors and the caller decides what to do.
//!
//! ## Examples
//!
//! ```rust,ignore
//! let response = DockerConnection::open(&uri)
//!     .method(Method::POST)
//!     .path("/containers/abc/stop")
//!     .query("t", "10")
//!     .request()
//!     .await?;
//! ```
//!
use crate::core::error::{DockyardError, Result};
use bytes::Bytes;
use futures_util::stream::{BoxStream, StreamExt, TryStreamExt};
use http_body_util::{combinators::UnsyncBoxBody, BodyExt, Empty, Full, StreamBody};
use hyper::{
    body::Frame,
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, HOST},
    Method, Request, StatusCode,
};
use hyper_util::rt::TokioIo;
use serde::{de::DeserializeOwned, Serialize};
use std::{
    fmt, io,
    path::PathBuf,
    pin::Pin,
    str::FromStr,
    task::{Context, Poll},
};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, ReadBuf},
    net::TcpStream,
    task::JoinHandle,
};
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::{debug, trace};

/// Default port for plain TCP daemons.
pub const DEFAULT_DAEMON_PORT: u16 = 2375;

/// Request body as sent by hyper: in-memory bytes or a streamed reader.
pub type RequestBody = UnsyncBoxBody<Bytes, io::Error>;

/// Where the engine daemon listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonUri {
    Tcp { host: String, port: u16 },
    Unix(PathBuf),
}

impl DaemonUri {
    /// Value of the `Host` header for requests to this daemon.
    pub fn host_header(&self) -> String {
        match self {
            DaemonUri::Tcp { host, port } => format!("{}:{}", host, port),
            DaemonUri::Unix(_) => "localhost".to_string(),
        }
    }
}

impl fmt::Display for DaemonUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DaemonUri::Tcp { host, port } => write!(f, "tcp://{}:{}", host, port),
            DaemonUri::Unix(path) => write!(f, "unix://{}", path.display()),
        }
    }
}

impl FromStr for DaemonUri {
    type Err = DockyardError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(path) = s.strip_prefix("unix://") {
            if path.is_empty() {
                return Err(DockyardError::Config(format!(
                    "Daemon URI '{}' has no socket path",
                    s
                )));
            }
            return Ok(DaemonUri::Unix(PathBuf::from(path)));
        }
        let url = url::Url::parse(s)
            .map_err(|e| DockyardError::Config(format!("Invalid daemon URI '{}': {}", s, e)))?;
        match url.scheme() {
            "tcp" | "http" => {
                let host = url
                    .host_str()
                    .filter(|h| !h.is_empty())
                    .ok_or_else(|| {
                        DockyardError::Config(format!("Daemon URI '{}' has no host", s))
                    })?
                    .to_string();
                let port = url.port().unwrap_or(DEFAULT_DAEMON_PORT);
                Ok(DaemonUri::Tcp { host, port })
            }
            other => Err(DockyardError::Config(format!(
                "Unsupported daemon URI scheme '{}' in '{}'",
                other, s
            ))),
        }
    }
}

/// Aborts the task driving a hyper connection when dropped.
struct ConnectionGuard {
    driver: JoinHandle<()>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

/// Payload of a daemon response, readable as `AsyncRead`.
pub struct ResponseBody {
    reader: StreamReader<BoxStream<'static, io::Result<Bytes>>, Bytes>,
    _guard: ConnectionGuard,
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBody").finish_non_exhaustive()
    }
}

impl AsyncRead for ResponseBody {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.reader).poll_read(cx, buf)
    }
}

/// Status, headers and body of one daemon response.
#[derive(Debug)]
pub struct DockerResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseBody,
}

impl DockerResponse {
    pub fn status(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Takes ownership of the body stream. The connection stays open until
    /// the returned body is dropped.
    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    /// Reads the whole body.
    pub async fn bytes(mut self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.body.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    /// Reads the whole body as (lossy) UTF-8 text.
    pub async fn text(self) -> Result<String> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub async fn json<T: DeserializeOwned>(self) -> Result<T> {
        let bytes = self.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Drains the body and turns this response into an `Engine` error.
    /// A body that cannot be read still yields the error, with the read
    /// failure as its message.
    pub async fn into_engine_error(self) -> DockyardError {
        let status = self.status();
        let message = match self.text().await {
            Ok(text) => text,
            Err(e) => format!("<unreadable response body: {}>", e),
        };
        DockyardError::Engine { status, message }
    }

    /// Returns the response if its status is one of `accepted`, otherwise
    /// the `Engine` error carrying the body text.
    pub async fn accept(self, accepted: &[u16]) -> Result<Self> {
        if accepted.contains(&self.status()) {
            Ok(self)
        } else {
            Err(self.into_engine_error().await)
        }
    }

    /// Like [`accept`](Self::accept) but for the whole 2xx range.
    pub async fn accept_success(self) -> Result<Self> {
        if self.status.is_success() {
            Ok(self)
        } else {
            Err(self.into_engine_error().await)
        }
    }
}

/// Builder for a single request to the daemon.
pub struct DockerConnection {
    uri: DaemonUri,
    method: Method,
    prefix: String,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    entity: Option<(RequestBody, Option<u64>)>,
}

impl DockerConnection {
    /// Starts a `GET /` request to `uri`. No I/O happens until `request()`.
    pub fn open(uri: &DaemonUri) -> Self {
        Self {
            uri: uri.clone(),
            method: Method::GET,
            prefix: String::new(),
            path: "/".to_string(),
            query: Vec::new(),
            headers: Vec::new(),
            entity: None,
        }
    }

    /// Prefixes the path with `/v<version>` when a version is given.
    pub fn api_version(mut self, version: Option<&str>) -> Self {
        self.prefix = version.map(|v| format!("/v{}", v)).unwrap_or_default();
        self
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Adds a query parameter. Repeatable; order is kept.
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Adds the parameter only when a value is present.
    pub fn query_if_set<V: ToString>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    /// Adds a boolean parameter as `1`/`0`, only when present.
    pub fn flag_if_set(self, key: &str, value: Option<bool>) -> Self {
        self.query_if_set(key, value.map(|b| if b { 1 } else { 0 }))
    }

    /// Adds a header. Repeatable; duplicates are allowed.
    pub fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.push((key.to_string(), value.into()));
        self
    }

    /// Sets an in-memory entity.
    pub fn entity(mut self, bytes: impl Into<Bytes>) -> Self {
        let bytes: Bytes = bytes.into();
        let len = bytes.len() as u64;
        let body = Full::new(bytes).map_err(|never| match never {}).boxed_unsync();
        self.entity = Some((body, Some(len)));
        self
    }

    /// Sets a JSON entity with the matching content type.
    pub fn json_entity<T: Serialize>(self, value: &T) -> Result<Self> {
        let bytes = serde_json::to_vec(value)?;
        Ok(self
            .header(CONTENT_TYPE.as_str(), "application/json")
            .entity(bytes))
    }

    /// Sets a streamed entity of known length, read from `reader`.
    pub fn entity_reader<R>(mut self, reader: R, len: u64) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        let stream = ReaderStream::new(reader).map_ok(Frame::data);
        let body = StreamBody::new(stream).boxed_unsync();
        self.entity = Some((body, Some(len)));
        self
    }

    fn target(&self) -> String {
        let mut target = format!("{}{}", self.prefix, self.path);
        if !self.query.is_empty() {
            let encoded: Vec<String> = self
                .query
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect();
            target.push('?');
            target.push_str(&encoded.join("&"));
        }
        target
    }

    fn build_request(self) -> Result<Request<RequestBody>> {
        let target = self.target();
        let mut builder = Request::builder()
            .method(self.method)
            .uri(target)
            .header(HOST, self.uri.host_header());
        for (key, value) in &self.headers {
            let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                DockyardError::InvalidArgument(format!("Invalid header name '{}': {}", key, e))
            })?;
            let value = HeaderValue::from_str(value).map_err(|e| {
                DockyardError::InvalidArgument(format!("Invalid value for header '{}': {}", key, e))
            })?;
            builder = builder.header(name, value);
        }
        let body = match self.entity {
            Some((body, len)) => {
                if let Some(len) = len {
                    builder = builder.header(CONTENT_LENGTH, len);
                }
                body
            }
            None => Empty::<Bytes>::new().map_err(|never| match never {}).boxed_unsync(),
        };
        builder
            .body(body)
            .map_err(|e| DockyardError::InvalidArgument(format!("Invalid request: {}", e)))
    }

    /// Performs the exchange. The returned response owns the connection.
    pub async fn request(self) -> Result<DockerResponse> {
        let uri = self.uri.clone();
        let request = self.build_request()?;
        debug!("{} {} via {}", request.method(), request.uri(), uri);
        match &uri {
            DaemonUri::Tcp { host, port } => {
                let stream = TcpStream::connect((host.as_str(), *port))
                    .await
                    .map_err(|source| DockyardError::Connect {
                        uri: uri.to_string(),
                        source,
                    })?;
                exchange(stream, request).await
            }
            #[cfg(unix)]
            DaemonUri::Unix(path) => {
                let stream = tokio::net::UnixStream::connect(path)
                    .await
                    .map_err(|source| DockyardError::Connect {
                        uri: uri.to_string(),
                        source,
                    })?;
                exchange(stream, request).await
            }
            #[cfg(not(unix))]
            DaemonUri::Unix(_) => Err(DockyardError::Connect {
                uri: uri.to_string(),
                source: io::Error::new(
                    io::ErrorKind::Unsupported,
                    "unix sockets are not available on this platform",
                ),
            }),
        }
    }
}

async fn exchange<S>(stream: S, request: Request<RequestBody>) -> Result<DockerResponse>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream)).await?;
    let guard = ConnectionGuard {
        driver: tokio::spawn(async move {
            if let Err(e) = conn.await {
                trace!("Daemon connection ended with error: {}", e);
            }
        }),
    };

    let response = sender.send_request(request).await?;
    let (parts, incoming) = response.into_parts();
    trace!("Daemon answered {}", parts.status);

    let stream = incoming
        .into_data_stream()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
        .boxed();
    Ok(DockerResponse {
        status: parts.status,
        headers: parts.headers,
        body: ResponseBody {
            reader: StreamReader::new(stream),
            _guard: guard,
        },
    })
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_daemon_uri() {
        assert_eq!(
            "unix:///var/run/docker.sock".parse::<DaemonUri>().unwrap(),
            DaemonUri::Unix(PathBuf::from("/var/run/docker.sock"))
        );
        assert_eq!(
            "tcp://10.0.0.5:2376".parse::<DaemonUri>().unwrap(),
            DaemonUri::Tcp {
                host: "10.0.0.5".into(),
                port: 2376
            }
        );
        assert_eq!(
            "http://docker-host".parse::<DaemonUri>().unwrap(),
            DaemonUri::Tcp {
                host: "docker-host".into(),
                port: DEFAULT_DAEMON_PORT
            }
        );
    }

    #[test]
    fn test_parse_daemon_uri_errors() {
        assert!("unix://".parse::<DaemonUri>().is_err());
        assert!("not a uri".parse::<DaemonUri>().is_err());
        let err = "ftp://host".parse::<DaemonUri>().unwrap_err();
        assert!(err.to_string().contains("Unsupported daemon URI scheme"));
    }

    #[test]
    fn test_host_header() {
        let tcp = DaemonUri::Tcp {
            host: "example".into(),
            port: 2375,
        };
        assert_eq!(tcp.host_header(), "example:2375");
        assert_eq!(
            DaemonUri::Unix(PathBuf::from("/tmp/d.sock")).host_header(),
            "localhost"
        );
    }

    #[test]
    fn test_target_encodes_query_in_order() {
        let uri = DaemonUri::Unix(PathBuf::from("/tmp/d.sock"));
        let conn = DockerConnection::open(&uri)
            .api_version(Some("1.41"))
            .path("/images/create")
            .query("fromImage", "registry:5000/my image")
            .query_if_set::<&str>("tag", None)
            .flag_if_set("force", Some(true))
            .flag_if_set("noprune", Some(false));
        assert_eq!(
            conn.target(),
            "/v1.41/images/create?fromImage=registry%3A5000%2Fmy%20image&force=1&noprune=0"
        );
    }

    #[test]
    fn test_build_request_sets_headers_and_length() {
        let uri = DaemonUri::Tcp {
            host: "h".into(),
            port: 1,
        };
        let request = DockerConnection::open(&uri)
            .method(Method::POST)
            .path("/build")
            .header("X-Registry-Config", "e30=")
            .entity(&b"abc"[..])
            .build_request()
            .unwrap();
        assert_eq!(request.method(), Method::POST);
        assert_eq!(request.headers()[HOST], "h:1");
        assert_eq!(request.headers()["X-Registry-Config"], "e30=");
        assert_eq!(request.headers()[CONTENT_LENGTH], "3");
    }

    #[tokio::test]
    async fn test_connect_refused_is_connect_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let uri = DaemonUri::Tcp {
            host: "127.0.0.1".into(),
            port,
        };
        let result = DockerConnection::open(&uri).path("/info").request().await;
        assert!(matches!(result, Err(DockyardError::Connect { .. })));
    }
}
