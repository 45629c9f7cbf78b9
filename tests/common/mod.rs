//! Test infrastructure for e2e proxy tests.

#![allow(dead_code)]

use std::io::Write;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing_subscriber::fmt::MakeWriter;
use whitelist_proxy::proxy::TunnelHandler;
use whitelist_proxy::{AuditLogger, Config, ProxyServer};

// ---------------------------------------------------------------------------
// TestProxy: wraps ProxyServer with bind + spawn
// ---------------------------------------------------------------------------

pub struct TestProxy {
    pub addr: SocketAddr,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

pub struct TestProxyBuilder {
    whitelist: Vec<String>,
    audit_log: Option<String>,
    connect_timeout: Option<Duration>,
}

impl TestProxyBuilder {
    pub fn audit_log(mut self, path: &str) -> Self {
        self.audit_log = Some(path.to_string());
        self
    }

    /// Bound the CONNECT upstream dial.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub async fn start(self) -> TestProxy {
        let config = Config::minimal("127.0.0.1:0".to_string(), self.whitelist);

        let mut server = ProxyServer::new(config).unwrap();
        if let Some(path) = self.audit_log {
            server = server.with_audit_logger(Arc::new(AuditLogger::open(path).unwrap()));
        }
        if let Some(timeout) = self.connect_timeout {
            server = server.with_tunnel_handler(TunnelHandler::new().with_connect_timeout(timeout));
        }

        let addr = server.bind().await.unwrap();
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

        tokio::spawn(async move {
            let _ = server.serve(shutdown_rx).await;
        });

        TestProxy { addr, shutdown_tx }
    }
}

impl TestProxy {
    pub fn builder<S: AsRef<str>>(whitelist: &[S]) -> TestProxyBuilder {
        TestProxyBuilder {
            whitelist: whitelist.iter().map(|s| s.as_ref().to_string()).collect(),
            audit_log: None,
            connect_timeout: None,
        }
    }

    /// Start a proxy whitelisting exactly the given entries.
    pub async fn start<S: AsRef<str>>(whitelist: &[S]) -> Self {
        Self::builder(whitelist).start().await
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}

// ---------------------------------------------------------------------------
// Clients
// ---------------------------------------------------------------------------

/// Build a reqwest client that sends plain HTTP through the given proxy.
pub fn test_client(proxy_addr: SocketAddr) -> reqwest::Client {
    let proxy = reqwest::Proxy::all(format!("http://{}", proxy_addr)).unwrap();
    reqwest::Client::builder().proxy(proxy).build().unwrap()
}

/// A parsed raw HTTP/1.1 response.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub head: String,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<String> {
        let prefix = format!("{}:", name.to_ascii_lowercase());
        self.head.lines().find_map(|line| {
            line.to_ascii_lowercase()
                .starts_with(&prefix)
                .then(|| line[prefix.len()..].trim().to_string())
        })
    }

    pub fn body_str(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Read a response head (through the blank line) from the stream.
pub async fn read_head(stream: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut byte))
            .await
            .expect("timed out reading response head")
            .unwrap();
        if n == 0 {
            break;
        }
        head.push(byte[0]);
    }
    String::from_utf8_lossy(&head).into_owned()
}

fn parse_status(head: &str) -> u16 {
    head.split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| panic!("malformed status line: {:?}", head))
}

/// Send a raw request to the proxy and read one full response.
///
/// The body is read according to `Content-Length` (absent means empty).
pub async fn raw_request(proxy: SocketAddr, request: &str) -> RawResponse {
    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream.write_all(request.as_bytes()).await.unwrap();

    let head = read_head(&mut stream).await;
    let mut response = RawResponse {
        status: parse_status(&head),
        head,
        body: Vec::new(),
    };

    let len: usize = response
        .header("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; len];
    tokio::time::timeout(Duration::from_secs(5), stream.read_exact(&mut body))
        .await
        .expect("timed out reading response body")
        .unwrap();
    response.body = body;
    response
}

/// Plain proxied GET for `url` with `Connection: close`.
pub async fn proxied_get(proxy: SocketAddr, url: &str, host_header: &str) -> RawResponse {
    raw_request(
        proxy,
        &format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            url, host_header
        ),
    )
    .await
}

/// Send a CONNECT and return the stream plus the response head.
pub async fn connect_tunnel(proxy: SocketAddr, target: &str) -> (TcpStream, RawResponse) {
    let mut stream = TcpStream::connect(proxy).await.unwrap();
    let request = format!("CONNECT {} HTTP/1.1\r\nHost: {}\r\n\r\n", target, target);
    stream.write_all(request.as_bytes()).await.unwrap();

    let head = read_head(&mut stream).await;
    let response = RawResponse {
        status: parse_status(&head),
        head,
        body: Vec::new(),
    };
    (stream, response)
}

// ---------------------------------------------------------------------------
// Upstreams
// ---------------------------------------------------------------------------

/// A TCP server that echoes every byte back, for CONNECT tunnel tests.
pub struct EchoServer {
    pub addr: SocketAddr,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl EchoServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    result = listener.accept() => {
                        let (mut stream, _) = match result {
                            Ok(conn) => conn,
                            Err(_) => continue,
                        };
                        tokio::spawn(async move {
                            let (mut rd, mut wr) = stream.split();
                            let _ = tokio::io::copy(&mut rd, &mut wr).await;
                        });
                    }
                }
            }
        });

        Self { addr, shutdown_tx }
    }

    pub fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// A local port with nothing listening on it.
pub async fn dead_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

// ---------------------------------------------------------------------------
// LogCapture: thread-local tracing subscriber writing into a buffer
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for SharedBuffer {
    type Writer = SharedBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Captures log output on the current thread. Use with the default
/// (current-thread) `#[tokio::test]` runtime so spawned proxy tasks log here too.
pub struct LogCapture {
    buffer: SharedBuffer,
    _guard: tracing::subscriber::DefaultGuard,
}

impl LogCapture {
    pub fn new() -> Self {
        let buffer = SharedBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(buffer.clone())
            .with_ansi(false)
            .with_target(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        Self {
            buffer,
            _guard: guard,
        }
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.0.lock().unwrap()).into_owned()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.contents().contains(needle)
    }

    pub fn count(&self, needle: &str) -> usize {
        self.contents().matches(needle).count()
    }
}

// ---------------------------------------------------------------------------
// Audit log helpers
// ---------------------------------------------------------------------------

/// Read every JSON line of an audit log.
pub fn read_audit_entries(path: &str) -> Vec<serde_json::Value> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).unwrap())
        .collect()
}
