//! HTTP request handler for the proxy

use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use tokio::net::TcpStream;

use super::response::{
    connect_established_response, connect_rejected_response, denied_response, error_response,
    non_proxy_response, ProxyBody,
};
use super::tunnel::TunnelHandler;
use crate::audit::{AuditEntry, AuditLogger, Protocol};
use crate::error::{Error, Result};
use crate::filter::{ConnectDecision, ConnectInterceptor, RequestDecision, RequestInterceptor};

/// Main proxy request handler
pub struct ProxyHandler {
    request_interceptor: Arc<RequestInterceptor>,
    connect_interceptor: Arc<ConnectInterceptor>,
    tunnel_handler: Arc<TunnelHandler>,
    audit_logger: Option<Arc<AuditLogger>>,
}

impl ProxyHandler {
    pub fn new(
        request_interceptor: Arc<RequestInterceptor>,
        connect_interceptor: Arc<ConnectInterceptor>,
        tunnel_handler: Arc<TunnelHandler>,
    ) -> Self {
        Self {
            request_interceptor,
            connect_interceptor,
            tunnel_handler,
            audit_logger: None,
        }
    }

    pub fn with_audit_logger(mut self, logger: Option<Arc<AuditLogger>>) -> Self {
        self.audit_logger = logger;
        self
    }

    fn emit_audit(&self, entry: AuditEntry) {
        if let Some(ref logger) = self.audit_logger {
            logger.log(&entry);
        }
    }

    /// Handle an incoming proxy request
    pub async fn handle(
        self,
        req: Request<Incoming>,
    ) -> std::result::Result<Response<ProxyBody>, hyper::Error> {
        if req.method() == Method::CONNECT {
            return self.handle_connect(req).await;
        }

        self.handle_http(req).await
    }

    async fn handle_connect(
        self,
        req: Request<Incoming>,
    ) -> std::result::Result<Response<ProxyBody>, hyper::Error> {
        let target = connect_target(&req);
        tracing::debug!(target_host = %target, "CONNECT request");

        let target = match self.connect_interceptor.decide(&target) {
            ConnectDecision::Reject(target) => {
                self.emit_audit(AuditEntry::blocked(Protocol::Connect, "CONNECT", &target));
                return Ok(connect_rejected_response());
            }
            ConnectDecision::Allow(target) => {
                self.emit_audit(AuditEntry::allowed(Protocol::Connect, "CONNECT", &target));
                target
            }
        };

        let upstream = match self.tunnel_handler.connect_upstream(&target).await {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(target_host = %target, error = %e, "CONNECT upstream dial failed");
                return Ok(error_response(&e.to_string()));
            }
        };

        // Get the upgrade future before the request is dropped
        let upgrade = hyper::upgrade::on(req);
        let tunnel_handler = self.tunnel_handler.clone();

        tokio::spawn(async move {
            let upgraded = match upgrade.await {
                Ok(u) => u,
                Err(e) => {
                    tracing::error!(target_host = %target, error = %e, "Failed to upgrade connection");
                    return;
                }
            };

            if let Err(e) = tunnel_handler.run_tunnel(upgraded, upstream, &target).await {
                let err_str = e.to_string();
                if !err_str.contains("connection reset") && !err_str.contains("early eof") {
                    tracing::error!(target_host = %target, error = %e, "Tunnel error");
                }
            }
        });

        Ok(connect_established_response())
    }

    async fn handle_http(
        self,
        req: Request<Incoming>,
    ) -> std::result::Result<Response<ProxyBody>, hyper::Error> {
        // Only absolute-form targets are proxy requests
        let Some(target_host) = request_target_host(&req) else {
            tracing::debug!(uri = %req.uri(), "Non-proxy request");
            return Ok(non_proxy_response());
        };
        let method = req.method().to_string();

        match self.request_interceptor.decide(&target_host) {
            RequestDecision::Deny(key, denial) => {
                self.emit_audit(AuditEntry::blocked(Protocol::Http, &method, &key));
                return Ok(denied_response(&denial));
            }
            RequestDecision::PassThrough(key) => {
                self.emit_audit(AuditEntry::allowed(Protocol::Http, &method, &key));
            }
        }

        // No TLS client: allowed absolute-form https:// requests are refused here
        let uri = req.uri();
        if uri.scheme_str() != Some("http") {
            let scheme = uri.scheme_str().unwrap_or("").to_string();
            return Ok(error_response(&format!("Unsupported scheme: {}", scheme)));
        }
        let host = uri.host().unwrap_or_default().to_string();
        let port = uri.port_u16().unwrap_or(80);

        tracing::debug!(method = %method, host = %host, port = %port, "Forwarding request");
        match forward_http_request(&host, port, req).await {
            Ok(resp) => Ok(resp),
            Err(e) => {
                tracing::error!(host = %host, port = %port, error = %e, "HTTP forwarding error");
                Ok(error_response(&e.to_string()))
            }
        }
    }
}

/// The CONNECT target exactly as the client wrote it.
pub(crate) fn connect_target<B>(req: &Request<B>) -> String {
    match req.uri().authority() {
        Some(authority) => authority.as_str().to_string(),
        None => req.uri().to_string(),
    }
}

/// Host (and port, if given) of an absolute-form request, without userinfo.
///
/// Returns `None` for origin-form requests that were not meant for a proxy.
pub(crate) fn request_target_host<B>(req: &Request<B>) -> Option<String> {
    let uri = req.uri();
    uri.scheme()?;
    let authority = uri.authority()?.as_str();
    let host = match authority.rsplit_once('@') {
        Some((_userinfo, host)) => host,
        None => authority,
    };
    Some(host.to_string())
}

/// Hop-by-hop headers that must not be forwarded (RFC 7230 section 6.1).
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Forward a whitelisted plain HTTP request to the upstream server.
async fn forward_http_request(
    host: &str,
    port: u16,
    req: Request<Incoming>,
) -> Result<Response<ProxyBody>> {
    let addr = format!("{}:{}", host, port);
    let tcp = TcpStream::connect(&addr)
        .await
        .map_err(|e| Error::proxy(format!("Failed to connect to {}: {}", addr, e)))?;
    let io = TokioIo::new(tcp);

    let (mut sender, conn) = hyper::client::conn::http1::handshake(io).await?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            let err_str = e.to_string();
            if !err_str.contains("connection closed") && !err_str.contains("early eof") {
                tracing::error!(error = %e, "HTTP upstream connection error");
            }
        }
    });

    // Origin-form URI, hop-by-hop headers stripped, Host guaranteed
    let (parts, body) = req.into_parts();

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let origin_uri: hyper::Uri = path_and_query
        .parse()
        .map_err(|e| Error::proxy(format!("Invalid request path '{}': {}", path_and_query, e)))?;

    let mut builder = Request::builder()
        .method(parts.method)
        .version(hyper::Version::HTTP_11)
        .uri(origin_uri);

    for (name, value) in &parts.headers {
        if !HOP_BY_HOP_HEADERS.contains(&name.as_str()) {
            builder = builder.header(name, value);
        }
    }

    if !parts.headers.contains_key(hyper::header::HOST) {
        if port == 80 {
            builder = builder.header(hyper::header::HOST, host);
        } else {
            builder = builder.header(hyper::header::HOST, format!("{}:{}", host, port));
        }
    }

    let upstream_req = builder
        .body(body)
        .map_err(|e| Error::proxy(format!("Failed to build upstream request: {}", e)))?;
    let resp = sender.send_request(upstream_req).await?;

    Ok(resp.map(|b| b.boxed()))
}
