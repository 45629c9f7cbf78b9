//! Main proxy server

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

use super::handler::ProxyHandler;
use super::tunnel::TunnelHandler;
use crate::audit::AuditLogger;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::filter::{
    ConnectInterceptor, RequestInterceptor, SharedAccessLog, TracingAccessLog, WhitelistRegistry,
};

/// The main proxy server
pub struct ProxyServer {
    config: Config,
    request_interceptor: Arc<RequestInterceptor>,
    connect_interceptor: Arc<ConnectInterceptor>,
    tunnel_handler: Arc<TunnelHandler>,
    audit_logger: Option<Arc<AuditLogger>>,
    listener: Option<TcpListener>,
}

impl ProxyServer {
    /// Create a new proxy server from configuration, logging through `tracing`.
    ///
    /// Fails with a configuration error when the whitelist is empty; nothing
    /// is bound at that point.
    pub fn new(config: Config) -> Result<Self> {
        Self::with_access_log(config, TracingAccessLog::shared())
    }

    /// Create a proxy server whose whitelist and interceptors log through `log`.
    pub fn with_access_log(config: Config, log: SharedAccessLog) -> Result<Self> {
        let entries = config.whitelist_entries()?;
        let whitelist = Arc::new(WhitelistRegistry::build(entries.iter().cloned(), log.as_ref()));

        tracing::info!(
            configured = entries.len(),
            distinct = whitelist.len(),
            "Whitelist loaded"
        );
        tracing::debug!(
            entries = ?whitelist.iter().collect::<Vec<_>>(),
            "Whitelist entries"
        );

        let request_interceptor = Arc::new(RequestInterceptor::new(whitelist.clone(), log.clone()));
        let connect_interceptor = Arc::new(ConnectInterceptor::new(whitelist, log));

        Ok(Self {
            config,
            request_interceptor,
            connect_interceptor,
            tunnel_handler: Arc::new(TunnelHandler::new()),
            audit_logger: None,
            listener: None,
        })
    }

    /// Set the audit logger for structured decision logging.
    pub fn with_audit_logger(mut self, logger: Arc<AuditLogger>) -> Self {
        self.audit_logger = Some(logger);
        self
    }

    /// Replace the tunnel handler (e.g. to shorten the upstream dial timeout).
    pub fn with_tunnel_handler(mut self, handler: TunnelHandler) -> Self {
        self.tunnel_handler = Arc::new(handler);
        self
    }

    /// Run the proxy server with graceful shutdown
    pub async fn run_until_shutdown(
        mut self,
        shutdown: tokio::sync::oneshot::Receiver<()>,
    ) -> Result<()> {
        let local_addr = self.bind().await?;
        tracing::info!(address = %local_addr, "Proxy server listening");
        self.serve(shutdown).await
    }

    /// Bind the server to its configured address and return the local address.
    ///
    /// Useful when binding to port 0 to discover the assigned port.
    /// Call `serve()` afterwards to start accepting connections.
    pub async fn bind(&mut self) -> Result<SocketAddr> {
        let bind_address = &self.config.proxy.bind_address;
        let addr: SocketAddr = bind_address.parse().map_err(|e| {
            Error::config(format!("Invalid bind address '{}': {}", bind_address, e))
        })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::proxy(format!("Failed to bind to {}: {}", addr, e)))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| Error::proxy(format!("Failed to get local address: {}", e)))?;

        self.listener = Some(listener);
        Ok(local_addr)
    }

    /// Serve connections using a previously bound listener, with graceful shutdown.
    pub async fn serve(mut self, mut shutdown: tokio::sync::oneshot::Receiver<()>) -> Result<()> {
        let listener = self
            .listener
            .take()
            .ok_or_else(|| Error::proxy("serve() called before bind()"))?;

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Shutdown signal received");
                    return Ok(());
                }
                result = listener.accept() => {
                    let (stream, client_addr) = match result {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to accept connection");
                            continue;
                        }
                    };

                    tracing::debug!(client = %client_addr, "New connection");
                    self.spawn_connection(stream, client_addr);
                }
            }
        }
    }

    /// Spawn a task to handle a single connection.
    fn spawn_connection(&self, stream: TcpStream, client_addr: SocketAddr) {
        let request_interceptor = self.request_interceptor.clone();
        let connect_interceptor = self.connect_interceptor.clone();
        let tunnel_handler = self.tunnel_handler.clone();
        let audit_logger = self.audit_logger.clone();

        tokio::spawn(async move {
            let io = TokioIo::new(stream);

            let service = service_fn(move |req| {
                let handler = ProxyHandler::new(
                    request_interceptor.clone(),
                    connect_interceptor.clone(),
                    tunnel_handler.clone(),
                )
                .with_audit_logger(audit_logger.clone());
                async move { handler.handle(req).await }
            });

            if let Err(e) = http1::Builder::new()
                .preserve_header_case(true)
                .title_case_headers(true)
                .serve_connection(io, service)
                .with_upgrades()
                .await
            {
                if !e.to_string().contains("connection closed") {
                    tracing::debug!(client = %client_addr, error = %e, "Connection error");
                }
            }
        });
    }
}
