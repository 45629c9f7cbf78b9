//! whitelist-proxy - a forwarding HTTP/HTTPS proxy gated by a static whitelist
//!
//! Every plain request and every CONNECT tunnel is checked against a fixed set
//! of `host:port` entries before anything leaves the proxy.
//!
//! # Matching
//!
//! - **Plain requests**: the target host gets `:80` appended when it names no
//!   port, then must appear in the whitelist verbatim. Denials get
//!   `403 Forbidden` with body `Host not in whitelist\n`.
//! - **CONNECT tunnels**: the `host:port` target is looked up as-is, with no
//!   port inference. Rejections get `502 Bad Gateway`.
//!
//! Matching is exact and case-sensitive: no wildcards, no CIDR ranges.
//!
//! # Example
//!
//! ```no_run
//! use whitelist_proxy::{Config, ProxyServer};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::minimal(
//!         "127.0.0.1:8080".to_string(),
//!         vec!["example.com:80".to_string(), "example.com:443".to_string()],
//!     );
//!     let server = ProxyServer::new(config)?;
//!     let (_shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
//!     server.run_until_shutdown(shutdown_rx).await?;
//!     Ok(())
//! }
//! ```

pub mod audit;
pub mod config;
pub mod error;
pub mod filter;
pub mod proxy;

#[cfg(test)]
pub(crate) mod test_support;

pub use audit::AuditLogger;
pub use config::Config;
pub use error::{Error, Result};
pub use filter::{
    AccessLog, ConnectDecision, ConnectInterceptor, RequestDecision, RequestInterceptor,
    TracingAccessLog, WhitelistRegistry,
};
pub use proxy::ProxyServer;
