//! CONNECT tunnel handling: raw byte relay between client and upstream

use hyper::upgrade::Upgraded;
use hyper_util::rt::TokioIo;
use std::time::Duration;
use tokio::net::TcpStream;

use crate::error::{Error, Result};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Dials CONNECT targets and relays bytes once the client connection is upgraded.
pub struct TunnelHandler {
    connect_timeout: Duration,
}

impl Default for TunnelHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl TunnelHandler {
    pub fn new() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Open the upstream TCP connection for an allowed CONNECT target.
    pub async fn connect_upstream(&self, target: &str) -> Result<TcpStream> {
        match tokio::time::timeout(self.connect_timeout, TcpStream::connect(target)).await {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(Error::proxy(format!(
                "Failed to connect to {}: {}",
                target, e
            ))),
            Err(_) => Err(Error::proxy(format!(
                "Timed out connecting to {} after {:?}",
                target, self.connect_timeout
            ))),
        }
    }

    /// Copy bytes both ways until either side closes.
    pub async fn run_tunnel(
        &self,
        upgraded: Upgraded,
        mut upstream: TcpStream,
        target: &str,
    ) -> Result<()> {
        let mut client = TokioIo::new(upgraded);
        let (from_client, from_upstream) =
            tokio::io::copy_bidirectional(&mut client, &mut upstream).await?;

        tracing::debug!(
            tunnel = %target,
            from_client,
            from_upstream,
            "Tunnel closed"
        );
        Ok(())
    }
}
