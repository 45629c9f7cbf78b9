//! Whitelist check for CONNECT tunnel targets

use std::sync::Arc;

use super::log::SharedAccessLog;
use super::whitelist::WhitelistRegistry;

/// Outcome of checking a CONNECT target. The target is echoed back unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectDecision {
    /// Establish the tunnel.
    Allow(String),
    /// Refuse the tunnel.
    Reject(String),
}

impl ConnectDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, ConnectDecision::Allow(_))
    }

    pub fn target(&self) -> &str {
        match self {
            ConnectDecision::Allow(target) | ConnectDecision::Reject(target) => target,
        }
    }
}

/// Gates CONNECT tunnel establishment.
///
/// CONNECT targets always carry a port, so unlike
/// [`RequestInterceptor`](super::RequestInterceptor) no default port is ever
/// inferred here: the target is the lookup key.
pub struct ConnectInterceptor {
    whitelist: Arc<WhitelistRegistry>,
    log: SharedAccessLog,
}

impl ConnectInterceptor {
    pub fn new(whitelist: Arc<WhitelistRegistry>, log: SharedAccessLog) -> Self {
        Self { whitelist, log }
    }

    pub fn decide(&self, target_host_port: &str) -> ConnectDecision {
        if self.whitelist.contains(target_host_port) {
            return ConnectDecision::Allow(target_host_port.to_string());
        }

        self.log.host_not_allowed(target_host_port);
        ConnectDecision::Reject(target_host_port.to_string())
    }
}
