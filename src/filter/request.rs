//! Whitelist check for plain (non-CONNECT) proxied requests

use hyper::StatusCode;
use std::sync::Arc;

use super::log::SharedAccessLog;
use super::whitelist::WhitelistRegistry;

/// Port assumed for a plain HTTP target that names none.
pub const DEFAULT_HTTP_PORT: &str = "80";

/// Body sent with every denial.
pub const DENIAL_BODY: &str = "Host not in whitelist\n";

/// Content type sent with every denial.
pub const DENIAL_CONTENT_TYPE: &str = "text/plain";

/// The response the engine must send instead of forwarding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Denial {
    pub status: StatusCode,
    pub content_type: &'static str,
    pub body: &'static str,
}

impl Denial {
    fn not_whitelisted() -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            content_type: DENIAL_CONTENT_TYPE,
            body: DENIAL_BODY,
        }
    }
}

/// Outcome of checking a plain request. Both variants carry the canonical
/// `host:port` key that was looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestDecision {
    /// Forward the request unmodified.
    PassThrough(String),
    /// Answer with the given response instead of forwarding.
    Deny(String, Denial),
}

impl RequestDecision {
    pub fn is_pass_through(&self) -> bool {
        matches!(self, RequestDecision::PassThrough(_))
    }

    /// The canonical key the decision was made on.
    pub fn key(&self) -> &str {
        match self {
            RequestDecision::PassThrough(key) | RequestDecision::Deny(key, _) => key,
        }
    }
}

/// Gates plain requests before they are forwarded.
pub struct RequestInterceptor {
    whitelist: Arc<WhitelistRegistry>,
    log: SharedAccessLog,
}

impl RequestInterceptor {
    pub fn new(whitelist: Arc<WhitelistRegistry>, log: SharedAccessLog) -> Self {
        Self { whitelist, log }
    }

    /// Canonical whitelist key for a plain request target.
    ///
    /// A target without any `:` gets `:80` appended; anything else is used
    /// as-is, however many separators it has.
    pub fn whitelist_key(target_host: &str) -> String {
        if target_host.contains(':') {
            target_host.to_string()
        } else {
            format!("{}:{}", target_host, DEFAULT_HTTP_PORT)
        }
    }

    /// Decide whether a request for `target_host` may be forwarded.
    pub fn decide(&self, target_host: &str) -> RequestDecision {
        let key = Self::whitelist_key(target_host);
        if self.whitelist.contains(&key) {
            return RequestDecision::PassThrough(key);
        }

        self.log.host_not_allowed(&key);
        RequestDecision::Deny(key, Denial::not_whitelisted())
    }
}
