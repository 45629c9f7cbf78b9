//! Logging capability handed to the whitelist and both interceptors.

use std::sync::Arc;

/// Sink for the two messages the access-control core emits.
///
/// One instance is created at startup and passed explicitly to
/// [`WhitelistRegistry::build`](super::WhitelistRegistry::build) and to each
/// interceptor, so tests can swap in a recording implementation.
pub trait AccessLog: Send + Sync {
    /// A configured entry was added to the whitelist.
    fn whitelisting(&self, entry: &str);

    /// A request or tunnel was refused for `host`.
    fn host_not_allowed(&self, host: &str);
}

/// Shared handle type used by the filter components.
pub type SharedAccessLog = Arc<dyn AccessLog>;

/// Default sink: `INFO` events through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAccessLog;

impl TracingAccessLog {
    pub fn shared() -> SharedAccessLog {
        Arc::new(Self)
    }
}

impl AccessLog for TracingAccessLog {
    fn whitelisting(&self, entry: &str) {
        tracing::info!("whitelisting: {}", entry);
    }

    fn host_not_allowed(&self, host: &str) {
        tracing::info!("Host not allowed: {}", host);
    }
}

/// Recording sink for unit tests.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct RecordingAccessLog {
    lines: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl RecordingAccessLog {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl AccessLog for RecordingAccessLog {
    fn whitelisting(&self, entry: &str) {
        self.lines
            .lock()
            .unwrap()
            .push(format!("whitelisting: {}", entry));
    }

    fn host_not_allowed(&self, host: &str) {
        self.lines
            .lock()
            .unwrap()
            .push(format!("Host not allowed: {}", host));
    }
}
