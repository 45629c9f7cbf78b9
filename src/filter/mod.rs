//! Whitelist-based access control for plain requests and CONNECT tunnels

mod connect;
mod log;
mod request;
mod whitelist;

pub use connect::{ConnectDecision, ConnectInterceptor};
pub use log::{AccessLog, SharedAccessLog, TracingAccessLog};
pub use request::{
    Denial, RequestDecision, RequestInterceptor, DEFAULT_HTTP_PORT, DENIAL_BODY,
    DENIAL_CONTENT_TYPE,
};
pub use whitelist::WhitelistRegistry;
