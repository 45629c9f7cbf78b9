//! HTTP forwarding proxy: accept loop, request dispatch, CONNECT relay

mod handler;
mod response;
mod server;
mod tunnel;

pub use handler::ProxyHandler;
pub use response::ProxyBody;
pub use server::ProxyServer;
pub use tunnel::TunnelHandler;
