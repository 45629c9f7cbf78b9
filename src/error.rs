//! Error types for whitelist-proxy

use std::io;

/// Main error type for the proxy
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Proxy error: {0}")]
    Proxy(String),

    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    pub fn proxy(msg: impl Into<String>) -> Self {
        Error::Proxy(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
