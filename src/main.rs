//! whitelist-proxy CLI - a forwarding proxy gated by a host:port whitelist

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use whitelist_proxy::config::WHITELIST_ENV;
use whitelist_proxy::{AuditLogger, Config, ProxyServer};

#[derive(Parser)]
#[command(name = "whitelist-proxy")]
#[command(about = "A forwarding HTTP/HTTPS proxy that only reaches whitelisted host:port destinations")]
#[command(version)]
struct Cli {
    /// Comma-separated host:port entries to allow, matched verbatim
    #[arg(short, long, env = "WHITELIST")]
    whitelist: Option<String>,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config)
    #[arg(short, long, env = "BIND_ADDRESS")]
    bind: Option<String>,

    /// Path to a JSONL audit log of every decision (overrides config)
    #[arg(long, env = "AUDIT_LOG")]
    audit_log: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut cfg = match cli.config {
        Some(ref path) => match Config::from_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    // Apply CLI / environment overrides
    cfg.apply_whitelist_override(cli.whitelist.as_deref());
    if let Some(addr) = cli.bind {
        cfg.proxy.bind_address = addr;
    }
    if let Some(path) = cli.audit_log {
        cfg.logging.audit_log = Some(path);
    }
    if let Some(level) = cli.log_level {
        cfg.logging.level = level;
    }

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.logging.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if cfg.whitelist_entries().is_err() {
        eprintln!("Error: {} not set", WHITELIST_ENV);
        std::process::exit(1);
    }

    if let Some(ref path) = cli.config {
        tracing::info!(path = %path.display(), "Loaded configuration");
    }

    let audit_log_path = cfg.logging.audit_log.clone();
    let mut server = ProxyServer::new(cfg)?;

    if let Some(ref audit_path) = audit_log_path {
        match AuditLogger::open(audit_path) {
            Ok(logger) => {
                tracing::info!(path = %audit_path, "Audit log enabled");
                server = server.with_audit_logger(Arc::new(logger));
            }
            Err(e) => {
                eprintln!("Error: Failed to open audit log '{}': {}", audit_path, e);
                std::process::exit(1);
            }
        }
    }

    tracing::info!("Starting proxy server...");

    // Handle Ctrl+C
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutting down...");
        let _ = shutdown_tx.send(());
    });

    server.run_until_shutdown(shutdown_rx).await?;

    Ok(())
}
