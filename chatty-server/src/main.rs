//! Chatty server binary.
//!
//! # Usage
//!
//! ```bash
//! # Run on default address 127.0.0.1:3000
//! cargo run --bin chatty-server
//!
//! # Run on custom address
//! cargo run --bin chatty-server -- --bind 0.0.0.0:7000
//!
//! # Or via environment variable
//! CHATTY_ADDR=0.0.0.0:7000 cargo run --bin chatty-server
//! ```

use std::path::Path;
use std::sync::Arc;

use chatty_server::config::{ServerCliArgs, ServerConfig};
use chatty_server::executor::CommandExecutor;
use chatty_server::notifications::NotificationStore;
use chatty_server::server;
use chatty_server::service::{MemoryBackend, Services};
use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;

#[tokio::main]
async fn main() {
    let cli = ServerCliArgs::parse();

    let config = match ServerConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    let _log_guard = init_logging(&config.log_level, config.log_file.as_deref());

    tracing::info!(addr = %config.bind_addr, "starting chatty server");

    let backend = MemoryBackend::with_notifications(NotificationStore::with_max_queue_size(
        config.max_notifications,
    ));
    let executor = CommandExecutor::new(Services::in_memory(Arc::new(backend)));

    let handle = match server::start_server(&config.bind_addr, executor, config.server_options())
        .await
    {
        Ok((_, handle)) => handle,
        Err(e) => {
            tracing::error!(error = %e, "failed to start server");
            std::process::exit(1);
        }
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for ctrl-c");
    }
    handle.stop();
    handle.wait().await;
    tracing::info!("chatty server stopped");
}

/// Installs the global subscriber. Logs go to stdout, or to `file_path` when
/// given; the returned guard must live until shutdown so the file is flushed.
/// `ServerConfig::load` has already rejected paths without a file name.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let file = file_path.and_then(|path| Some((path.parent()?, path.file_name()?)));
    let Some((dir, name)) = file else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
        return None;
    };

    let file_appender = tracing_appender::rolling::never(dir, name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}
