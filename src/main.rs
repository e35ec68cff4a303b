use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::{info, warn, Level};
use tracing_subscriber;

use turnstile::clock::SystemClock;
use turnstile::config::TurnstileConfig;
use turnstile::http::{AppState, HttpServer};
use turnstile::ratelimit::WindowLimiter;

#[derive(Parser, Debug)]
#[command(name = "turnstile")]
#[command(about = "Fixed-window request throttling service", version)]
struct Args {
    /// Path to a YAML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    info!("Starting Turnstile Request Throttling Service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = match args.config {
        Some(path) => TurnstileConfig::from_file(path)?,
        None => TurnstileConfig::default(),
    };
    info!(
        listen_addr = %config.server.listen_addr,
        limit = config.rate_limiting.limit,
        window_secs = config.rate_limiting.window_secs,
        "Configuration loaded"
    );

    // Initialize the rate limiter and inject it into the handler state
    let limiter = WindowLimiter::new(
        config.rate_limiting.limit,
        config.rate_limiting.window_secs,
    )?;
    let state = Arc::new(AppState {
        limiter,
        clock: Box::new(SystemClock),
    });
    info!("Rate limiter initialized");

    // The limiter never schedules its own eviction; sweep stale window
    // state from here on a fixed interval
    let cleanup_state = Arc::clone(&state);
    let cleanup_interval = Duration::from_secs(config.rate_limiting.cleanup_interval_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(cleanup_interval);
        loop {
            interval.tick().await;
            let now = cleanup_state.clock.now();
            match cleanup_state.limiter.cleanup(now) {
                Ok(removed) if removed > 0 => {
                    info!(removed = removed, "Evicted stale rate limit state")
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Cleanup sweep failed"),
            }
        }
    });

    // Create and start the HTTP server
    let server = HttpServer::new(config.server.listen_addr, state);

    info!("Starting HTTP server on {}", config.server.listen_addr);

    // Run the server with graceful shutdown on Ctrl+C
    server.serve_with_shutdown(shutdown_signal()).await?;

    info!("Turnstile Request Throttling Service stopped");
    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
