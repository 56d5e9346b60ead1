//! Faucet service binary

use axum::http::HeaderValue;
use clap::Parser;
use faucet_common::utils::logging::init_logging;
use std::net::SocketAddr;
use std::sync::Arc;
use testnet_faucet::api::{router, AppState};
use testnet_faucet::{ClaimIssuer, ClaimStore, Collaborators, FaucetConfig};
use tokio::signal;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Faucet service CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file path (TOML)
    #[arg(short, long, env = "FAUCET_CONFIG")]
    config: Option<String>,

    /// Server address
    #[arg(long)]
    server_addr: Option<String>,

    /// RPC URL
    #[arg(long)]
    rpc_url: Option<String>,

    /// Private key
    #[arg(long)]
    private_key: Option<String>,

    /// Address cooldown (seconds)
    #[arg(long)]
    address_cooldown: Option<u64>,

    /// Rate limit window (seconds)
    #[arg(long)]
    rate_limit_window: Option<u64>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = FaucetConfig::load(args.config.as_deref())?;

    // Override with CLI arguments
    if let Some(addr) = args.server_addr {
        config.server_addr = addr;
    }

    if let Some(rpc_url) = args.rpc_url {
        config.rpc_url = rpc_url;
    }

    if let Some(key) = args.private_key {
        config.private_key = key;
    }

    if let Some(cooldown) = args.address_cooldown {
        config.address_cooldown_secs = cooldown;
    }

    if let Some(window) = args.rate_limit_window {
        config.rate_limit_window_secs = window;
    }

    if args.debug {
        config.logging.level = "debug".to_string();
    }

    // Initialize tracing; the guard flushes the file writer on drop
    let _log_guard = init_logging(&config.logging).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    info!("Starting Testnet Faucet v{}", env!("CARGO_PKG_VERSION"));
    config.validate()?;

    info!("Configuration:");
    info!("  Server address: {}", config.server_addr);
    info!("  RPC URL: {}", config.rpc_url);
    info!("  Fee mode: {:?}", config.fee_mode);
    info!(
        "  Rate limit: {} requests / {}s per IP",
        config.max_requests_per_window, config.rate_limit_window_secs
    );
    info!("  Address cooldown: {:?}", config.address_cooldown_duration());
    info!("  Captcha: {}", if config.captcha_enabled { "enabled" } else { "disabled" });

    let (collaborators, ledger) = Collaborators::from_config(&config).await?;
    info!("Chain id: {}", collaborators.chain_id);

    // Print statistics
    let stats = ledger.statistics().await?;
    info!("Previous statistics:");
    info!("  Total claims: {}", stats.total_claims);
    info!("  Unique addresses: {}", stats.unique_addresses);

    let issuer = Arc::new(ClaimIssuer::new(&config, collaborators)?);
    info!("Claim issuer initialized");

    // Build router
    let mut app = router(AppState {
        issuer,
        trust_proxy_headers: config.trust_proxy_headers,
        metrics_enabled: config.metrics_enabled,
    })
    .layer(TraceLayer::new_for_http());

    // Add CORS if enabled
    if config.cors_enabled {
        let origins = if config.allowed_origins.iter().any(|o| o == "*") {
            AllowOrigin::any()
        } else {
            let parsed = config
                .allowed_origins
                .iter()
                .filter_map(|o| match o.parse::<HeaderValue>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!("Ignoring invalid CORS origin: {}", o);
                        None
                    }
                })
                .collect::<Vec<_>>();
            AllowOrigin::list(parsed)
        };

        let cors = CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any);

        app = app.layer(cors);
        info!("CORS enabled");
    }

    // Start server
    let addr: SocketAddr = config.server_addr.parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    ledger.flush().await?;
    info!("Shutting down gracefully");
    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
