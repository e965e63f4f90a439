// src/main.rs

use axum::serve;
use clap::Parser;
use key_registry::{
    build_app,
    cli::{Cli, Commands},
    metrics, setup_configuration, AppError, AppState,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = ?e, "Failed to install Ctrl+C handler");
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
                error!(error = ?e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { info!(signal = "Ctrl+C", "Received signal. Initiating graceful shutdown...") },
        () = terminate => { info!(signal = "Terminate", "Received signal. Initiating graceful shutdown...") },
    }
}

fn init_tracing(plain: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);
    if plain {
        registry.with(fmt::layer()).init();
    } else {
        let json_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true);
        registry.with(json_layer).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_tracing(cli.plain_logs);

    let (config, _config_path) = setup_configuration(cli.config.clone()).map_err(|e| {
        eprintln!("Application setup error: {e:?}");
        e
    })?;

    if *cli.effective_command() == Commands::CheckConfig {
        println!("Configuration is valid.");
        println!(
            "  store: {}\n  window: {}s\n  ttl: {}s\n  max_cas_retries: {}\n  purge.batch_size: {}\n  listen: {}:{}",
            if config.redis_url.is_some() { "redis" } else { "memory" },
            config.registry.window_secs,
            config.registry.ttl_secs,
            config.registry.max_cas_retries,
            config.purge.batch_size,
            config.server.host,
            config.server.port,
        );
        return Ok(());
    }

    let state = Arc::new(AppState::new(config.clone())?);

    match cli.effective_command() {
        Commands::Read { registry_id } => {
            match state.service.read(registry_id).await? {
                Some(registry) => println!("{}", serde_json::to_string_pretty(&registry)?),
                None => {
                    return Err(AppError::RegistryNotFound {
                        registry_id: registry_id.clone(),
                    })
                }
            }
            Ok(())
        }
        Commands::Purge { prefix, batch_size } => {
            let batch_size = batch_size.unwrap_or(config.purge.batch_size);
            let total = state.service.purge_all_by_prefix(prefix, batch_size).await?;
            println!("{}", serde_json::to_string_pretty(&total)?);
            Ok(())
        }
        Commands::CheckConfig => Ok(()),
        Commands::Serve => {
            if let Err(e) = metrics::install_recorder() {
                warn!(error = %e, "Metrics recorder unavailable; /metrics will be empty");
            }
            let app = build_app(state);

            let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
                .parse()
                .map_err(|e| {
                    AppError::config_validation(
                        format!("Invalid bind address: {e}"),
                        Some("server.host"),
                    )
                })?;
            let listener = TcpListener::bind(addr).await.map_err(|e| {
                error!(server.address = %addr, error = ?e, "Failed to bind to address. Exiting.");
                AppError::from(e)
            })?;
            info!(server.address = %addr, "Server listening");

            info!("Starting server run loop...");
            serve(listener, app.into_make_service())
                .with_graceful_shutdown(shutdown_signal())
                .await
                .map_err(|e| {
                    error!(error = ?e, "Server run loop encountered an error. Exiting.");
                    AppError::from(e)
                })?;

            info!("Server shut down gracefully.");
            Ok(())
        }
    }
}
