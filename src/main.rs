use blob_gateway::app::{build_router, AppState};
use blob_gateway::config::environment::AppConfig;
use blob_gateway::service::backend::SubmitBackend;
use blob_gateway::service::status_service;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    init_logging();

    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "config error");
            std::process::exit(1);
        }
    };

    let backend = match SubmitBackend::from_config(&config) {
        Ok(b) => b,
        Err(e) => {
            error!(error = %e, "backend init error");
            std::process::exit(1);
        }
    };

    let bind_addr = format!("{}:{}", config.api_host, config.api_port);
    let listener = match TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, bind_addr = %bind_addr, "server bind error");
            std::process::exit(1);
        }
    };

    info!(
        env = %config.rust_env,
        host = %config.api_host,
        port = config.api_port,
        network = %config.network_name,
        backend_mode = %backend.mode(),
        "blob-gateway started"
    );

    let state = AppState::new(config, backend);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(status_service::run_status_refresh(
        state.clone(),
        shutdown_rx.clone(),
    ));
    tokio::spawn(status_service::run_expiry_sweep(
        state.clone(),
        shutdown_rx,
    ));

    let app = build_router(state);
    let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });
    if let Err(e) = serve.await {
        error!(error = %e, "server runtime error");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
