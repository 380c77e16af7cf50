use clap::Parser;
use countrysrv::{
    api,
    cli::Args,
    config::Config,
    initialization::{build_cache, open_store, refresh_dataset},
    services::country::CountryService,
    AppState,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        error!("Failed to start server: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = Config::from_env();
    if let Some(port) = args.port {
        config.server_port = port;
    }
    let config = Arc::new(config);

    let store = open_store(&config).await?;
    let cache = build_cache(&config)?;

    refresh_dataset(&config, &args, store.clone(), cache.clone()).await?;

    let app_state = AppState {
        country_service: Arc::new(CountryService::new(store)),
        cache,
    };

    let app = api::router(app_state);

    let listener = TcpListener::bind(&format!("0.0.0.0:{}", config.server_port)).await?;

    info!("Server listening on http://0.0.0.0:{}", config.server_port);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Signal received, starting graceful shutdown");
}
