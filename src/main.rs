//! QueryRelay server entry point.

use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use queryrelay::config::Config;
use queryrelay::errors::{Error, Result};
use queryrelay::server::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::load()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cfg.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let state = AppState::from_config(&cfg)?;
    let app = build_router(state, &cfg.cors_origins);

    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .map_err(|err| Error::Config(format!("invalid bind address: {err}")))?;

    tracing::info!(%addr, "starting QueryRelay server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| Error::Config(format!("failed to bind {addr}: {err}")))?;

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    );

    tokio::select! {
        result = server => {
            result.map_err(|err| Error::Config(format!("server error: {err}")))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    Ok(())
}
