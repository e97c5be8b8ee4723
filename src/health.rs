//! Keep-alive HTTP endpoint for hosting platforms that ping the bot.

use std::net::SocketAddr;

use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::TempVoiceError;

const ALIVE: &str = "Bot is running 24/7!";

pub fn router() -> Router {
    Router::new().route("/", get(alive))
}

async fn alive() -> &'static str {
    ALIVE
}

/// Bind the health server's address. Fails startup if the port is taken.
pub async fn bind(address: SocketAddr) -> Result<TcpListener, TempVoiceError> {
    let listener = TcpListener::bind(address)
        .await
        .map_err(TempVoiceError::HealthServer)?;
    tracing::info!("Health check listening on {address}.");
    Ok(listener)
}

/// Serve the health check in the background.
pub fn spawn(listener: TcpListener) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router()).await {
            tracing::error!("Health server stopped: {e}");
        }
    })
}
