//! HTTP shell for the inbound webhook.
//!
//! `POST /webhook/wasapi` accepts the raw Wasapi payload. A body that parses
//! is acknowledged with `200 {"success":true}` and normalized on a spawned
//! task; a malformed body gets `500 {"success":false,"error":...}`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use tracing::{debug, error, info};

use crate::wasapi::payload::WebhookPayload;
use crate::wasapi::provider::WasapiProvider;

/// Route the webhook is served on.
pub const WEBHOOK_PATH: &str = "/webhook/wasapi";

/// Build the webhook router.
pub fn router(provider: Arc<WasapiProvider>) -> Router {
    Router::new()
        .route(WEBHOOK_PATH, post(receive))
        .with_state(provider)
}

async fn receive(State(provider): State<Arc<WasapiProvider>>, body: Bytes) -> impl IntoResponse {
    let payload = match WebhookPayload::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            error!(error = %e, "error processing Wasapi webhook");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "success": false, "error": e.to_string() })),
            );
        }
    };

    tokio::spawn(async move {
        if provider.normalizer().normalize(payload).await.is_none() {
            debug!("webhook produced no event");
        }
    });

    (StatusCode::OK, Json(serde_json::json!({ "success": true })))
}

/// Serve the webhook on `addr` until the listener fails.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server stops.
pub async fn serve(addr: SocketAddr, provider: Arc<WasapiProvider>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| anyhow::anyhow!("failed to bind webhook listener on {addr}: {e}"))?;
    info!(addr = %listener.local_addr()?, path = WEBHOOK_PATH, "webhook server listening");
    axum::serve(listener, router(provider)).await?;
    Ok(())
}
