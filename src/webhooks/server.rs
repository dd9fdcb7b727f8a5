//! Admission webhook server.
//!
//! Exposes `POST /validate-deployment` for a ValidatingWebhookConfiguration.
//!
//! To enable TLS (required by the API server):
//! 1. Issue a serving certificate (e.g. with cert-manager)
//! 2. Mount the secret at /etc/webhook/certs/ or point `WEBHOOK_CERT_PATH`
//!    and `WEBHOOK_KEY_PATH` at it
//!
//! Without certificates the server falls back to plain HTTP, which is only
//! useful behind a TLS-terminating proxy or for local testing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    response::{IntoResponse, Response},
    routing::post,
};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::WebhookConfig;
use crate::health::HealthState;
use crate::webhooks::handler::{AdmissionHandler, AdmissionOutcome};

/// Route served to the API server
pub const VALIDATE_DEPLOYMENT_PATH: &str = "/validate-deployment";

/// Shared state for webhook handlers
pub struct WebhookState {
    pub handler: AdmissionHandler,
    pub health: Option<Arc<HealthState>>,
}

impl WebhookState {
    pub fn new(handler: AdmissionHandler, health: Option<Arc<HealthState>>) -> Self {
        Self { handler, health }
    }
}

impl IntoResponse for AdmissionOutcome {
    fn into_response(self) -> Response {
        (self.status, Json(self.review)).into_response()
    }
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(VALIDATE_DEPLOYMENT_PATH, post(validate_deployment))
        .with_state(state)
}

/// Validate a Deployment admission request.
///
/// The body is taken as raw bytes rather than through the `Json` extractor so
/// that a malformed review still gets a denial envelope back.
async fn validate_deployment(State(state): State<Arc<WebhookState>>, body: Bytes) -> Response {
    let started = Instant::now();
    let outcome = state.handler.handle(&body);

    if let Some(health) = &state.health {
        health
            .metrics
            .record_admission(outcome.decision, started.elapsed().as_secs_f64());
    }

    outcome.into_response()
}

/// Errors that can occur when running the webhook server
#[derive(Error, Debug)]
pub enum WebhookError {
    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),
    /// Server error
    #[error("Webhook server error: {0}")]
    Server(String),
}

/// Run the webhook server.
///
/// Serves over TLS when both certificate files exist, plain HTTP otherwise.
/// Marks `health` ready once the listener is configured.
pub async fn run_webhook_server(
    config: &WebhookConfig,
    state: Arc<WebhookState>,
) -> Result<(), WebhookError> {
    use axum_server::tls_rustls::RustlsConfig;

    let health = state.health.clone();
    let app = create_webhook_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.webhook_port));

    if config.tls_available() {
        let tls = RustlsConfig::from_pem_file(&config.cert_path, &config.key_path)
            .await
            .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

        info!(port = config.webhook_port, "Webhook server listening with TLS");
        mark_ready(health.as_deref()).await;

        axum_server::bind_rustls(addr, tls)
            .serve(app.into_make_service())
            .await
            .map_err(|e| WebhookError::Server(e.to_string()))?;
    } else {
        warn!(
            cert_path = %config.cert_path.display(),
            key_path = %config.key_path.display(),
            "Webhook certificates not found, serving plain HTTP"
        );

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| WebhookError::Server(e.to_string()))?;
        info!(port = config.webhook_port, "Webhook server listening");
        mark_ready(health.as_deref()).await;

        axum::serve(listener, app)
            .await
            .map_err(|e| WebhookError::Server(e.to_string()))?;
    }

    Ok(())
}

async fn mark_ready(health: Option<&HealthState>) {
    if let Some(health) = health {
        health.set_ready(true).await;
    }
}
