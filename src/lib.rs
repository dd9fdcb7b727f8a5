//! deployment-webhook library crate
//!
//! Exports the admission pipeline, the HTTP servers and configuration.

pub mod config;
pub mod health;
pub mod webhooks;

pub use config::WebhookConfig;
pub use health::HealthState;
pub use webhooks::{
    AdmissionHandler, PolicyEvaluator, PolicyLimits, WebhookError, WebhookState,
    run_webhook_server,
};
