//! Validating admission webhook for Deployments.
//!
//! A request flows through:
//! - [`codec`]: AdmissionReview envelope and Deployment decoding/encoding
//! - [`quantity`]: CPU and memory quantity normalization (used by the codec)
//! - [`policies`]: ordered resource and replica policies
//! - [`handler`]: the decision pipeline and HTTP status mapping
//! - [`server`]: the axum transport

pub mod codec;
pub mod handler;
pub mod policies;
pub mod quantity;
mod server;

pub use codec::{ContainerView, DecodeError, DeploymentView};
pub use handler::{AdmissionHandler, AdmissionOutcome, Decision, DenialStatus};
pub use policies::{PolicyEvaluator, PolicyLimits, PolicyViolation, Verdict, ViolationReason};
pub use server::{
    VALIDATE_DEPLOYMENT_PATH, WebhookError, WebhookState, create_webhook_router,
    run_webhook_server,
};

// Re-export kube-rs admission types for contract testing
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
