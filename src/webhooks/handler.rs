//! Admission decision pipeline.
//!
//! Turns a raw request body into a response envelope and an HTTP status.
//! Every failure becomes a denial envelope; nothing here panics or returns
//! an error to the transport.

use std::str::FromStr;

use axum::http::StatusCode;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionReview, Operation};
use tracing::{debug, info, warn};

use super::codec::{
    DecodeError, DeploymentView, EnvelopeRequest, decode_envelope, decode_object, encode_allow,
    encode_deny, encode_invalid, ensure_deployment, peek_uid,
};
use super::policies::{PolicyEvaluator, Verdict, ViolationReason};

/// Status reason used when the embedded object cannot be decoded
pub const INVALID_OBJECT_REASON: &str = "InvalidObject";

/// Envelope `status.code` for policy denials
const POLICY_DENIAL_CODE: u16 = 403;

/// HTTP status used for policy denials.
///
/// The admission API only reads `response.allowed`, so `Ok` is the
/// conventional choice. `BadRequest` reproduces services that answer
/// denials with 400.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DenialStatus {
    #[default]
    Ok,
    BadRequest,
}

impl DenialStatus {
    pub fn status_code(&self) -> StatusCode {
        match self {
            DenialStatus::Ok => StatusCode::OK,
            DenialStatus::BadRequest => StatusCode::BAD_REQUEST,
        }
    }
}

impl FromStr for DenialStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "200" => Ok(DenialStatus::Ok),
            "400" => Ok(DenialStatus::BadRequest),
            other => Err(format!("expected 200 or 400, got '{other}'")),
        }
    }
}

/// What the webhook decided, for logging and metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied(ViolationReason),
    /// Envelope or object could not be decoded
    Invalid,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Allowed => "allowed",
            Decision::Denied(_) => "denied",
            Decision::Invalid => "invalid",
        }
    }
}

/// Response envelope plus the HTTP status it is sent with
pub struct AdmissionOutcome {
    pub status: StatusCode,
    pub review: AdmissionReview<DynamicObject>,
    pub decision: Decision,
}

impl AdmissionOutcome {
    /// Serialize the response envelope to JSON
    pub fn body(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.review)
    }

    /// uid echoed in the response envelope (empty if none could be read)
    pub fn uid(&self) -> &str {
        self.review
            .response
            .as_ref()
            .map(|response| response.uid.as_str())
            .unwrap_or_default()
    }
}

/// Decodes, evaluates and encodes a single admission request
#[derive(Debug, Clone, Default)]
pub struct AdmissionHandler {
    evaluator: PolicyEvaluator,
    denial_status: DenialStatus,
}

impl AdmissionHandler {
    pub fn new(evaluator: PolicyEvaluator, denial_status: DenialStatus) -> Self {
        Self {
            evaluator,
            denial_status,
        }
    }

    /// Handle a raw AdmissionReview body
    pub fn handle(&self, body: &[u8]) -> AdmissionOutcome {
        let envelope = match decode_envelope(body) {
            Ok(envelope) => envelope,
            Err(e) => {
                let uid = peek_uid(body).unwrap_or_default();
                warn!(uid = %uid, error = %e, "Failed to decode AdmissionReview");
                return AdmissionOutcome {
                    status: StatusCode::BAD_REQUEST,
                    review: encode_invalid(&uid, &e.to_string()),
                    decision: Decision::Invalid,
                };
            }
        };

        let request = &envelope.request;
        let uid = request.uid.as_str();
        debug!(
            uid = %uid,
            operation = ?request.operation,
            namespace = ?request.namespace,
            name = %request.name,
            dry_run = request.dry_run,
            "Processing admission request"
        );

        // DELETE requests carry no object to validate
        if request.operation == Operation::Delete {
            info!(uid = %uid, "Admission request allowed (DELETE)");
            return allowed(request);
        }

        let deployment = match decode_deployment(&envelope) {
            Ok(deployment) => deployment,
            Err(e) => {
                warn!(uid = %uid, error = %e, "Failed to decode Deployment");
                return AdmissionOutcome {
                    status: StatusCode::BAD_REQUEST,
                    review: encode_deny(request, INVALID_OBJECT_REASON, &e.to_string(), 400),
                    decision: Decision::Invalid,
                };
            }
        };

        match self.evaluator.evaluate(&deployment) {
            Verdict::Allowed => {
                info!(
                    uid = %uid,
                    deployment = ?deployment.name,
                    replicas = deployment.replicas,
                    "Admission request allowed"
                );
                allowed(request)
            }
            Verdict::Denied(violation) => {
                warn!(
                    uid = %uid,
                    deployment = ?deployment.name,
                    reason = %violation.reason,
                    message = %violation.message,
                    "Admission request denied"
                );
                AdmissionOutcome {
                    status: self.denial_status.status_code(),
                    review: encode_deny(
                        request,
                        violation.reason.as_str(),
                        &violation.message,
                        POLICY_DENIAL_CODE,
                    ),
                    decision: Decision::Denied(violation.reason),
                }
            }
        }
    }
}

fn allowed(request: &AdmissionRequest<DynamicObject>) -> AdmissionOutcome {
    AdmissionOutcome {
        status: StatusCode::OK,
        review: encode_allow(request),
        decision: Decision::Allowed,
    }
}

fn decode_deployment(envelope: &EnvelopeRequest) -> Result<DeploymentView, DecodeError> {
    ensure_deployment(&envelope.request)?;
    let object = envelope
        .object
        .as_ref()
        .ok_or_else(|| DecodeError::MissingObject(envelope.request.operation.clone()))?;
    decode_object(object)
}
