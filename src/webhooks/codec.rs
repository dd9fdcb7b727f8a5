//! AdmissionReview envelope codec.
//!
//! Decoding happens in two stages so a broken object never loses the request
//! uid: [`decode_envelope`] parses the outer review and lifts the object out
//! as raw JSON before the typed decode, then [`decode_object`] turns that JSON
//! into a normalized [`DeploymentView`]. The encoders always copy the uid of
//! the request they answer.

use std::collections::BTreeMap;

use k8s_openapi::Resource;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Container;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity as QuantityString;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use kube::core::{DynamicObject, Status, TypeMeta};
use serde_json::Value;
use thiserror::Error;

use super::quantity::{Quantity, QuantityError};

/// Message carried by every allow response
pub const ALLOWED_MESSAGE: &str = "The deployment is valid";

const ADMISSION_API_VERSION: &str = "admission.k8s.io/v1";
const ADMISSION_KIND: &str = "AdmissionReview";

/// Errors raised while decoding the review envelope or the embedded object
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Body is not valid JSON or not shaped like an AdmissionReview
    #[error("malformed AdmissionReview: {0}")]
    MalformedEnvelope(#[source] serde_json::Error),

    /// Review carries no `request`
    #[error("invalid AdmissionReview: {0}")]
    MissingRequest(String),

    /// Request targets something other than an apps Deployment
    #[error("unsupported resource kind '{0}', only apps/v1 Deployment is accepted")]
    UnsupportedKind(String),

    /// CREATE/UPDATE request without an object
    #[error("{0:?} request carries no object")]
    MissingObject(Operation),

    /// Object does not deserialize as a Deployment
    #[error("malformed Deployment object: {0}")]
    MalformedObject(#[source] serde_json::Error),

    /// Object does not declare itself an apps/v1 Deployment
    #[error("object is not an apps/v1 Deployment (apiVersion '{api_version}', kind '{kind}')")]
    NotADeployment { api_version: String, kind: String },

    /// `spec.replicas` is not set
    #[error("deployment does not set spec.replicas")]
    MissingReplicas,

    /// A container resource request is not a valid quantity
    #[error("container '{container}' has an invalid {resource} request: {source}")]
    InvalidQuantity {
        container: String,
        resource: &'static str,
        #[source]
        source: QuantityError,
    },
}

/// Output of the envelope stage.
///
/// `request` answers every response; its `object` and `old_object` are always
/// `None`. The object under review stays raw JSON in `object` until
/// [`decode_object`] runs.
#[derive(Debug, Clone)]
pub struct EnvelopeRequest {
    pub request: AdmissionRequest<DynamicObject>,
    pub object: Option<Value>,
}

/// Read-only view of the parts of a Deployment the policies inspect
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentView {
    pub name: Option<String>,
    pub namespace: Option<String>,
    pub replicas: i32,
    /// Pod template containers, in declaration order
    pub containers: Vec<ContainerView>,
}

/// Normalized resource requests of a single container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerView {
    pub name: String,
    /// CPU request in millicores (0 when not requested)
    pub cpu_request_milli: i64,
    /// Memory request in bytes (0 when not requested)
    pub memory_request_bytes: i64,
}

/// Decode the outer AdmissionReview without interpreting the object
pub fn decode_envelope(body: &[u8]) -> Result<EnvelopeRequest, DecodeError> {
    let mut review: Value = serde_json::from_slice(body).map_err(DecodeError::MalformedEnvelope)?;

    // Objects are lifted out before the typed decode so their shape cannot
    // fail the envelope. `oldObject` is never inspected.
    let object = match review.get_mut("request").and_then(Value::as_object_mut) {
        Some(request) => {
            request.remove("oldObject");
            request.remove("object").filter(|object| !object.is_null())
        }
        None => None,
    };

    let review: AdmissionReview<DynamicObject> =
        serde_json::from_value(review).map_err(DecodeError::MalformedEnvelope)?;
    let request: Result<AdmissionRequest<DynamicObject>, _> = review.try_into();
    let request = request.map_err(|e| DecodeError::MissingRequest(e.to_string()))?;

    Ok(EnvelopeRequest { request, object })
}

/// Best-effort read of `request.uid` from a body the envelope stage rejected
pub fn peek_uid(body: &[u8]) -> Option<String> {
    let review: Value = serde_json::from_slice(body).ok()?;
    review
        .pointer("/request/uid")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Reject requests for anything other than `apps` Deployments
pub fn ensure_deployment(request: &AdmissionRequest<DynamicObject>) -> Result<(), DecodeError> {
    let kind = &request.kind;
    if kind.group == "apps" && kind.kind == "Deployment" {
        return Ok(());
    }

    let qualified = if kind.group.is_empty() {
        format!("{}/{}", kind.version, kind.kind)
    } else {
        format!("{}/{}/{}", kind.group, kind.version, kind.kind)
    };
    Err(DecodeError::UnsupportedKind(qualified))
}

/// Decode the embedded object into a normalized [`DeploymentView`]
pub fn decode_object(object: &Value) -> Result<DeploymentView, DecodeError> {
    let deployment: Deployment =
        serde_json::from_value(object.clone()).map_err(DecodeError::MalformedObject)?;
    ensure_object_type(object)?;

    let spec = deployment.spec.ok_or(DecodeError::MissingReplicas)?;
    let replicas = spec.replicas.ok_or(DecodeError::MissingReplicas)?;

    let containers = spec
        .template
        .spec
        .map(|pod| pod.containers)
        .unwrap_or_default()
        .iter()
        .map(container_view)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(DeploymentView {
        name: deployment.metadata.name,
        namespace: deployment.metadata.namespace,
        replicas,
        containers,
    })
}

/// The typed decode only checks `apiVersion` and `kind` when they are present
fn ensure_object_type(object: &Value) -> Result<(), DecodeError> {
    let field = |name: &str| {
        object
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let (api_version, kind) = (field("apiVersion"), field("kind"));

    if api_version == Deployment::API_VERSION && kind == Deployment::KIND {
        Ok(())
    } else {
        Err(DecodeError::NotADeployment { api_version, kind })
    }
}

fn container_view(container: &Container) -> Result<ContainerView, DecodeError> {
    let requests = container
        .resources
        .as_ref()
        .and_then(|resources| resources.requests.as_ref());

    let cpu_request_milli = request_quantity(requests, "cpu", &container.name)?
        .map(|q| q.milli_value())
        .unwrap_or(0);
    let memory_request_bytes = request_quantity(requests, "memory", &container.name)?
        .map(|q| q.value())
        .unwrap_or(0);

    Ok(ContainerView {
        name: container.name.clone(),
        cpu_request_milli,
        memory_request_bytes,
    })
}

fn request_quantity(
    requests: Option<&BTreeMap<String, QuantityString>>,
    resource: &'static str,
    container: &str,
) -> Result<Option<Quantity>, DecodeError> {
    let Some(raw) = requests.and_then(|r| r.get(resource)) else {
        return Ok(None);
    };

    Quantity::parse(&raw.0)
        .map(Some)
        .map_err(|source| DecodeError::InvalidQuantity {
            container: container.to_string(),
            resource,
            source,
        })
}

/// Build an allow response for `request`
pub fn encode_allow(request: &AdmissionRequest<DynamicObject>) -> AdmissionReview<DynamicObject> {
    let mut status = Status::success();
    status.code = 200;
    status.message = ALLOWED_MESSAGE.to_string();

    let mut response = AdmissionResponse::from(request);
    response.result = status;
    response.into_review()
}

/// Build a denial response for `request`.
///
/// `message` is what `kubectl` shows the user; `reason` is a short
/// machine-readable code such as `TooManyReplicas`.
pub fn encode_deny(
    request: &AdmissionRequest<DynamicObject>,
    reason: &str,
    message: &str,
    code: u16,
) -> AdmissionReview<DynamicObject> {
    let mut status = Status::failure(message, reason);
    status.code = code;

    let mut response = AdmissionResponse::from(request).deny(message);
    response.result = status;
    response.into_review()
}

/// Build a denial response when no request could be decoded.
///
/// `uid` is whatever could be salvaged from the body, empty when nothing could.
pub fn encode_invalid(uid: &str, message: &str) -> AdmissionReview<DynamicObject> {
    let mut response = AdmissionResponse::invalid(message);
    response.uid = uid.to_string();
    response.result.code = 400;

    let mut review = response.into_review();
    if review.types.api_version.is_empty() {
        review.types = TypeMeta {
            api_version: ADMISSION_API_VERSION.to_string(),
            kind: ADMISSION_KIND.to_string(),
        };
    }
    review
}
