//! Validation policies for Deployment admission.
//!
//! Policies run in a fixed order and the first violation wins:
//! 1. Container resource requests (CPU, then memory, per container)
//! 2. Replica count
//!
//! Every policy is a pure function of the decoded [`DeploymentView`] and the
//! injected [`PolicyLimits`].

pub mod replicas;
pub mod resources;

use std::fmt;

use thiserror::Error;

use crate::webhooks::codec::DeploymentView;

pub use replicas::check_replicas;
pub use resources::check_resources;

/// Default CPU request ceiling per container, in millicores
pub const DEFAULT_MAX_CPU_MILLI: i64 = 100;
/// Default memory request ceiling per container, in bytes
pub const DEFAULT_MAX_MEMORY_BYTES: i64 = 250_000_000;
/// Default replica ceiling per Deployment
pub const DEFAULT_MAX_REPLICAS: i32 = 2;

/// Thresholds enforced by the policies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyLimits {
    pub max_cpu_milli: i64,
    pub max_memory_bytes: i64,
    pub max_replicas: i32,
}

impl Default for PolicyLimits {
    fn default() -> Self {
        Self {
            max_cpu_milli: DEFAULT_MAX_CPU_MILLI,
            max_memory_bytes: DEFAULT_MAX_MEMORY_BYTES,
            max_replicas: DEFAULT_MAX_REPLICAS,
        }
    }
}

/// Machine-readable reason for a denial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViolationReason {
    CpuRequestTooHigh,
    MemoryRequestTooHigh,
    TooManyReplicas,
}

impl ViolationReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationReason::CpuRequestTooHigh => "CpuRequestTooHigh",
            ViolationReason::MemoryRequestTooHigh => "MemoryRequestTooHigh",
            ViolationReason::TooManyReplicas => "TooManyReplicas",
        }
    }
}

impl fmt::Display for ViolationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named compliance failure with a human-readable message
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct PolicyViolation {
    pub reason: ViolationReason,
    pub message: String,
}

impl PolicyViolation {
    pub fn new(reason: ViolationReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }
}

/// Outcome of a single policy
pub type ComplianceResult = Result<(), PolicyViolation>;

/// Outcome of the whole policy chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    Denied(PolicyViolation),
}

impl Verdict {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Verdict::Allowed)
    }

    /// Denial message, if any
    pub fn message(&self) -> Option<&str> {
        match self {
            Verdict::Allowed => None,
            Verdict::Denied(violation) => Some(&violation.message),
        }
    }
}

/// Context for validation
pub struct ValidationContext<'a> {
    /// The Deployment being admitted
    pub deployment: &'a DeploymentView,
    /// Thresholds to enforce
    pub limits: &'a PolicyLimits,
}

/// A single admission rule
pub type Policy = fn(&ValidationContext<'_>) -> ComplianceResult;

/// Ordered policy chain. New rules are appended here.
const POLICIES: &[(&str, Policy)] = &[
    ("resources", check_resources as Policy),
    ("replicas", check_replicas as Policy),
];

/// Runs the policy chain against decoded Deployments
#[derive(Debug, Clone, Default)]
pub struct PolicyEvaluator {
    limits: PolicyLimits,
}

impl PolicyEvaluator {
    pub fn new(limits: PolicyLimits) -> Self {
        Self { limits }
    }

    /// Evaluate every policy in order, stopping at the first violation
    pub fn evaluate(&self, deployment: &DeploymentView) -> Verdict {
        let ctx = ValidationContext {
            deployment,
            limits: &self.limits,
        };

        for (name, policy) in POLICIES {
            if let Err(violation) = policy(&ctx) {
                tracing::debug!(policy = *name, reason = %violation.reason, "Policy rejected deployment");
                return Verdict::Denied(violation);
            }
        }

        Verdict::Allowed
    }
}
