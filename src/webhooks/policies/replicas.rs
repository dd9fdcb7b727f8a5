//! Replica count policy.
//!
//! Validates that `spec.replicas` does not exceed `max_replicas`. A missing
//! replica count never reaches this policy; the decoder rejects it.

use super::{ComplianceResult, PolicyViolation, ValidationContext, ViolationReason};

/// Validate the replica count
pub fn check_replicas(ctx: &ValidationContext<'_>) -> ComplianceResult {
    let replicas = ctx.deployment.replicas;
    let max_replicas = ctx.limits.max_replicas;

    if replicas > max_replicas {
        return Err(PolicyViolation::new(
            ViolationReason::TooManyReplicas,
            format!(
                "the maximum number of replicas is {} and you provided {}",
                max_replicas, replicas
            ),
        ));
    }

    Ok(())
}
