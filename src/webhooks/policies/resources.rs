//! Container resource request policy.
//!
//! Validates, for each container in pod-template order:
//! - CPU request does not exceed `max_cpu_milli`
//! - Memory request does not exceed `max_memory_bytes`
//!
//! CPU is checked before memory within a container. Containers without
//! requests count as requesting zero.

use super::{ComplianceResult, PolicyViolation, ValidationContext, ViolationReason};

/// Validate container CPU and memory requests
pub fn check_resources(ctx: &ValidationContext<'_>) -> ComplianceResult {
    let limits = ctx.limits;

    for container in &ctx.deployment.containers {
        if container.cpu_request_milli > limits.max_cpu_milli {
            return Err(PolicyViolation::new(
                ViolationReason::CpuRequestTooHigh,
                format!(
                    "cpu request is too high, the maximum value is {}m and you provided {}m",
                    limits.max_cpu_milli, container.cpu_request_milli
                ),
            ));
        }

        if container.memory_request_bytes > limits.max_memory_bytes {
            return Err(PolicyViolation::new(
                ViolationReason::MemoryRequestTooHigh,
                format!(
                    "memory request is too high, the maximum value is {} bytes and you provided {} bytes",
                    limits.max_memory_bytes, container.memory_request_bytes
                ),
            ));
        }
    }

    Ok(())
}
