// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Unit tests for deployment-webhook.
//!
//! These tests drive the admission pipeline end to end through raw request
//! bodies, without an HTTP server or a Kubernetes cluster.

#[path = "../common/mod.rs"]
mod common;

use axum::http::StatusCode;
use deployment_webhook::webhooks::{AdmissionHandler, Decision, ViolationReason};

use common::fixtures::{ContainerFixture, DeploymentReviewBuilder, container};

mod scenario_tests {
    use super::*;

    #[test]
    fn test_compliant_deployment_is_allowed() {
        let body = DeploymentReviewBuilder::new("web")
            .uid("scenario-1")
            .replicas(1)
            .container(container("app", "50m", "100000000"))
            .build_body();

        let outcome = AdmissionHandler::default().handle(&body);
        assert_eq!(outcome.status, StatusCode::OK);
        assert_eq!(outcome.decision, Decision::Allowed);

        let response = outcome.review.response.unwrap();
        assert_eq!(response.uid, "scenario-1");
        assert!(response.allowed);
        assert_eq!(response.result.message, "The deployment is valid");
    }

    #[test]
    fn test_cpu_over_limit_is_denied() {
        let body = DeploymentReviewBuilder::new("web")
            .uid("scenario-2")
            .replicas(1)
            .container(container("app", "150m", "100000000"))
            .build_body();

        let outcome = AdmissionHandler::default().handle(&body);
        assert_eq!(
            outcome.decision,
            Decision::Denied(ViolationReason::CpuRequestTooHigh)
        );

        let response = outcome.review.response.unwrap();
        assert_eq!(response.uid, "scenario-2");
        assert!(!response.allowed);
        assert!(response.result.message.starts_with("cpu request is too high"));
        assert!(response.result.message.contains("150"));
    }

    #[test]
    fn test_memory_over_limit_is_denied() {
        let body = DeploymentReviewBuilder::new("web")
            .uid("scenario-3")
            .replicas(1)
            .container(container("app", "50m", "300000000"))
            .build_body();

        let outcome = AdmissionHandler::default().handle(&body);
        assert_eq!(
            outcome.decision,
            Decision::Denied(ViolationReason::MemoryRequestTooHigh)
        );

        let response = outcome.review.response.unwrap();
        assert_eq!(response.uid, "scenario-3");
        assert!(response.result.message.starts_with("memory request is too high"));
    }

    #[test]
    fn test_too_many_replicas_is_denied_after_resources_pass() {
        let body = DeploymentReviewBuilder::new("web")
            .uid("scenario-4")
            .replicas(3)
            .container(container("app", "10m", "1000000"))
            .container(container("sidecar", "50m", "100000000"))
            .build_body();

        let outcome = AdmissionHandler::default().handle(&body);
        assert_eq!(
            outcome.decision,
            Decision::Denied(ViolationReason::TooManyReplicas)
        );

        let response = outcome.review.response.unwrap();
        assert_eq!(response.uid, "scenario-4");
        assert_eq!(
            response.result.message,
            "the maximum number of replicas is 2 and you provided 3"
        );
    }

    #[test]
    fn test_malformed_json_is_denied_with_empty_uid() {
        let outcome = AdmissionHandler::default().handle(br#"{"request": {"uid": "x""#);
        assert_eq!(outcome.status, StatusCode::BAD_REQUEST);
        assert_eq!(outcome.decision, Decision::Invalid);

        let response = outcome.review.response.unwrap();
        assert!(response.uid.is_empty());
        assert!(!response.allowed);
        assert!(response.result.message.starts_with("malformed AdmissionReview"));
    }

    #[test]
    fn test_missing_replicas_is_denied_with_request_uid() {
        let body = DeploymentReviewBuilder::new("web")
            .uid("scenario-6")
            .without_replicas()
            .container(container("app", "50m", "100000000"))
            .build_body();

        let outcome = AdmissionHandler::default().handle(&body);
        assert_eq!(outcome.status, StatusCode::BAD_REQUEST);
        assert_eq!(outcome.decision, Decision::Invalid);

        let response = outcome.review.response.unwrap();
        assert_eq!(response.uid, "scenario-6");
        assert!(!response.allowed);
        assert!(response.result.message.contains("spec.replicas"));
    }
}

mod normalization_tests {
    use super::*;

    #[test]
    fn test_fractional_cores_are_normalized() {
        // 0.2 cores == 200m
        let body = DeploymentReviewBuilder::default()
            .container(container("app", "0.2", "64Mi"))
            .build_body();

        let outcome = AdmissionHandler::default().handle(&body);
        assert_eq!(
            outcome.decision,
            Decision::Denied(ViolationReason::CpuRequestTooHigh)
        );
        assert!(
            outcome
                .review
                .response
                .unwrap()
                .result
                .message
                .contains("200m")
        );
    }

    #[test]
    fn test_binary_memory_units_are_normalized() {
        // 256Mi == 268435456 bytes, above the 250MB ceiling
        let body = DeploymentReviewBuilder::default()
            .container(container("app", "100m", "256Mi"))
            .build_body();

        let outcome = AdmissionHandler::default().handle(&body);
        assert_eq!(
            outcome.decision,
            Decision::Denied(ViolationReason::MemoryRequestTooHigh)
        );
    }

    #[test]
    fn test_containers_without_requests_are_compliant() {
        let body = DeploymentReviewBuilder::default()
            .container(ContainerFixture {
                name: "bare".to_string(),
                ..Default::default()
            })
            .build_body();

        let outcome = AdmissionHandler::default().handle(&body);
        assert_eq!(outcome.decision, Decision::Allowed);
    }

    #[test]
    fn test_non_numeric_quantity_is_invalid() {
        let body = DeploymentReviewBuilder::default()
            .uid("bad-quantity")
            .container(container("app", "fast", "1Gi"))
            .build_body();

        let outcome = AdmissionHandler::default().handle(&body);
        assert_eq!(outcome.decision, Decision::Invalid);
        assert_eq!(outcome.uid(), "bad-quantity");
    }
}

mod envelope_tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_operation_is_validated() {
        let body = DeploymentReviewBuilder::default()
            .operation("UPDATE")
            .replicas(10)
            .build_body();

        let outcome = AdmissionHandler::default().handle(&body);
        assert_eq!(
            outcome.decision,
            Decision::Denied(ViolationReason::TooManyReplicas)
        );
    }

    #[test]
    fn test_delete_operation_is_allowed() {
        let body = DeploymentReviewBuilder::default()
            .uid("delete-uid")
            .operation("DELETE")
            .build_body();

        let outcome = AdmissionHandler::default().handle(&body);
        assert_eq!(outcome.decision, Decision::Allowed);
        assert_eq!(outcome.uid(), "delete-uid");
    }

    #[test]
    fn test_other_kinds_are_rejected() {
        let mut review = DeploymentReviewBuilder::default().uid("pod-uid").build_review();
        review["request"]["kind"] = json!({ "group": "", "version": "v1", "kind": "Pod" });
        let body = serde_json::to_vec(&review).unwrap();

        let outcome = AdmissionHandler::default().handle(&body);
        assert_eq!(outcome.decision, Decision::Invalid);

        let response = outcome.review.response.unwrap();
        assert_eq!(response.uid, "pod-uid");
        assert!(response.result.message.contains("v1/Pod"));
    }

    #[test]
    fn test_non_map_objects_keep_request_uid() {
        for object in [json!([1, 2, 3]), json!("nope"), json!(42), json!(false)] {
            let mut review = DeploymentReviewBuilder::default().uid("keep-me").build_review();
            review["request"]["object"] = object;
            let body = serde_json::to_vec(&review).unwrap();

            let outcome = AdmissionHandler::default().handle(&body);
            assert_eq!(outcome.status, StatusCode::BAD_REQUEST);
            assert_eq!(outcome.decision, Decision::Invalid);

            let response = outcome.review.response.unwrap();
            assert_eq!(response.uid, "keep-me");
            assert_eq!(response.result.reason, "InvalidObject");
            assert!(response.result.message.starts_with("malformed Deployment object"));
        }
    }

    #[test]
    fn test_mistyped_metadata_keeps_request_uid() {
        let mut review = DeploymentReviewBuilder::default().uid("keep-me").build_review();
        review["request"]["object"]["metadata"] = json!(5);
        let body = serde_json::to_vec(&review).unwrap();

        let outcome = AdmissionHandler::default().handle(&body);
        assert_eq!(outcome.decision, Decision::Invalid);
        assert_eq!(outcome.uid(), "keep-me");
    }

    #[test]
    fn test_broken_old_object_is_ignored() {
        let mut review = DeploymentReviewBuilder::default()
            .uid("update-uid")
            .operation("UPDATE")
            .container(container("app", "50m", "64Mi"))
            .build_review();
        review["request"]["oldObject"] = json!("not a deployment");
        let body = serde_json::to_vec(&review).unwrap();

        let outcome = AdmissionHandler::default().handle(&body);
        assert_eq!(outcome.decision, Decision::Allowed);
        assert_eq!(outcome.uid(), "update-uid");
    }

    #[test]
    fn test_object_without_type_is_invalid() {
        let mut review = DeploymentReviewBuilder::default()
            .uid("untyped")
            .replicas(5)
            .build_review();
        let object = review["request"]["object"].as_object_mut().unwrap();
        object.remove("apiVersion");
        object.remove("kind");
        let body = serde_json::to_vec(&review).unwrap();

        let outcome = AdmissionHandler::default().handle(&body);
        assert_eq!(outcome.decision, Decision::Invalid);

        let response = outcome.review.response.unwrap();
        assert_eq!(response.uid, "untyped");
        assert!(response.result.message.contains("not an apps/v1 Deployment"));
    }

    #[test]
    fn test_envelope_shape_error_echoes_uid() {
        let outcome = AdmissionHandler::default().handle(br#"{"request":{"uid":"abc-123"}}"#);
        assert_eq!(outcome.status, StatusCode::BAD_REQUEST);
        assert_eq!(outcome.decision, Decision::Invalid);
        assert_eq!(outcome.uid(), "abc-123");

        let mut review = DeploymentReviewBuilder::default().uid("no-kind").build_review();
        review["request"].as_object_mut().unwrap().remove("kind");
        let body = serde_json::to_vec(&review).unwrap();

        let outcome = AdmissionHandler::default().handle(&body);
        assert_eq!(outcome.decision, Decision::Invalid);
        assert_eq!(outcome.uid(), "no-kind");
    }

    #[test]
    fn test_response_envelope_shape() {
        let body = DeploymentReviewBuilder::default()
            .uid("shape")
            .replicas(3)
            .build_body();

        let outcome = AdmissionHandler::default().handle(&body);
        let json: serde_json::Value = serde_json::from_slice(&outcome.body().unwrap()).unwrap();

        assert_eq!(json["apiVersion"], "admission.k8s.io/v1");
        assert_eq!(json["kind"], "AdmissionReview");
        assert_eq!(json["response"]["uid"], "shape");
        assert_eq!(json["response"]["allowed"], false);
        assert_eq!(json["response"]["status"]["reason"], "TooManyReplicas");
        assert!(
            json["response"]["status"]["message"]
                .as_str()
                .unwrap()
                .contains("you provided 3")
        );
    }
}
