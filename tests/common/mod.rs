//! Shared helpers for integration test targets.
