//! Mutating admission webhook.
//!
//! The server terminates TLS with the self-issued leaf certificate and routes:
//! - `/mutate` - AdmissionReview v1 callback for Ingress objects
//! - `/status`, `/readyz`, `/metrics` - probes and metrics (see [`crate::health`])

pub mod lifecycle;
pub mod mutation;
mod server;

/// Admission callback path
pub const MUTATE_PATH: &str = "/mutate";

pub use lifecycle::{
    ServerEvent, ServerPhase, ServerStateMachine, ServerStatus, TransitionResult,
};
pub use mutation::{AdmittedObject, Decision, HostRewrite, review};
pub use server::{
    AdmissionOutcome, AdmissionServer, TransformFailurePolicy, WebhookState, admit,
    create_webhook_router, tls_config,
};

// Re-export kube-rs admission types for contract testing
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
