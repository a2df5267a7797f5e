//! muting library crate
//!
//! A mutating admission webhook that rewrites the host suffix of Ingress
//! rules. On startup it issues its own CA and serving certificate, registers
//! a MutatingWebhookConfiguration trusting that CA, and serves AdmissionReview
//! callbacks over TLS until shut down.

pub mod app;
pub mod config;
pub mod error;
pub mod health;
pub mod pki;
pub mod registrar;
pub mod transform;
pub mod webhooks;

pub use config::Config;
pub use error::{Error, Result};
pub use health::HealthState;
pub use transform::{TransformRule, apply};
