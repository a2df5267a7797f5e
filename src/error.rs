//! Error types for muting.
//!
//! Every variant maps to the startup or serving phase it came from, so the
//! binary can report a single diagnostic line naming what failed.

use std::time::Duration;
use thiserror::Error;

/// Error type for muting operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid configuration or unreadable rule file
    #[error("Configuration error: {0}")]
    Config(String),

    /// Key generation, certificate signing or PEM encoding failed
    #[error("Crypto failure: {0}")]
    Crypto(String),

    /// The cluster rejected the webhook configuration lookup or write
    #[error("Registration failure: unable to {action} webhook configuration {name}: {source}")]
    Registration {
        action: &'static str,
        name: String,
        #[source]
        source: kube::Error,
    },

    /// The listener could not bind or the TLS credential was unusable
    #[error("Server start failure: {0}")]
    ServerStart(String),

    /// The listener stopped without being asked to
    #[error("Listener failure: {0}")]
    Listener(String),

    /// Rules could not be read; the affected value passes through unmutated
    #[error("Transform degraded: {0}")]
    TransformDegraded(String),

    /// In-flight requests did not finish within the drain bound
    #[error("Shutdown timed out after {0:?} waiting for in-flight requests")]
    ShutdownTimeout(Duration),

    /// Kubernetes client construction error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
}

impl Error {
    /// Short label of the phase that produced this error
    pub fn phase(&self) -> &'static str {
        match self {
            Error::Config(_) => "config",
            Error::Crypto(_) => "crypto",
            Error::Registration { .. } => "registration",
            Error::ServerStart(_) => "server-start",
            Error::Listener(_) => "serve",
            Error::TransformDegraded(_) => "transform",
            Error::ShutdownTimeout(_) => "shutdown",
            Error::Kube(_) => "cluster",
        }
    }

    /// Whether this error must terminate the process
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Error::TransformDegraded(_))
    }

    /// Check if this error indicates a not-found condition
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Kube(e) | Error::Registration { source: e, .. } => is_not_found(e),
            _ => false,
        }
    }
}

/// Check whether a Kubernetes API error is a 404
pub fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(e) if e.code == 404)
}

/// Result type alias for muting operations
pub type Result<T> = std::result::Result<T, Error>;
