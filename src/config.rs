//! Command line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::error::{Error, Result};
use crate::pki::IdentityProfile;
use crate::registrar::CallbackEndpoint;
use crate::webhooks::TransformFailurePolicy;

/// Default listen address
pub const DEFAULT_BIND: &str = "0.0.0.0:8443";
/// Default drain bound in seconds
pub const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 30;

/// Mutating admission webhook that rewrites Ingress host suffixes
#[derive(Clone, Debug, Parser)]
#[command(name = "muting", version, about)]
pub struct Config {
    /// Address the HTTPS listener binds
    #[arg(short, long, env = "MUTING_BIND", default_value = DEFAULT_BIND)]
    pub bind: SocketAddr,

    /// Transform rules file, read once at startup
    #[arg(short, long, env = "MUTING_CONFIG", default_value = "transform.yaml")]
    pub config: PathBuf,

    /// Read rules from this ConfigMap in --namespace on every request instead of --config
    #[arg(long, env = "MUTING_RULES_CONFIGMAP")]
    pub rules_configmap: Option<String>,

    /// Name of the MutatingWebhookConfiguration
    #[arg(short = 'r', long, env = "MUTING_NAME", default_value = "muting")]
    pub name: String,

    /// Namespace of the webhook Service
    #[arg(short, long, env = "MUTING_NAMESPACE", default_value = "default")]
    pub namespace: String,

    /// Name of the webhook Service
    #[arg(short, long, env = "MUTING_SERVICE", default_value = "muting")]
    pub service: String,

    /// Register a URL callback to this host instead of the in-cluster Service
    #[arg(long, env = "MUTING_HOST")]
    pub host: Option<String>,

    /// Handling of Ingress requests when the rules cannot be read
    #[arg(long, env = "MUTING_ON_TRANSFORM_ERROR", value_enum, default_value_t = TransformFailurePolicy::Passthrough)]
    pub on_transform_error: TransformFailurePolicy,

    /// Seconds to wait for in-flight requests on shutdown
    #[arg(long, env = "MUTING_DRAIN_TIMEOUT_SECS", default_value_t = DEFAULT_DRAIN_TIMEOUT_SECS)]
    pub drain_timeout_secs: u64,

    /// Debug logging
    #[arg(long, env = "MUTING_DEBUG")]
    pub debug: bool,
}

/// Where transform rules come from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RuleLocation {
    File(PathBuf),
    ConfigMap { namespace: String, name: String },
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        for (flag, value) in [
            ("name", &self.name),
            ("namespace", &self.namespace),
            ("service", &self.service),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("--{} must not be empty", flag)));
            }
        }
        if self
            .rules_configmap
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            return Err(Error::Config(
                "--rules-configmap must not be empty".to_string(),
            ));
        }
        if self.host.as_deref().is_some_and(|host| host.trim().is_empty()) {
            return Err(Error::Config("--host must not be empty".to_string()));
        }
        Ok(())
    }

    /// Names the leaf certificate must cover
    pub fn identity_profile(&self) -> Result<IdentityProfile> {
        match &self.host {
            Some(host) => IdentityProfile::for_host(host),
            None => IdentityProfile::for_service(&self.service, &self.namespace),
        }
    }

    pub fn rule_location(&self) -> RuleLocation {
        match &self.rules_configmap {
            Some(name) => RuleLocation::ConfigMap {
                namespace: self.namespace.clone(),
                name: name.clone(),
            },
            None => RuleLocation::File(self.config.clone()),
        }
    }

    /// Callback the API server is pointed at
    pub fn endpoint(&self) -> CallbackEndpoint {
        match &self.host {
            Some(host) => CallbackEndpoint::url(host, Some(self.bind.port())),
            None => CallbackEndpoint::service(&self.service, &self.namespace),
        }
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }

    /// Default tracing filter directives
    pub fn log_directives(&self) -> &'static [&'static str] {
        if self.debug {
            &["muting=debug", "kube=info"]
        } else {
            &["muting=info", "kube=info"]
        }
    }
}
