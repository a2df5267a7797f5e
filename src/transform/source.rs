//! Where transform rules come from.
//!
//! A static file is read once at startup. A ConfigMap is read again on every
//! admission request so edits to it take effect without a restart.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::{Api, Client};
use tracing::debug;

use super::{TransformRule, Transforms};
use crate::error::{Error, Result};

/// ConfigMap data key holding the rule document
pub const RULES_CONFIGMAP_KEY: &str = "transform.yaml";

/// Supplies the ordered rule list to the admission server
#[async_trait]
pub trait RuleSource: Send + Sync {
    /// Read the current rule list
    async fn load(&self) -> Result<Vec<TransformRule>>;

    /// Human-readable location, used in logs
    fn describe(&self) -> String;
}

/// Rules loaded once from a YAML file
#[derive(Clone, Debug)]
pub struct StaticRules {
    origin: String,
    rules: Arc<Vec<TransformRule>>,
}

impl StaticRules {
    pub fn new(origin: impl Into<String>, rules: Vec<TransformRule>) -> Self {
        Self {
            origin: origin.into(),
            rules: Arc::new(rules),
        }
    }

    /// Read and validate a rule file
    pub fn from_file(path: &Path) -> Result<Self> {
        let document = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "unable to read transform file {}: {}",
                path.display(),
                e
            ))
        })?;
        let transforms = Transforms::from_yaml(&document).map_err(|e| {
            Error::Config(format!(
                "unable to decode transform file {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Self::new(path.display().to_string(), transforms.into_rules()))
    }
}

#[async_trait]
impl RuleSource for StaticRules {
    async fn load(&self) -> Result<Vec<TransformRule>> {
        Ok(self.rules.as_ref().clone())
    }

    fn describe(&self) -> String {
        format!("file {}", self.origin)
    }
}

/// Rules read from a ConfigMap on every call
#[derive(Clone)]
pub struct ConfigMapRuleSource {
    api: Api<ConfigMap>,
    namespace: String,
    name: String,
}

impl ConfigMapRuleSource {
    pub fn new(client: Client, namespace: &str, name: &str) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl RuleSource for ConfigMapRuleSource {
    async fn load(&self) -> Result<Vec<TransformRule>> {
        let config_map = self.api.get(&self.name).await.map_err(|e| {
            Error::TransformDegraded(format!(
                "unable to read ConfigMap {}/{}: {}",
                self.namespace, self.name, e
            ))
        })?;
        let rules = rules_from_config_map(&config_map)?;
        debug!(
            configmap = %self.name,
            namespace = %self.namespace,
            rules = rules.len(),
            "Loaded transform rules"
        );
        Ok(rules)
    }

    fn describe(&self) -> String {
        format!("configmap {}/{}", self.namespace, self.name)
    }
}

/// Extract and parse the rule document stored in a ConfigMap
pub fn rules_from_config_map(config_map: &ConfigMap) -> Result<Vec<TransformRule>> {
    let name = config_map.metadata.name.as_deref().unwrap_or_default();
    let document = config_map
        .data
        .as_ref()
        .and_then(|data| data.get(RULES_CONFIGMAP_KEY))
        .ok_or_else(|| {
            Error::TransformDegraded(format!(
                "ConfigMap {} has no {} key",
                name, RULES_CONFIGMAP_KEY
            ))
        })?;
    Transforms::from_yaml(document)
        .map(Transforms::into_rules)
        .map_err(|e| Error::TransformDegraded(format!("ConfigMap {}: {}", name, e)))
}
