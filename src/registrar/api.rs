//! Cluster API seam for MutatingWebhookConfiguration objects.

use async_trait::async_trait;
use k8s_openapi::api::admissionregistration::v1::MutatingWebhookConfiguration;
use kube::api::PostParams;
use kube::{Api, Client};
#[cfg(test)]
use mockall::automock;

use crate::error::is_not_found;

/// Get/create/replace of cluster-scoped webhook configurations
#[cfg_attr(test, automock)]
#[async_trait]
pub trait WebhookConfigApi: Send + Sync {
    /// Fetch by name; `Ok(None)` when the cluster answers 404
    async fn get(&self, name: &str) -> Result<Option<MutatingWebhookConfiguration>, kube::Error>;

    /// Create a new configuration
    async fn create(
        &self,
        config: &MutatingWebhookConfiguration,
    ) -> Result<MutatingWebhookConfiguration, kube::Error>;

    /// Replace an existing configuration; `config` must carry its resource version
    async fn replace(
        &self,
        name: &str,
        config: &MutatingWebhookConfiguration,
    ) -> Result<MutatingWebhookConfiguration, kube::Error>;
}

/// [`WebhookConfigApi`] backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeWebhookConfigApi {
    api: Api<MutatingWebhookConfiguration>,
}

impl KubeWebhookConfigApi {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl WebhookConfigApi for KubeWebhookConfigApi {
    async fn get(&self, name: &str) -> Result<Option<MutatingWebhookConfiguration>, kube::Error> {
        match self.api.get(name).await {
            Ok(config) => Ok(Some(config)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create(
        &self,
        config: &MutatingWebhookConfiguration,
    ) -> Result<MutatingWebhookConfiguration, kube::Error> {
        self.api.create(&PostParams::default(), config).await
    }

    async fn replace(
        &self,
        name: &str,
        config: &MutatingWebhookConfiguration,
    ) -> Result<MutatingWebhookConfiguration, kube::Error> {
        self.api.replace(name, &PostParams::default(), config).await
    }
}
