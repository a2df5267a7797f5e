//! In-memory stand-in for the MutatingWebhookConfiguration API.
//!
//! Assigns resource versions like the API server does and rejects a replace
//! whose resource version does not match the stored object.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use k8s_openapi::api::admissionregistration::v1::MutatingWebhookConfiguration;
use kube::core::ErrorResponse;

use muting::registrar::WebhookConfigApi;

#[derive(Default)]
struct FakeState {
    objects: BTreeMap<String, MutatingWebhookConfiguration>,
    last_version: u64,
    creates: usize,
    replaced_versions: Vec<Option<String>>,
}

/// Shared handle to the fake cluster; clones see the same objects.
#[derive(Clone, Default)]
pub struct FakeCluster {
    state: Arc<Mutex<FakeState>>,
}

fn api_error(code: u16, reason: &str, message: String) -> kube::Error {
    kube::Error::Api(ErrorResponse {
        status: "Failure".to_string(),
        message,
        reason: reason.to_string(),
        code,
    })
}

fn object_name(config: &MutatingWebhookConfiguration) -> String {
    config.metadata.name.clone().unwrap_or_default()
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stored(&self, name: &str) -> Option<MutatingWebhookConfiguration> {
        self.state.lock().unwrap().objects.get(name).cloned()
    }

    pub fn creates(&self) -> usize {
        self.state.lock().unwrap().creates
    }

    /// Resource versions carried by each replace call, in order
    pub fn replaced_versions(&self) -> Vec<Option<String>> {
        self.state.lock().unwrap().replaced_versions.clone()
    }
}

#[async_trait]
impl WebhookConfigApi for FakeCluster {
    async fn get(&self, name: &str) -> Result<Option<MutatingWebhookConfiguration>, kube::Error> {
        Ok(self.stored(name))
    }

    async fn create(
        &self,
        config: &MutatingWebhookConfiguration,
    ) -> Result<MutatingWebhookConfiguration, kube::Error> {
        let mut state = self.state.lock().unwrap();
        let name = object_name(config);
        if state.objects.contains_key(&name) {
            return Err(api_error(409, "AlreadyExists", format!("{} already exists", name)));
        }
        state.last_version += 1;
        state.creates += 1;

        let mut stored = config.clone();
        stored.metadata.resource_version = Some(state.last_version.to_string());
        state.objects.insert(name, stored.clone());
        Ok(stored)
    }

    async fn replace(
        &self,
        name: &str,
        config: &MutatingWebhookConfiguration,
    ) -> Result<MutatingWebhookConfiguration, kube::Error> {
        let mut state = self.state.lock().unwrap();
        state
            .replaced_versions
            .push(config.metadata.resource_version.clone());

        let current_version = match state.objects.get(name) {
            Some(current) => current.metadata.resource_version.clone(),
            None => return Err(api_error(404, "NotFound", format!("{} not found", name))),
        };
        if config.metadata.resource_version != current_version {
            return Err(api_error(
                409,
                "Conflict",
                format!("{} has been modified", name),
            ));
        }
        state.last_version += 1;

        let mut stored = config.clone();
        stored.metadata.resource_version = Some(state.last_version.to_string());
        state.objects.insert(name.to_string(), stored.clone());
        Ok(stored)
    }
}
