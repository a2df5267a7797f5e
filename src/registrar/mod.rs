//! Webhook registration.
//!
//! Applies the [`WebhookDeclaration`] to the cluster once at startup: create
//! the MutatingWebhookConfiguration when it does not exist, otherwise replace
//! it in place. Replacing carries over the cluster-assigned resource version;
//! without it the API server rejects the write as a conflict.

mod api;
mod declaration;

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::health::HealthState;

#[cfg(test)]
pub use api::MockWebhookConfigApi;
pub use api::{KubeWebhookConfigApi, WebhookConfigApi};
pub use declaration::{
    ADMISSION_REVIEW_VERSION, CallbackEndpoint, FAILURE_POLICY, InterceptRule,
    NAMESPACE_SELECTOR_VALUE, WebhookDeclaration,
};

/// What reconciliation did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The configuration did not exist and was created
    Created { resource_version: Option<String> },
    /// The configuration existed and was replaced
    Updated { resource_version: Option<String> },
}

impl ReconcileOutcome {
    /// Metric label for this outcome
    pub fn action(&self) -> &'static str {
        match self {
            ReconcileOutcome::Created { .. } => "created",
            ReconcileOutcome::Updated { .. } => "updated",
        }
    }

    /// Resource version the cluster returned for the write
    pub fn resource_version(&self) -> Option<&str> {
        match self {
            ReconcileOutcome::Created { resource_version }
            | ReconcileOutcome::Updated { resource_version } => resource_version.as_deref(),
        }
    }
}

/// Registers the webhook with the cluster
pub struct WebhookRegistrar<A> {
    api: A,
    health_state: Option<Arc<HealthState>>,
}

impl<A: WebhookConfigApi> WebhookRegistrar<A> {
    pub fn new(api: A, health_state: Option<Arc<HealthState>>) -> Self {
        Self { api, health_state }
    }

    /// Create or update the configuration described by `declaration`
    pub async fn reconcile(&self, declaration: &WebhookDeclaration) -> Result<ReconcileOutcome> {
        let name = declaration.name.as_str();
        let mut desired = declaration.to_configuration();

        let existing = self
            .api
            .get(name)
            .await
            .map_err(|source| Error::Registration {
                action: "get",
                name: name.to_string(),
                source,
            })?;

        let outcome = match existing {
            None => {
                debug!(name = %name, "Webhook configuration not found, creating");
                let created =
                    self.api
                        .create(&desired)
                        .await
                        .map_err(|source| Error::Registration {
                            action: "create",
                            name: name.to_string(),
                            source,
                        })?;
                ReconcileOutcome::Created {
                    resource_version: created.metadata.resource_version,
                }
            }
            Some(current) => {
                debug!(
                    name = %name,
                    resource_version = ?current.metadata.resource_version,
                    "Webhook configuration exists, updating"
                );
                desired.metadata.resource_version = current.metadata.resource_version;
                let updated = self.api.replace(name, &desired).await.map_err(|source| {
                    Error::Registration {
                        action: "update",
                        name: name.to_string(),
                        source,
                    }
                })?;
                ReconcileOutcome::Updated {
                    resource_version: updated.metadata.resource_version,
                }
            }
        };

        if let Some(ref state) = self.health_state {
            state.metrics.record_registration(outcome.action());
        }
        info!(
            name = %name,
            webhook = %declaration.webhook_name,
            action = outcome.action(),
            "Applied admission config"
        );

        Ok(outcome)
    }
}
