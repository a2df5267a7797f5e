//! MutatingWebhookConfiguration generation.

use std::collections::BTreeMap;

use k8s_openapi::ByteString;
use k8s_openapi::api::admissionregistration::v1::{
    MutatingWebhook, MutatingWebhookConfiguration, RuleWithOperations, ServiceReference,
    WebhookClientConfig,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

use crate::webhooks::MUTATE_PATH;

/// Only review version the server speaks
pub const ADMISSION_REVIEW_VERSION: &str = "v1";

/// Failure policy applied by the API server when the webhook is unreachable
pub const FAILURE_POLICY: &str = "Fail";

/// Value of the namespace label that opts a namespace in
pub const NAMESPACE_SELECTOR_VALUE: &str = "enabled";

/// Resource intercepted by the webhook
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InterceptRule {
    pub api_group: String,
    pub api_version: String,
    pub resource: String,
    pub operations: Vec<String>,
}

impl InterceptRule {
    /// networking.k8s.io/v1 ingresses on CREATE and UPDATE
    pub fn ingresses() -> Self {
        Self {
            api_group: "networking.k8s.io".to_string(),
            api_version: "v1".to_string(),
            resource: "ingresses".to_string(),
            operations: vec!["CREATE".to_string(), "UPDATE".to_string()],
        }
    }
}

/// Where the API server sends admission reviews
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallbackEndpoint {
    /// In-cluster Service
    Service {
        name: String,
        namespace: String,
        path: String,
    },
    /// Externally reachable URL
    Url(String),
}

impl CallbackEndpoint {
    pub fn service(name: &str, namespace: &str) -> Self {
        Self::Service {
            name: name.to_string(),
            namespace: namespace.to_string(),
            path: MUTATE_PATH.to_string(),
        }
    }

    /// `https://<host>[:<port>]/mutate`
    pub fn url(host: &str, port: Option<u16>) -> Self {
        let authority = match port {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };
        Self::Url(format!("https://{}{}", authority, MUTATE_PATH))
    }
}

/// Desired cluster-side webhook registration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookDeclaration {
    /// Name of the MutatingWebhookConfiguration object
    pub name: String,
    /// Name of the single webhook entry
    pub webhook_name: String,
    /// Namespace label key that must equal `enabled`
    pub selector_label: String,
    pub rule: InterceptRule,
    pub endpoint: CallbackEndpoint,
    /// PEM root certificate the API server trusts
    pub ca_bundle: Vec<u8>,
}

impl WebhookDeclaration {
    /// Declaration for the Ingress webhook served by `service` in `namespace`
    pub fn new(
        name: &str,
        service: &str,
        namespace: &str,
        endpoint: CallbackEndpoint,
        ca_bundle: &[u8],
    ) -> Self {
        Self {
            name: name.to_string(),
            webhook_name: format!("{}.{}.svc.cluster.local", service, namespace),
            selector_label: service.to_string(),
            rule: InterceptRule::ingresses(),
            endpoint,
            ca_bundle: ca_bundle.to_vec(),
        }
    }

    /// Render the Kubernetes object, without a resource version
    pub fn to_configuration(&self) -> MutatingWebhookConfiguration {
        let client_config = match &self.endpoint {
            CallbackEndpoint::Service {
                name,
                namespace,
                path,
            } => WebhookClientConfig {
                ca_bundle: Some(ByteString(self.ca_bundle.clone())),
                service: Some(ServiceReference {
                    name: name.clone(),
                    namespace: namespace.clone(),
                    path: Some(path.clone()),
                    port: None,
                }),
                url: None,
            },
            CallbackEndpoint::Url(url) => WebhookClientConfig {
                ca_bundle: Some(ByteString(self.ca_bundle.clone())),
                service: None,
                url: Some(url.clone()),
            },
        };

        let rule = RuleWithOperations {
            api_groups: Some(vec![self.rule.api_group.clone()]),
            api_versions: Some(vec![self.rule.api_version.clone()]),
            resources: Some(vec![self.rule.resource.clone()]),
            operations: Some(self.rule.operations.clone()),
            scope: None,
        };

        let namespace_selector = LabelSelector {
            match_labels: Some(BTreeMap::from([(
                self.selector_label.clone(),
                NAMESPACE_SELECTOR_VALUE.to_string(),
            )])),
            match_expressions: None,
        };

        MutatingWebhookConfiguration {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                ..Default::default()
            },
            webhooks: Some(vec![MutatingWebhook {
                name: self.webhook_name.clone(),
                admission_review_versions: vec![ADMISSION_REVIEW_VERSION.to_string()],
                side_effects: "None".to_string(),
                failure_policy: Some(FAILURE_POLICY.to_string()),
                client_config,
                rules: Some(vec![rule]),
                namespace_selector: Some(namespace_selector),
                ..Default::default()
            }]),
        }
    }
}
