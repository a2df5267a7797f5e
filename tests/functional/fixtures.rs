//! Shared request builders and rule sources.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use muting::transform::{RuleSource, StaticRules, TransformRule};
use muting::{Error, Result};

pub const UID: &str = "705ab4f5-6393-11e8-b7cc-42010a800002";

pub fn example_rules() -> Vec<TransformRule> {
    vec![TransformRule::new(["example.com"], "internal.example.com")]
}

pub fn static_rules() -> Arc<dyn RuleSource> {
    Arc::new(StaticRules::new("fixture", example_rules()))
}

/// AdmissionReview v1 for an Ingress with one rule per host
pub fn ingress_review(hosts: &[&str]) -> Value {
    let rules: Vec<Value> = hosts
        .iter()
        .map(|host| {
            json!({
                "host": host,
                "http": {"paths": [{
                    "path": "/",
                    "pathType": "Prefix",
                    "backend": {"service": {"name": "web", "port": {"number": 80}}}
                }]}
            })
        })
        .collect();

    json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": UID,
            "kind": {"group": "networking.k8s.io", "version": "v1", "kind": "Ingress"},
            "resource": {"group": "networking.k8s.io", "version": "v1", "resource": "ingresses"},
            "name": "web",
            "namespace": "default",
            "operation": "CREATE",
            "userInfo": {"username": "admin"},
            "object": {
                "apiVersion": "networking.k8s.io/v1",
                "kind": "Ingress",
                "metadata": {"name": "web", "namespace": "default"},
                "spec": {"rules": rules}
            },
            "dryRun": false
        }
    })
}

/// AdmissionReview v1 for a ConfigMap, which is never mutated
pub fn config_map_review() -> Value {
    json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": UID,
            "kind": {"group": "", "version": "v1", "kind": "ConfigMap"},
            "resource": {"group": "", "version": "v1", "resource": "configmaps"},
            "name": "settings",
            "namespace": "default",
            "operation": "UPDATE",
            "userInfo": {"username": "admin"},
            "object": {
                "apiVersion": "v1",
                "kind": "ConfigMap",
                "metadata": {"name": "settings", "namespace": "default"},
                "data": {"host": "app.example.com"}
            }
        }
    })
}

/// Decoded JSON patch of an AdmissionReview response, if any.
///
/// The patch travels as a JSON array of bytes.
pub fn response_patch(review: &Value) -> Option<Value> {
    let patch = review["response"].get("patch").filter(|p| !p.is_null())?;
    let bytes: Vec<u8> = serde_json::from_value(patch.clone()).unwrap();
    Some(serde_json::from_slice(&bytes).unwrap())
}

/// Rules that take `delay` to load and signal when loading starts
pub struct SlowRules {
    pub delay: Duration,
    pub started: Arc<Notify>,
}

#[async_trait]
impl RuleSource for SlowRules {
    async fn load(&self) -> Result<Vec<TransformRule>> {
        self.started.notify_one();
        tokio::time::sleep(self.delay).await;
        Ok(example_rules())
    }

    fn describe(&self) -> String {
        "slow fixture".to_string()
    }
}

/// Rules that can be swapped between loads, like an edited ConfigMap
pub struct LiveRules {
    rules: Mutex<Vec<TransformRule>>,
}

impl LiveRules {
    pub fn new(rules: Vec<TransformRule>) -> Self {
        Self {
            rules: Mutex::new(rules),
        }
    }

    pub fn replace(&self, rules: Vec<TransformRule>) {
        *self.rules.lock().unwrap() = rules;
    }
}

#[async_trait]
impl RuleSource for LiveRules {
    async fn load(&self) -> Result<Vec<TransformRule>> {
        Ok(self.rules.lock().unwrap().clone())
    }

    fn describe(&self) -> String {
        "live fixture".to_string()
    }
}

/// Rules that can never be read
pub struct MissingRules;

#[async_trait]
impl RuleSource for MissingRules {
    async fn load(&self) -> Result<Vec<TransformRule>> {
        Err(Error::TransformDegraded(
            "unable to read ConfigMap default/rules: not found".to_string(),
        ))
    }

    fn describe(&self) -> String {
        "configmap default/rules".to_string()
    }
}

/// Rules whose loader panics, standing in for a handler bug
pub struct PanickingRules;

#[async_trait]
impl RuleSource for PanickingRules {
    async fn load(&self) -> Result<Vec<TransformRule>> {
        panic!("rule loader exploded");
    }

    fn describe(&self) -> String {
        "panicking fixture".to_string()
    }
}
