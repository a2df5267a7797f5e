//! Ingress host mutation policy.
//!
//! The decoded object is projected into [`AdmittedObject`] before any policy
//! runs. Only Ingress objects are ever mutated; every other kind is admitted
//! unchanged. The policy never denies a request.

use json_patch::jsonptr::PointerBuf;
use json_patch::{Patch, PatchOperation, ReplaceOperation};
use k8s_openapi::api::networking::v1::Ingress;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse};
use serde_json::Value;
use tracing::{error, warn};

use crate::transform::{TransformRule, apply};

/// API group of the mutated kind
pub const TARGET_GROUP: &str = "networking.k8s.io";
/// API version of the mutated kind
pub const TARGET_VERSION: &str = "v1";
/// Mutated kind
pub const TARGET_KIND: &str = "Ingress";

/// Object carried by an admission request
#[derive(Clone, Debug)]
pub enum AdmittedObject {
    Ingress(Box<Ingress>),
    /// Any other kind, or an Ingress request without a decodable object
    Other { kind: String },
}

impl AdmittedObject {
    /// Project the request's object into a supported variant
    pub fn from_request(request: &AdmissionRequest<DynamicObject>) -> Self {
        let gvk = &request.kind;
        let is_target = gvk.group == TARGET_GROUP
            && gvk.version == TARGET_VERSION
            && gvk.kind == TARGET_KIND;
        if !is_target {
            return AdmittedObject::Other {
                kind: gvk.kind.clone(),
            };
        }

        match &request.object {
            Some(object) => match object.clone().try_parse::<Ingress>() {
                Ok(ingress) => AdmittedObject::Ingress(Box::new(ingress)),
                Err(e) => {
                    warn!(uid = %request.uid, error = %e, "Unable to decode Ingress, admitting unchanged");
                    AdmittedObject::Other {
                        kind: gvk.kind.clone(),
                    }
                }
            },
            None => AdmittedObject::Other {
                kind: gvk.kind.clone(),
            },
        }
    }

    pub fn kind(&self) -> &str {
        match self {
            AdmittedObject::Ingress(_) => TARGET_KIND,
            AdmittedObject::Other { kind } => kind,
        }
    }
}

/// One rewritten `spec.rules[index].host`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostRewrite {
    pub index: usize,
    pub from: String,
    pub to: String,
}

impl HostRewrite {
    fn operation(&self) -> PatchOperation {
        let index = self.index.to_string();
        PatchOperation::Replace(ReplaceOperation {
            path: PointerBuf::from_tokens(["spec", "rules", index.as_str(), "host"]),
            value: Value::String(self.to.clone()),
        })
    }
}

/// Hosts of `ingress` that the rules change
pub fn plan_rewrites(ingress: &Ingress, rules: &[TransformRule]) -> Vec<HostRewrite> {
    let Some(ingress_rules) = ingress.spec.as_ref().and_then(|s| s.rules.as_ref()) else {
        return Vec::new();
    };

    ingress_rules
        .iter()
        .enumerate()
        .filter_map(|(index, rule)| {
            let host = rule.host.as_deref()?;
            let rewritten = apply(rules, host);
            (rewritten != host).then(|| HostRewrite {
                index,
                from: host.to_string(),
                to: rewritten,
            })
        })
        .collect()
}

/// JSON patch replacing each rewritten host and nothing else
pub fn to_patch(rewrites: &[HostRewrite]) -> Patch {
    Patch(rewrites.iter().map(HostRewrite::operation).collect())
}

/// Admission decision for one request
#[derive(Debug)]
pub struct Decision {
    pub kind: String,
    pub rewrites: Vec<HostRewrite>,
    pub response: AdmissionResponse,
}

impl Decision {
    pub fn is_mutated(&self) -> bool {
        !self.rewrites.is_empty()
    }
}

/// Decide the response for `object` under `rules`. Always allows.
pub fn review(
    request: &AdmissionRequest<DynamicObject>,
    object: &AdmittedObject,
    rules: &[TransformRule],
) -> Decision {
    let accept = AdmissionResponse::from(request);
    let rewrites = match object {
        AdmittedObject::Ingress(ingress) => plan_rewrites(ingress, rules),
        AdmittedObject::Other { .. } => Vec::new(),
    };

    if rewrites.is_empty() {
        return Decision {
            kind: object.kind().to_string(),
            rewrites,
            response: accept,
        };
    }

    match accept.clone().with_patch(to_patch(&rewrites)) {
        Ok(response) => Decision {
            kind: object.kind().to_string(),
            rewrites,
            response,
        },
        Err(e) => {
            error!(uid = %request.uid, error = %e, "Unable to serialize patch, admitting unchanged");
            Decision {
                kind: object.kind().to_string(),
                rewrites: Vec::new(),
                response: accept,
            }
        }
    }
}
