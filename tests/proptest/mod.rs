// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Property-based tests for muting.
//!
//! Uses proptest to generate random inputs and verify invariants.

use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionReview};
use proptest::prelude::*;
use serde_json::json;

use muting::transform::{TransformRule, apply};
use muting::webhooks::{AdmittedObject, ServerEvent, ServerPhase, ServerStateMachine, review};

/// Strategy for a single DNS label drawn from the first half of the alphabet.
fn low_label() -> impl Strategy<Value = String> + Clone {
    "[a-m][a-m0-9]{0,7}"
}

/// Strategy for a single DNS label drawn from the second half of the alphabet.
fn high_label() -> impl Strategy<Value = String> + Clone {
    "[n-z][n-z0-9]{0,7}"
}

fn domain(label: impl Strategy<Value = String>) -> impl Strategy<Value = String> {
    prop::collection::vec(label, 1..4).prop_map(|labels| labels.join("."))
}

fn rule(label: impl Strategy<Value = String> + Clone) -> impl Strategy<Value = TransformRule> {
    (prop::collection::vec(domain(label.clone()), 1..3), domain(label))
        .prop_map(|(from, to)| TransformRule::new(from, to))
}

fn any_event() -> impl Strategy<Value = ServerEvent> {
    prop_oneof![
        Just(ServerEvent::Bound),
        Just(ServerEvent::BindFailed),
        Just(ServerEvent::ShutdownRequested),
        Just(ServerEvent::ListenerFailed),
        Just(ServerEvent::Drained),
    ]
}

fn request(kind: &str, object: serde_json::Value) -> AdmissionRequest<DynamicObject> {
    let review: AdmissionReview<DynamicObject> = serde_json::from_value(json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": "uid",
            "kind": {"group": "example.io", "version": "v1", "kind": kind},
            "resource": {"group": "example.io", "version": "v1", "resource": "things"},
            "operation": "CREATE",
            "userInfo": {},
            "object": object
        }
    }))
    .unwrap();
    review.try_into().unwrap()
}

proptest! {
    #[test]
    fn apply_is_deterministic(
        rules in prop::collection::vec(rule(low_label()), 0..4),
        input in domain(low_label()),
    ) {
        prop_assert_eq!(apply(&rules, &input), apply(&rules, &input));
    }

    #[test]
    fn apply_without_match_is_identity(
        rules in prop::collection::vec(rule(high_label()), 0..4),
        input in domain(low_label()),
    ) {
        prop_assert_eq!(apply(&rules, &input), input);
    }

    #[test]
    fn apply_rewrites_anchored_suffix(
        prefix in domain(low_label()),
        suffix in domain(high_label()),
        to in domain(low_label()),
    ) {
        let rules = vec![TransformRule::new([suffix.clone()], to.clone())];
        prop_assert_eq!(
            apply(&rules, &format!("{}.{}", prefix, suffix)),
            format!("{}.{}", prefix, to)
        );
        prop_assert_eq!(apply(&rules, &suffix), suffix.clone());
    }

    #[test]
    fn first_matching_rule_wins(
        prefix in domain(low_label()),
        suffix in domain(high_label()),
        first in domain(low_label()),
        second in domain(low_label()),
    ) {
        let rules = vec![
            TransformRule::new([suffix.clone()], first.clone()),
            TransformRule::new([suffix.clone()], second),
        ];
        prop_assert_eq!(
            apply(&rules, &format!("{}.{}", prefix, suffix)),
            format!("{}.{}", prefix, first)
        );
    }

    #[test]
    fn other_kinds_are_accepted_unchanged(
        kind in "[A-HJ-Z][a-z]{2,12}",
        host in domain(low_label()),
        replicas in 0..10i64,
    ) {
        let object = json!({
            "apiVersion": "example.io/v1",
            "kind": kind,
            "metadata": {"name": "thing"},
            "spec": {"replicas": replicas, "rules": [{"host": format!("{}.example.com", host)}]}
        });
        let req = request(&kind, object);
        let rules = vec![TransformRule::new(["example.com"], "internal.example.com")];
        let decision = review(&req, &AdmittedObject::from_request(&req), &rules);
        prop_assert!(decision.response.allowed);
        prop_assert!(decision.response.patch.is_none());
    }

    #[test]
    fn stopped_is_absorbing(events in prop::collection::vec(any_event(), 0..20)) {
        let sm = ServerStateMachine::new();
        let mut phase = ServerPhase::Idle;
        let mut stopped = false;
        for event in events {
            phase = sm.transition(phase, event).phase();
            if stopped {
                prop_assert_eq!(phase, ServerPhase::Stopped);
            }
            stopped = phase == ServerPhase::Stopped;
        }
    }

    #[test]
    fn draining_never_returns_to_listening(events in prop::collection::vec(any_event(), 0..20)) {
        let sm = ServerStateMachine::new();
        let mut phase = ServerPhase::Idle;
        let mut drained = false;
        for event in events {
            phase = sm.transition(phase, event).phase();
            if drained {
                prop_assert_ne!(phase, ServerPhase::Listening);
            }
            drained |= phase == ServerPhase::Draining;
        }
    }
}
