// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Unit tests for muting.
//!
//! These tests run without a Kubernetes cluster and test individual
//! components in isolation through the public API.

mod transform_tests {
    use muting::transform::{TransformRule, Transforms, apply};

    #[test]
    fn test_rule_display() {
        let rule = TransformRule::new(["example.com", "example.org"], "internal.example.com");
        assert_eq!(rule.to_string(), "example.com, example.org => internal.example.com");
    }

    #[test]
    fn test_document_order_is_kept() {
        let document = r#"
transforms:
  - from: ["corp.example.com"]
    to: "corp.internal"
  - from: ["example.com"]
    to: "internal.example.com"
"#;
        let rules = Transforms::from_yaml(document).unwrap().into_rules();
        assert_eq!(rules.len(), 2);
        assert_eq!(apply(&rules, "app.corp.example.com"), "app.corp.internal");
        assert_eq!(apply(&rules, "app.example.com"), "app.internal.example.com");
    }

    #[test]
    fn test_empty_document_has_no_rules() {
        let rules = Transforms::from_yaml("{}").unwrap().into_rules();
        assert!(rules.is_empty());
        assert_eq!(apply(&rules, "app.example.com"), "app.example.com");
    }

    #[test]
    fn test_invalid_rule_rejected() {
        let err = Transforms::from_yaml("transforms:\n  - from: []\n    to: x\n").unwrap_err();
        assert_eq!(err.phase(), "config");
    }

    #[test]
    fn test_suffix_alone_does_not_match() {
        let rules = vec![TransformRule::new(["example.com"], "internal.example.com")];
        assert_eq!(apply(&rules, "example.com"), "example.com");
        assert_eq!(apply(&rules, "badexample.com"), "badexample.com");
    }
}

mod error_tests {
    use std::time::Duration;

    use muting::Error;

    #[test]
    fn test_phase_labels() {
        assert_eq!(Error::Config("x".into()).phase(), "config");
        assert_eq!(Error::Crypto("x".into()).phase(), "crypto");
        assert_eq!(Error::ServerStart("x".into()).phase(), "server-start");
        assert_eq!(Error::Listener("x".into()).phase(), "serve");
        assert_eq!(Error::TransformDegraded("x".into()).phase(), "transform");
        assert_eq!(
            Error::ShutdownTimeout(Duration::from_secs(1)).phase(),
            "shutdown"
        );
    }

    #[test]
    fn test_only_degraded_transform_is_recoverable() {
        assert!(!Error::TransformDegraded("x".into()).is_fatal());
        assert!(Error::Config("x".into()).is_fatal());
        assert!(Error::ShutdownTimeout(Duration::from_secs(1)).is_fatal());
    }
}

mod pki_tests {
    use muting::pki::{IdentityProfile, PemRole, issue_leaf, issue_root};

    #[test]
    fn test_profile_display() {
        let profile = IdentityProfile::for_service("muting", "default").unwrap();
        assert_eq!(
            profile.to_string(),
            "Common Name: muting.default.svc\n\
             DNS Name: muting\n\
             DNS Name: muting.default\n\
             DNS Name: muting.default.svc"
        );
    }

    #[test]
    fn test_profile_requires_alt_names() {
        assert!(IdentityProfile::new("muting", vec![]).is_err());
        assert!(IdentityProfile::new("muting", vec!["bad name".to_string()]).is_err());
    }

    #[test]
    fn test_issued_pem_roles() {
        let root = issue_root().unwrap();
        let leaf = issue_leaf(
            &root,
            &IdentityProfile::for_host("webhook.example.com").unwrap(),
        )
        .unwrap();

        for material in [&root, &leaf] {
            let key = String::from_utf8(material.pem(PemRole::Key).to_vec()).unwrap();
            let cert = String::from_utf8(material.pem(PemRole::Certificate).to_vec()).unwrap();
            assert!(key.contains("PRIVATE KEY"));
            assert!(cert.starts_with("-----BEGIN CERTIFICATE-----"));
        }
        assert_ne!(root.certificate_pem(), leaf.certificate_pem());
    }

    #[test]
    fn test_debug_redacts_key() {
        let root = issue_root().unwrap();
        let debug = format!("{:?}", root);
        assert!(!debug.contains("PRIVATE KEY"));
    }
}

mod registrar_tests {
    use muting::registrar::{CallbackEndpoint, WebhookDeclaration};

    #[test]
    fn test_webhook_name_derivation() {
        let declaration = WebhookDeclaration::new(
            "muting",
            "hooks",
            "infra",
            CallbackEndpoint::service("hooks", "infra"),
            b"CA",
        );
        assert_eq!(declaration.webhook_name, "hooks.infra.svc.cluster.local");
        assert_eq!(declaration.selector_label, "hooks");
    }

    #[test]
    fn test_url_without_port() {
        assert_eq!(
            CallbackEndpoint::url("webhook.example.com", None),
            CallbackEndpoint::Url("https://webhook.example.com/mutate".to_string())
        );
    }
}

mod lifecycle_tests {
    use muting::webhooks::{ServerEvent, ServerPhase, ServerStateMachine};

    #[test]
    fn test_phase_display() {
        assert_eq!(ServerPhase::Idle.to_string(), "Idle");
        assert_eq!(ServerPhase::Listening.to_string(), "Listening");
        assert_eq!(ServerPhase::Draining.to_string(), "Draining");
        assert_eq!(ServerPhase::Stopped.to_string(), "Stopped");
    }

    #[test]
    fn test_phase_default() {
        assert_eq!(ServerPhase::default(), ServerPhase::Idle);
    }

    #[test]
    fn test_listening_events() {
        let sm = ServerStateMachine::new();
        let events = sm.valid_events(ServerPhase::Listening);
        assert!(events.contains(&ServerEvent::ShutdownRequested));
        assert!(events.contains(&ServerEvent::ListenerFailed));
        assert!(!events.contains(&ServerEvent::Bound));
    }
}
