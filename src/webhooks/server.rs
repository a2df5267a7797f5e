//! Admission webhook server.
//!
//! Serves `/mutate` plus the probe routes over TLS using the leaf identity
//! issued at startup. The listener runs until the shutdown token is
//! cancelled, then drains in-flight requests with a bounded wait.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{Json, Router, extract::State, routing::post};
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use rustls::ServerConfig;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::health::{self, HealthState};
use crate::pki::{KeyMaterial, PemRole};
use crate::transform::RuleSource;
use crate::webhooks::MUTATE_PATH;
use crate::webhooks::lifecycle::{
    ServerEvent, ServerPhase, ServerStateMachine, ServerStatus, TransitionResult,
};
use crate::webhooks::mutation::{AdmittedObject, Decision, review};

/// What to do with an Ingress when the rules cannot be read
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum TransformFailurePolicy {
    /// Admit the object unchanged
    #[default]
    Passthrough,
    /// Deny the request with the read failure as the reason
    Reject,
}

impl fmt::Display for TransformFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformFailurePolicy::Passthrough => write!(f, "passthrough"),
            TransformFailurePolicy::Reject => write!(f, "reject"),
        }
    }
}

/// How an admission request was answered
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdmissionOutcome {
    /// Not an Ingress
    Skipped,
    /// Ingress with no host matching a rule
    Unchanged,
    /// Ingress patched
    Mutated,
    /// Rules unavailable, admitted unchanged
    Degraded,
    /// Rules unavailable, denied
    Rejected,
}

impl AdmissionOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdmissionOutcome::Skipped => "skipped",
            AdmissionOutcome::Unchanged => "unchanged",
            AdmissionOutcome::Mutated => "mutated",
            AdmissionOutcome::Degraded => "degraded",
            AdmissionOutcome::Rejected => "rejected",
        }
    }
}

/// Shared state for webhook handlers
pub struct WebhookState {
    pub rules: Arc<dyn RuleSource>,
    pub on_transform_error: TransformFailurePolicy,
    pub health: Arc<HealthState>,
}

impl WebhookState {
    pub fn new(
        rules: Arc<dyn RuleSource>,
        on_transform_error: TransformFailurePolicy,
        health: Arc<HealthState>,
    ) -> Self {
        Self {
            rules,
            on_transform_error,
            health,
        }
    }
}

fn operation_label(operation: &Operation) -> &'static str {
    match operation {
        Operation::Create => "CREATE",
        Operation::Update => "UPDATE",
        Operation::Delete => "DELETE",
        Operation::Connect => "CONNECT",
    }
}

/// Decide one admission request.
///
/// Rules are only read for Ingress objects, so other kinds are admitted
/// without touching the rule source.
pub async fn admit(
    state: &WebhookState,
    request: &AdmissionRequest<DynamicObject>,
) -> (AdmissionOutcome, Decision) {
    let object = AdmittedObject::from_request(request);
    if !matches!(object, AdmittedObject::Ingress(_)) {
        return (AdmissionOutcome::Skipped, review(request, &object, &[]));
    }

    let rules = match state.rules.load().await {
        Ok(rules) => {
            state.health.metrics.set_transform_rules(rules.len());
            rules
        }
        Err(e) => {
            state.health.metrics.record_transform_degraded();
            let decision = review(request, &object, &[]);
            return match state.on_transform_error {
                TransformFailurePolicy::Passthrough => {
                    warn!(uid = %request.uid, source = %state.rules.describe(), error = %e, "Transform rules unavailable, admitting unchanged");
                    (AdmissionOutcome::Degraded, decision)
                }
                TransformFailurePolicy::Reject => {
                    warn!(uid = %request.uid, source = %state.rules.describe(), error = %e, "Transform rules unavailable, denying");
                    let response = AdmissionResponse::from(request).deny(e.to_string());
                    (
                        AdmissionOutcome::Rejected,
                        Decision {
                            response,
                            ..decision
                        },
                    )
                }
            };
        }
    };

    let decision = review(request, &object, &rules);
    if decision.is_mutated() {
        state.health.metrics.record_host_rewrites(decision.rewrites.len());
        for rewrite in &decision.rewrites {
            info!(
                uid = %request.uid,
                namespace = ?request.namespace,
                name = ?request.name,
                index = rewrite.index,
                from = %rewrite.from,
                to = %rewrite.to,
                "Rewriting Ingress host"
            );
        }
        (AdmissionOutcome::Mutated, decision)
    } else {
        (AdmissionOutcome::Unchanged, decision)
    }
}

/// Create the webhook router, including the probe routes.
///
/// Every route gets a request trace span, and a panicking handler answers
/// 500 instead of dropping the connection.
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    let health_routes = health::create_router(state.health.clone());
    Router::new()
        .route(MUTATE_PATH, post(mutate))
        .with_state(state)
        .merge(health_routes)
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
}

async fn mutate(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> Json<AdmissionReview<DynamicObject>> {
    let started = Instant::now();
    let request: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to extract admission request");
            return Json(
                AdmissionResponse::invalid(format!("Invalid AdmissionReview: {}", e))
                    .into_review(),
            );
        }
    };

    debug!(
        uid = %request.uid,
        kind = %request.kind.kind,
        operation = ?request.operation,
        namespace = ?request.namespace,
        name = ?request.name,
        "Processing admission request"
    );

    let (outcome, decision) = admit(&state, &request).await;
    state.health.metrics.record_admission(
        &decision.kind,
        operation_label(&request.operation),
        outcome.as_str(),
        started.elapsed().as_secs_f64(),
    );
    debug!(uid = %request.uid, outcome = outcome.as_str(), "Admission request answered");

    Json(decision.response.into_review())
}

/// Build the TLS configuration from a leaf identity
pub fn tls_config(identity: &KeyMaterial) -> Result<RustlsConfig> {
    let mut reader = identity.pem(PemRole::Certificate);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::ServerStart(format!("invalid certificate PEM: {}", e)))?;
    if certs.is_empty() {
        return Err(Error::ServerStart("no certificate in identity".to_string()));
    }

    let mut reader = identity.pem(PemRole::Key);
    let key = rustls_pemfile::private_key(&mut reader)
        .map_err(|e| Error::ServerStart(format!("invalid key PEM: {}", e)))?
        .ok_or_else(|| Error::ServerStart("no private key in identity".to_string()))?;

    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::ServerStart(format!("TLS protocol setup failed: {}", e)))?
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| Error::ServerStart(format!("unusable certificate/key pair: {}", e)))?;
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(RustlsConfig::from_config(Arc::new(config)))
}

/// TLS admission server
pub struct AdmissionServer {
    bind: SocketAddr,
    identity: KeyMaterial,
    state: Arc<WebhookState>,
    drain_timeout: Duration,
    machine: ServerStateMachine,
    status: watch::Sender<ServerStatus>,
}

impl AdmissionServer {
    pub fn new(
        bind: SocketAddr,
        identity: KeyMaterial,
        state: Arc<WebhookState>,
        drain_timeout: Duration,
    ) -> Self {
        let (status, _) = watch::channel(ServerStatus::default());
        Self {
            bind,
            identity,
            state,
            drain_timeout,
            machine: ServerStateMachine::new(),
            status,
        }
    }

    /// Follow phase changes and the bound address
    pub fn subscribe(&self) -> watch::Receiver<ServerStatus> {
        self.status.subscribe()
    }

    pub fn phase(&self) -> ServerPhase {
        self.status.borrow().phase
    }

    fn advance(&self, event: ServerEvent) {
        let current = self.phase();
        match self.machine.transition(current, event) {
            TransitionResult::Success {
                from,
                to,
                description,
            } => {
                debug!(%from, %to, %event, description, "Server phase transition");
                self.status.send_modify(|s| s.phase = to);
            }
            TransitionResult::InvalidTransition { current, event } => {
                warn!(%current, %event, "Ignoring invalid server phase transition");
            }
        }
    }

    /// Serve until `shutdown` is cancelled, then drain.
    ///
    /// Returns `Ok(())` once every in-flight request has finished, or
    /// [`Error::ShutdownTimeout`] when the drain bound expires first.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let tls = match tls_config(&self.identity) {
            Ok(tls) => tls,
            Err(e) => {
                self.advance(ServerEvent::BindFailed);
                return Err(e);
            }
        };

        if shutdown.is_cancelled() {
            self.advance(ServerEvent::ShutdownRequested);
            return Ok(());
        }

        let app = create_webhook_router(self.state.clone());
        let handle = Handle::new();
        let server = axum_server::bind_rustls(self.bind, tls).handle(handle.clone());
        let mut serving = tokio::spawn(server.serve(app.into_make_service()));

        let Some(local_addr) = handle.listening().await else {
            let reason = match serving.await {
                Ok(Err(e)) => e.to_string(),
                Ok(Ok(())) => "listener exited before binding".to_string(),
                Err(e) => e.to_string(),
            };
            self.advance(ServerEvent::BindFailed);
            return Err(Error::ServerStart(format!(
                "unable to bind {}: {}",
                self.bind, reason
            )));
        };

        self.status.send_modify(|s| s.local_addr = Some(local_addr));
        self.advance(ServerEvent::Bound);
        self.state.health.set_ready(true).await;
        info!(addr = %local_addr, "Admission server listening with TLS");

        tokio::select! {
            _ = shutdown.cancelled() => {}
            result = &mut serving => {
                self.state.health.set_ready(false).await;
                self.advance(ServerEvent::ListenerFailed);
                let reason = match result {
                    Ok(Ok(())) => "listener exited unexpectedly".to_string(),
                    Ok(Err(e)) => e.to_string(),
                    Err(e) => e.to_string(),
                };
                return Err(Error::Listener(reason));
            }
        }

        self.advance(ServerEvent::ShutdownRequested);
        self.state.health.set_ready(false).await;
        info!(
            in_flight = handle.connection_count(),
            timeout = ?self.drain_timeout,
            "Draining admission server"
        );
        handle.graceful_shutdown(None);

        match tokio::time::timeout(self.drain_timeout, &mut serving).await {
            Ok(Ok(Ok(()))) => {
                self.advance(ServerEvent::Drained);
                info!("Admission server stopped");
                Ok(())
            }
            Ok(Ok(Err(e))) => {
                self.advance(ServerEvent::ListenerFailed);
                Err(Error::Listener(e.to_string()))
            }
            Ok(Err(e)) => {
                self.advance(ServerEvent::ListenerFailed);
                Err(Error::Listener(e.to_string()))
            }
            Err(_) => {
                warn!(
                    in_flight = handle.connection_count(),
                    "Drain timed out, closing remaining connections"
                );
                handle.shutdown();
                serving.abort();
                self.advance(ServerEvent::Drained);
                Err(Error::ShutdownTimeout(self.drain_timeout))
            }
        }
    }
}
