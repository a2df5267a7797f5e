//! Startup sequence.
//!
//! Strictly sequential: issue the root, issue the leaf, read the rules once,
//! register the webhook, then serve until shutdown. Any failure before serving
//! aborts startup with the phase that failed.

use std::sync::Arc;

use kube::Client;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::{Config, RuleLocation};
use crate::error::{Error, Result};
use crate::health::HealthState;
use crate::pki::{KeyMaterial, PemRole, install_crypto_provider, issue_leaf, issue_root};
use crate::registrar::{
    KubeWebhookConfigApi, ReconcileOutcome, WebhookConfigApi, WebhookDeclaration,
    WebhookRegistrar,
};
use crate::transform::{ConfigMapRuleSource, RuleSource, StaticRules};
use crate::webhooks::{AdmissionServer, WebhookState};

/// Everything startup produced, ready to serve
pub struct Bootstrap {
    /// Root certificate registered as the CA bundle
    pub root: KeyMaterial,
    pub registration: ReconcileOutcome,
    pub server: AdmissionServer,
}

/// Validate the configuration, then connect to the cluster.
///
/// Validation runs first so a bad flag is reported as a config failure even
/// where no cluster is reachable.
pub async fn connect(config: &Config) -> Result<Client> {
    config.validate()?;
    install_crypto_provider()?;
    Ok(Client::try_default().await?)
}

/// Rule source for the configured location
pub fn rule_source(config: &Config, client: &Client) -> Result<Arc<dyn RuleSource>> {
    Ok(match config.rule_location() {
        RuleLocation::File(path) => Arc::new(StaticRules::from_file(&path)?),
        RuleLocation::ConfigMap { namespace, name } => {
            Arc::new(ConfigMapRuleSource::new(client.clone(), &namespace, &name))
        }
    })
}

/// Run every startup phase up to, but not including, serving
pub async fn bootstrap<A: WebhookConfigApi>(
    config: &Config,
    rules: Arc<dyn RuleSource>,
    api: A,
    health: Arc<HealthState>,
) -> Result<Bootstrap> {
    config.validate()?;

    let root = issue_root()?;
    let profile = config.identity_profile()?;
    let leaf = issue_leaf(&root, &profile)?;
    info!(profile = %profile, "Issued webhook identity");

    let initial = rules.load().await.map_err(|e| match e {
        Error::TransformDegraded(reason) => Error::Config(reason),
        other => other,
    })?;
    health.metrics.set_transform_rules(initial.len());
    info!(source = %rules.describe(), count = initial.len(), "Loaded transform rules");
    for rule in &initial {
        info!(rule = %rule, "Transform rule");
    }

    let declaration = WebhookDeclaration::new(
        &config.name,
        &config.service,
        &config.namespace,
        config.endpoint(),
        root.pem(PemRole::Certificate),
    );
    let registrar = WebhookRegistrar::new(api, Some(health.clone()));
    let registration = registrar.reconcile(&declaration).await?;

    let state = Arc::new(WebhookState::new(
        rules,
        config.on_transform_error,
        health,
    ));
    let server = AdmissionServer::new(config.bind, leaf, state, config.drain_timeout());

    Ok(Bootstrap {
        root,
        registration,
        server,
    })
}

/// Start the webhook against the cluster and serve until `shutdown`
pub async fn run(config: Config, client: Client, shutdown: CancellationToken) -> Result<()> {
    config.validate()?;
    let rules = rule_source(&config, &client)?;
    let api = KubeWebhookConfigApi::new(client);
    let health = Arc::new(HealthState::new());

    let Bootstrap { server, .. } = bootstrap(&config, rules, api, health).await?;
    server.run(shutdown).await
}
