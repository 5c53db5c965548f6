use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the static `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE
        .get_or_init(|| async {
            info!("Initializing Metrics ...");
            Metrics::new()
        })
        .await
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Credential cache
    pub credential_grants: IntCounterVec,
    pub credential_expiry_unix: IntGauge,

    // Authorization gate
    pub authorization_decisions: IntCounterVec,

    // Upstream calls
    pub upstream_duration: HistogramVec,

    // Workflow tokens
    pub workflow_tokens: IntCounterVec,
    pub workflow_policy_violations: IntCounter,

    // Notification sinks
    pub notifications_delivered: IntCounterVec,
    pub notification_failures: IntCounterVec,

    // Config/runtime
    pub config_validation_errors: IntCounter,
    pub up: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("authx".into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            // Credential
            credential_grants: IntCounterVec::new(Opts::new("credential_grants_total", "Service credential grants by operation and outcome"),&["operation", "outcome"],).unwrap(),
            credential_expiry_unix: IntGauge::new("credential_expiry_unix_seconds", "Expiry of the cached service credential").unwrap(),

            // Gate
            authorization_decisions: IntCounterVec::new(Opts::new("authorization_decisions_total", "Authorization gate decisions"),&["decision"],).unwrap(),

            // Upstream
            upstream_duration: HistogramVec::new(HistogramOpts::new("upstream_duration_seconds", "Outbound call duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),&["upstream", "operation"],).unwrap(),

            // Workflow
            workflow_tokens: IntCounterVec::new(Opts::new("workflow_token_operations_total", "Workflow token operations"),&["kind", "operation", "outcome"],).unwrap(),
            workflow_policy_violations: IntCounter::new("workflow_policy_violations_total", "Pending workflow tokens matched by more than one user").unwrap(),

            // Notifications
            notifications_delivered: IntCounterVec::new(Opts::new("notifications_delivered_total", "Delivered notification events"),&["sink", "event"],).unwrap(),
            notification_failures: IntCounterVec::new(Opts::new("notification_failures_total", "Notification delivery failures"),&["sink", "reason"],).unwrap(),

            // Config/runtime
            config_validation_errors: IntCounter::new("config_validation_errors_total","Validation errors during startup",).unwrap(),
            up: IntGauge::new("up", "1 if service is healthy").unwrap(),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.credential_grants.clone())).unwrap();
        reg.register(Box::new(metrics.credential_expiry_unix.clone())).unwrap();
        reg.register(Box::new(metrics.authorization_decisions.clone())).unwrap();
        reg.register(Box::new(metrics.upstream_duration.clone())).unwrap();
        reg.register(Box::new(metrics.workflow_tokens.clone())).unwrap();
        reg.register(Box::new(metrics.workflow_policy_violations.clone())).unwrap();
        reg.register(Box::new(metrics.notifications_delivered.clone())).unwrap();
        reg.register(Box::new(metrics.notification_failures.clone())).unwrap();
        reg.register(Box::new(metrics.config_validation_errors.clone())).unwrap();
        reg.register(Box::new(metrics.up.clone())).unwrap();

        metrics
    }
}
