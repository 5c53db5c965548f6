use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tracing::{info, warn};

use crate::authorization::AuthorizationGate;
use crate::config::settings::SettingsConfig;
use crate::observability::metrics::get_metrics;
use crate::observability::routes::MetricsState;
use crate::server::routes;
use crate::services::Services;

#[derive(Clone)]
pub struct AppState {
    pub metrics_state: MetricsState,
    pub services: Services,
    pub gate: Arc<AuthorizationGate>,
    pub admin_scope: String,
}

impl AppState {
    pub async fn new(services: Services, gate: Arc<AuthorizationGate>, admin_scope: &str) -> Self {
        let metrics = get_metrics().await;
        Self {
            metrics_state: MetricsState::new(metrics.registry.clone()),
            services,
            gate,
            admin_scope: admin_scope.to_owned(),
        }
    }
}

/// Full application router: `/users` API plus the metrics route when enabled.
pub fn app(settings_config: &SettingsConfig, state: AppState) -> Router {
    Router::new()
        .merge(routes::router(&state))
        .merge(state.metrics_state.router(&settings_config.metrics))
        .with_state(state)
}

pub async fn start(settings_config: &SettingsConfig, state: AppState) -> Result<()> {
    let app = app(settings_config, state);

    let bind_address = settings_config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!(address = %listener.local_addr()?, "http server listening");

    let metrics = get_metrics().await;
    metrics.up.set(1);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    metrics.up.set(0);
    info!("http server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received shutdown signal"),
        Err(e) => {
            warn!(error = %e, "unable to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
