use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::authorization::AuthorizationGate;
use crate::config::service::ServiceConfig;
use crate::credential::{CredentialCache, IssuerClient};
use crate::directory::{DirectoryService, ScimDirectory};
use crate::events::EventEmitter;
use crate::services::Services;
use crate::workflow::{DirectoryTokenRepository, WorkflowTokenEngine};

/// Everything the HTTP layer needs, wired from one config.
pub struct Bootstrap {
    pub credentials: Arc<CredentialCache>,
    pub gate: Arc<AuthorizationGate>,
    pub services: Services,
}

/// Acquire the service credential and build every component on top of
/// it. A failed acquisition is returned to the caller.
pub async fn initialize(config: &ServiceConfig, emitter: EventEmitter) -> Result<Bootstrap> {
    let issuer = Arc::new(IssuerClient::new(&config.openid)?);
    let credentials = Arc::new(CredentialCache::new(issuer.clone()));
    credentials
        .acquire(&config.directory.username, &config.directory.password)
        .await?;

    let directory: Arc<dyn DirectoryService> =
        Arc::new(ScimDirectory::new(&config.directory, credentials.clone())?);
    let gate = Arc::new(AuthorizationGate::new(
        issuer.clone(),
        config.openid.default_scope.clone(),
    ));
    let services = wire_services(directory, issuer, emitter, config);
    info!(issuer = %config.openid.issuer, directory = %config.directory.base_url, "services initialized");

    Ok(Bootstrap {
        credentials,
        gate,
        services,
    })
}

/// Service graph over any directory implementation.
pub fn wire_services(
    directory: Arc<dyn DirectoryService>,
    issuer: Arc<IssuerClient>,
    emitter: EventEmitter,
    config: &ServiceConfig,
) -> Services {
    let repository = Arc::new(DirectoryTokenRepository::new(directory.clone()));
    let engine = Arc::new(WorkflowTokenEngine::new(repository));
    Services::new(
        directory,
        engine,
        issuer,
        emitter,
        Arc::new(config.workflow.clone()),
    )
}
