pub mod activation;
pub mod bootstrap;
pub mod password;
pub mod registration;
pub mod users;

use std::sync::Arc;

use crate::config::service::WorkflowConfig;
use crate::credential::IssuerClient;
use crate::directory::models::User;
use crate::directory::{DirectoryService, Filter};
use crate::errors::{AuthxError, AuthxResult};
use crate::events::EventEmitter;
use crate::workflow::WorkflowTokenEngine;

pub use activation::ActivationService;
pub use bootstrap::{initialize, Bootstrap};
pub use password::PasswordService;
pub use registration::{Registration, RegistrationService};
pub use users::UserService;

#[derive(Clone)]
pub struct Services {
    pub registration: Arc<RegistrationService>,
    pub activation: Arc<ActivationService>,
    pub password: Arc<PasswordService>,
    pub users: Arc<UserService>,
}

impl Services {
    pub fn new(
        directory: Arc<dyn DirectoryService>,
        engine: Arc<WorkflowTokenEngine>,
        issuer: Arc<IssuerClient>,
        emitter: EventEmitter,
        workflow: Arc<WorkflowConfig>,
    ) -> Self {
        Self {
            registration: Arc::new(RegistrationService::new(
                directory.clone(),
                engine.clone(),
                emitter.clone(),
                workflow.clone(),
            )),
            activation: Arc::new(ActivationService::new(engine.clone())),
            password: Arc::new(PasswordService::new(
                directory.clone(),
                engine,
                issuer,
                emitter,
                workflow,
            )),
            users: Arc::new(UserService::new(directory)),
        }
    }
}

/// Exact `userName` lookup.
pub(crate) async fn find_by_user_name(
    directory: &dyn DirectoryService,
    user_name: &str,
) -> AuthxResult<Option<User>> {
    if user_name.trim().is_empty() {
        return Err(AuthxError::Input("user name is required".to_owned()));
    }
    let listed = directory
        .list_users(&Filter::eq("userName", user_name).into_query())
        .await?;
    Ok(listed
        .resources
        .into_iter()
        .find(|user| user.user_name.as_deref() == Some(user_name)))
}
