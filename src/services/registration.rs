use std::sync::Arc;

use tracing::info;

use crate::config::service::WorkflowConfig;
use crate::directory::models::{NewUser, User};
use crate::directory::DirectoryService;
use crate::errors::{AuthxError, AuthxResult};
use crate::events::{workflow_link, EventEmitter, NotificationEvent};
use crate::services::find_by_user_name;
use crate::workflow::{without_workflow_entries, WorkflowKind, WorkflowTokenEngine};

static REGISTER_INTENT: &str = "unable to register the user";
static RESEND_INTENT: &str = "unable to resend activation";

/// A freshly created, still inactive user and the link that activates it.
/// `user` carries no workflow entries; the link is the only way to the token.
#[derive(Debug, Clone)]
pub struct Registration {
    pub user: User,
    pub activation_link: String,
}

pub struct RegistrationService {
    directory: Arc<dyn DirectoryService>,
    engine: Arc<WorkflowTokenEngine>,
    emitter: EventEmitter,
    workflow: Arc<WorkflowConfig>,
}

impl RegistrationService {
    pub fn new(
        directory: Arc<dyn DirectoryService>,
        engine: Arc<WorkflowTokenEngine>,
        emitter: EventEmitter,
        workflow: Arc<WorkflowConfig>,
    ) -> Self {
        Self {
            directory,
            engine,
            emitter,
            workflow,
        }
    }

    /// Create an inactive user that carries a pending activation token.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        activation_url: Option<&str>,
    ) -> AuthxResult<Registration> {
        if email.trim().is_empty() || !email.contains('@') {
            return Err(AuthxError::Input("a valid email is required".to_owned()));
        }
        if password.is_empty() {
            return Err(AuthxError::Input("password is required".to_owned()));
        }
        let base_url = self
            .workflow
            .activation_url(activation_url)
            .ok_or_else(|| AuthxError::Input("invalid activation url".to_owned()))?;

        let entry = self.engine.new_entry(WorkflowKind::Activation);
        let new_user = NewUser::inactive(email, password, vec![entry.to_entitlement()]);
        let user = self
            .directory
            .create_user(&new_user)
            .await
            .map_err(|e| e.with_intent(REGISTER_INTENT))?;
        info!(user_id = %user.id, "user registered");

        let activation_link = workflow_link(&base_url, &entry.token);
        self.emitter.emit(NotificationEvent::user_signup(
            &user.id,
            activation_link.clone(),
            user.primary_email().or(Some(email)),
        ));

        Ok(Registration {
            user: without_workflow_entries(user),
            activation_link,
        })
    }

    /// Issue a new activation token for an inactive user; the previous one
    /// stops working.
    pub async fn resend_activation(
        &self,
        user_name: &str,
        activation_url: Option<&str>,
    ) -> AuthxResult<()> {
        let base_url = self
            .workflow
            .activation_url(activation_url)
            .ok_or_else(|| AuthxError::Input("invalid activation url".to_owned()))?;

        let user = find_by_user_name(self.directory.as_ref(), user_name)
            .await
            .map_err(|e| e.with_intent(RESEND_INTENT))?
            .ok_or_else(|| AuthxError::Input("no such user".to_owned()))?;
        if user.active == Some(true) {
            return Err(AuthxError::Input("user is already active".to_owned()));
        }

        let token = self
            .engine
            .generate(&user.id, WorkflowKind::Activation)
            .await
            .map_err(|e| e.with_intent(RESEND_INTENT))?;

        self.emitter.emit(NotificationEvent::user_signup(
            &user.id,
            workflow_link(&base_url, &token),
            user.primary_email(),
        ));
        Ok(())
    }
}
