use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::config::service::WorkflowConfig;
use crate::credential::IssuerClient;
use crate::directory::models::{AttributeQuery, PatchOperation, PatchRequest, User};
use crate::directory::DirectoryService;
use crate::errors::{AuthxError, AuthxResult, UnauthorizedReason};
use crate::events::{workflow_link, EventEmitter, NotificationEvent};
use crate::services::find_by_user_name;
use crate::workflow::{without_workflow_entries, ConsumeEffect, WorkflowKind, WorkflowTokenEngine};

static FORGOT_INTENT: &str = "unable to start password reset";
static RESET_INTENT: &str = "unable to reset password";
static CHANGE_INTENT: &str = "unable to change password";

pub struct PasswordService {
    directory: Arc<dyn DirectoryService>,
    engine: Arc<WorkflowTokenEngine>,
    issuer: Arc<IssuerClient>,
    emitter: EventEmitter,
    workflow: Arc<WorkflowConfig>,
}

impl PasswordService {
    pub fn new(
        directory: Arc<dyn DirectoryService>,
        engine: Arc<WorkflowTokenEngine>,
        issuer: Arc<IssuerClient>,
        emitter: EventEmitter,
        workflow: Arc<WorkflowConfig>,
    ) -> Self {
        Self {
            directory,
            engine,
            issuer,
            emitter,
            workflow,
        }
    }

    /// Issue a reset token for `user_name` and publish the reset link.
    pub async fn forgot_password(&self, user_name: &str, reset_url: Option<&str>) -> AuthxResult<()> {
        let base_url = self
            .workflow
            .password_reset_url(reset_url)
            .ok_or_else(|| AuthxError::Input("invalid password reset url".to_owned()))?;

        let user = find_by_user_name(self.directory.as_ref(), user_name)
            .await
            .map_err(|e| e.with_intent(FORGOT_INTENT))?
            .ok_or_else(|| AuthxError::Input("no such user".to_owned()))?;

        let token = self
            .engine
            .generate(&user.id, WorkflowKind::PasswordReset)
            .await
            .map_err(|e| e.with_intent(FORGOT_INTENT))?;

        self.emitter.emit(NotificationEvent::user_password_reset(
            &user.id,
            workflow_link(&base_url, &token),
            user.primary_email(),
        ));
        Ok(())
    }

    pub async fn reset_password(&self, token: &str, new_password: &str) -> AuthxResult<User> {
        if new_password.is_empty() {
            return Err(AuthxError::Input("new password is required".to_owned()));
        }
        self.engine
            .consume(
                WorkflowKind::PasswordReset,
                token,
                ConsumeEffect::SetPassword(new_password.to_owned()),
            )
            .await
            .map(without_workflow_entries)
            .map_err(|e| e.with_intent(RESET_INTENT))
    }

    /// Change the password of `user_id` after proving the old one. The
    /// proof is a password grant against the issuer; it does not touch the
    /// service credential.
    pub async fn change_password(
        &self,
        user_id: &str,
        user_name: &str,
        old_password: &str,
        new_password: &str,
    ) -> AuthxResult<User> {
        if new_password.is_empty() {
            return Err(AuthxError::Input("new password is required".to_owned()));
        }

        let user = self
            .directory
            .get_user(user_id, &AttributeQuery::default())
            .await
            .map_err(|e| e.with_intent(CHANGE_INTENT))?;
        if user.user_name.as_deref() != Some(user_name) {
            warn!(user_id, "password change with a user name that does not own the record");
            return Err(AuthxError::Unauthorized(UnauthorizedReason::InvalidCredentials));
        }

        match self.issuer.password_grant(user_name, old_password).await {
            Ok(_) => {}
            Err(AuthxError::UpstreamAuth { .. }) => {
                return Err(AuthxError::Unauthorized(UnauthorizedReason::InvalidCredentials))
            }
            Err(e) => return Err(e.with_intent(CHANGE_INTENT)),
        }

        let patch = PatchRequest::new(vec![PatchOperation::replace(
            "password",
            Value::String(new_password.to_owned()),
        )]);
        let updated = self
            .directory
            .modify_user(user_id, &patch, None)
            .await
            .map_err(|e| e.with_intent(CHANGE_INTENT))?;
        info!(user_id, "password changed");
        Ok(without_workflow_entries(updated))
    }
}
