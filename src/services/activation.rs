use std::sync::Arc;

use crate::directory::models::User;
use crate::errors::AuthxResult;
use crate::workflow::{without_workflow_entries, ConsumeEffect, WorkflowKind, WorkflowTokenEngine};

pub struct ActivationService {
    engine: Arc<WorkflowTokenEngine>,
}

impl ActivationService {
    pub fn new(engine: Arc<WorkflowTokenEngine>) -> Self {
        Self { engine }
    }

    /// Consume an activation token and mark its user active.
    pub async fn activate(&self, token: &str) -> AuthxResult<User> {
        self.engine
            .consume(WorkflowKind::Activation, token, ConsumeEffect::Activate)
            .await
            .map(without_workflow_entries)
            .map_err(|e| e.with_intent("unable to activate user"))
    }
}
