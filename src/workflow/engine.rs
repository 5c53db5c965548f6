use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};

use crate::directory::models::{PatchOperation, User};
use crate::errors::{AuthxError, AuthxResult};
use crate::observability::metrics::get_metrics;
use crate::workflow::repository::WorkflowTokenRepository;
use crate::workflow::token::{is_well_formed, WorkflowKind, WorkflowTokenEntry};

/// Side effect written together with the consumed token.
#[derive(Clone)]
pub enum ConsumeEffect {
    Activate,
    SetPassword(String),
}

impl ConsumeEffect {
    pub fn into_operations(self) -> Vec<PatchOperation> {
        match self {
            ConsumeEffect::Activate => vec![PatchOperation::replace("active", Value::Bool(true))],
            ConsumeEffect::SetPassword(password) => {
                vec![PatchOperation::replace("password", Value::String(password))]
            }
        }
    }
}

impl fmt::Debug for ConsumeEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsumeEffect::Activate => f.write_str("Activate"),
            ConsumeEffect::SetPassword(_) => f.write_str("SetPassword(..)"),
        }
    }
}

pub struct WorkflowTokenEngine {
    repository: Arc<dyn WorkflowTokenRepository>,
}

impl WorkflowTokenEngine {
    pub fn new(repository: Arc<dyn WorkflowTokenRepository>) -> Self {
        Self { repository }
    }

    /// Pending entry to embed in a record that does not exist yet.
    pub fn new_entry(&self, kind: WorkflowKind) -> WorkflowTokenEntry {
        WorkflowTokenEntry::generate(kind)
    }

    /// Issue a token for an existing user and return it.
    pub async fn generate(&self, user_id: &str, kind: WorkflowKind) -> AuthxResult<String> {
        let entry = WorkflowTokenEntry::generate(kind);
        let result = self.repository.append(user_id, &entry).await;
        record(kind, "generate", &result).await;
        result?;
        info!(user_id, %kind, "workflow token issued");
        Ok(entry.token)
    }

    /// The user holding the pending token, without consuming it.
    pub async fn resolve(&self, kind: WorkflowKind, token: &str) -> AuthxResult<User> {
        let result = self.lookup(kind, token).await;
        record(kind, "resolve", &result).await;
        result
    }

    /// Consume the token and apply `effect` atomically.
    pub async fn consume(
        &self,
        kind: WorkflowKind,
        token: &str,
        effect: ConsumeEffect,
    ) -> AuthxResult<User> {
        let result = if is_well_formed(token) {
            debug!(%kind, ?effect, "consuming workflow token");
            self.repository
                .consume_if_pending(kind, token, effect.into_operations())
                .await
        } else {
            Err(AuthxError::InvalidToken)
        };
        record(kind, "consume", &result).await;
        if let Ok(user) = &result {
            info!(user_id = %user.id, %kind, "workflow token consumed");
        }
        result
    }

    async fn lookup(&self, kind: WorkflowKind, token: &str) -> AuthxResult<User> {
        if !is_well_formed(token) {
            return Err(AuthxError::InvalidToken);
        }
        self.repository
            .find_pending(kind, token)
            .await?
            .ok_or(AuthxError::InvalidToken)
    }
}

async fn record<T>(kind: WorkflowKind, operation: &str, result: &AuthxResult<T>) {
    let outcome = match result {
        Ok(_) => "ok",
        Err(AuthxError::InvalidToken) => "invalid",
        Err(_) => "error",
    };
    get_metrics()
        .await
        .workflow_tokens
        .with_label_values(&[kind.as_str(), operation, outcome])
        .inc();
}
