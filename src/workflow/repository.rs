use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, warn};

use crate::directory::models::{AttributeQuery, Entitlement, PatchOperation, PatchRequest, User};
use crate::directory::{DirectoryService, Filter};
use crate::errors::{AuthxError, AuthxResult};
use crate::observability::metrics::get_metrics;
use crate::workflow::locks::KeyedLocks;
use crate::workflow::token::{is_pending_entry, WorkflowKind, WorkflowTokenEntry};

/// Storage of workflow tokens inside user records.
#[async_trait]
pub trait WorkflowTokenRepository: Send + Sync {
    /// Add a pending entry to the user. Older pending entries of the same
    /// kind on that user are marked consumed in the same write.
    async fn append(&self, user_id: &str, entry: &WorkflowTokenEntry) -> AuthxResult<User>;

    /// The user holding the pending entry for `(kind, token)`, if any.
    async fn find_pending(&self, kind: WorkflowKind, token: &str) -> AuthxResult<Option<User>>;

    /// Flip the pending entry to consumed and apply `effect` in one write.
    /// Fails with `InvalidToken` when the entry is missing or another
    /// caller consumed it first.
    async fn consume_if_pending(
        &self,
        kind: WorkflowKind,
        token: &str,
        effect: Vec<PatchOperation>,
    ) -> AuthxResult<User>;
}

pub struct DirectoryTokenRepository {
    directory: Arc<dyn DirectoryService>,
    locks: KeyedLocks<(WorkflowKind, String)>,
}

impl DirectoryTokenRepository {
    pub fn new(directory: Arc<dyn DirectoryService>) -> Self {
        Self {
            directory,
            locks: KeyedLocks::new(),
        }
    }

    async fn try_consume(
        &self,
        kind: WorkflowKind,
        token: &str,
        effect: Vec<PatchOperation>,
    ) -> AuthxResult<User> {
        let user = self
            .find_pending(kind, token)
            .await?
            .ok_or(AuthxError::InvalidToken)?;

        let entitlements: Vec<Entitlement> = user
            .entitlements
            .iter()
            .map(|entitlement| {
                if is_pending_entry(entitlement, kind, token) {
                    WorkflowTokenEntry {
                        kind,
                        token: token.to_owned(),
                        consumed: true,
                    }
                    .to_entitlement()
                } else {
                    entitlement.clone()
                }
            })
            .collect();

        let mut operations = vec![entitlements_op(&entitlements)?];
        operations.extend(effect);
        let patch = PatchRequest::new(operations);

        let version = user.version();
        match self.directory.modify_user(&user.id, &patch, version).await {
            Ok(updated) => Ok(updated),
            Err(e) if version.is_some() && e.is_stale_write() => {
                debug!(user_id = %user.id, %kind, error = %e, "lost consume race");
                Err(AuthxError::InvalidToken)
            }
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl WorkflowTokenRepository for DirectoryTokenRepository {
    async fn append(&self, user_id: &str, entry: &WorkflowTokenEntry) -> AuthxResult<User> {
        let user = self
            .directory
            .get_user(user_id, &AttributeQuery::default())
            .await?;

        let mut entitlements: Vec<Entitlement> = user
            .entitlements
            .iter()
            .map(|entitlement| match WorkflowTokenEntry::from_entitlement(entitlement) {
                Some(mut existing) if existing.kind == entry.kind && !existing.consumed => {
                    existing.consumed = true;
                    existing.to_entitlement()
                }
                _ => entitlement.clone(),
            })
            .collect();
        entitlements.push(entry.to_entitlement());

        let patch = PatchRequest::new(vec![entitlements_op(&entitlements)?]);
        self.directory
            .modify_user(user_id, &patch, user.version())
            .await
    }

    async fn find_pending(&self, kind: WorkflowKind, token: &str) -> AuthxResult<Option<User>> {
        let query = Filter::eq("entitlements.type", kind.as_str())
            .and_eq("entitlements.display", token)
            .and_eq("entitlements.value", "false")
            .into_query();
        let listed = self.directory.list_users(&query).await?;

        // The conjunction may be satisfied by different elements of the
        // multi-valued attribute, so keep only users holding one exact entry.
        let matches: Vec<User> = listed
            .resources
            .into_iter()
            .filter(|user| {
                user.entitlements
                    .iter()
                    .any(|entitlement| is_pending_entry(entitlement, kind, token))
            })
            .collect();

        if matches.len() > 1 {
            let user_ids: Vec<&str> = matches.iter().map(|user| user.id.as_str()).collect();
            error!(%kind, ?user_ids, "pending workflow token held by more than one user, using the first");
            get_metrics().await.workflow_policy_violations.inc();
        }

        Ok(matches.into_iter().next())
    }

    async fn consume_if_pending(
        &self,
        kind: WorkflowKind,
        token: &str,
        effect: Vec<PatchOperation>,
    ) -> AuthxResult<User> {
        let result = self
            .locks
            .run((kind, token.to_owned()), self.try_consume(kind, token, effect))
            .await;
        if let Err(e) = &result {
            if !matches!(e, AuthxError::InvalidToken) {
                warn!(%kind, error = %e, "workflow token consume failed");
            }
        }
        result
    }
}

fn entitlements_op(entitlements: &[Entitlement]) -> AuthxResult<PatchOperation> {
    let value = serde_json::to_value(entitlements)
        .map_err(|e| AuthxError::Internal(format!("unable to encode entitlements: {}", e)))?;
    Ok(PatchOperation::replace("entitlements", value))
}
