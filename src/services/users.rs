use std::sync::Arc;

use serde_json::Value;

use crate::directory::models::{AttributeQuery, ListQuery, ListResponse, PatchOperation, PatchRequest, User};
use crate::directory::DirectoryService;
use crate::errors::{AuthxError, AuthxResult};
use crate::utils::constants::SCIM_USER_SCHEMA;
use crate::workflow::{list_without_workflow_entries, without_workflow_entries};

const ENTITLEMENTS: &str = "entitlements";

/// Plain user record operations behind the authorization gate. Workflow
/// token entries never leave or enter through here.
pub struct UserService {
    directory: Arc<dyn DirectoryService>,
}

impl UserService {
    pub fn new(directory: Arc<dyn DirectoryService>) -> Self {
        Self { directory }
    }

    pub async fn list_users(&self, query: &ListQuery) -> AuthxResult<ListResponse> {
        self.directory
            .list_users(query)
            .await
            .map(list_without_workflow_entries)
            .map_err(|e| e.with_intent("unable to list users"))
    }

    pub async fn get_user(&self, id: &str, query: &AttributeQuery) -> AuthxResult<User> {
        self.directory
            .get_user(id, query)
            .await
            .map(without_workflow_entries)
            .map_err(|e| e.with_intent("unable to get user"))
    }

    pub async fn modify_user(&self, id: &str, patch: &PatchRequest) -> AuthxResult<User> {
        if patch.operations.is_empty() {
            return Err(AuthxError::Input("at least one patch operation is required".to_owned()));
        }
        if patch.operations.iter().any(touches_entitlements) {
            return Err(AuthxError::Input("entitlements cannot be modified".to_owned()));
        }
        self.directory
            .modify_user(id, patch, None)
            .await
            .map(without_workflow_entries)
            .map_err(|e| e.with_intent("unable to update the user"))
    }

    pub async fn delete_user(&self, id: &str) -> AuthxResult<()> {
        self.directory
            .delete_user(id)
            .await
            .map_err(|e| e.with_intent("unable to delete user"))
    }
}

/// SCIM attribute names are case-insensitive and may carry the core schema
/// URN as a prefix.
fn is_entitlements_attribute(name: &str) -> bool {
    let name = name.trim().to_lowercase();
    let prefix = format!("{}:", SCIM_USER_SCHEMA.to_lowercase());
    let name = name.strip_prefix(&prefix).unwrap_or(&name);
    name.starts_with(ENTITLEMENTS)
}

fn value_touches_entitlements(value: &Value) -> bool {
    match value {
        Value::Object(map) => map.iter().any(|(key, nested)| {
            is_entitlements_attribute(key)
                || (key.eq_ignore_ascii_case(SCIM_USER_SCHEMA) && value_touches_entitlements(nested))
        }),
        _ => false,
    }
}

fn touches_entitlements(operation: &PatchOperation) -> bool {
    match operation.path.as_deref() {
        Some(path) => is_entitlements_attribute(path),
        None => operation.value.as_ref().is_some_and(value_touches_entitlements),
    }
}
