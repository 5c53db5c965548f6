use async_trait::async_trait;

use crate::directory::models::{AttributeQuery, ListQuery, ListResponse, NewUser, PatchRequest, User};
use crate::errors::AuthxResult;

/// The remote user store. Implementations map their failures onto the
/// error taxonomy before returning.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    async fn list_users(&self, query: &ListQuery) -> AuthxResult<ListResponse>;

    async fn get_user(&self, id: &str, query: &AttributeQuery) -> AuthxResult<User>;

    /// Apply a patch. With `if_match` set, the write must be rejected as a
    /// conflict when the record changed since that version was read.
    async fn modify_user(
        &self,
        id: &str,
        patch: &PatchRequest,
        if_match: Option<&str>,
    ) -> AuthxResult<User>;

    async fn delete_user(&self, id: &str) -> AuthxResult<()>;

    async fn create_user(&self, user: &NewUser) -> AuthxResult<User>;
}
