use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use http::header::{AUTHORIZATION, CONTENT_TYPE, IF_MATCH};
use http::Method;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::service::DirectoryConfig;
use crate::credential::CredentialCache;
use crate::directory::models::{AttributeQuery, ListQuery, ListResponse, NewUser, PatchRequest, User};
use crate::directory::service::DirectoryService;
use crate::errors::{AuthxError, AuthxResult};
use crate::helpers::time::get_instant;
use crate::observability::metrics::get_metrics;
use crate::upstream::{expect_success, read_json, UpstreamFailure};
use crate::utils::constants::{DEFAULT_DIRECTORY_TIMEOUT_MS, SCIM_CONTENT_TYPE};

static DIRECTORY_MSG: &str = "directory";

/// SCIM 2.0 `/Users` client. Every call carries the cached service
/// credential, refreshed first when it is about to expire.
pub struct ScimDirectory {
    client: Client,
    base_url: Url,
    credentials: Arc<CredentialCache>,
}

impl ScimDirectory {
    pub fn new(cfg: &DirectoryConfig, credentials: Arc<CredentialCache>) -> Result<Self> {
        let timeout = cfg.timeout_ms.unwrap_or(DEFAULT_DIRECTORY_TIMEOUT_MS);
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout))
            .build()?;
        let base_url = Url::parse(&cfg.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("directory base_url {} cannot carry a path", cfg.base_url));
        }
        Ok(Self {
            client,
            base_url,
            credentials,
        })
    }

    async fn request(&self, method: Method, id: Option<&str>) -> AuthxResult<RequestBuilder> {
        let url = users_url(&self.base_url, id)?;
        let credential = self.credentials.valid_credential().await?;
        Ok(self
            .client
            .request(method, url)
            .header(AUTHORIZATION, credential.authorization_header())
            .header(CONTENT_TYPE, SCIM_CONTENT_TYPE))
    }

    async fn send(&self, operation: &str, request: RequestBuilder) -> Result<reqwest::Response, UpstreamFailure> {
        let start = get_instant();
        let result = expect_success(request.send().await).await;
        get_metrics()
            .await
            .upstream_duration
            .with_label_values(&[DIRECTORY_MSG, operation])
            .observe(start.elapsed().as_secs_f64());
        if let Err(failure) = &result {
            debug!(operation, %failure, "directory call failed");
        }
        result
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        intent: &str,
        request: RequestBuilder,
    ) -> AuthxResult<T> {
        let response = self
            .send(operation, request)
            .await
            .map_err(|failure| failure.into_error(intent))?;
        read_json(response)
            .await
            .map_err(|failure| failure.into_error(intent))
    }
}

/// `<base>/Users` or `<base>/Users/<id>` with the id as a single
/// percent-encoded segment.
pub fn users_url(base: &Url, id: Option<&str>) -> AuthxResult<Url> {
    if let Some(id) = id {
        if id.is_empty() || id == "." || id == ".." || id.contains('/') {
            return Err(AuthxError::Input("invalid user id".to_owned()));
        }
    }
    let mut url = base.clone();
    {
        let mut segments = url
            .path_segments_mut()
            .map_err(|_| AuthxError::Internal("directory base_url cannot carry a path".to_owned()))?;
        segments.pop_if_empty().push("Users");
        if let Some(id) = id {
            segments.push(id);
        }
    }
    Ok(url)
}

#[async_trait]
impl DirectoryService for ScimDirectory {
    async fn list_users(&self, query: &ListQuery) -> AuthxResult<ListResponse> {
        let request = self.request(Method::GET, None).await?.query(query);
        self.send_json("list_users", "unable to list users", request).await
    }

    async fn get_user(&self, id: &str, query: &AttributeQuery) -> AuthxResult<User> {
        let request = self
            .request(Method::GET, Some(id))
            .await?
            .query(query);
        self.send_json("get_user", "unable to get user", request).await
    }

    async fn modify_user(
        &self,
        id: &str,
        patch: &PatchRequest,
        if_match: Option<&str>,
    ) -> AuthxResult<User> {
        let mut request = self
            .request(Method::PATCH, Some(id))
            .await?
            .json(patch);
        if let Some(version) = if_match {
            request = request.header(IF_MATCH, version);
        }
        self.send_json("modify_user", "unable to update the user", request).await
    }

    async fn delete_user(&self, id: &str) -> AuthxResult<()> {
        let request = self.request(Method::DELETE, Some(id)).await?;
        self.send("delete_user", request)
            .await
            .map(|_| ())
            .map_err(|failure| failure.into_error("unable to delete user"))
    }

    async fn create_user(&self, user: &NewUser) -> AuthxResult<User> {
        let request = self.request(Method::POST, None).await?.json(user);
        self.send_json("create_user", "unable to create user", request).await
    }
}
