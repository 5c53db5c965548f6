use std::time::Duration;

use anyhow::Result;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::config::service::OpenIdConfig;
use crate::credential::credential::{Credential, TokenResponse};
use crate::errors::{AuthxError, AuthxResult};
use crate::helpers::time::get_instant;
use crate::observability::metrics::get_metrics;
use crate::upstream::{expect_success, read_json, UpstreamFailure};
use crate::utils::constants::DEFAULT_ISSUER_TIMEOUT_MS;

static ISSUER_MSG: &str = "issuer";

/// RFC 7662 introspection answer. Gluu reports `scopes` as an array, other
/// issuers a space separated `scope`; both are honoured.
#[derive(Debug, Clone, Deserialize)]
pub struct Introspection {
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub scopes: Vec<String>,
    #[serde(default)]
    pub scope: Option<String>,
    pub client_id: Option<String>,
    pub sub: Option<String>,
    pub username: Option<String>,
    pub exp: Option<i64>,
}

impl Introspection {
    pub fn grants(&self, required: &str) -> bool {
        self.scopes.iter().any(|s| s == required)
            || self
                .scope
                .as_deref()
                .is_some_and(|s| s.split_whitespace().any(|s| s == required))
    }
}

fn default_active() -> bool {
    true
}

/// HTTP client for the external token issuer.
#[derive(Debug, Clone)]
pub struct IssuerClient {
    client: Client,
    token_endpoint: String,
    introspection_endpoint: String,
    client_id: String,
    client_secret: String,
    grant_scopes: Vec<String>,
}

impl IssuerClient {
    pub fn new(cfg: &OpenIdConfig) -> Result<Self> {
        let timeout = cfg.http_timeout_ms.unwrap_or(DEFAULT_ISSUER_TIMEOUT_MS);
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout))
            .build()?;
        Ok(Self {
            client,
            token_endpoint: cfg.token_endpoint.to_owned(),
            introspection_endpoint: cfg.introspection_endpoint.to_owned(),
            client_id: cfg.client_id.to_owned(),
            client_secret: cfg.client_secret.to_owned(),
            grant_scopes: cfg.grant_scopes.to_owned(),
        })
    }

    /// Resource-owner password grant with the fixed service scopes.
    pub async fn password_grant(&self, username: &str, password: &str) -> AuthxResult<Credential> {
        let scope = self.grant_scopes.join(" ");
        let form = [
            ("grant_type", "password"),
            ("username", username),
            ("password", password),
            ("scope", scope.as_str()),
        ];
        self.token_request("password", &form)
            .await
            .and_then(|response| response.into_credential(None))
            .map_err(|failure| grant_error(failure, "unable to acquire credential"))
    }

    pub async fn refresh_grant(&self, refresh_token: &str) -> AuthxResult<Credential> {
        let form = [("grant_type", "refresh_token"), ("refresh_token", refresh_token)];
        self.token_request("refresh", &form)
            .await
            .and_then(|response| response.into_credential(Some(refresh_token)))
            .map_err(|failure| grant_error(failure, "unable to refresh credential"))
    }

    /// Raw introspection; the authorization gate owns the classification.
    pub async fn introspect(&self, token: &str) -> Result<Introspection, UpstreamFailure> {
        let start = get_instant();
        let form = [("token", token), ("token_type_hint", "access_token")];
        let result = async {
            let response = expect_success(
                self.client
                    .post(&self.introspection_endpoint)
                    .basic_auth(&self.client_id, Some(&self.client_secret))
                    .form(&form)
                    .send()
                    .await,
            )
            .await?;
            read_json::<Introspection>(response).await
        }
        .await;
        observe(start, "introspect").await;
        result
    }

    async fn token_request(
        &self,
        operation: &str,
        form: &[(&str, &str)],
    ) -> Result<TokenResponse, UpstreamFailure> {
        let start = get_instant();
        debug!(operation, "token endpoint request");
        let result = async {
            let response = expect_success(
                self.client
                    .post(&self.token_endpoint)
                    .basic_auth(&self.client_id, Some(&self.client_secret))
                    .form(form)
                    .send()
                    .await,
            )
            .await?;
            read_json::<TokenResponse>(response).await
        }
        .await;
        observe(start, operation).await;
        result
    }
}

/// Any status-level rejection from the token endpoint is an auth failure;
/// timeouts and transport problems keep their own kinds.
fn grant_error(failure: UpstreamFailure, intent: &str) -> AuthxError {
    match failure {
        UpstreamFailure::Status { detail, .. } => AuthxError::UpstreamAuth {
            intent: intent.to_owned(),
            detail,
        },
        other => other.into_error(intent),
    }
}

async fn observe(start: tokio::time::Instant, operation: &str) {
    get_metrics()
        .await
        .upstream_duration
        .with_label_values(&[ISSUER_MSG, operation])
        .observe(start.elapsed().as_secs_f64());
}
