use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::credential::credential::Credential;
use crate::credential::issuer::IssuerClient;
use crate::errors::{AuthxError, AuthxResult};
use crate::helpers::time::now_i64;
use crate::observability::metrics::get_metrics;

static ACQUIRE_MSG: &str = "acquire";
static REFRESH_MSG: &str = "refresh";
static OK_MSG: &str = "ok";
static ERROR_MSG: &str = "error";

/// Holds the single live service credential used by every outbound
/// directory call. Constructed once and shared through `Arc`.
///
/// Refreshes are single-flight: callers that find the credential about to
/// expire queue on `refresh_flight`; the first one refreshes, the others
/// pick up its result from the cache.
pub struct CredentialCache {
    issuer: Arc<IssuerClient>,
    current: RwLock<Option<Credential>>,
    refresh_flight: Mutex<()>,
}

impl CredentialCache {
    pub fn new(issuer: Arc<IssuerClient>) -> Self {
        Self {
            issuer,
            current: RwLock::new(None),
            refresh_flight: Mutex::new(()),
        }
    }

    pub fn issuer(&self) -> &IssuerClient {
        &self.issuer
    }

    /// Password grant for the service account. On failure the cache keeps
    /// whatever it held before (nothing, at startup).
    pub async fn acquire(&self, username: &str, password: &str) -> AuthxResult<Credential> {
        let result = self.issuer.password_grant(username, password).await;
        record(ACQUIRE_MSG, &result).await;
        let credential = result?;
        info!(expires_at = credential.expires_at, "service credential acquired");
        self.store(credential.clone()).await;
        Ok(credential)
    }

    /// Exchange a refresh token. Never falls back to the stale credential.
    pub async fn refresh(&self, refresh_token: &str) -> AuthxResult<Credential> {
        let result = self.issuer.refresh_grant(refresh_token).await;
        record(REFRESH_MSG, &result).await;
        let credential = result.inspect_err(|e| warn!(error = %e, "service credential refresh failed"))?;
        info!(expires_at = credential.expires_at, "service credential refreshed");
        self.store(credential.clone()).await;
        Ok(credential)
    }

    /// Return `current` while `now + skew < expires_at`, otherwise a refreshed credential.
    pub async fn ensure_valid(&self, current: &Credential) -> AuthxResult<Credential> {
        if current.is_fresh(now_i64()) {
            return Ok(current.clone());
        }

        let _flight = self.refresh_flight.lock().await;
        // a caller ahead of us in the queue may already have refreshed;
        // its refresh token supersedes the one `current` carries
        let mut latest = current.clone();
        if let Some(cached) = self.snapshot().await {
            if cached.access_token != current.access_token {
                if cached.is_fresh(now_i64()) {
                    debug!("credential already refreshed by a concurrent caller");
                    return Ok(cached);
                }
                latest = cached;
            }
        }
        debug!(expires_at = latest.expires_at, "credential about to expire, refreshing");
        self.refresh(&latest.refresh_token).await
    }

    /// The credential to put on the next outbound call.
    pub async fn valid_credential(&self) -> AuthxResult<Credential> {
        let current = self
            .snapshot()
            .await
            .ok_or_else(AuthxError::uninitialized_credential)?;
        self.ensure_valid(&current).await
    }

    pub async fn snapshot(&self) -> Option<Credential> {
        self.current.read().await.clone()
    }

    async fn store(&self, credential: Credential) {
        get_metrics().await.credential_expiry_unix.set(credential.expires_at);
        *self.current.write().await = Some(credential);
    }
}

async fn record(operation: &str, result: &AuthxResult<Credential>) {
    let outcome = if result.is_ok() { OK_MSG } else { ERROR_MSG };
    get_metrics()
        .await
        .credential_grants
        .with_label_values(&[operation, outcome])
        .inc();
}
