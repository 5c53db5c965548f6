use serde::Deserialize;
use std::fmt;

use crate::helpers::time::{expires_at_from, is_fresh_at};
use crate::upstream::UpstreamFailure;

/// The service's own directory access credential.
///
/// Always replaced as a whole; never patched field by field.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: i64, // UNIX TIMESTAMP
    pub refresh_token: String,
}

impl Credential {
    pub fn new(access_token: String, token_type: String, expires_at: i64, refresh_token: String) -> Self {
        Self {
            access_token,
            token_type,
            expires_at,
            refresh_token,
        }
    }

    /// Usable for an outbound call started at `now` (skew applied).
    pub fn is_fresh(&self, now: i64) -> bool {
        is_fresh_at(now, self.expires_at)
    }

    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

// tokens stay out of logs
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

/// Token endpoint response for password and refresh grants.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    pub expires_in: Option<i64>,
    pub expires_at: Option<i64>,
    pub refresh_token: Option<String>,
}

impl TokenResponse {
    /// Some issuers omit the refresh token on refresh; the previous one stays valid then.
    /// A response without any expiry is malformed.
    pub fn into_credential(self, previous_refresh_token: Option<&str>) -> Result<Credential, UpstreamFailure> {
        let expires_at = expires_at_from(self.expires_at, self.expires_in)
            .ok_or_else(|| UpstreamFailure::Malformed("token response carries no expiry".to_owned()))?;
        let refresh_token = self
            .refresh_token
            .or_else(|| previous_refresh_token.map(str::to_owned))
            .unwrap_or_default();
        Ok(Credential::new(self.access_token, self.token_type, expires_at, refresh_token))
    }
}

fn default_token_type() -> String {
    "bearer".to_owned()
}
