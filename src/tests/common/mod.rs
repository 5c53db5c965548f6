// tests/common/mod.rs
pub use axum::Router;
pub use serde_json::json;
pub use tokio::task::JoinHandle;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Json;
use reqwest::Client;
use serde_json::{Map, Value};

use crate::config::proc_loader::parse_config;
use crate::config::service::{OpenIdConfig, ServiceConfig, WorkflowConfig};
use crate::credential::{CredentialCache, IssuerClient};
use crate::directory::models::{
    AttributeQuery, Entitlement, ListQuery, ListResponse, Meta, NewUser, PatchOp, PatchRequest, User,
};
use crate::directory::DirectoryService;
use crate::errors::{AuthxError, AuthxResult, ConflictKind};
use crate::events::EventEmitter;
use crate::services::bootstrap::wire_services;
use crate::services::Services;
use crate::utils::channel;

pub const SERVICE_USER: &str = "svc-authx";
pub const SERVICE_PASSWORD: &str = "svc-secret";
pub const ACTIVATION_URL: &str = "https://app.example.com/activate/";
pub const RESET_URL: &str = "https://app.example.com/reset/";

/// Spawn an Axum router on an ephemeral port and return (JoinHandle, SocketAddr)
pub async fn spawn_axum(router: Router) -> (JoinHandle<()>, SocketAddr) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, router).await.expect("server failed");
    });
    (handle, addr)
}

pub fn build_reqwest_client() -> Client {
    Client::builder()
        .timeout(std::time::Duration::from_secs(5))
        .build()
        .expect("reqwest client")
}

// -------------------------------
// Fake OpenID issuer: token + introspection endpoints
// -------------------------------

#[derive(Default)]
pub struct FakeIssuer {
    accounts: Mutex<HashMap<String, String>>,
    introspections: Mutex<HashMap<String, Value>>,
    pub password_ttl: AtomicI64,
    pub refresh_ttl: AtomicI64,
    pub refresh_delay_ms: AtomicU64,
    pub refresh_fails: AtomicBool,
    pub password_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub introspect_calls: AtomicUsize,
    pub refresh_tokens_seen: Mutex<Vec<String>>,
}

impl FakeIssuer {
    pub fn add_account(&self, username: &str, password: &str) {
        self.accounts
            .lock()
            .unwrap()
            .insert(username.to_owned(), password.to_owned());
    }

    /// Active bearer token carrying `scopes`.
    pub fn grant_token(&self, token: &str, scopes: &[&str]) {
        self.set_introspection(
            token,
            json!({"active": true, "scopes": scopes, "sub": format!("sub-{}", token)}),
        );
    }

    pub fn set_introspection(&self, token: &str, body: Value) {
        self.introspections
            .lock()
            .unwrap()
            .insert(token.to_owned(), body);
    }
}

async fn fake_token(
    State(issuer): State<Arc<FakeIssuer>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    let invalid_grant = || {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "invalid_grant", "error_description": "grant rejected"})),
        )
            .into_response()
    };

    match form.get("grant_type").map(String::as_str) {
        Some("password") => {
            let n = issuer.password_calls.fetch_add(1, Ordering::SeqCst) + 1;
            let known = {
                let accounts = issuer.accounts.lock().unwrap();
                match (form.get("username"), form.get("password")) {
                    (Some(u), Some(p)) => accounts.get(u) == Some(p),
                    _ => false,
                }
            };
            if !known {
                return invalid_grant();
            }
            Json(json!({
                "access_token": format!("access-{}", n),
                "token_type": "bearer",
                "expires_in": issuer.password_ttl.load(Ordering::SeqCst),
                "refresh_token": format!("refresh-{}", n),
            }))
            .into_response()
        }
        Some("refresh_token") => {
            let n = issuer.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
            if let Some(token) = form.get("refresh_token") {
                issuer.refresh_tokens_seen.lock().unwrap().push(token.clone());
            }
            let delay = issuer.refresh_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            if issuer.refresh_fails.load(Ordering::SeqCst) {
                return invalid_grant();
            }
            Json(json!({
                "access_token": format!("refreshed-{}", n),
                "token_type": "bearer",
                "expires_in": issuer.refresh_ttl.load(Ordering::SeqCst),
                "refresh_token": format!("refresh-r{}", n),
            }))
            .into_response()
        }
        _ => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "unsupported_grant_type"})),
        )
            .into_response(),
    }
}

async fn fake_introspect(
    State(issuer): State<Arc<FakeIssuer>>,
    Form(form): Form<HashMap<String, String>>,
) -> Json<Value> {
    issuer.introspect_calls.fetch_add(1, Ordering::SeqCst);
    let introspections = issuer.introspections.lock().unwrap();
    let body = form
        .get("token")
        .and_then(|token| introspections.get(token))
        .cloned()
        .unwrap_or_else(|| json!({"active": false}));
    Json(body)
}

/// Fake issuer with the service account registered; returns its base url.
pub async fn spawn_fake_issuer() -> (Arc<FakeIssuer>, String) {
    let issuer = Arc::new(FakeIssuer::default());
    issuer.password_ttl.store(3600, Ordering::SeqCst);
    issuer.refresh_ttl.store(3600, Ordering::SeqCst);
    issuer.add_account(SERVICE_USER, SERVICE_PASSWORD);

    let router = Router::new()
        .route("/token", post(fake_token))
        .route("/introspect", post(fake_introspect))
        .with_state(issuer.clone());
    let (_handle, addr) = spawn_axum(router).await;
    (issuer, format!("http://{}", addr))
}

// -------------------------------
// Config fixtures
// -------------------------------

pub fn openid_config(issuer_base: &str) -> OpenIdConfig {
    OpenIdConfig {
        issuer: issuer_base.to_owned(),
        token_endpoint: format!("{}/token", issuer_base),
        introspection_endpoint: format!("{}/introspect", issuer_base),
        client_id: "authx".to_owned(),
        client_secret: "authx-secret".to_owned(),
        default_scope: "user".to_owned(),
        admin_scope: "admin".to_owned(),
        grant_scopes: vec!["uma_protection".into(), "openid".into(), "profile".into()],
        http_timeout_ms: Some(2_000),
    }
}

pub fn workflow_config() -> WorkflowConfig {
    WorkflowConfig {
        activation_urls: vec![ACTIVATION_URL.to_owned(), "https://admin.example.com/activate/".to_owned()],
        password_reset_urls: vec![RESET_URL.to_owned()],
    }
}

pub fn config_yaml(issuer_base: &str, directory_base: &str) -> String {
    format!(
        r#"
settings:
  server:
    host: "127.0.0.1"
    port: "0"
  metrics:
    is_enabled: true
    path: "/metrics"
  logging:
    level: "debug"
    format: "compact"
openid:
  issuer: "{issuer}"
  token_endpoint: "{issuer}/token"
  introspection_endpoint: "{issuer}/introspect"
  client_id: "authx"
  client_secret: "authx-secret"
  default_scope: "user"
  http_timeout_ms: 2000
directory:
  base_url: "{directory}/identity/restv1/scim/v2"
  username: "{user}"
  password: "{password}"
workflow:
  activation_urls:
    - "{activation}"
    - "https://admin.example.com/activate/"
  password_reset_urls:
    - "{reset}"
notifications:
  audit:
    type: log
"#,
        issuer = issuer_base,
        directory = directory_base,
        user = SERVICE_USER,
        password = SERVICE_PASSWORD,
        activation = ACTIVATION_URL,
        reset = RESET_URL,
    )
}

pub async fn service_config(issuer_base: &str, directory_base: &str) -> ServiceConfig {
    parse_config(config_yaml(issuer_base, directory_base))
        .await
        .expect("fixture config must be valid")
}

/// Issuer client and an initialized credential cache against `issuer_base`.
pub async fn credential_cache(issuer_base: &str) -> (Arc<IssuerClient>, Arc<CredentialCache>) {
    let issuer = Arc::new(IssuerClient::new(&openid_config(issuer_base)).unwrap());
    let cache = Arc::new(CredentialCache::new(issuer.clone()));
    cache.acquire(SERVICE_USER, SERVICE_PASSWORD).await.unwrap();
    (issuer, cache)
}

/// Services over an in-memory directory, plus the emitter they publish on.
pub async fn in_memory_services(
    directory: Arc<InMemoryDirectory>,
    issuer_base: &str,
) -> (Services, EventEmitter) {
    let config = service_config(issuer_base, "http://directory.invalid").await;
    let issuer = Arc::new(IssuerClient::new(&config.openid).unwrap());
    let emitter = EventEmitter::new(channel::run());
    let services = wire_services(directory, issuer, emitter.clone(), &config);
    (services, emitter)
}

// -------------------------------
// In-memory SCIM directory
// -------------------------------

#[derive(Default)]
struct DirectoryState {
    users: Vec<User>,
    passwords: HashMap<String, String>,
    versions: HashMap<String, u64>,
    next_id: u64,
}

/// `DirectoryService` over a vector of users. Filters support `eq` clauses
/// joined by `and`; multi-valued sub-attributes match per clause, like a
/// real SCIM server. Writes bump `meta.version` and honour `If-Match`.
#[derive(Default)]
pub struct InMemoryDirectory {
    state: Mutex<DirectoryState>,
    list_delay_ms: AtomicU64,
    modify_rejection: Mutex<Option<String>>,
    pub list_calls: AtomicUsize,
    pub modify_calls: AtomicUsize,
}

impl InMemoryDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_list_delay(&self, delay: Duration) {
        self.list_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// The next `modify_user` fails with a validation conflict carrying `detail`.
    pub fn reject_next_modify(&self, detail: &str) {
        *self.modify_rejection.lock().unwrap() = Some(detail.to_owned());
    }

    pub fn insert(&self, user_name: &str, active: bool, entitlements: Vec<Entitlement>) -> String {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let id = format!("u-{}", state.next_id);
        let mut user: User = serde_json::from_value(json!({
            "id": id,
            "userName": user_name,
            "emails": [{"value": user_name, "primary": true}],
            "active": active,
        }))
        .unwrap();
        user.entitlements = entitlements;
        bump_version(&mut state.versions, &mut user);
        state.users.push(user);
        id
    }

    pub fn user(&self, id: &str) -> Option<User> {
        let state = self.state.lock().unwrap();
        state.users.iter().find(|u| u.id == id).cloned()
    }

    pub fn password(&self, id: &str) -> Option<String> {
        self.state.lock().unwrap().passwords.get(id).cloned()
    }
}

fn bump_version(versions: &mut HashMap<String, u64>, user: &mut User) {
    let version = versions.entry(user.id.clone()).or_insert(0);
    *version += 1;
    user.meta = Some(Meta {
        version: Some(format!("W/\"{}\"", version)),
        resource_type: Some("User".to_owned()),
        extra: Map::new(),
    });
}

fn not_found(intent: &str) -> AuthxError {
    AuthxError::Upstream {
        intent: intent.to_owned(),
        status: Some(404),
        detail: "resource not found".to_owned(),
    }
}

fn parse_clause(clause: &str) -> Option<(String, String)> {
    let (attribute, rest) = clause.trim().split_once(" eq ")?;
    let value = rest.trim().strip_prefix('"')?.strip_suffix('"')?;
    Some((
        attribute.to_owned(),
        value.replace("\\\"", "\"").replace("\\\\", "\\"),
    ))
}

fn clause_matches(user: &User, attribute: &str, value: &str) -> bool {
    match attribute {
        "id" => user.id == value,
        "userName" => user.user_name.as_deref() == Some(value),
        "entitlements.type" => user.entitlements.iter().any(|e| e.kind.as_deref() == Some(value)),
        "entitlements.display" => user.entitlements.iter().any(|e| e.display.as_deref() == Some(value)),
        "entitlements.value" => user.entitlements.iter().any(|e| e.value_str().as_deref() == Some(value)),
        _ => false,
    }
}

fn filter_matches(user: &User, filter: &str) -> bool {
    filter.split(" and ").all(|clause| match parse_clause(clause) {
        Some((attribute, value)) => clause_matches(user, &attribute, &value),
        None => false,
    })
}

#[async_trait]
impl DirectoryService for InMemoryDirectory {
    async fn list_users(&self, query: &ListQuery) -> AuthxResult<ListResponse> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.list_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let state = self.state.lock().unwrap();
        let resources: Vec<User> = state
            .users
            .iter()
            .filter(|user| match &query.filter {
                Some(filter) => filter_matches(user, filter),
                None => true,
            })
            .cloned()
            .collect();
        let total = resources.len() as u64;
        Ok(ListResponse {
            resources,
            total_results: Some(total),
            start_index: Some(1),
            items_per_page: Some(total),
        })
    }

    async fn get_user(&self, id: &str, _query: &AttributeQuery) -> AuthxResult<User> {
        self.user(id).ok_or_else(|| not_found("unable to get user"))
    }

    async fn modify_user(
        &self,
        id: &str,
        patch: &PatchRequest,
        if_match: Option<&str>,
    ) -> AuthxResult<User> {
        self.modify_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(detail) = self.modify_rejection.lock().unwrap().take() {
            return Err(AuthxError::UpstreamConflict {
                intent: "unable to update the user".to_owned(),
                detail,
                kind: ConflictKind::Validation,
            });
        }
        let mut guard = self.state.lock().unwrap();
        let DirectoryState {
            users,
            passwords,
            versions,
            ..
        } = &mut *guard;

        let stored = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| not_found("unable to update the user"))?;
        if let Some(expected) = if_match {
            if stored.version() != Some(expected) {
                return Err(AuthxError::UpstreamConflict {
                    intent: "unable to update the user".to_owned(),
                    detail: "version mismatch".to_owned(),
                    kind: ConflictKind::StaleVersion,
                });
            }
        }

        let mut updated = stored.clone();
        let mut new_password = None;
        for operation in &patch.operations {
            let value = operation.value.clone().unwrap_or(Value::Null);
            match (operation.op, operation.path.as_deref()) {
                (PatchOp::Remove, Some("entitlements")) => updated.entitlements.clear(),
                (_, Some("entitlements")) => {
                    updated.entitlements =
                        serde_json::from_value(value).map_err(|e| AuthxError::Upstream {
                            intent: "unable to update the user".to_owned(),
                            status: Some(400),
                            detail: e.to_string(),
                        })?;
                }
                (_, Some("active")) => updated.active = value.as_bool(),
                (_, Some("password")) => new_password = value.as_str().map(str::to_owned),
                (PatchOp::Remove, Some(path)) => {
                    updated.extra.remove(path);
                }
                (_, Some(path)) => {
                    updated.extra.insert(path.to_owned(), value);
                }
                (_, None) => {
                    return Err(AuthxError::Upstream {
                        intent: "unable to update the user".to_owned(),
                        status: Some(400),
                        detail: "path is required".to_owned(),
                    })
                }
            }
        }

        bump_version(versions, &mut updated);
        if let Some(password) = new_password {
            passwords.insert(id.to_owned(), password);
        }
        *stored = updated.clone();
        Ok(updated)
    }

    async fn delete_user(&self, id: &str) -> AuthxResult<()> {
        let mut state = self.state.lock().unwrap();
        let before = state.users.len();
        state.users.retain(|u| u.id != id);
        if state.users.len() == before {
            return Err(not_found("unable to delete user"));
        }
        Ok(())
    }

    async fn create_user(&self, new_user: &NewUser) -> AuthxResult<User> {
        let mut guard = self.state.lock().unwrap();
        if guard
            .users
            .iter()
            .any(|u| u.user_name.as_deref() == Some(new_user.user_name.as_str()))
        {
            return Err(AuthxError::UpstreamConflict {
                intent: "unable to create user".to_owned(),
                detail: "userName is already taken".to_owned(),
                kind: ConflictKind::Validation,
            });
        }
        guard.next_id += 1;
        let id = format!("u-{}", guard.next_id);
        let mut user = User {
            schemas: new_user.schemas.clone(),
            id: id.clone(),
            user_name: Some(new_user.user_name.clone()),
            emails: new_user.emails.clone(),
            active: Some(new_user.active),
            entitlements: new_user.entitlements.clone(),
            meta: None,
            extra: Map::new(),
        };
        let state = &mut *guard;
        bump_version(&mut state.versions, &mut user);
        state.passwords.insert(id, new_user.password.clone());
        state.users.push(user.clone());
        Ok(user)
    }
}
