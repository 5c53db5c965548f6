use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::utils::constants::{SCIM_PATCH_SCHEMA, SCIM_USER_SCHEMA};

/// A directory user record. Only the fields this service touches are
/// typed; everything else round-trips through `extra`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub schemas: Vec<String>,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub emails: Vec<Email>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entitlements: Vec<Entitlement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl User {
    pub fn primary_email(&self) -> Option<&str> {
        self.emails
            .iter()
            .find(|email| email.primary == Some(true))
            .or_else(|| self.emails.first())
            .map(|email| email.value.as_str())
    }

    /// Version tag for conditional writes, when the directory exposes one.
    pub fn version(&self) -> Option<&str> {
        self.meta.as_ref().and_then(|meta| meta.version.as_deref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Email {
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<bool>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl Email {
    pub fn primary(value: &str) -> Self {
        Self {
            value: value.to_owned(),
            primary: Some(true),
            kind: None,
        }
    }
}

/// Multi-valued `entitlements` element. Directories disagree on whether
/// `value` is a string or a boolean, so it stays a raw JSON value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entitlement {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary: Option<bool>,
}

impl Entitlement {
    /// `value` rendered the way the directory filter compares it.
    pub fn value_str(&self) -> Option<String> {
        match self.value.as_ref()? {
            Value::String(s) => Some(s.to_owned()),
            Value::Bool(b) => Some(b.to_string()),
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of `createUser`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub schemas: Vec<String>,
    pub user_name: String,
    pub emails: Vec<Email>,
    pub password: String,
    pub active: bool,
    pub entitlements: Vec<Entitlement>,
}

impl NewUser {
    /// An inactive user identified by email, waiting for activation.
    pub fn inactive(email: &str, password: &str, entitlements: Vec<Entitlement>) -> Self {
        Self {
            schemas: vec![SCIM_USER_SCHEMA.to_owned()],
            user_name: email.to_owned(),
            emails: vec![Email::primary(email)],
            password: password.to_owned(),
            active: false,
            entitlements,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    #[serde(rename = "Resources", default)]
    pub resources: Vec<User>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_results: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_index: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items_per_page: Option<u64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    Add,
    Remove,
    Replace,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatchOperation {
    pub op: PatchOp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

impl PatchOperation {
    pub fn replace(path: &str, value: Value) -> Self {
        Self {
            op: PatchOp::Replace,
            path: Some(path.to_owned()),
            value: Some(value),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatchRequest {
    #[serde(default = "default_patch_schemas")]
    pub schemas: Vec<String>,
    #[serde(rename = "Operations")]
    pub operations: Vec<PatchOperation>,
}

impl PatchRequest {
    pub fn new(operations: Vec<PatchOperation>) -> Self {
        Self {
            schemas: default_patch_schemas(),
            operations,
        }
    }
}

fn default_patch_schemas() -> Vec<String> {
    vec![SCIM_PATCH_SCHEMA.to_owned()]
}

/// Query parameters for `listUsers`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_index: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_attributes: Option<String>,
}

/// Attribute projection for `getUser` / `modifyUser` responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttributeQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_attributes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scim_user_keeps_unknown_attributes() {
        let raw = json!({
            "schemas": [SCIM_USER_SCHEMA],
            "id": "u-1",
            "userName": "alice@example.com",
            "emails": [{"value": "work@example.com"}, {"value": "alice@example.com", "primary": true}],
            "active": false,
            "entitlements": [{"type": "activation", "display": "abc", "value": "false"}],
            "meta": {"version": "W/\"3\"", "resourceType": "User"},
            "displayName": "Alice"
        });
        let user: User = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(user.primary_email(), Some("alice@example.com"));
        assert_eq!(user.version(), Some("W/\"3\""));
        assert_eq!(user.entitlements[0].value_str().as_deref(), Some("false"));
        assert_eq!(serde_json::to_value(&user).unwrap(), raw);
    }

    #[test]
    fn patch_request_uses_scim_wire_names() {
        let patch = PatchRequest::new(vec![PatchOperation::replace("active", json!(true))]);
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            json!({
                "schemas": [SCIM_PATCH_SCHEMA],
                "Operations": [{"op": "replace", "path": "active", "value": true}]
            })
        );
    }

    #[test]
    fn boolean_entitlement_values_compare_as_strings() {
        let entitlement: Entitlement =
            serde_json::from_value(json!({"type": "resetPassword", "display": "t", "value": false})).unwrap();
        assert_eq!(entitlement.value_str().as_deref(), Some("false"));
    }
}
