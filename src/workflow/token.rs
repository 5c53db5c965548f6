use rand::rngs::OsRng;
use rand::RngCore;
use serde_json::Value;
use std::fmt;

use crate::directory::models::{Entitlement, ListResponse, User};
use crate::utils::constants::WORKFLOW_TOKEN_BYTES;

const PENDING: &str = "false";
const CONSUMED: &str = "true";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkflowKind {
    Activation,
    PasswordReset,
}

impl WorkflowKind {
    /// Entitlement `type` used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowKind::Activation => "activation",
            WorkflowKind::PasswordReset => "resetPassword",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "activation" => Some(WorkflowKind::Activation),
            "resetPassword" => Some(WorkflowKind::PasswordReset),
            _ => None,
        }
    }
}

impl fmt::Display for WorkflowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single-use token stored as one element of a user's entitlements.
#[derive(Clone, PartialEq, Eq)]
pub struct WorkflowTokenEntry {
    pub kind: WorkflowKind,
    pub token: String,
    pub consumed: bool,
}

impl WorkflowTokenEntry {
    /// Fresh pending entry with a new random token.
    pub fn generate(kind: WorkflowKind) -> Self {
        Self {
            kind,
            token: generate_token(),
            consumed: false,
        }
    }

    pub fn from_entitlement(entitlement: &Entitlement) -> Option<Self> {
        let kind = WorkflowKind::parse(entitlement.kind.as_deref()?)?;
        let token = entitlement.display.clone()?;
        let consumed = match entitlement.value_str()?.as_str() {
            PENDING => false,
            CONSUMED => true,
            _ => return None,
        };
        Some(Self {
            kind,
            token,
            consumed,
        })
    }

    pub fn to_entitlement(&self) -> Entitlement {
        Entitlement {
            kind: Some(self.kind.as_str().to_owned()),
            display: Some(self.token.clone()),
            value: Some(Value::String(
                if self.consumed { CONSUMED } else { PENDING }.to_owned(),
            )),
            primary: None,
        }
    }
}

impl fmt::Debug for WorkflowTokenEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowTokenEntry")
            .field("kind", &self.kind)
            .field("consumed", &self.consumed)
            .finish_non_exhaustive()
    }
}

/// Whether `entitlement` is the still-pending entry for `(kind, token)`.
pub fn is_pending_entry(entitlement: &Entitlement, kind: WorkflowKind, token: &str) -> bool {
    WorkflowTokenEntry::from_entitlement(entitlement)
        .is_some_and(|entry| entry.kind == kind && entry.token == token && !entry.consumed)
}

/// Whether `entitlement` belongs to the workflow token store, whatever its state.
pub fn is_workflow_entitlement(entitlement: &Entitlement) -> bool {
    entitlement
        .kind
        .as_deref()
        .and_then(WorkflowKind::parse)
        .is_some()
}

/// The user as callers may see it: workflow token entries removed.
pub fn without_workflow_entries(mut user: User) -> User {
    user.entitlements
        .retain(|entitlement| !is_workflow_entitlement(entitlement));
    user
}

pub fn list_without_workflow_entries(mut listed: ListResponse) -> ListResponse {
    listed.resources = listed
        .resources
        .into_iter()
        .map(without_workflow_entries)
        .collect();
    listed
}

/// 16 bytes from the OS CSPRNG, lowercase hex.
pub fn generate_token() -> String {
    let mut bytes = [0u8; WORKFLOW_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Shape check done before any directory round trip.
pub fn is_well_formed(token: &str) -> bool {
    token.len() == WORKFLOW_TOKEN_BYTES * 2
        && token.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
