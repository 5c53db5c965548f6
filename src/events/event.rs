use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::utils::constants::{EVENT_USER_PASSWORD_RESET, EVENT_USER_SIGNUP};

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event")]
pub enum EventPayload {
    #[serde(rename = "user-signup")]
    UserSignup {
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(rename = "activationLink")]
        activation_link: String,
    },
    #[serde(rename = "user-password-reset")]
    UserPasswordReset {
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(rename = "resetLink")]
        reset_link: String,
    },
}

/// Published after a state change that a person has to act on.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NotificationEvent {
    #[serde(flatten)]
    pub payload: EventPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn user_signup(user_id: &str, activation_link: String, email: Option<&str>) -> Self {
        Self::new(
            EventPayload::UserSignup {
                user_id: user_id.to_owned(),
                activation_link,
            },
            email,
        )
    }

    pub fn user_password_reset(user_id: &str, reset_link: String, email: Option<&str>) -> Self {
        Self::new(
            EventPayload::UserPasswordReset {
                user_id: user_id.to_owned(),
                reset_link,
            },
            email,
        )
    }

    fn new(payload: EventPayload, email: Option<&str>) -> Self {
        Self {
            payload,
            email: email.map(str::to_owned),
            timestamp: Utc::now(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self.payload {
            EventPayload::UserSignup { .. } => EVENT_USER_SIGNUP,
            EventPayload::UserPasswordReset { .. } => EVENT_USER_PASSWORD_RESET,
        }
    }

    pub fn user_id(&self) -> &str {
        match &self.payload {
            EventPayload::UserSignup { user_id, .. } => user_id,
            EventPayload::UserPasswordReset { user_id, .. } => user_id,
        }
    }

    pub fn link(&self) -> &str {
        match &self.payload {
            EventPayload::UserSignup { activation_link, .. } => activation_link,
            EventPayload::UserPasswordReset { reset_link, .. } => reset_link,
        }
    }
}

/// Allow-listed base URL with the token appended verbatim, so the base
/// decides whether the token lands in a path segment or a query value.
pub fn workflow_link(base_url: &str, token: &str) -> String {
    format!("{}{}", base_url, token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn signup_event_wire_shape() {
        let event = NotificationEvent::user_signup(
            "u-1",
            workflow_link("https://app.example.com/activate/", "abc"),
            Some("alice@example.com"),
        );
        let mut value = serde_json::to_value(&event).unwrap();
        value.as_object_mut().unwrap().remove("timestamp");
        assert_eq!(
            value,
            json!({
                "event": "user-signup",
                "userId": "u-1",
                "activationLink": "https://app.example.com/activate/abc",
                "email": "alice@example.com"
            })
        );
        assert_eq!(event.name(), "user-signup");
    }

    #[test]
    fn reset_link_appends_token_to_base() {
        let event = NotificationEvent::user_password_reset(
            "u-2",
            workflow_link("https://app.example.com/reset?token=", "abc"),
            None,
        );
        assert_eq!(event.link(), "https://app.example.com/reset?token=abc");
        assert!(serde_json::to_value(&event).unwrap().get("email").is_none());
    }
}
