//! # AuthX Agent Library
//!
//! Authorization and credential lifecycle in front of a SCIM directory:
//! bearer-token introspection against a scope, a cached service credential
//! refreshed ahead of expiry, single-use activation / password-reset tokens
//! stored on the user record, and notification events after state changes.
//!
//! Modules:
//! - `credential`: service credential, issuer client, credential cache
//! - `authorization`: authorization gate and axum middleware
//! - `directory`: SCIM model, filter builder, `DirectoryService`
//! - `workflow`: workflow token engine and its repository
//! - `events` / `sinks`: notification events and their delivery
//! - `services` / `server`: user operations and the HTTP surface

pub mod authorization;
pub mod config;
pub mod credential;
pub mod directory;
pub mod errors;
pub mod events;
pub mod helpers;
pub mod observability;
pub mod server;
pub mod services;
pub mod sinks;
pub mod tests;
pub mod upstream;
pub mod utils;
pub mod workflow;

pub use crate::config::service::ServiceConfig;
pub use crate::errors::{AuthxError, AuthxResult};
