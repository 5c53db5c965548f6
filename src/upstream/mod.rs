//! Upstream failure classification.
//!
//! Issuer and directory responses are mapped to [`UpstreamFailure`] exactly
//! once, where the HTTP call returns. Callers decide how a class maps onto
//! [`AuthxError`]; nothing downstream inspects raw responses.

pub mod classify;

pub use classify::{expect_success, read_json, FailureClass, UpstreamFailure};
