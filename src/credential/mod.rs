pub mod credential;
pub mod credential_cache;
pub mod issuer;

pub use credential::Credential;
pub use credential_cache::CredentialCache;
pub use issuer::{Introspection, IssuerClient};
