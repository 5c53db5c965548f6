pub mod filter;
pub mod models;
pub mod scim;
pub mod service;

pub use filter::Filter;
pub use models::{AttributeQuery, Entitlement, ListQuery, ListResponse, NewUser, PatchOperation, PatchRequest, User};
pub use scim::ScimDirectory;
pub use service::DirectoryService;
