pub mod engine;
pub mod locks;
pub mod repository;
pub mod token;

pub use engine::{ConsumeEffect, WorkflowTokenEngine};
pub use repository::{DirectoryTokenRepository, WorkflowTokenRepository};
pub use token::{list_without_workflow_entries, without_workflow_entries, WorkflowKind, WorkflowTokenEntry};
