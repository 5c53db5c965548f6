#[cfg(test)]
pub mod common;

mod workflow_tokens;
