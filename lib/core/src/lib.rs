//! Core domain types and utilities for the flowdeck platform.
//!
//! This crate provides the foundational ID types and error handling shared
//! by every other flowdeck crate.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{
    ConnectionId, CredentialId, NodeExecutionId, TriggerId, WorkflowId, WorkflowRunId,
};
