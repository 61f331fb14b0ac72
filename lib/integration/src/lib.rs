//! Integration framework for the flowdeck platform.
//!
//! This crate provides:
//!
//! - **Connector trait**: Common interface for all integrations
//! - **Credential model + vault**: Encrypted storage for connection credentials
//! - **REST connector**: Generic JSON-over-HTTP connector with credential
//!   application
//! - **Rate limiter**: Per-connection rate limiting

pub mod connector;
pub mod credential;
pub mod error;
pub mod memory;
pub mod rate_limit;
pub mod rest;

pub use connector::{
    Connector, ConnectorInfo, ConnectorRegistry, OperationInfo, OperationOutcome,
    OperationRequest, ResolvedAuth,
};
pub use credential::{Credential, CredentialData, CredentialKind, CredentialVault};
pub use error::{ConnectorError, CredentialError};
pub use memory::InMemoryVault;
pub use rate_limit::{RateLimitConfig, RateLimitResult, RateLimiter};
pub use rest::{RestConnector, RestOperation};
