//! Database repositories.
//!
//! Each repository owns the SQL for one aggregate. Rows are read into
//! `FromRow` structs and converted to domain types with explicit error
//! mapping, so schema drift fails loudly instead of silently.

pub mod connection;
pub mod credential;
pub mod data_store;
pub mod workflow;
pub mod workflow_run;

pub use connection::ConnectionRepository;
pub use credential::SqlCredentialVault;
pub use data_store::SqlDataStore;
pub use workflow::WorkflowRepository;
pub use workflow_run::WorkflowRunRepository;

/// Maps an ID/JSON decode failure into a sqlx decode error.
pub(crate) fn decode_error(context: &str, detail: impl std::fmt::Display) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("{context}: {detail}"),
    )))
}
