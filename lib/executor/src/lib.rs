//! Node executors and the variable-interpolation runtime.
//!
//! This crate turns node configurations into effects. The `Dispatcher`
//! implements the workflow crate's `NodeExecutor` trait and switches on
//! the node kind:
//!
//! - **trigger**: passes the run input through
//! - **http_request**: outbound HTTP with interpolated URL/headers/body
//! - **llm_call**: renders the prompt and calls the `LlmBackend`
//! - **integration**: resolves credentials (refresh-on-read), rate-limits,
//!   and dispatches to the `ConnectorRegistry`
//! - **conditional / for_each / transform / output**: pure evaluation over
//!   the execution context
//! - **data_store**: keyed cross-run state behind the `DataStore` trait
//!
//! All string configuration may reference prior outputs with
//! `{{node.<id>.<path>}}`, the trigger input with `{{trigger.<path>}}`,
//! and workflow variables with `{{vars.<name>}}`.

pub mod condition;
pub mod context;
pub mod control;
pub mod data_store;
pub mod dispatch;
pub mod http;
pub mod integration;
pub mod interpolate;
pub mod llm;

pub use condition::select_branch;
pub use context::ExecutionContext;
pub use data_store::{DataStore, DataStoreError, InMemoryDataStore};
pub use dispatch::Dispatcher;
pub use interpolate::{render_string, resolve_json, resolve_template, InterpolationError};
