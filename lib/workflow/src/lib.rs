//! Workflow engine for the flowdeck platform.
//!
//! This crate provides the workflow definition model and the execution
//! engine built on top of it:
//!
//! - **Graph Model**: Directed acyclic graphs using petgraph with typed
//!   nodes and edges
//! - **Node Types**: Trigger, HTTP Request, LLM Call, Integration,
//!   Conditional, For-Each, Transform, Data Store, Output
//! - **Port System**: Named input/output ports with JSON Schema typing;
//!   conditional branches route through per-case output ports
//! - **Execution**: Event-sourced state machine for tracking workflow runs
//! - **Orchestrator/Worker**: graph logic and node execution split behind
//!   `EventStore`/`ObjectStore` traits, with NATS JetStream implementations

pub mod definition;
pub mod edge;
pub mod envelope;
pub mod error;
pub mod execution;
pub mod graph;
pub mod memory;
pub mod nats;
pub mod node;
pub mod orchestrator;
pub mod port;
pub mod remaining_work;
pub mod run_state;
pub mod trigger;
pub mod worker;

pub use definition::{Workflow, WorkflowMetadata};
pub use edge::Edge;
pub use envelope::Envelope;
pub use error::{GraphError, WorkflowError};
pub use execution::{ExecutionEvent, ExecutionState, NodeExecution, NodeExecutionState};
pub use graph::WorkflowGraph;
pub use node::{Node, NodeConfig, NodeId, NodeKind};
pub use orchestrator::{EventStore, Orchestrator, WorkItem, WorkItemResult};
pub use port::{InputPort, OutputPort, PortSchema};
pub use run_state::{RunState, RunStateBuilder};
pub use trigger::{Trigger, TriggerConfig, TriggerType};
pub use worker::{NodeExecutor, ObjectStore, Worker};
