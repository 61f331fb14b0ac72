//! Workflow worker for executing nodes.
//!
//! Workers execute nodes and publish completion/failure results; the
//! orchestrator owns all graph logic. The worker:
//! 1. Resolves the work item's input keys through the object store
//! 2. Invokes the `NodeExecutor` with the assembled inputs
//! 3. Stores the output back to the object store
//! 4. Reports a `WorkItemResult` (carrying the selected branch for
//!    conditional nodes)

use crate::node::{Node, NodeId, NodeKind};
use crate::orchestrator::{WorkItem, WorkItemResult};
use async_trait::async_trait;
use flowdeck_core::WorkflowId;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Trait for object storage operations.
///
/// Node outputs are stored out-of-band (NATS Object Store in production) and
/// referenced by key everywhere else. This abstraction allows testing
/// without NATS.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Stores data and returns the key.
    async fn put(&self, data: &[u8]) -> Result<String, ObjectStoreError>;

    /// Retrieves data by key.
    async fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError>;

    /// Deletes data by key.
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError>;
}

#[async_trait]
impl<T: ObjectStore + ?Sized> ObjectStore for std::sync::Arc<T> {
    async fn put(&self, data: &[u8]) -> Result<String, ObjectStoreError> {
        (**self).put(data).await
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        (**self).get(key).await
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        (**self).delete(key).await
    }
}

/// Errors from object store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectStoreError {
    /// Failed to store data.
    StoreFailed { message: String },
    /// Key not found.
    NotFound { key: String },
    /// Failed to retrieve data.
    RetrieveFailed { message: String },
    /// Failed to delete data.
    DeleteFailed { message: String },
}

impl std::fmt::Display for ObjectStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StoreFailed { message } => write!(f, "object store put failed: {message}"),
            Self::NotFound { key } => write!(f, "object not found: {key}"),
            Self::RetrieveFailed { message } => write!(f, "object store get failed: {message}"),
            Self::DeleteFailed { message } => write!(f, "object store delete failed: {message}"),
        }
    }
}

impl std::error::Error for ObjectStoreError {}

/// Inputs assembled for a single node execution.
///
/// `outputs` holds the payloads of every node completed so far, keyed by
/// node ID, so interpolation can reference any upstream node.
#[derive(Debug, Clone, Default)]
pub struct NodeInputs {
    /// The workflow being executed.
    pub workflow_id: WorkflowId,
    /// The run's trigger input.
    pub run_input: Option<JsonValue>,
    /// The workflow's static variables.
    pub variables: std::collections::BTreeMap<String, JsonValue>,
    /// Resolved outputs of completed nodes.
    pub outputs: HashMap<NodeId, JsonValue>,
}

/// Trait for node execution.
///
/// The production implementation dispatches on the node's configuration to
/// HTTP, LLM, integration, and control-flow executors; tests substitute
/// mocks.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Executes a node with the given inputs.
    ///
    /// Returns the output as JSON. Conditional nodes must include a
    /// top-level string field `branch` naming the branch taken (or null).
    async fn execute(
        &self,
        node: &Node,
        inputs: NodeInputs,
    ) -> Result<JsonValue, NodeExecutionError>;
}

#[async_trait]
impl<T: NodeExecutor + ?Sized> NodeExecutor for std::sync::Arc<T> {
    async fn execute(
        &self,
        node: &Node,
        inputs: NodeInputs,
    ) -> Result<JsonValue, NodeExecutionError> {
        (**self).execute(node, inputs).await
    }
}

/// Errors from node execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeExecutionError {
    /// Input validation failed.
    InvalidInput { message: String },
    /// A `{{...}}` reference could not be resolved.
    UnresolvedReference { message: String },
    /// Execution failed.
    ExecutionFailed { message: String },
    /// Node type not supported by this executor.
    UnsupportedNodeType { node_type: String },
    /// External service error.
    ExternalServiceError { service: String, message: String },
    /// Credential resolution failed.
    CredentialError { message: String },
    /// Timeout.
    Timeout,
}

impl std::fmt::Display for NodeExecutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput { message } => write!(f, "invalid input: {message}"),
            Self::UnresolvedReference { message } => {
                write!(f, "unresolved reference: {message}")
            }
            Self::ExecutionFailed { message } => write!(f, "execution failed: {message}"),
            Self::UnsupportedNodeType { node_type } => {
                write!(f, "unsupported node type: {node_type}")
            }
            Self::ExternalServiceError { service, message } => {
                write!(f, "external service error ({service}): {message}")
            }
            Self::CredentialError { message } => {
                write!(f, "credential error: {message}")
            }
            Self::Timeout => write!(f, "execution timed out"),
        }
    }
}

impl std::error::Error for NodeExecutionError {}

/// Errors that can occur during worker operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerError {
    /// Object store error.
    ObjectStore(ObjectStoreError),
    /// Node execution error.
    Execution(NodeExecutionError),
    /// Failed to (de)serialize a payload.
    SerializationFailed { message: String },
}

impl std::fmt::Display for WorkerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ObjectStore(e) => write!(f, "object store error: {e}"),
            Self::Execution(e) => write!(f, "execution error: {e}"),
            Self::SerializationFailed { message } => {
                write!(f, "serialization failed: {message}")
            }
        }
    }
}

impl std::error::Error for WorkerError {}

impl From<ObjectStoreError> for WorkerError {
    fn from(e: ObjectStoreError) -> Self {
        Self::ObjectStore(e)
    }
}

impl From<NodeExecutionError> for WorkerError {
    fn from(e: NodeExecutionError) -> Self {
        Self::Execution(e)
    }
}

/// The workflow worker.
///
/// Executes individual nodes and reports results.
pub struct Worker<O: ObjectStore, E: NodeExecutor> {
    object_store: O,
    executor: E,
}

impl<O: ObjectStore, E: NodeExecutor> Worker<O, E> {
    /// Creates a new worker.
    pub fn new(object_store: O, executor: E) -> Self {
        Self {
            object_store,
            executor,
        }
    }

    /// Processes a work item.
    pub async fn process(&self, work_item: WorkItem, node: &Node) -> WorkItemResult {
        match self.execute_node(&work_item, node).await {
            Ok((output_key, branch)) => WorkItemResult::Completed {
                run_id: work_item.run_id,
                node_id: work_item.node_id,
                output_key,
                branch,
            },
            Err(e) => WorkItemResult::Failed {
                run_id: work_item.run_id,
                node_id: work_item.node_id,
                error: e.to_string(),
            },
        }
    }

    /// Executes a node and returns the output key plus any selected branch.
    async fn execute_node(
        &self,
        work_item: &WorkItem,
        node: &Node,
    ) -> Result<(String, Option<String>), WorkerError> {
        let inputs = NodeInputs {
            workflow_id: work_item.workflow_id,
            run_input: work_item.run_input.clone(),
            variables: work_item.variables.clone(),
            outputs: self.resolve_inputs(&work_item.inputs).await?,
        };

        let output = self.executor.execute(node, inputs).await?;

        let branch = if node.kind() == NodeKind::Conditional {
            output
                .get("branch")
                .and_then(JsonValue::as_str)
                .map(ToString::to_string)
        } else {
            None
        };

        let output_bytes =
            serde_json::to_vec(&output).map_err(|e| WorkerError::SerializationFailed {
                message: e.to_string(),
            })?;
        let output_key = self.object_store.put(&output_bytes).await?;

        Ok((output_key, branch))
    }

    /// Resolves input keys to payloads through the object store.
    async fn resolve_inputs(
        &self,
        input_keys: &HashMap<NodeId, String>,
    ) -> Result<HashMap<NodeId, JsonValue>, WorkerError> {
        let mut inputs = HashMap::new();

        for (node_id, key) in input_keys {
            let bytes = self.object_store.get(key).await?;
            let value: JsonValue =
                serde_json::from_slice(&bytes).map_err(|e| WorkerError::SerializationFailed {
                    message: e.to_string(),
                })?;
            inputs.insert(*node_id, value);
        }

        Ok(inputs)
    }
}

/// A mock executor that can be configured to succeed or fail.
pub struct MockExecutor {
    /// If set, all executions fail with this error.
    pub fail_with: Option<NodeExecutionError>,
    /// The output returned on success.
    pub output: JsonValue,
}

impl MockExecutor {
    /// Creates a mock executor that succeeds with the given output.
    #[must_use]
    pub fn succeeding(output: JsonValue) -> Self {
        Self {
            fail_with: None,
            output,
        }
    }

    /// Creates a mock executor that fails with the given error.
    #[must_use]
    pub fn failing(error: NodeExecutionError) -> Self {
        Self {
            fail_with: Some(error),
            output: JsonValue::Null,
        }
    }
}

#[async_trait]
impl NodeExecutor for MockExecutor {
    async fn execute(
        &self,
        _node: &Node,
        _inputs: NodeInputs,
    ) -> Result<JsonValue, NodeExecutionError> {
        match &self.fail_with {
            Some(e) => Err(e.clone()),
            None => Ok(self.output.clone()),
        }
    }
}

/// In-memory object store for tests and single-node deployments.
#[derive(Default)]
pub struct InMemoryObjectStore {
    data: std::sync::Mutex<HashMap<String, Vec<u8>>>,
    counter: std::sync::atomic::AtomicU64,
}

impl InMemoryObjectStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put(&self, data: &[u8]) -> Result<String, ObjectStoreError> {
        let n = self
            .counter
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let key = format!("obj_{n}");
        self.data
            .lock()
            .expect("object store lock")
            .insert(key.clone(), data.to_vec());
        Ok(key)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        self.data
            .lock()
            .expect("object store lock")
            .get(key)
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound {
                key: key.to_string(),
            })
    }

    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        self.data.lock().expect("object store lock").remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{
        ConditionCombinator, ConditionalCase, ConditionalConfig, NodeConfig, TransformConfig,
    };
    use flowdeck_core::WorkflowRunId;

    fn transform_node() -> Node {
        Node::new(
            "Shape",
            NodeConfig::Transform(TransformConfig {
                template: serde_json::json!({}),
            }),
        )
    }

    fn conditional_node() -> Node {
        Node::new(
            "Router",
            NodeConfig::Conditional(ConditionalConfig {
                cases: vec![ConditionalCase {
                    branch: "yes".to_string(),
                    combinator: ConditionCombinator::And,
                    conditions: vec![],
                }],
                fallback_branch: None,
            }),
        )
    }

    fn work_item(node: &Node, inputs: HashMap<NodeId, String>) -> WorkItem {
        WorkItem {
            run_id: WorkflowRunId::new(),
            workflow_id: WorkflowId::new(),
            node_id: node.id,
            run_input: None,
            variables: Default::default(),
            inputs,
        }
    }

    #[tokio::test]
    async fn worker_processes_work_item_successfully() {
        let object_store = InMemoryObjectStore::new();
        let upstream = NodeId::new();
        let input_key = object_store
            .put(&serde_json::to_vec(&serde_json::json!({"data": "test"})).unwrap())
            .await
            .unwrap();

        let executor = MockExecutor::succeeding(serde_json::json!({"result": "success"}));
        let worker = Worker::new(object_store, executor);

        let node = transform_node();
        let item = work_item(&node, [(upstream, input_key)].into_iter().collect());

        match worker.process(item.clone(), &node).await {
            WorkItemResult::Completed {
                run_id,
                node_id,
                output_key,
                branch,
            } => {
                assert_eq!(run_id, item.run_id);
                assert_eq!(node_id, item.node_id);
                assert!(!output_key.is_empty());
                assert!(branch.is_none());
            }
            WorkItemResult::Failed { error, .. } => {
                panic!("expected success, got failure: {error}");
            }
        }
    }

    #[tokio::test]
    async fn worker_reports_execution_failure() {
        let worker = Worker::new(
            InMemoryObjectStore::new(),
            MockExecutor::failing(NodeExecutionError::ExecutionFailed {
                message: "test error".to_string(),
            }),
        );

        let node = transform_node();
        let item = work_item(&node, HashMap::new());

        match worker.process(item, &node).await {
            WorkItemResult::Failed { error, .. } => {
                assert!(error.contains("test error"));
            }
            WorkItemResult::Completed { .. } => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn worker_fails_on_missing_input_key() {
        let worker = Worker::new(
            InMemoryObjectStore::new(),
            MockExecutor::succeeding(serde_json::json!({})),
        );

        let node = transform_node();
        let item = work_item(
            &node,
            [(NodeId::new(), "nonexistent_key".to_string())]
                .into_iter()
                .collect(),
        );

        match worker.process(item, &node).await {
            WorkItemResult::Failed { error, .. } => {
                assert!(error.contains("not found"));
            }
            WorkItemResult::Completed { .. } => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn worker_extracts_conditional_branch() {
        let worker = Worker::new(
            InMemoryObjectStore::new(),
            MockExecutor::succeeding(serde_json::json!({"branch": "yes", "input": {}})),
        );

        let node = conditional_node();
        let item = work_item(&node, HashMap::new());

        match worker.process(item, &node).await {
            WorkItemResult::Completed { branch, .. } => {
                assert_eq!(branch.as_deref(), Some("yes"));
            }
            WorkItemResult::Failed { error, .. } => panic!("unexpected failure: {error}"),
        }
    }

    #[tokio::test]
    async fn worker_stores_output_in_object_store() {
        let worker = Worker::new(
            InMemoryObjectStore::new(),
            MockExecutor::succeeding(serde_json::json!({"output": "data"})),
        );

        let node = transform_node();
        let item = work_item(&node, HashMap::new());

        if let WorkItemResult::Completed { output_key, .. } = worker.process(item, &node).await {
            let stored = worker.object_store.get(&output_key).await.unwrap();
            let value: JsonValue = serde_json::from_slice(&stored).unwrap();
            assert_eq!(value["output"], "data");
        } else {
            panic!("expected success");
        }
    }
}
