//! Execution context for node evaluation.
//!
//! The context holds everything interpolation can see: the trigger input,
//! outputs of completed nodes, workflow variables, and (inside for-each
//! bodies) the current item bindings.

use flowdeck_core::WorkflowId;
use flowdeck_workflow::node::NodeId;
use flowdeck_workflow::worker::NodeInputs;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};

/// The data visible to a single node execution.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    workflow_id: WorkflowId,
    run_input: Option<JsonValue>,
    outputs: HashMap<NodeId, JsonValue>,
    variables: BTreeMap<String, JsonValue>,
    item: Option<JsonValue>,
    index: Option<usize>,
}

impl ExecutionContext {
    /// Builds a context from the inputs assembled by the worker.
    #[must_use]
    pub fn new(inputs: NodeInputs) -> Self {
        Self {
            workflow_id: inputs.workflow_id,
            run_input: inputs.run_input,
            outputs: inputs.outputs,
            variables: inputs.variables,
            item: None,
            index: None,
        }
    }

    /// Returns the workflow being executed.
    #[must_use]
    pub fn workflow_id(&self) -> WorkflowId {
        self.workflow_id
    }

    /// Returns the trigger input.
    #[must_use]
    pub fn run_input(&self) -> Option<&JsonValue> {
        self.run_input.as_ref()
    }

    /// Derives a context with `{{item}}` / `{{index}}` bound, for one
    /// for-each iteration.
    #[must_use]
    pub fn with_item(&self, item: JsonValue, index: usize) -> Self {
        let mut ctx = self.clone();
        ctx.item = Some(item);
        ctx.index = Some(index);
        ctx
    }

    /// Resolves a dotted reference against the context.
    ///
    /// Supported roots: `trigger`, `vars`, `node`, `item`, `index`.
    /// Returns `None` when any segment is missing.
    #[must_use]
    pub fn lookup(&self, reference: &str) -> Option<JsonValue> {
        let mut segments = reference.split('.');
        let root = segments.next()?;

        match root {
            "trigger" => walk(self.run_input.as_ref()?, segments),
            "vars" => {
                let name = segments.next()?;
                walk(self.variables.get(name)?, segments)
            }
            "node" => {
                let id: NodeId = segments.next()?.parse().ok()?;
                walk(self.outputs.get(&id)?, segments)
            }
            "item" => walk(self.item.as_ref()?, segments),
            "index" => {
                if segments.next().is_some() {
                    return None;
                }
                self.index.map(|i| JsonValue::from(i as u64))
            }
            _ => None,
        }
    }
}

/// Walks the remaining path segments into a JSON value.
///
/// Object segments index by key; numeric segments index into arrays.
fn walk<'a>(value: &JsonValue, segments: impl Iterator<Item = &'a str>) -> Option<JsonValue> {
    let mut current = value;
    for segment in segments {
        current = match current {
            JsonValue::Object(map) => map.get(segment)?,
            JsonValue::Array(items) => {
                let index: usize = segment.parse().ok()?;
                items.get(index)?
            }
            _ => return None,
        };
    }
    Some(current.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> ExecutionContext {
        let node_id: NodeId = "node_01J9ZZZZZZZZZZZZZZZZZZZZZZ".parse().unwrap_or_default();
        let mut outputs = HashMap::new();
        outputs.insert(
            node_id,
            serde_json::json!({"status": 200, "body": {"items": ["a", "b"]}}),
        );

        let mut variables = BTreeMap::new();
        variables.insert(
            "api_base".to_string(),
            serde_json::json!("https://api.example.com"),
        );

        ExecutionContext::new(NodeInputs {
            workflow_id: WorkflowId::new(),
            run_input: Some(serde_json::json!({"user": {"email": "a@example.com"}})),
            variables,
            outputs,
        })
    }

    fn first_output_id(ctx: &ExecutionContext) -> NodeId {
        *ctx.outputs.keys().next().expect("one output")
    }

    #[test]
    fn lookup_trigger_path() {
        let ctx = context();
        assert_eq!(
            ctx.lookup("trigger.user.email"),
            Some(serde_json::json!("a@example.com"))
        );
    }

    #[test]
    fn lookup_variable() {
        let ctx = context();
        assert_eq!(
            ctx.lookup("vars.api_base"),
            Some(serde_json::json!("https://api.example.com"))
        );
    }

    #[test]
    fn lookup_node_output_with_array_index() {
        let ctx = context();
        let id = first_output_id(&ctx);
        assert_eq!(
            ctx.lookup(&format!("node.{id}.body.items.1")),
            Some(serde_json::json!("b"))
        );
    }

    #[test]
    fn lookup_missing_returns_none() {
        let ctx = context();
        assert_eq!(ctx.lookup("trigger.user.phone"), None);
        assert_eq!(ctx.lookup("vars.missing"), None);
        assert_eq!(ctx.lookup("nonsense.path"), None);
    }

    #[test]
    fn item_bindings_only_inside_for_each() {
        let ctx = context();
        assert_eq!(ctx.lookup("item"), None);
        assert_eq!(ctx.lookup("index"), None);

        let iter_ctx = ctx.with_item(serde_json::json!({"sku": "x1"}), 3);
        assert_eq!(iter_ctx.lookup("item.sku"), Some(serde_json::json!("x1")));
        assert_eq!(iter_ctx.lookup("index"), Some(serde_json::json!(3)));
    }
}
