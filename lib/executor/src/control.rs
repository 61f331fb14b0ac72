//! Pure executors: trigger, conditional, for-each, transform, output.
//!
//! These evaluate entirely against the execution context. Outputs are
//! plain JSON shaped for downstream interpolation.

use crate::condition::select_branch;
use crate::context::ExecutionContext;
use crate::interpolate::{resolve_json, resolve_template};
use flowdeck_workflow::node::{ConditionalConfig, ForEachConfig, OutputConfig, TransformConfig};
use flowdeck_workflow::worker::NodeExecutionError;
use serde_json::Value as JsonValue;

/// Trigger nodes pass the run input through as their output.
#[must_use]
pub fn execute_trigger(ctx: &ExecutionContext) -> JsonValue {
    ctx.run_input().cloned().unwrap_or(JsonValue::Null)
}

/// Evaluates a conditional node.
///
/// Output: `{ "branch": <selected-or-null> }`. The worker lifts `branch`
/// into the completion result so the orchestrator can skip untaken paths.
#[must_use]
pub fn execute_conditional(ctx: &ExecutionContext, config: &ConditionalConfig) -> JsonValue {
    match select_branch(ctx, config) {
        Some(branch) => serde_json::json!({ "branch": branch }),
        None => serde_json::json!({ "branch": JsonValue::Null }),
    }
}

/// Evaluates a for-each node.
///
/// Resolves `items` to an array, maps the item template over each element
/// with `{{item}}`/`{{index}}` bound, and outputs `{ "items": [...] }`.
/// An empty input array yields an empty output array.
pub fn execute_for_each(
    ctx: &ExecutionContext,
    config: &ForEachConfig,
) -> Result<JsonValue, NodeExecutionError> {
    let items = resolve_template(ctx, &config.items).map_err(|e| {
        NodeExecutionError::UnresolvedReference {
            message: e.to_string(),
        }
    })?;

    let JsonValue::Array(items) = items else {
        return Err(NodeExecutionError::InvalidInput {
            message: format!("for_each items must resolve to an array, got {items}"),
        });
    };

    let mut mapped = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        let iteration = ctx.with_item(item, index);
        let value = resolve_json(&iteration, &config.item_template).map_err(|e| {
            NodeExecutionError::UnresolvedReference {
                message: format!("iteration {index}: {e}"),
            }
        })?;
        mapped.push(value);
    }

    Ok(serde_json::json!({ "items": mapped }))
}

/// Evaluates a transform node: the template resolved against the context.
pub fn execute_transform(
    ctx: &ExecutionContext,
    config: &TransformConfig,
) -> Result<JsonValue, NodeExecutionError> {
    resolve_json(ctx, &config.template).map_err(|e| NodeExecutionError::UnresolvedReference {
        message: e.to_string(),
    })
}

/// Evaluates an output node: the run's final payload.
pub fn execute_output(
    ctx: &ExecutionContext,
    config: &OutputConfig,
) -> Result<JsonValue, NodeExecutionError> {
    resolve_json(ctx, &config.template).map_err(|e| NodeExecutionError::UnresolvedReference {
        message: e.to_string(),
    })
}
