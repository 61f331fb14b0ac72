//! Node configuration catalog.
//!
//! The canvas builds its palette and configuration forms from this
//! endpoint instead of hardcoding node shapes client-side.

use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use flowdeck_integration::Connector;
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;

/// `GET /api/node-types`
pub async fn catalog(State(state): State<Arc<AppState>>) -> Json<JsonValue> {
    let connectors: Vec<JsonValue> = state
        .connectors
        .kinds()
        .into_iter()
        .filter_map(|kind| state.connectors.get(&kind))
        .map(|connector| serde_json::to_value(connector.info()).unwrap_or(JsonValue::Null))
        .collect();

    Json(json!({
        "node_types": node_type_catalog(),
        "connectors": connectors,
        "oauth_providers": state.oauth.registry().keys(),
    }))
}

/// Static catalog of node kinds and their configuration fields.
fn node_type_catalog() -> JsonValue {
    json!([
        {
            "kind": "trigger",
            "name": "Trigger",
            "description": "Starts the workflow (manual, webhook, or schedule)",
            "config": {
                "type": { "type": "string", "enum": ["manual", "webhook", "schedule"] },
                "path": { "type": "string", "description": "Webhook path" },
                "cron": { "type": "string", "description": "Cron expression" }
            }
        },
        {
            "kind": "http_request",
            "name": "HTTP Request",
            "description": "Calls an HTTP endpoint",
            "config": {
                "method": { "type": "string", "enum": ["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD"] },
                "url": { "type": "string", "interpolated": true },
                "headers": { "type": "object", "interpolated": true },
                "query": { "type": "object", "interpolated": true },
                "body": { "type": "object", "interpolated": true },
                "timeout_secs": { "type": "integer" },
                "connection_id": { "type": "string", "description": "Optional connection for auth" }
            }
        },
        {
            "kind": "llm_call",
            "name": "LLM Call",
            "description": "Single-shot LLM inference",
            "config": {
                "model": { "type": "string" },
                "prompt": { "type": "string", "interpolated": true },
                "system_prompt": { "type": "string", "interpolated": true },
                "temperature": { "type": "number" },
                "max_tokens": { "type": "integer" },
                "output_schema": { "type": "object" }
            }
        },
        {
            "kind": "integration",
            "name": "Integration",
            "description": "Calls a connected third-party service",
            "config": {
                "connection_id": { "type": "string" },
                "integration_kind": { "type": "string" },
                "operation": { "type": "string" },
                "parameters": { "type": "object", "interpolated": true }
            }
        },
        {
            "kind": "conditional",
            "name": "Conditional",
            "description": "Routes execution through the first matching case",
            "config": {
                "cases": { "type": "array" },
                "fallback_branch": { "type": "string" }
            }
        },
        {
            "kind": "for_each",
            "name": "For Each",
            "description": "Maps a template over the items of an array",
            "config": {
                "items": { "type": "string", "interpolated": true },
                "item_template": { "type": "object", "interpolated": true }
            }
        },
        {
            "kind": "transform",
            "name": "Transform",
            "description": "Reshapes data with an interpolated template",
            "config": {
                "template": { "type": "object", "interpolated": true }
            }
        },
        {
            "kind": "data_store",
            "name": "Data Store",
            "description": "Reads and writes keyed state that outlives a run",
            "config": {
                "operation": { "type": "string", "enum": ["get", "set", "delete", "append"] },
                "key": { "type": "string", "interpolated": true },
                "value": { "type": "object", "interpolated": true },
                "scope": { "type": "string", "enum": ["workflow", "global"] }
            }
        },
        {
            "kind": "output",
            "name": "Output",
            "description": "Produces the run's final output",
            "config": {
                "template": { "type": "object", "interpolated": true }
            }
        }
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_covers_every_node_kind() {
        let catalog = node_type_catalog();
        let kinds: Vec<&str> = catalog
            .as_array()
            .expect("array")
            .iter()
            .filter_map(|entry| entry["kind"].as_str())
            .collect();

        assert_eq!(
            kinds,
            vec![
                "trigger",
                "http_request",
                "llm_call",
                "integration",
                "conditional",
                "for_each",
                "transform",
                "data_store",
                "output",
            ]
        );
    }
}
