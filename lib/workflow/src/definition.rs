//! Workflow definition types.
//!
//! A workflow is a named, versioned automation that consists of:
//! - Metadata (name, description, version, timestamps)
//! - A directed graph of nodes
//! - Static variables available to interpolation as `{{vars.*}}`

use crate::error::WorkflowError;
use crate::graph::WorkflowGraph;
use crate::node::{NodeConfig, TriggerNodeConfig};
use crate::trigger::{Trigger, TriggerConfig};
use chrono::{DateTime, Utc};
use flowdeck_core::WorkflowId;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// Metadata for a workflow definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    /// Human-readable name for this workflow.
    pub name: String,
    /// Description of what this workflow does.
    pub description: Option<String>,
    /// Semantic version of this workflow definition.
    pub version: String,
    /// Whether this workflow is enabled.
    pub enabled: bool,
    /// Tags for organization/filtering.
    pub tags: Vec<String>,
    /// When this workflow was created.
    pub created_at: DateTime<Utc>,
    /// When this workflow was last updated.
    pub updated_at: DateTime<Utc>,
}

impl WorkflowMetadata {
    /// Creates new metadata with default values.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            description: None,
            version: "0.1.0".to_string(),
            enabled: true,
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// A complete workflow definition.
///
/// This is the source of truth for a workflow. Triggers are denormalized
/// from the graph into a separate table for efficient lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique identifier for this workflow.
    pub id: WorkflowId,
    /// Workflow metadata.
    pub metadata: WorkflowMetadata,
    /// The workflow graph (nodes and edges).
    pub graph: WorkflowGraph,
    /// Static variables, available to interpolation as `{{vars.<name>}}`.
    #[serde(default)]
    pub variables: BTreeMap<String, JsonValue>,
}

impl Workflow {
    /// Creates a new workflow with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: WorkflowId::new(),
            metadata: WorkflowMetadata::new(name),
            graph: WorkflowGraph::new(),
            variables: BTreeMap::new(),
        }
    }

    /// Creates a workflow with a specific ID.
    #[must_use]
    pub fn with_id(id: WorkflowId, name: impl Into<String>) -> Self {
        Self {
            id,
            metadata: WorkflowMetadata::new(name),
            graph: WorkflowGraph::new(),
            variables: BTreeMap::new(),
        }
    }

    /// Sets a static variable.
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: JsonValue) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    /// Validates the workflow definition.
    ///
    /// Validates the graph structure (single trigger, DAG, required inputs)
    /// and the trigger configuration itself.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn validate(&self) -> Result<(), WorkflowError> {
        self.graph.validate()?;

        for node in self.graph.nodes() {
            let NodeConfig::Trigger(trigger) = &node.config else {
                continue;
            };
            match trigger {
                TriggerNodeConfig::Schedule { cron, .. } => {
                    let parts = cron.split_whitespace().count();
                    if parts != 5 {
                        return Err(WorkflowError::InvalidCronExpression {
                            expression: cron.clone(),
                            reason: format!("expected 5 fields, got {parts}"),
                        });
                    }
                }
                TriggerNodeConfig::Webhook { path, .. } => {
                    if !path.starts_with('/') {
                        return Err(WorkflowError::InvalidWebhookPath { path: path.clone() });
                    }
                }
                TriggerNodeConfig::Manual => {}
            }
        }

        Ok(())
    }

    /// Extracts denormalized trigger records from the graph.
    ///
    /// One record per trigger node. For a valid workflow this is a single
    /// record, but extraction works on unvalidated graphs too.
    #[must_use]
    pub fn triggers(&self) -> Vec<Trigger> {
        self.graph
            .nodes()
            .filter_map(|node| {
                let NodeConfig::Trigger(config) = &node.config else {
                    return None;
                };
                let config = match config {
                    TriggerNodeConfig::Manual => TriggerConfig::Manual,
                    TriggerNodeConfig::Webhook { path, secret } => TriggerConfig::Webhook {
                        path: path.clone(),
                        secret: secret.clone(),
                    },
                    TriggerNodeConfig::Schedule { cron, timezone } => TriggerConfig::Schedule {
                        cron: cron.clone(),
                        timezone: timezone.clone(),
                    },
                };
                Some(Trigger::new(self.id, node.id, config))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::Edge;
    use crate::node::{Node, OutputConfig, TriggerNodeConfig};

    fn linear_workflow(trigger: TriggerNodeConfig) -> Workflow {
        let mut workflow = Workflow::new("Test");
        let start = Node::new("Start", NodeConfig::Trigger(trigger));
        let done = Node::new(
            "Done",
            NodeConfig::Output(OutputConfig {
                template: serde_json::json!("{{trigger}}"),
            }),
        );
        let start_id = start.id;
        let done_id = done.id;
        workflow.graph.add_node(start);
        workflow.graph.add_node(done);
        workflow
            .graph
            .add_edge(start_id, done_id, Edge::default_ports())
            .unwrap();
        workflow
    }

    #[test]
    fn validate_accepts_manual_trigger() {
        let workflow = linear_workflow(TriggerNodeConfig::Manual);
        assert!(workflow.validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_cron() {
        let workflow = linear_workflow(TriggerNodeConfig::Schedule {
            cron: "every day".to_string(),
            timezone: None,
        });
        assert!(matches!(
            workflow.validate(),
            Err(WorkflowError::InvalidCronExpression { .. })
        ));
    }

    #[test]
    fn validate_rejects_bad_webhook_path() {
        let workflow = linear_workflow(TriggerNodeConfig::Webhook {
            path: "hooks/incoming".to_string(),
            secret: None,
        });
        assert!(matches!(
            workflow.validate(),
            Err(WorkflowError::InvalidWebhookPath { .. })
        ));
    }

    #[test]
    fn triggers_are_denormalized() {
        let workflow = linear_workflow(TriggerNodeConfig::Webhook {
            path: "/hooks/incoming".to_string(),
            secret: Some("s3cret".to_string()),
        });
        let triggers = workflow.triggers();
        assert_eq!(triggers.len(), 1);
        assert_eq!(triggers[0].workflow_id, workflow.id);
        match &triggers[0].config {
            TriggerConfig::Webhook { path, .. } => assert_eq!(path, "/hooks/incoming"),
            other => panic!("unexpected trigger config: {other:?}"),
        }
    }

    #[test]
    fn workflow_serde_roundtrip() {
        let workflow = linear_workflow(TriggerNodeConfig::Manual)
            .with_variable("api_base", serde_json::json!("https://api.example.com"));
        let json = serde_json::to_string(&workflow).expect("serialize");
        let mut parsed: Workflow = serde_json::from_str(&json).expect("deserialize");
        parsed.graph.rebuild_index_map();

        assert_eq!(parsed.id, workflow.id);
        assert_eq!(parsed.graph.node_count(), 2);
        assert_eq!(
            parsed.variables.get("api_base"),
            Some(&serde_json::json!("https://api.example.com"))
        );
    }
}
