//! Trigger types for workflow initiation.
//!
//! Triggers are nodes in the workflow graph that serve as entry points.
//! They are denormalized out of the graph into standalone records so
//! dispatchers (webhook path routing, schedule scanning) can work without
//! walking node configurations.

use crate::node::NodeId;
use chrono::{DateTime, Utc};
use flowdeck_core::{TriggerId, WorkflowId};
use serde::{Deserialize, Serialize};

/// The type of trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    /// Manual trigger (user-initiated via the API).
    Manual,
    /// HTTP webhook trigger.
    Webhook,
    /// Time-based trigger with a cron expression.
    Schedule,
}

/// Configuration for a trigger, as carried by denormalized records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerConfig {
    /// Manual trigger.
    Manual,
    /// HTTP webhook trigger.
    Webhook {
        /// The webhook path (e.g., "/hooks/my-workflow").
        path: String,
        /// Optional shared secret for webhook validation.
        secret: Option<String>,
    },
    /// Cron-style scheduled trigger. Stored for an external scheduler to
    /// read; this system does not fire schedules itself.
    Schedule {
        /// Cron expression (e.g., "0 7 * * *" for 7am daily).
        cron: String,
        /// Timezone for the schedule.
        timezone: Option<String>,
    },
}

impl TriggerConfig {
    /// Returns the trigger type.
    #[must_use]
    pub fn trigger_type(&self) -> TriggerType {
        match self {
            Self::Manual => TriggerType::Manual,
            Self::Webhook { .. } => TriggerType::Webhook,
            Self::Schedule { .. } => TriggerType::Schedule,
        }
    }
}

/// A denormalized trigger record for efficient lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    /// Unique identifier for this trigger.
    pub id: TriggerId,
    /// The workflow this trigger belongs to.
    pub workflow_id: WorkflowId,
    /// The node in the workflow graph this trigger corresponds to.
    pub node_id: NodeId,
    /// Trigger configuration.
    pub config: TriggerConfig,
    /// Whether this trigger is active.
    pub enabled: bool,
    /// When this trigger was created.
    pub created_at: DateTime<Utc>,
}

impl Trigger {
    /// Creates a new enabled trigger.
    #[must_use]
    pub fn new(workflow_id: WorkflowId, node_id: NodeId, config: TriggerConfig) -> Self {
        Self {
            id: TriggerId::new(),
            workflow_id,
            node_id,
            config,
            enabled: true,
            created_at: Utc::now(),
        }
    }

    /// Returns the trigger type.
    #[must_use]
    pub fn trigger_type(&self) -> TriggerType {
        self.config.trigger_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_type_mapping() {
        assert_eq!(TriggerConfig::Manual.trigger_type(), TriggerType::Manual);
        assert_eq!(
            TriggerConfig::Webhook {
                path: "/hooks/x".to_string(),
                secret: None,
            }
            .trigger_type(),
            TriggerType::Webhook
        );
        assert_eq!(
            TriggerConfig::Schedule {
                cron: "0 7 * * *".to_string(),
                timezone: None,
            }
            .trigger_type(),
            TriggerType::Schedule
        );
    }

    #[test]
    fn trigger_serde_roundtrip() {
        let trigger = Trigger::new(
            WorkflowId::new(),
            NodeId::new(),
            TriggerConfig::Schedule {
                cron: "0 7 * * *".to_string(),
                timezone: Some("America/Los_Angeles".to_string()),
            },
        );
        let json = serde_json::to_string(&trigger).expect("serialize");
        let parsed: Trigger = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(trigger, parsed);
    }
}
