//! Workflow node types and configurations.
//!
//! Nodes are the building blocks of workflows. Each node has:
//! - A unique ID within the workflow
//! - A kind-specific configuration
//! - Input and output ports derived from that configuration
//!
//! String-valued configuration fields (URLs, prompts, templates, condition
//! operands) may contain `{{...}}` placeholders that are resolved against
//! the run context at execution time.

use crate::port::{InputPort, OutputPort, PortSchema};
use flowdeck_core::ConnectionId;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use ulid::Ulid;

/// A unique identifier for a node within a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Ulid);

impl NodeId {
    /// Creates a new random node ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Creates a node ID from a ULID.
    #[must_use]
    pub const fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node_{}", self.0)
    }
}

impl std::str::FromStr for NodeId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix("node_").unwrap_or(s);
        Ulid::from_string(raw).map(Self)
    }
}

/// The kind of a workflow node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Entry point that initiates workflow execution.
    Trigger,
    /// Outbound HTTP request.
    HttpRequest,
    /// Single-shot LLM inference.
    LlmCall,
    /// Operation against a connected third-party service.
    Integration,
    /// Conditional branching over named cases.
    Conditional,
    /// Map a template over the items of an array.
    ForEach,
    /// Expression-based data reshaping.
    Transform,
    /// Keyed cross-run state operations.
    DataStore,
    /// Terminal node producing the run's final output.
    Output,
}

/// Configuration for trigger nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TriggerNodeConfig {
    /// Manual trigger (user-initiated via the API).
    Manual,
    /// HTTP webhook trigger.
    Webhook {
        /// The webhook path (e.g., "/hooks/my-workflow").
        path: String,
        /// Optional shared secret for webhook validation.
        secret: Option<String>,
    },
    /// Cron-style scheduled trigger. The schedule is stored with the
    /// definition; firing it is delegated to an external scheduler.
    Schedule {
        /// Cron expression (e.g., "0 7 * * *" for 7am daily).
        cron: String,
        /// Timezone for the schedule.
        timezone: Option<String>,
    },
}

/// HTTP method for request nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl HttpMethod {
    /// Returns the method as an uppercase string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        }
    }
}

/// Configuration for HTTP request nodes.
///
/// URL, header values, query values and the body are interpolatable.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HttpRequestConfig {
    /// HTTP method.
    pub method: HttpMethod,
    /// Request URL.
    pub url: String,
    /// Request headers.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Query parameters.
    #[serde(default)]
    pub query: BTreeMap<String, String>,
    /// Optional request body (JSON, interpolated recursively).
    pub body: Option<JsonValue>,
    /// Request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Optional connection whose credential authenticates the request.
    pub connection_id: Option<ConnectionId>,
}

/// Configuration for LLM call nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmCallConfig {
    /// Model identifier (e.g., "claude-sonnet-4-5").
    pub model: String,
    /// The prompt, interpolatable.
    pub prompt: String,
    /// Optional system prompt.
    pub system_prompt: Option<String>,
    /// Temperature for sampling.
    pub temperature: Option<f32>,
    /// Maximum tokens to generate.
    pub max_tokens: Option<u32>,
    /// Optional JSON schema for structured output.
    pub output_schema: Option<JsonValue>,
}

/// Configuration for integration nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationNodeConfig {
    /// The connection providing credentials for this call.
    pub connection_id: ConnectionId,
    /// The integration kind (e.g., "slack", "notion").
    pub integration_kind: String,
    /// The operation to perform (e.g., "post_message", "create_page").
    pub operation: String,
    /// Operation-specific parameters, interpolated recursively.
    #[serde(default)]
    pub parameters: JsonValue,
}

/// How multiple conditions within a case combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionCombinator {
    /// All conditions must hold.
    #[default]
    And,
    /// At least one condition must hold.
    Or,
}

/// Comparison operators for conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    IsEmpty,
    IsNotEmpty,
    IsNull,
    IsNotNull,
    In,
}

impl ComparisonOperator {
    /// Returns true if this operator compares against a right-hand value.
    #[must_use]
    pub fn takes_operand(&self) -> bool {
        !matches!(
            self,
            Self::IsEmpty | Self::IsNotEmpty | Self::IsNull | Self::IsNotNull
        )
    }
}

/// A single condition within a conditional case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Left-hand operand, usually a `{{...}}` placeholder.
    pub lhs: String,
    /// The comparison operator.
    pub operator: ComparisonOperator,
    /// Right-hand operand. Ignored by operators that take no operand.
    pub rhs: Option<JsonValue>,
}

/// A named case within a conditional node.
///
/// The branch name doubles as the node's output port for that case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalCase {
    /// The branch (output port) taken when this case matches.
    pub branch: String,
    /// How the conditions combine.
    #[serde(default)]
    pub combinator: ConditionCombinator,
    /// The conditions to evaluate.
    pub conditions: Vec<Condition>,
}

/// Configuration for conditional nodes.
///
/// Cases are evaluated in order; the first match selects the branch. When
/// no case matches and no fallback is declared, the node completes with no
/// branch selected and every labeled successor is skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionalConfig {
    /// The cases, evaluated in order.
    pub cases: Vec<ConditionalCase>,
    /// Branch taken when no case matches.
    pub fallback_branch: Option<String>,
}

/// Configuration for for-each (loop) nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForEachConfig {
    /// Expression resolving to the array to iterate.
    pub items: String,
    /// Template applied to each element. `{{item}}` and `{{index}}` are
    /// bound per iteration.
    pub item_template: JsonValue,
}

/// Configuration for transform nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformConfig {
    /// JSON template resolved recursively against the run context.
    pub template: JsonValue,
}

/// Data store operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataStoreOperation {
    /// Read the value under the key (null when absent).
    Get,
    /// Write the value under the key.
    Set,
    /// Remove the key.
    Delete,
    /// Append the value to the array under the key.
    Append,
}

/// Scope for data store keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataStoreScope {
    /// Keys are namespaced per workflow.
    #[default]
    Workflow,
    /// Keys are shared across all workflows.
    Global,
}

/// Configuration for data store nodes (cross-run keyed state).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataStoreNodeConfig {
    /// The operation to perform.
    pub operation: DataStoreOperation,
    /// The key, interpolatable.
    pub key: String,
    /// The value for Set/Append, interpolated recursively.
    pub value: Option<JsonValue>,
    /// Key scope.
    #[serde(default)]
    pub scope: DataStoreScope,
}

/// Configuration for output nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Template for the run's final output, interpolated recursively.
    pub template: JsonValue,
}

/// Configuration for a node, varying by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeConfig {
    /// Trigger node configuration.
    Trigger(TriggerNodeConfig),
    /// HTTP request node configuration.
    HttpRequest(HttpRequestConfig),
    /// LLM call node configuration.
    LlmCall(LlmCallConfig),
    /// Integration node configuration.
    Integration(IntegrationNodeConfig),
    /// Conditional node configuration.
    Conditional(ConditionalConfig),
    /// For-each node configuration.
    ForEach(ForEachConfig),
    /// Transform node configuration.
    Transform(TransformConfig),
    /// Data store node configuration.
    DataStore(DataStoreNodeConfig),
    /// Output node configuration.
    Output(OutputConfig),
}

impl NodeConfig {
    /// Returns the kind of this node configuration.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Trigger(_) => NodeKind::Trigger,
            Self::HttpRequest(_) => NodeKind::HttpRequest,
            Self::LlmCall(_) => NodeKind::LlmCall,
            Self::Integration(_) => NodeKind::Integration,
            Self::Conditional(_) => NodeKind::Conditional,
            Self::ForEach(_) => NodeKind::ForEach,
            Self::Transform(_) => NodeKind::Transform,
            Self::DataStore(_) => NodeKind::DataStore,
            Self::Output(_) => NodeKind::Output,
        }
    }
}

/// A workflow node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier for this node within the workflow.
    pub id: NodeId,
    /// Human-readable name for this node.
    pub name: String,
    /// Node configuration (determines kind and behavior).
    pub config: NodeConfig,
    /// Input ports for this node.
    pub inputs: Vec<InputPort>,
    /// Output ports for this node.
    pub outputs: Vec<OutputPort>,
}

impl Node {
    /// Creates a new node with the given configuration and default ports.
    #[must_use]
    pub fn new(name: impl Into<String>, config: NodeConfig) -> Self {
        let (inputs, outputs) = Self::default_ports(&config);
        Self {
            id: NodeId::new(),
            name: name.into(),
            config,
            inputs,
            outputs,
        }
    }

    /// Creates a new node with a specific ID.
    #[must_use]
    pub fn with_id(id: NodeId, name: impl Into<String>, config: NodeConfig) -> Self {
        let (inputs, outputs) = Self::default_ports(&config);
        Self {
            id,
            name: name.into(),
            config,
            inputs,
            outputs,
        }
    }

    /// Returns the kind of this node.
    #[must_use]
    pub fn kind(&self) -> NodeKind {
        self.config.kind()
    }

    /// Returns the input port with the given name, if any.
    #[must_use]
    pub fn input_port(&self, name: &str) -> Option<&InputPort> {
        self.inputs.iter().find(|p| p.name == name)
    }

    /// Returns the output port with the given name, if any.
    #[must_use]
    pub fn output_port(&self, name: &str) -> Option<&OutputPort> {
        self.outputs.iter().find(|p| p.name == name)
    }

    /// Generates default ports based on node configuration.
    fn default_ports(config: &NodeConfig) -> (Vec<InputPort>, Vec<OutputPort>) {
        match config {
            NodeConfig::Trigger(_) => {
                // Triggers have no inputs, one output
                (vec![], vec![OutputPort::new("output", PortSchema::any())])
            }
            NodeConfig::HttpRequest(_) => (
                vec![InputPort::optional("input", PortSchema::any())],
                vec![OutputPort::new("output", PortSchema::object())],
            ),
            NodeConfig::LlmCall(config) => (
                vec![InputPort::required("input", PortSchema::any())],
                vec![OutputPort::new(
                    "output",
                    config
                        .output_schema
                        .clone()
                        .map_or_else(PortSchema::object, PortSchema::from_json),
                )],
            ),
            NodeConfig::Integration(_) => (
                vec![InputPort::optional("input", PortSchema::any())],
                vec![OutputPort::new("output", PortSchema::any())],
            ),
            NodeConfig::Conditional(config) => {
                let mut outputs: Vec<OutputPort> = config
                    .cases
                    .iter()
                    .map(|c| OutputPort::new(&c.branch, PortSchema::any()))
                    .collect();
                if let Some(fallback) = &config.fallback_branch
                    && !outputs.iter().any(|p| &p.name == fallback)
                {
                    outputs.push(OutputPort::new(fallback, PortSchema::any()));
                }
                (
                    vec![InputPort::required("input", PortSchema::any())],
                    outputs,
                )
            }
            NodeConfig::ForEach(_) => (
                vec![InputPort::required("input", PortSchema::any())],
                vec![OutputPort::new("items", PortSchema::array())],
            ),
            NodeConfig::Transform(_) => (
                vec![InputPort::required("input", PortSchema::any())],
                vec![OutputPort::new("output", PortSchema::any())],
            ),
            NodeConfig::DataStore(_) => (
                vec![InputPort::optional("input", PortSchema::any())],
                vec![OutputPort::new("output", PortSchema::any())],
            ),
            NodeConfig::Output(_) => {
                // Terminal: consumes input, produces the run output
                (vec![InputPort::required("input", PortSchema::any())], vec![])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_display() {
        let id = NodeId::new();
        assert!(id.to_string().starts_with("node_"));
    }

    #[test]
    fn node_id_parses_both_forms() {
        let ulid = Ulid::new();
        let id = NodeId::from_ulid(ulid);
        let parsed: NodeId = id.to_string().parse().expect("prefixed form");
        assert_eq!(id, parsed);
        let parsed: NodeId = ulid.to_string().parse().expect("raw form");
        assert_eq!(id, parsed);
    }

    #[test]
    fn trigger_node_has_no_inputs() {
        let node = Node::new("Manual Start", NodeConfig::Trigger(TriggerNodeConfig::Manual));
        assert!(node.inputs.is_empty());
        assert_eq!(node.outputs.len(), 1);
        assert_eq!(node.outputs[0].name, "output");
    }

    #[test]
    fn conditional_node_has_branch_outputs() {
        let node = Node::new(
            "Router",
            NodeConfig::Conditional(ConditionalConfig {
                cases: vec![
                    ConditionalCase {
                        branch: "urgent".to_string(),
                        combinator: ConditionCombinator::And,
                        conditions: vec![Condition {
                            lhs: "{{trigger.priority}}".to_string(),
                            operator: ComparisonOperator::Gt,
                            rhs: Some(serde_json::json!(3)),
                        }],
                    },
                    ConditionalCase {
                        branch: "routine".to_string(),
                        combinator: ConditionCombinator::And,
                        conditions: vec![],
                    },
                ],
                fallback_branch: Some("other".to_string()),
            }),
        );
        assert_eq!(node.inputs.len(), 1);
        let ports: Vec<_> = node.outputs.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(ports, vec!["urgent", "routine", "other"]);
    }

    #[test]
    fn output_node_is_terminal() {
        let node = Node::new(
            "Done",
            NodeConfig::Output(OutputConfig {
                template: serde_json::json!({"result": "{{node.abc.output}}"}),
            }),
        );
        assert_eq!(node.inputs.len(), 1);
        assert!(node.outputs.is_empty());
    }

    #[test]
    fn operator_operand_arity() {
        assert!(ComparisonOperator::Eq.takes_operand());
        assert!(ComparisonOperator::In.takes_operand());
        assert!(!ComparisonOperator::IsEmpty.takes_operand());
        assert!(!ComparisonOperator::IsNull.takes_operand());
    }

    #[test]
    fn node_serde_roundtrip() {
        let node = Node::new(
            "Fetch",
            NodeConfig::HttpRequest(HttpRequestConfig {
                method: HttpMethod::Post,
                url: "https://api.example.com/items".to_string(),
                body: Some(serde_json::json!({"name": "{{trigger.name}}"})),
                ..Default::default()
            }),
        );
        let json = serde_json::to_string(&node).expect("serialize");
        let parsed: Node = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(node, parsed);
    }

    #[test]
    fn http_method_serializes_uppercase() {
        let json = serde_json::to_string(&HttpMethod::Delete).expect("serialize");
        assert_eq!(json, "\"DELETE\"");
    }
}
