//! Port system for workflow nodes.
//!
//! Ports are named connection points on nodes. Each port carries a JSON
//! Schema describing the data it accepts (input) or produces (output).
//! An edge is valid when the source port's schema is compatible with the
//! target port's schema.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A JSON Schema describing the data type for a port.
///
/// This is a structural wrapper around a JSON Schema object. Compatibility
/// checking is intentionally shallow: it compares top-level `type` fields and
/// treats the empty schema as "any".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSchema {
    /// The JSON Schema definition.
    #[serde(flatten)]
    pub schema: JsonValue,
}

impl PortSchema {
    /// Creates a schema that accepts any value.
    #[must_use]
    pub fn any() -> Self {
        Self {
            schema: serde_json::json!({}),
        }
    }

    /// Creates a schema for a string type.
    #[must_use]
    pub fn string() -> Self {
        Self {
            schema: serde_json::json!({ "type": "string" }),
        }
    }

    /// Creates a schema for a number type.
    #[must_use]
    pub fn number() -> Self {
        Self {
            schema: serde_json::json!({ "type": "number" }),
        }
    }

    /// Creates a schema for a boolean type.
    #[must_use]
    pub fn boolean() -> Self {
        Self {
            schema: serde_json::json!({ "type": "boolean" }),
        }
    }

    /// Creates a schema for an object type.
    #[must_use]
    pub fn object() -> Self {
        Self {
            schema: serde_json::json!({ "type": "object" }),
        }
    }

    /// Creates a schema for an array type.
    #[must_use]
    pub fn array() -> Self {
        Self {
            schema: serde_json::json!({ "type": "array" }),
        }
    }

    /// Creates a schema from a raw JSON value.
    #[must_use]
    pub fn from_json(schema: JsonValue) -> Self {
        Self { schema }
    }

    /// Returns the top-level `type` declared by this schema, if any.
    #[must_use]
    pub fn declared_type(&self) -> Option<&str> {
        self.schema.get("type").and_then(JsonValue::as_str)
    }

    /// Checks if data matching this schema can flow into a port with the
    /// other schema.
    ///
    /// The check is shallow: an empty schema on either side is compatible
    /// with everything, `integer` output satisfies a `number` input, and
    /// otherwise the top-level types must match. Schemas without a top-level
    /// `type` are assumed compatible.
    #[must_use]
    pub fn is_compatible_with(&self, other: &Self) -> bool {
        match (self.declared_type(), other.declared_type()) {
            (Some(source), Some(target)) => {
                source == target || (source == "integer" && target == "number")
            }
            // Either side is untyped or "any"
            _ => true,
        }
    }
}

impl Default for PortSchema {
    fn default() -> Self {
        Self::any()
    }
}

/// An input port on a workflow node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputPort {
    /// The name of this port.
    pub name: String,
    /// The JSON Schema defining accepted data types.
    pub schema: PortSchema,
    /// Whether this input is required (must have an incoming edge).
    pub required: bool,
}

impl InputPort {
    /// Creates a new required input port.
    #[must_use]
    pub fn required(name: impl Into<String>, schema: PortSchema) -> Self {
        Self {
            name: name.into(),
            schema,
            required: true,
        }
    }

    /// Creates a new optional input port.
    #[must_use]
    pub fn optional(name: impl Into<String>, schema: PortSchema) -> Self {
        Self {
            name: name.into(),
            schema,
            required: false,
        }
    }
}

/// An output port on a workflow node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPort {
    /// The name of this port.
    pub name: String,
    /// The JSON Schema defining the produced data type.
    pub schema: PortSchema,
}

impl OutputPort {
    /// Creates a new output port.
    #[must_use]
    pub fn new(name: impl Into<String>, schema: PortSchema) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_schema_compatible_with_all() {
        let any = PortSchema::any();
        assert!(any.is_compatible_with(&PortSchema::string()));
        assert!(PortSchema::number().is_compatible_with(&any));
    }

    #[test]
    fn same_type_compatible() {
        assert!(PortSchema::string().is_compatible_with(&PortSchema::string()));
        assert!(PortSchema::array().is_compatible_with(&PortSchema::array()));
    }

    #[test]
    fn different_types_not_compatible() {
        assert!(!PortSchema::string().is_compatible_with(&PortSchema::number()));
        assert!(!PortSchema::object().is_compatible_with(&PortSchema::array()));
    }

    #[test]
    fn integer_flows_into_number() {
        let int = PortSchema::from_json(serde_json::json!({ "type": "integer" }));
        assert!(int.is_compatible_with(&PortSchema::number()));
        assert!(!PortSchema::number().is_compatible_with(&int));
    }

    #[test]
    fn input_port_required_flag() {
        assert!(InputPort::required("data", PortSchema::string()).required);
        assert!(!InputPort::optional("config", PortSchema::object()).required);
    }

    #[test]
    fn schema_serde_roundtrip() {
        let schema = PortSchema::object();
        let json = serde_json::to_string(&schema).expect("serialize");
        let parsed: PortSchema = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(schema, parsed);
    }
}
