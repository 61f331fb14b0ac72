//! Condition evaluation for conditional nodes.
//!
//! Cases are evaluated in declaration order; the first matching case wins.
//! Operand resolution is forgiving: a reference that does not resolve
//! behaves as an absent value (null-ish), it does not fail the node —
//! canvases routinely test fields that only some payloads carry.

use crate::context::ExecutionContext;
use crate::interpolate::resolve_json;
use flowdeck_workflow::node::{
    ComparisonOperator, Condition, ConditionCombinator, ConditionalCase, ConditionalConfig,
};
use serde_json::Value as JsonValue;

/// Selects the branch for a conditional node.
///
/// Returns the first matching case's branch, the fallback branch when no
/// case matches, or `None` when there is no fallback either.
#[must_use]
pub fn select_branch(ctx: &ExecutionContext, config: &ConditionalConfig) -> Option<String> {
    for case in &config.cases {
        if evaluate_case(ctx, case) {
            return Some(case.branch.clone());
        }
    }
    config.fallback_branch.clone()
}

/// Evaluates a single case.
///
/// A case with no conditions always matches (a catch-all branch).
#[must_use]
pub fn evaluate_case(ctx: &ExecutionContext, case: &ConditionalCase) -> bool {
    if case.conditions.is_empty() {
        return true;
    }
    match case.combinator {
        ConditionCombinator::And => case
            .conditions
            .iter()
            .all(|condition| evaluate_condition(ctx, condition)),
        ConditionCombinator::Or => case
            .conditions
            .iter()
            .any(|condition| evaluate_condition(ctx, condition)),
    }
}

/// Evaluates one condition.
#[must_use]
pub fn evaluate_condition(ctx: &ExecutionContext, condition: &Condition) -> bool {
    let lhs = resolve_operand(ctx, &condition.lhs);

    match condition.operator {
        ComparisonOperator::IsNull => is_null(lhs.as_ref()),
        ComparisonOperator::IsNotNull => !is_null(lhs.as_ref()),
        ComparisonOperator::IsEmpty => is_empty(lhs.as_ref()),
        ComparisonOperator::IsNotEmpty => !is_empty(lhs.as_ref()),
        operator => {
            // Operand-taking operators need a present left-hand value.
            let Some(lhs) = lhs else {
                return false;
            };
            if lhs.is_null() {
                return false;
            }
            let rhs = condition
                .rhs
                .as_ref()
                .and_then(|raw| resolve_json(ctx, raw).ok());
            let Some(rhs) = rhs else {
                return false;
            };
            compare(&lhs, operator, &rhs)
        }
    }
}

/// Resolves a condition operand; unresolved references yield `None`.
fn resolve_operand(ctx: &ExecutionContext, raw: &str) -> Option<JsonValue> {
    crate::interpolate::resolve_template(ctx, raw).ok()
}

fn is_null(value: Option<&JsonValue>) -> bool {
    matches!(value, None | Some(JsonValue::Null))
}

fn is_empty(value: Option<&JsonValue>) -> bool {
    match value {
        None | Some(JsonValue::Null) => true,
        Some(JsonValue::String(s)) => s.is_empty(),
        Some(JsonValue::Array(items)) => items.is_empty(),
        Some(JsonValue::Object(map)) => map.is_empty(),
        Some(_) => false,
    }
}

fn compare(lhs: &JsonValue, operator: ComparisonOperator, rhs: &JsonValue) -> bool {
    match operator {
        ComparisonOperator::Eq => values_equal(lhs, rhs),
        ComparisonOperator::NotEq => !values_equal(lhs, rhs),
        ComparisonOperator::Gt => numeric(lhs, rhs).is_some_and(|(a, b)| a > b),
        ComparisonOperator::Gte => numeric(lhs, rhs).is_some_and(|(a, b)| a >= b),
        ComparisonOperator::Lt => numeric(lhs, rhs).is_some_and(|(a, b)| a < b),
        ComparisonOperator::Lte => numeric(lhs, rhs).is_some_and(|(a, b)| a <= b),
        ComparisonOperator::Contains => contains(lhs, rhs),
        ComparisonOperator::NotContains => !contains(lhs, rhs),
        ComparisonOperator::StartsWith => match (lhs, rhs) {
            (JsonValue::String(s), JsonValue::String(prefix)) => s.starts_with(prefix),
            _ => false,
        },
        ComparisonOperator::EndsWith => match (lhs, rhs) {
            (JsonValue::String(s), JsonValue::String(suffix)) => s.ends_with(suffix),
            _ => false,
        },
        ComparisonOperator::In => match rhs {
            JsonValue::Array(items) => items.iter().any(|item| values_equal(lhs, item)),
            _ => false,
        },
        // Nullary operators are handled before compare.
        ComparisonOperator::IsNull
        | ComparisonOperator::IsNotNull
        | ComparisonOperator::IsEmpty
        | ComparisonOperator::IsNotEmpty => false,
    }
}

/// Equality with numeric coercion: `1` equals `1.0`, and a numeric string
/// compares equal to its number (canvas inputs arrive as strings).
fn values_equal(lhs: &JsonValue, rhs: &JsonValue) -> bool {
    if lhs == rhs {
        return true;
    }
    numeric(lhs, rhs).is_some_and(|(a, b)| (a - b).abs() < f64::EPSILON)
}

/// Extracts both sides as f64, parsing numeric strings.
fn numeric(lhs: &JsonValue, rhs: &JsonValue) -> Option<(f64, f64)> {
    Some((as_f64(lhs)?, as_f64(rhs)?))
}

fn as_f64(value: &JsonValue) -> Option<f64> {
    match value {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn contains(lhs: &JsonValue, rhs: &JsonValue) -> bool {
    match lhs {
        JsonValue::String(s) => match rhs {
            JsonValue::String(needle) => s.contains(needle),
            _ => false,
        },
        JsonValue::Array(items) => items.iter().any(|item| values_equal(item, rhs)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowdeck_core::WorkflowId;
    use flowdeck_workflow::worker::NodeInputs;

    fn context() -> ExecutionContext {
        ExecutionContext::new(NodeInputs {
            workflow_id: WorkflowId::new(),
            run_input: Some(serde_json::json!({
                "priority": 5,
                "status": "open",
                "labels": ["bug", "urgent"],
                "description": ""
            })),
            variables: Default::default(),
            outputs: Default::default(),
        })
    }

    fn condition(lhs: &str, operator: ComparisonOperator, rhs: Option<JsonValue>) -> Condition {
        Condition {
            lhs: lhs.to_string(),
            operator,
            rhs,
        }
    }

    #[test]
    fn numeric_comparisons() {
        let ctx = context();
        assert!(evaluate_condition(
            &ctx,
            &condition(
                "{{trigger.priority}}",
                ComparisonOperator::Gt,
                Some(serde_json::json!(3))
            )
        ));
        assert!(!evaluate_condition(
            &ctx,
            &condition(
                "{{trigger.priority}}",
                ComparisonOperator::Lt,
                Some(serde_json::json!(3))
            )
        ));
        // Numeric strings coerce.
        assert!(evaluate_condition(
            &ctx,
            &condition(
                "{{trigger.priority}}",
                ComparisonOperator::Eq,
                Some(serde_json::json!("5"))
            )
        ));
    }

    #[test]
    fn string_operators() {
        let ctx = context();
        assert!(evaluate_condition(
            &ctx,
            &condition(
                "{{trigger.status}}",
                ComparisonOperator::StartsWith,
                Some(serde_json::json!("op"))
            )
        ));
        assert!(evaluate_condition(
            &ctx,
            &condition(
                "{{trigger.status}}",
                ComparisonOperator::In,
                Some(serde_json::json!(["open", "pending"]))
            )
        ));
    }

    #[test]
    fn array_contains() {
        let ctx = context();
        assert!(evaluate_condition(
            &ctx,
            &condition(
                "{{trigger.labels}}",
                ComparisonOperator::Contains,
                Some(serde_json::json!("urgent"))
            )
        ));
        assert!(!evaluate_condition(
            &ctx,
            &condition(
                "{{trigger.labels}}",
                ComparisonOperator::Contains,
                Some(serde_json::json!("feature"))
            )
        ));
    }

    #[test]
    fn null_and_empty_checks() {
        let ctx = context();
        assert!(evaluate_condition(
            &ctx,
            &condition("{{trigger.missing}}", ComparisonOperator::IsNull, None)
        ));
        assert!(evaluate_condition(
            &ctx,
            &condition("{{trigger.description}}", ComparisonOperator::IsEmpty, None)
        ));
        assert!(evaluate_condition(
            &ctx,
            &condition("{{trigger.labels}}", ComparisonOperator::IsNotEmpty, None)
        ));
    }

    #[test]
    fn missing_operand_fails_operand_taking_operators() {
        let ctx = context();
        assert!(!evaluate_condition(
            &ctx,
            &condition(
                "{{trigger.missing}}",
                ComparisonOperator::Eq,
                Some(serde_json::json!("anything"))
            )
        ));
    }

    #[test]
    fn case_combinators() {
        let ctx = context();
        let and_case = ConditionalCase {
            branch: "both".to_string(),
            combinator: ConditionCombinator::And,
            conditions: vec![
                condition(
                    "{{trigger.priority}}",
                    ComparisonOperator::Gte,
                    Some(serde_json::json!(5)),
                ),
                condition(
                    "{{trigger.status}}",
                    ComparisonOperator::Eq,
                    Some(serde_json::json!("closed")),
                ),
            ],
        };
        assert!(!evaluate_case(&ctx, &and_case));

        let or_case = ConditionalCase {
            combinator: ConditionCombinator::Or,
            ..and_case
        };
        assert!(evaluate_case(&ctx, &or_case));
    }

    #[test]
    fn first_matching_case_wins() {
        let ctx = context();
        let config = ConditionalConfig {
            cases: vec![
                ConditionalCase {
                    branch: "closed".to_string(),
                    combinator: ConditionCombinator::And,
                    conditions: vec![condition(
                        "{{trigger.status}}",
                        ComparisonOperator::Eq,
                        Some(serde_json::json!("closed")),
                    )],
                },
                ConditionalCase {
                    branch: "catch_all".to_string(),
                    combinator: ConditionCombinator::And,
                    conditions: vec![],
                },
            ],
            fallback_branch: None,
        };
        assert_eq!(select_branch(&ctx, &config), Some("catch_all".to_string()));
    }

    #[test]
    fn fallback_when_nothing_matches() {
        let ctx = context();
        let config = ConditionalConfig {
            cases: vec![ConditionalCase {
                branch: "closed".to_string(),
                combinator: ConditionCombinator::And,
                conditions: vec![condition(
                    "{{trigger.status}}",
                    ComparisonOperator::Eq,
                    Some(serde_json::json!("closed")),
                )],
            }],
            fallback_branch: Some("other".to_string()),
        };
        assert_eq!(select_branch(&ctx, &config), Some("other".to_string()));

        let no_fallback = ConditionalConfig {
            fallback_branch: None,
            ..config
        };
        assert_eq!(select_branch(&ctx, &no_fallback), None);
    }
}
