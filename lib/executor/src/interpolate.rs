//! Variable interpolation.
//!
//! Templates reference context data with `{{...}}` placeholders:
//!
//! - `{{node.<node_id>.<path>}}` — output of a completed node
//! - `{{trigger.<path>}}` — the run's trigger input
//! - `{{vars.<name>}}` — workflow variables
//! - `{{item}}` / `{{index}}` — bindings inside for-each bodies
//!
//! A template that consists of exactly one placeholder resolves to the raw
//! JSON value, so whole objects and arrays can flow between nodes. Mixed
//! templates render to strings, with non-string values serialized as JSON
//! text. Unresolvable references fail the node, reporting every missing
//! reference at once.

use crate::context::ExecutionContext;
use regex::Regex;
use serde_json::Value as JsonValue;
use std::fmt;
use std::sync::OnceLock;

/// Placeholder pattern: `{{ reference }}` with optional inner whitespace.
const PLACEHOLDER_PATTERN: &str = r"\{\{\s*([A-Za-z0-9_.\-]+)\s*\}\}";

fn placeholder_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PLACEHOLDER_PATTERN).expect("placeholder pattern is valid"))
}

/// Error carrying every reference that failed to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpolationError {
    /// The unresolved references, in template order.
    pub missing: Vec<String>,
}

impl fmt::Display for InterpolationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unresolved reference(s): {}", self.missing.join(", "))
    }
}

impl std::error::Error for InterpolationError {}

/// Resolves a template to a JSON value.
///
/// A template that is exactly one placeholder returns the referenced value
/// unchanged; anything else renders to a string.
///
/// # Errors
///
/// Returns an error listing every unresolvable reference.
pub fn resolve_template(
    ctx: &ExecutionContext,
    template: &str,
) -> Result<JsonValue, InterpolationError> {
    let re = placeholder_regex();

    if let Some(captures) = re.captures(template.trim())
        && captures.get(0).map(|m| m.as_str()) == Some(template.trim())
    {
        let reference = &captures[1];
        return ctx.lookup(reference).ok_or_else(|| InterpolationError {
            missing: vec![reference.to_string()],
        });
    }

    render_string(ctx, template).map(JsonValue::String)
}

/// Renders a template to a string, substituting every placeholder.
///
/// # Errors
///
/// Returns an error listing every unresolvable reference.
pub fn render_string(
    ctx: &ExecutionContext,
    template: &str,
) -> Result<String, InterpolationError> {
    let re = placeholder_regex();
    let mut missing = Vec::new();

    let rendered = re.replace_all(template, |captures: &regex::Captures<'_>| {
        let reference = &captures[1];
        match ctx.lookup(reference) {
            Some(value) => value_to_string(&value),
            None => {
                missing.push(reference.to_string());
                String::new()
            }
        }
    });

    if missing.is_empty() {
        Ok(rendered.into_owned())
    } else {
        Err(InterpolationError { missing })
    }
}

/// Resolves templates recursively through a JSON value.
///
/// Strings are resolved as templates; objects and arrays recurse; other
/// values pass through.
///
/// # Errors
///
/// Returns an error listing every unresolvable reference found anywhere in
/// the value.
pub fn resolve_json(
    ctx: &ExecutionContext,
    value: &JsonValue,
) -> Result<JsonValue, InterpolationError> {
    let mut missing = Vec::new();
    let resolved = resolve_json_inner(ctx, value, &mut missing);
    if missing.is_empty() {
        Ok(resolved)
    } else {
        Err(InterpolationError { missing })
    }
}

fn resolve_json_inner(
    ctx: &ExecutionContext,
    value: &JsonValue,
    missing: &mut Vec<String>,
) -> JsonValue {
    match value {
        JsonValue::String(template) => match resolve_template(ctx, template) {
            Ok(resolved) => resolved,
            Err(e) => {
                missing.extend(e.missing);
                JsonValue::Null
            }
        },
        JsonValue::Array(items) => JsonValue::Array(
            items
                .iter()
                .map(|item| resolve_json_inner(ctx, item, missing))
                .collect(),
        ),
        JsonValue::Object(map) => JsonValue::Object(
            map.iter()
                .map(|(key, item)| (key.clone(), resolve_json_inner(ctx, item, missing)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Converts a resolved value to its string rendering.
///
/// Strings render bare (no quotes); everything else renders as JSON text.
fn value_to_string(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        other => other.to_string(),
    }
}
