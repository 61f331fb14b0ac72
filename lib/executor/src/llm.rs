//! LLM call node executor.
//!
//! Renders the prompt against the run context and calls the configured
//! `LlmBackend`. Output:
//! `{ "content", "structured_output", "model", "usage": {..} }`.

use crate::context::ExecutionContext;
use crate::interpolate::render_string;
use flowdeck_ai::{LlmBackend, LlmInvocation, LlmRequest};
use flowdeck_workflow::node::LlmCallConfig;
use flowdeck_workflow::worker::NodeExecutionError;
use serde_json::Value as JsonValue;
use std::time::Instant;

/// Executes an LLM call node.
pub async fn execute_llm(
    backend: &dyn LlmBackend,
    ctx: &ExecutionContext,
    config: &LlmCallConfig,
) -> Result<JsonValue, NodeExecutionError> {
    let prompt = render_string(ctx, &config.prompt).map_err(|e| {
        NodeExecutionError::UnresolvedReference {
            message: e.to_string(),
        }
    })?;

    let mut request = LlmRequest::new(prompt);

    if let Some(system) = &config.system_prompt {
        let system = render_string(ctx, system).map_err(|e| {
            NodeExecutionError::UnresolvedReference {
                message: e.to_string(),
            }
        })?;
        request = request.with_system(system);
    }
    if let Some(schema) = &config.output_schema {
        request = request.with_output_schema(schema.clone());
    }
    if let Some(temperature) = config.temperature {
        request = request.with_temperature(temperature);
    }
    if let Some(max_tokens) = config.max_tokens {
        request = request.with_max_tokens(max_tokens);
    }

    let started = Instant::now();
    let response = backend.generate(&request).await.map_err(|e| {
        NodeExecutionError::ExternalServiceError {
            service: format!("llm:{}", config.model),
            message: e.to_string(),
        }
    })?;
    let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    let invocation = LlmInvocation::from_response(response, latency_ms);
    tracing::debug!(
        model = %invocation.model,
        tokens = invocation.usage.total(),
        latency_ms,
        "llm call completed"
    );

    serde_json::to_value(&invocation).map_err(|e| NodeExecutionError::ExecutionFailed {
        message: format!("failed to serialize invocation: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowdeck_ai::ScriptedBackend;
    use flowdeck_core::WorkflowId;
    use flowdeck_workflow::worker::NodeInputs;

    fn context() -> ExecutionContext {
        ExecutionContext::new(NodeInputs {
            workflow_id: WorkflowId::new(),
            run_input: Some(serde_json::json!({"subject": "quarterly report"})),
            variables: Default::default(),
            outputs: Default::default(),
        })
    }

    fn config(prompt: &str) -> LlmCallConfig {
        LlmCallConfig {
            model: "scripted".to_string(),
            prompt: prompt.to_string(),
            system_prompt: None,
            temperature: None,
            max_tokens: None,
            output_schema: None,
        }
    }

    #[tokio::test]
    async fn renders_prompt_and_returns_content() {
        let backend = ScriptedBackend::answering("A summary.");
        let ctx = context();

        let output = execute_llm(&backend, &ctx, &config("Summarize {{trigger.subject}}"))
            .await
            .expect("llm call");

        assert_eq!(output["content"], "A summary.");
        assert_eq!(output["model"], "scripted");
    }

    #[tokio::test]
    async fn missing_prompt_reference_fails() {
        let backend = ScriptedBackend::answering("unused");
        let ctx = context();

        let result = execute_llm(&backend, &ctx, &config("Summarize {{trigger.body}}")).await;
        assert!(matches!(
            result,
            Err(NodeExecutionError::UnresolvedReference { .. })
        ));
    }
}
