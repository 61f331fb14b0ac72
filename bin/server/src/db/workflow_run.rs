//! Workflow run repository.
//!
//! Run records mirror the event-sourced run state for querying; the event
//! stream remains the execution source of truth.

use crate::db::decode_error;
use chrono::{DateTime, Utc};
use flowdeck_core::{TriggerId, WorkflowId, WorkflowRunId};
use flowdeck_workflow::execution::{ExecutionState, NodeExecution, NodeExecutionState, WorkflowRun};
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

fn state_to_str(state: ExecutionState) -> &'static str {
    match state {
        ExecutionState::Queued => "queued",
        ExecutionState::Running => "running",
        ExecutionState::Completed => "completed",
        ExecutionState::Failed => "failed",
        ExecutionState::Cancelled => "cancelled",
    }
}

fn state_from_str(s: &str) -> ExecutionState {
    match s {
        "running" => ExecutionState::Running,
        "completed" => ExecutionState::Completed,
        "failed" => ExecutionState::Failed,
        "cancelled" => ExecutionState::Cancelled,
        _ => ExecutionState::Queued,
    }
}

fn node_state_to_str(state: NodeExecutionState) -> &'static str {
    match state {
        NodeExecutionState::Pending => "pending",
        NodeExecutionState::Ready => "ready",
        NodeExecutionState::Running => "running",
        NodeExecutionState::Completed => "completed",
        NodeExecutionState::Failed => "failed",
        NodeExecutionState::Skipped => "skipped",
    }
}

/// Row type for run queries.
#[derive(FromRow)]
struct RunRow {
    id: String,
    workflow_id: String,
    trigger_id: Option<String>,
    state: String,
    queued_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    input: Option<serde_json::Value>,
    output: Option<serde_json::Value>,
    error: Option<String>,
}

/// A run record with its resolved output payload.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunRecord {
    /// The underlying run.
    #[serde(flatten)]
    pub run: WorkflowRun,
    /// Resolved final output, when the run completed with one.
    pub output: Option<serde_json::Value>,
}

impl RunRow {
    fn try_into_record(self) -> Result<RunRecord, sqlx::Error> {
        let id = WorkflowRunId::from_str(&self.id)
            .map_err(|e| decode_error(&format!("invalid run id '{}'", self.id), e))?;
        let workflow_id = WorkflowId::from_str(&self.workflow_id)
            .map_err(|e| decode_error(&format!("invalid workflow id '{}'", self.workflow_id), e))?;
        let trigger_id = self
            .trigger_id
            .as_deref()
            .map(TriggerId::from_str)
            .transpose()
            .map_err(|e| decode_error("invalid trigger id", e))?;

        Ok(RunRecord {
            run: WorkflowRun {
                id,
                workflow_id,
                trigger_id,
                state: state_from_str(&self.state),
                queued_at: self.queued_at,
                started_at: self.started_at,
                finished_at: self.finished_at,
                input: self.input,
                output_key: None,
                error: self.error,
            },
            output: self.output,
        })
    }
}

/// Repository for workflow runs and their node executions.
pub struct WorkflowRunRepository {
    pool: PgPool,
}

impl WorkflowRunRepository {
    /// Creates a new repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a freshly queued run.
    pub async fn insert_queued(
        &self,
        run_id: WorkflowRunId,
        workflow_id: WorkflowId,
        trigger_id: Option<TriggerId>,
        input: Option<&serde_json::Value>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO workflow_runs (id, workflow_id, trigger_id, state, queued_at, input)
            VALUES ($1, $2, $3, 'queued', $4, $5)
            "#,
        )
        .bind(run_id.to_string())
        .bind(workflow_id.to_string())
        .bind(trigger_id.map(|t| t.to_string()))
        .bind(Utc::now())
        .bind(input)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Records the final state of a run, with its resolved output payload.
    pub async fn finalize(
        &self,
        run_id: WorkflowRunId,
        state: ExecutionState,
        started_at: Option<DateTime<Utc>>,
        finished_at: Option<DateTime<Utc>>,
        output: Option<&serde_json::Value>,
        error: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE workflow_runs
            SET state = $2, started_at = $3, finished_at = $4, output = $5, error = $6
            WHERE id = $1
            "#,
        )
        .bind(run_id.to_string())
        .bind(state_to_str(state))
        .bind(started_at)
        .bind(finished_at)
        .bind(output)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Persists node execution records for a run.
    pub async fn record_node_executions(
        &self,
        executions: impl IntoIterator<Item = &NodeExecution>,
    ) -> Result<(), sqlx::Error> {
        for exec in executions {
            sqlx::query(
                r#"
                INSERT INTO node_executions
                    (id, run_id, node_id, state, started_at, finished_at, input,
                     output_key, branch, error)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (id) DO UPDATE
                SET state = EXCLUDED.state,
                    started_at = EXCLUDED.started_at,
                    finished_at = EXCLUDED.finished_at,
                    output_key = EXCLUDED.output_key,
                    branch = EXCLUDED.branch,
                    error = EXCLUDED.error
                "#,
            )
            .bind(exec.id.to_string())
            .bind(exec.run_id.to_string())
            .bind(exec.node_id.to_string())
            .bind(node_state_to_str(exec.state))
            .bind(exec.started_at)
            .bind(exec.finished_at)
            .bind(&exec.input)
            .bind(&exec.output_key)
            .bind(&exec.branch)
            .bind(&exec.error)
            .execute(&self.pool)
            .await?;
        }
        Ok(())
    }

    /// Finds a run by ID.
    pub async fn find_by_id(&self, id: WorkflowRunId) -> Result<Option<RunRecord>, sqlx::Error> {
        let row: Option<RunRow> = sqlx::query_as(
            r#"
            SELECT id, workflow_id, trigger_id, state, queued_at, started_at,
                   finished_at, input, output, error
            FROM workflow_runs
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(r.try_into_record()?)),
            None => Ok(None),
        }
    }

    /// Lists runs for a workflow, newest first.
    pub async fn list_for_workflow(
        &self,
        workflow_id: WorkflowId,
        limit: i64,
    ) -> Result<Vec<RunRecord>, sqlx::Error> {
        let rows: Vec<RunRow> = sqlx::query_as(
            r#"
            SELECT id, workflow_id, trigger_id, state, queued_at, started_at,
                   finished_at, input, output, error
            FROM workflow_runs
            WHERE workflow_id = $1
            ORDER BY queued_at DESC
            LIMIT $2
            "#,
        )
        .bind(workflow_id.to_string())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(RunRow::try_into_record).collect()
    }
}
