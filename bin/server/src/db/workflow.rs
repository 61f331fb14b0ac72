//! Workflow definition repository.
//!
//! The graph and variables are stored as JSONB; metadata columns are
//! denormalized for listing without parsing graphs.

use crate::db::decode_error;
use chrono::{DateTime, Utc};
use flowdeck_core::WorkflowId;
use flowdeck_workflow::definition::{Workflow, WorkflowMetadata};
use flowdeck_workflow::graph::WorkflowGraph;
use sqlx::{FromRow, PgPool};
use std::str::FromStr;

/// Row type for workflow queries.
#[derive(FromRow)]
struct WorkflowRow {
    id: String,
    name: String,
    description: Option<String>,
    version: String,
    enabled: bool,
    tags: serde_json::Value,
    graph: serde_json::Value,
    variables: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl WorkflowRow {
    fn try_into_workflow(self) -> Result<Workflow, sqlx::Error> {
        let id = WorkflowId::from_str(&self.id)
            .map_err(|e| decode_error(&format!("invalid workflow id '{}'", self.id), e))?;

        let mut graph: WorkflowGraph = serde_json::from_value(self.graph)
            .map_err(|e| decode_error("invalid workflow graph", e))?;
        graph.rebuild_index_map();

        let tags: Vec<String> = serde_json::from_value(self.tags).unwrap_or_default();
        let variables = serde_json::from_value(self.variables).unwrap_or_default();

        Ok(Workflow {
            id,
            metadata: WorkflowMetadata {
                name: self.name,
                description: self.description,
                version: self.version,
                enabled: self.enabled,
                tags,
                created_at: self.created_at,
                updated_at: self.updated_at,
            },
            graph,
            variables,
        })
    }
}

/// Repository for workflow definitions.
pub struct WorkflowRepository {
    pool: PgPool,
}

impl WorkflowRepository {
    /// Creates a new repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Inserts a workflow.
    pub async fn insert(&self, workflow: &Workflow) -> Result<(), sqlx::Error> {
        let graph = serde_json::to_value(&workflow.graph)
            .map_err(|e| decode_error("failed to serialize graph", e))?;
        let variables = serde_json::to_value(&workflow.variables)
            .map_err(|e| decode_error("failed to serialize variables", e))?;
        let tags = serde_json::to_value(&workflow.metadata.tags)
            .map_err(|e| decode_error("failed to serialize tags", e))?;

        sqlx::query(
            r#"
            INSERT INTO workflows
                (id, name, description, version, enabled, tags, graph, variables,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(workflow.id.to_string())
        .bind(&workflow.metadata.name)
        .bind(&workflow.metadata.description)
        .bind(&workflow.metadata.version)
        .bind(workflow.metadata.enabled)
        .bind(tags)
        .bind(graph)
        .bind(variables)
        .bind(workflow.metadata.created_at)
        .bind(workflow.metadata.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Replaces a workflow definition.
    ///
    /// Returns false when the workflow does not exist.
    pub async fn update(&self, workflow: &Workflow) -> Result<bool, sqlx::Error> {
        let graph = serde_json::to_value(&workflow.graph)
            .map_err(|e| decode_error("failed to serialize graph", e))?;
        let variables = serde_json::to_value(&workflow.variables)
            .map_err(|e| decode_error("failed to serialize variables", e))?;
        let tags = serde_json::to_value(&workflow.metadata.tags)
            .map_err(|e| decode_error("failed to serialize tags", e))?;

        let result = sqlx::query(
            r#"
            UPDATE workflows
            SET name = $2, description = $3, version = $4, enabled = $5,
                tags = $6, graph = $7, variables = $8, updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(workflow.id.to_string())
        .bind(&workflow.metadata.name)
        .bind(&workflow.metadata.description)
        .bind(&workflow.metadata.version)
        .bind(workflow.metadata.enabled)
        .bind(tags)
        .bind(graph)
        .bind(variables)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Finds a workflow by ID.
    pub async fn find_by_id(&self, id: WorkflowId) -> Result<Option<Workflow>, sqlx::Error> {
        let row: Option<WorkflowRow> = sqlx::query_as(
            r#"
            SELECT id, name, description, version, enabled, tags, graph, variables,
                   created_at, updated_at
            FROM workflows
            WHERE id = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(r) => Ok(Some(r.try_into_workflow()?)),
            None => Ok(None),
        }
    }

    /// Lists all workflows, newest first.
    pub async fn list(&self) -> Result<Vec<Workflow>, sqlx::Error> {
        let rows: Vec<WorkflowRow> = sqlx::query_as(
            r#"
            SELECT id, name, description, version, enabled, tags, graph, variables,
                   created_at, updated_at
            FROM workflows
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(WorkflowRow::try_into_workflow).collect()
    }

    /// Lists enabled workflows.
    pub async fn list_enabled(&self) -> Result<Vec<Workflow>, sqlx::Error> {
        let rows: Vec<WorkflowRow> = sqlx::query_as(
            r#"
            SELECT id, name, description, version, enabled, tags, graph, variables,
                   created_at, updated_at
            FROM workflows
            WHERE enabled = TRUE
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(WorkflowRow::try_into_workflow).collect()
    }

    /// Deletes a workflow. Returns false when it did not exist.
    pub async fn delete(&self, id: WorkflowId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM workflows WHERE id = $1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
