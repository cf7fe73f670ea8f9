//! Operator endpoints over the workflow run journal.

use axum::{
    extract::{rejection::PathRejection, rejection::QueryRejection, Path, Query, State},
    Json,
};
use ppo_core::{RunState, WorkflowRun};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{ok, AppError, Envelope};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListRunsQuery {
    pub state: Option<RunState>,
}

/// GET /api/v1/admin/workflows?state=failed
pub async fn list_runs(
    State(state): State<AppState>,
    query: Result<Query<ListRunsQuery>, QueryRejection>,
) -> Result<Json<Envelope<Vec<WorkflowRun>>>, AppError> {
    let Query(query) = query?;
    let runs = state
        .reconciler
        .list_runs(query.state.unwrap_or(RunState::Failed))
        .await?;
    Ok(ok(runs))
}

/// POST /api/v1/admin/workflows/{id}/resume
pub async fn resume_run(
    State(state): State<AppState>,
    run_id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Envelope<WorkflowRun>>, AppError> {
    let Path(run_id) = run_id?;
    tracing::info!(run_id = %run_id, "Operator resume requested");
    let run = state.reconciler.resume_run(run_id).await?;
    Ok(ok(run))
}
