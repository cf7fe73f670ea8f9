use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ppo_core::repository::WorkflowRepository;
use ppo_core::{CoreError, CoreResult, RunState, WorkflowRun};
use sqlx::PgPool;
use uuid::Uuid;

pub struct StoreWorkflowRepository {
    pool: PgPool,
}

impl StoreWorkflowRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct WorkflowRunRow {
    id: Uuid,
    kind: String,
    order_id: Option<Uuid>,
    loan_ref: String,
    installment_ref: Option<String>,
    step: String,
    state: String,
    amount: i64,
    items_done: i32,
    transaction_ref: Option<String>,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<WorkflowRunRow> for WorkflowRun {
    type Error = CoreError;

    fn try_from(row: WorkflowRunRow) -> Result<Self, Self::Error> {
        let decode = |e: ppo_core::ParseEnumError| CoreError::internal("decoding workflow run", e);

        Ok(Self {
            id: row.id,
            kind: row.kind.parse().map_err(decode)?,
            order_id: row.order_id,
            loan_ref: row.loan_ref,
            installment_ref: row.installment_ref,
            step: row.step.parse().map_err(decode)?,
            state: row.state.parse().map_err(decode)?,
            amount: row.amount,
            items_done: row.items_done,
            transaction_ref: row.transaction_ref,
            last_error: row.last_error,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const RUN_COLUMNS: &str = "id, kind, order_id, loan_ref, installment_ref, step, state, amount, \
                           items_done, transaction_ref, last_error, created_at, updated_at";

/// A running cancellation already holds the partial unique index for this order.
fn map_write_error(run: &WorkflowRun, context: &'static str, err: sqlx::Error) -> CoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => CoreError::conflict(format!(
            "a cancellation for order {} is already in progress",
            run.order_id.map(|id| id.to_string()).unwrap_or_default()
        )),
        _ => CoreError::internal(context, err),
    }
}

#[async_trait]
impl WorkflowRepository for StoreWorkflowRepository {
    async fn start(&self, run: &WorkflowRun) -> CoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO workflow_runs (id, kind, order_id, loan_ref, installment_ref, step, state, amount, items_done, transaction_ref, last_error, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(run.id)
        .bind(run.kind.as_str())
        .bind(run.order_id)
        .bind(&run.loan_ref)
        .bind(&run.installment_ref)
        .bind(run.step.as_str())
        .bind(run.state.as_str())
        .bind(run.amount)
        .bind(run.items_done)
        .bind(&run.transaction_ref)
        .bind(&run.last_error)
        .bind(run.created_at)
        .bind(run.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(run, "opening workflow run", e))?;

        Ok(())
    }

    async fn save(&self, run: &WorkflowRun) -> CoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_runs
            SET step = $2, state = $3, amount = $4, items_done = $5, transaction_ref = $6, last_error = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(run.id)
        .bind(run.step.as_str())
        .bind(run.state.as_str())
        .bind(run.amount)
        .bind(run.items_done)
        .bind(&run.transaction_ref)
        .bind(&run.last_error)
        .bind(run.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_write_error(run, "saving workflow run", e))?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found(format!("workflow run {} not found", run.id)));
        }
        Ok(())
    }

    async fn claim(&self, id: Uuid, stale_before: DateTime<Utc>) -> CoreResult<WorkflowRun> {
        let claimed: Option<WorkflowRunRow> = sqlx::query_as(&format!(
            r#"
            UPDATE workflow_runs
            SET state = 'running', updated_at = $2
            WHERE id = $1
              AND (state IN ('failed', 'needs_attention') OR (state = 'running' AND updated_at < $3))
            RETURNING {RUN_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(Utc::now())
        .bind(stale_before)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => CoreError::conflict(format!(
                "workflow run {} cannot be claimed, its order already has a running cancellation",
                id
            )),
            _ => CoreError::internal("claiming workflow run", e),
        })?;

        match claimed {
            Some(row) => row.try_into(),
            None => {
                // Zero rows: either the run is unknown or someone else holds it.
                let current = self.get(id).await?;
                Err(CoreError::conflict(format!(
                    "workflow run {} is {} and cannot be resumed",
                    id, current.state
                )))
            }
        }
    }

    async fn get(&self, id: Uuid) -> CoreResult<WorkflowRun> {
        let row: Option<WorkflowRunRow> =
            sqlx::query_as(&format!("SELECT {RUN_COLUMNS} FROM workflow_runs WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| CoreError::internal("fetching workflow run", e))?;

        row.ok_or_else(|| CoreError::not_found(format!("workflow run {} not found", id)))?
            .try_into()
    }

    async fn list_by_state(&self, state: RunState) -> CoreResult<Vec<WorkflowRun>> {
        let rows: Vec<WorkflowRunRow> = sqlx::query_as(&format!(
            "SELECT {RUN_COLUMNS} FROM workflow_runs WHERE state = $1 ORDER BY created_at"
        ))
        .bind(state.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| CoreError::internal("listing workflow runs", e))?;

        rows.into_iter().map(WorkflowRun::try_from).collect()
    }
}
