//! Run records: one row per user request, its executed steps, the final
//! response and the plan snapshot.

use chrono::Utc;
use rusqlite::OptionalExtension;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// Fields for a new request record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewRequest {
    pub session_id: String,
    pub user_prompt: String,
    /// Complexity label assigned by the planner.
    pub intent: String,
    /// Execution strategy, e.g. `agent_single` or `agent_multi`.
    pub strategy: String,
}

/// A stored request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: String,
    pub session_id: String,
    pub user_prompt: String,
    pub intent: String,
    pub strategy: String,
    pub created_at: i64,
}

/// Fields for a new step record. Text fields are stored as given; callers
/// truncate beforehand.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStep {
    pub request_id: String,
    /// `agent_tool:{tool_name}`.
    pub step_type: String,
    pub model_name: String,
    pub input_prompt: String,
    pub output_text: String,
    pub tokens_used: u64,
    pub latency_ms: u64,
}

/// A stored step, ordered within its request by `seq`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRecord {
    pub id: String,
    pub request_id: String,
    pub seq: i64,
    pub step_type: String,
    pub model_name: String,
    pub input_prompt: String,
    pub output_text: String,
    pub tokens_used: u64,
    pub latency_ms: u64,
    pub created_at: i64,
}

/// Fields for the final response of a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewResponse {
    pub request_id: String,
    pub final_response: String,
    pub models_used: serde_json::Value,
    pub latency_ms: u64,
    pub estimated_cost: f64,
}

/// A stored response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub id: String,
    pub request_id: String,
    pub final_response: String,
    pub models_used: serde_json::Value,
    pub latency_ms: u64,
    pub estimated_cost: f64,
    pub created_at: i64,
}

/// A stored plan snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredPlan {
    pub id: String,
    pub request_id: String,
    pub plan: serde_json::Value,
    pub created_at: i64,
}

// ═══════════════════════════════════════════════════════════════════════
//  RunStore
// ═══════════════════════════════════════════════════════════════════════

/// Writers and readers for the run record tables.
#[derive(Clone)]
pub struct RunStore {
    db: Database,
}

impl RunStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // ── writers ──────────────────────────────────────────────────────

    /// Insert a request and return its id.
    #[instrument(skip(self, req), fields(session_id = %req.session_id))]
    pub async fn create_request(&self, req: NewRequest) -> StoreResult<String> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().timestamp();
        let row_id = id.clone();

        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO requests (id, session_id, user_prompt, intent, strategy, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    rusqlite::params![
                        row_id,
                        req.session_id,
                        req.user_prompt,
                        req.intent,
                        req.strategy,
                        now
                    ],
                )?;
                Ok(())
            })
            .await?;

        debug!(request_id = %id, "request created");
        Ok(id)
    }

    /// Append a step to its request and return the step id.
    #[instrument(skip(self, step), fields(request_id = %step.request_id, step_type = %step.step_type))]
    pub async fn create_step(&self, step: NewStep) -> StoreResult<String> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().timestamp();
        let row_id = id.clone();

        self.db
            .execute(move |conn| {
                let seq: i64 = conn.query_row(
                    "SELECT COALESCE(MAX(seq) + 1, 0) FROM request_steps WHERE request_id = ?1",
                    [&step.request_id],
                    |row| row.get(0),
                )?;
                conn.execute(
                    "INSERT INTO request_steps
                        (id, request_id, seq, step_type, model_name, input_prompt, output_text,
                         tokens_used, latency_ms, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    rusqlite::params![
                        row_id,
                        step.request_id,
                        seq,
                        step.step_type,
                        step.model_name,
                        step.input_prompt,
                        step.output_text,
                        step.tokens_used as i64,
                        step.latency_ms as i64,
                        now
                    ],
                )?;
                Ok(())
            })
            .await?;

        Ok(id)
    }

    /// Insert the final response and return its id.
    #[instrument(skip(self, resp), fields(request_id = %resp.request_id))]
    pub async fn create_response(&self, resp: NewResponse) -> StoreResult<String> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().timestamp();
        let row_id = id.clone();
        let models_used = serde_json::to_string(&resp.models_used)?;

        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO responses
                        (id, request_id, final_response, models_used, latency_ms, estimated_cost, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    rusqlite::params![
                        row_id,
                        resp.request_id,
                        resp.final_response,
                        models_used,
                        resp.latency_ms as i64,
                        resp.estimated_cost,
                        now
                    ],
                )?;
                Ok(())
            })
            .await?;

        Ok(id)
    }

    /// Store a plan snapshot for a request and return its id.
    #[instrument(skip(self, plan))]
    pub async fn store_plan(&self, request_id: &str, plan: &serde_json::Value) -> StoreResult<String> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().timestamp();
        let row_id = id.clone();
        let request_id = request_id.to_string();
        let plan = serde_json::to_string(plan)?;

        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO agent_plans (id, request_id, plan, created_at) VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![row_id, request_id, plan, now],
                )?;
                Ok(())
            })
            .await?;

        Ok(id)
    }

    // ── readers ──────────────────────────────────────────────────────

    /// Fetch a request by id.
    #[instrument(skip(self))]
    pub async fn get_request(&self, id: &str) -> StoreResult<RequestRecord> {
        let id = id.to_string();
        self.db
            .execute(move |conn| {
                conn.query_row(
                    "SELECT id, session_id, user_prompt, intent, strategy, created_at
                     FROM requests WHERE id = ?1",
                    [&id],
                    |row| {
                        Ok(RequestRecord {
                            id: row.get(0)?,
                            session_id: row.get(1)?,
                            user_prompt: row.get(2)?,
                            intent: row.get(3)?,
                            strategy: row.get(4)?,
                            created_at: row.get(5)?,
                        })
                    },
                )
                .optional()?
                .ok_or_else(|| StoreError::NotFound {
                    entity: "request",
                    id: id.clone(),
                })
            })
            .await
    }

    /// All steps of a request in insertion order.
    #[instrument(skip(self))]
    pub async fn list_steps(&self, request_id: &str) -> StoreResult<Vec<StepRecord>> {
        let request_id = request_id.to_string();
        self.db
            .execute(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, request_id, seq, step_type, model_name, input_prompt, output_text,
                            tokens_used, latency_ms, created_at
                     FROM request_steps WHERE request_id = ?1 ORDER BY seq ASC",
                )?;
                let rows = stmt.query_map([&request_id], |row| {
                    Ok(StepRecord {
                        id: row.get(0)?,
                        request_id: row.get(1)?,
                        seq: row.get(2)?,
                        step_type: row.get(3)?,
                        model_name: row.get(4)?,
                        input_prompt: row.get(5)?,
                        output_text: row.get(6)?,
                        tokens_used: row.get::<_, i64>(7)?.max(0) as u64,
                        latency_ms: row.get::<_, i64>(8)?.max(0) as u64,
                        created_at: row.get(9)?,
                    })
                })?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            })
            .await
    }

    /// The response recorded for a request, if any.
    #[instrument(skip(self))]
    pub async fn get_response(&self, request_id: &str) -> StoreResult<Option<ResponseRecord>> {
        let request_id = request_id.to_string();
        self.db
            .execute(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT id, request_id, final_response, models_used, latency_ms,
                                estimated_cost, created_at
                         FROM responses WHERE request_id = ?1
                         ORDER BY created_at DESC, id DESC LIMIT 1",
                        [&request_id],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, String>(2)?,
                                row.get::<_, String>(3)?,
                                row.get::<_, i64>(4)?,
                                row.get::<_, f64>(5)?,
                                row.get::<_, i64>(6)?,
                            ))
                        },
                    )
                    .optional()?;

                row.map(
                    |(id, request_id, final_response, models, latency, cost, created_at)|
                     -> StoreResult<ResponseRecord> {
                        Ok(ResponseRecord {
                            id,
                            request_id,
                            final_response,
                            models_used: serde_json::from_str(&models)?,
                            latency_ms: latency.max(0) as u64,
                            estimated_cost: cost,
                            created_at,
                        })
                    },
                )
                .transpose()
            })
            .await
    }

    /// The latest plan stored for a request, if any.
    #[instrument(skip(self))]
    pub async fn get_plan(&self, request_id: &str) -> StoreResult<Option<StoredPlan>> {
        let request_id = request_id.to_string();
        self.db
            .execute(move |conn| {
                let row = conn
                    .query_row(
                        "SELECT id, request_id, plan, created_at FROM agent_plans
                         WHERE request_id = ?1 ORDER BY created_at DESC, id DESC LIMIT 1",
                        [&request_id],
                        |row| {
                            Ok((
                                row.get::<_, String>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, String>(2)?,
                                row.get::<_, i64>(3)?,
                            ))
                        },
                    )
                    .optional()?;

                row.map(|(id, request_id, plan, created_at)| -> StoreResult<StoredPlan> {
                    Ok(StoredPlan {
                        id,
                        request_id,
                        plan: serde_json::from_str(&plan)?,
                        created_at,
                    })
                })
                .transpose()
            })
            .await
    }
}
