//! Schema migrations.
//!
//! Each migration is a static SQL batch keyed by version. Applied versions
//! are recorded in `_migrations`, so running the set twice is a no-op.

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

/// All migrations in order. Append only.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "run records: requests, request_steps, responses",
        sql: r#"
            CREATE TABLE requests (
                id          TEXT PRIMARY KEY,
                session_id  TEXT NOT NULL,
                user_prompt TEXT NOT NULL,
                intent      TEXT NOT NULL,
                strategy    TEXT NOT NULL,
                created_at  INTEGER NOT NULL
            );
            CREATE INDEX idx_requests_session ON requests(session_id);

            CREATE TABLE request_steps (
                id           TEXT PRIMARY KEY,
                request_id   TEXT NOT NULL REFERENCES requests(id) ON DELETE CASCADE,
                seq          INTEGER NOT NULL,
                step_type    TEXT NOT NULL,
                model_name   TEXT NOT NULL,
                input_prompt TEXT NOT NULL,
                output_text  TEXT NOT NULL,
                tokens_used  INTEGER NOT NULL DEFAULT 0,
                latency_ms   INTEGER NOT NULL DEFAULT 0,
                created_at   INTEGER NOT NULL
            );
            CREATE INDEX idx_request_steps_request ON request_steps(request_id, seq);

            CREATE TABLE responses (
                id             TEXT PRIMARY KEY,
                request_id     TEXT NOT NULL REFERENCES requests(id) ON DELETE CASCADE,
                final_response TEXT NOT NULL,
                models_used    TEXT NOT NULL,
                latency_ms     INTEGER NOT NULL DEFAULT 0,
                estimated_cost REAL NOT NULL DEFAULT 0,
                created_at     INTEGER NOT NULL
            );
            CREATE INDEX idx_responses_request ON responses(request_id);
        "#,
    },
    Migration {
        version: 2,
        description: "agent plans and per-session memory",
        sql: r#"
            CREATE TABLE agent_plans (
                id          TEXT PRIMARY KEY,
                request_id  TEXT NOT NULL REFERENCES requests(id) ON DELETE CASCADE,
                plan        TEXT NOT NULL,
                created_at  INTEGER NOT NULL
            );
            CREATE INDEX idx_agent_plans_request ON agent_plans(request_id);

            CREATE TABLE agent_memory (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id   TEXT NOT NULL,
                user_id      TEXT NOT NULL,
                user_prompt  TEXT NOT NULL,
                ai_response  TEXT NOT NULL,
                plan_summary TEXT,
                created_at   INTEGER NOT NULL
            );
            CREATE INDEX idx_agent_memory_session ON agent_memory(session_id, id);
            CREATE INDEX idx_agent_memory_user ON agent_memory(user_id, id);
        "#,
    },
];

// ── public API ───────────────────────────────────────────────────────

/// Apply every migration newer than the recorded version.
///
/// Synchronous; call it from the blocking pool.
pub fn run_all(conn: &Connection) -> StoreResult<()> {
    ensure_migrations_table(conn)?;

    let current = current_version(conn)?;
    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();

    if pending.is_empty() {
        debug!(current_version = current, "database schema is up to date");
        return Ok(());
    }

    info!(
        current_version = current,
        pending = pending.len(),
        "running pending migrations"
    );

    for migration in pending {
        apply(conn, migration)?;
    }
    Ok(())
}

/// Latest applied migration version, or 0 on a fresh database.
pub fn current_version(conn: &Connection) -> StoreResult<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |row| row.get(0),
    )
    .map_err(|e| StoreError::Migration {
        version: 0,
        message: format!("failed to read current version: {e}"),
    })
}

// ── internals ────────────────────────────────────────────────────────

fn ensure_migrations_table(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version     INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at  INTEGER NOT NULL
        );",
    )
    .map_err(|e| StoreError::Migration {
        version: 0,
        message: format!("failed to create _migrations table: {e}"),
    })
}

fn apply(conn: &Connection, migration: &Migration) -> StoreResult<()> {
    info!(
        version = migration.version,
        description = migration.description,
        "applying migration"
    );

    let fail = |stage: &str, e: rusqlite::Error| StoreError::Migration {
        version: migration.version,
        message: format!("{stage}: {e}"),
    };

    // `Connection::transaction` needs `&mut`, so the transaction is manual.
    conn.execute_batch("BEGIN IMMEDIATE;")
        .map_err(|e| fail("begin", e))?;

    let result = conn
        .execute_batch(migration.sql)
        .map_err(|e| fail("sql", e))
        .and_then(|()| {
            conn.execute(
                "INSERT INTO _migrations (version, description, applied_at) VALUES (?1, ?2, ?3)",
                rusqlite::params![
                    migration.version,
                    migration.description,
                    chrono::Utc::now().timestamp()
                ],
            )
            .map(|_| ())
            .map_err(|e| fail("record", e))
        });

    match result {
        Ok(()) => {
            conn.execute_batch("COMMIT;")
                .map_err(|e| fail("commit", e))?;
            info!(version = migration.version, "migration applied");
            Ok(())
        }
        Err(err) => {
            warn!(version = migration.version, %err, "migration failed, rolling back");
            let _ = conn.execute_batch("ROLLBACK;");
            Err(err)
        }
    }
}
