//! Per-session conversation memory.
//!
//! Every finished agent run stores one exchange (prompt, response and a
//! small plan summary). The planner reads the most recent exchanges of the
//! same session back as a bounded context block.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::db::Database;
use crate::error::StoreResult;
use crate::truncate_chars;

/// Stored prompt length cap, in characters.
pub const MAX_STORED_PROMPT_CHARS: usize = 5_000;
/// Stored response length cap, in characters.
pub const MAX_STORED_RESPONSE_CHARS: usize = 10_000;
/// Per-side cap applied when an exchange is rendered into context.
pub const CONTEXT_SNIPPET_CHARS: usize = 500;

const CONTEXT_SEPARATOR: &str = "\n---\n";

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// Compact description of the plan that produced a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub complexity: String,
    pub steps_count: usize,
}

/// One exchange to store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInteraction {
    pub session_id: String,
    pub user_id: String,
    pub prompt: String,
    pub response: String,
    pub plan_summary: Option<PlanSummary>,
}

/// A stored exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub id: i64,
    pub session_id: String,
    pub user_id: String,
    pub prompt: String,
    pub response: String,
    pub plan_summary: Option<PlanSummary>,
    pub created_at: i64,
}

// ═══════════════════════════════════════════════════════════════════════
//  MemoryStore
// ═══════════════════════════════════════════════════════════════════════

/// SQLite-backed `agent_memory` table.
#[derive(Clone)]
pub struct MemoryStore {
    db: Database,
}

impl MemoryStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Render the most recent `limit` exchanges of a session as context.
    ///
    /// Exchanges come out oldest first as `User: …\nAI: …` blocks joined by
    /// `\n---\n`. Rendering stops at the first block that would push the
    /// running total past `max_chars`. An unknown session yields `""`.
    #[instrument(skip(self))]
    pub async fn session_context(
        &self,
        session_id: &str,
        limit: usize,
        max_chars: usize,
    ) -> StoreResult<String> {
        let mut recent = self.recent(session_id, limit).await?;
        recent.reverse();

        let mut blocks = Vec::with_capacity(recent.len());
        let mut total = 0usize;
        for entry in &recent {
            let block = format!(
                "User: {}\nAI: {}",
                truncate_chars(&entry.prompt, CONTEXT_SNIPPET_CHARS),
                truncate_chars(&entry.response, CONTEXT_SNIPPET_CHARS)
            );
            let len = block.chars().count();
            if total + len > max_chars {
                break;
            }
            total += len;
            blocks.push(block);
        }

        debug!(exchanges = blocks.len(), chars = total, "session context built");
        Ok(blocks.join(CONTEXT_SEPARATOR))
    }

    /// Store one exchange. Prompt and response are truncated to the stored
    /// caps. Returns the new row id.
    #[instrument(skip(self, interaction), fields(session_id = %interaction.session_id))]
    pub async fn store_interaction(&self, interaction: NewInteraction) -> StoreResult<i64> {
        let prompt = truncate_chars(&interaction.prompt, MAX_STORED_PROMPT_CHARS);
        let response = truncate_chars(&interaction.response, MAX_STORED_RESPONSE_CHARS);
        let summary = interaction
            .plan_summary
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let now = Utc::now().timestamp();

        self.db
            .execute(move |conn| {
                conn.execute(
                    "INSERT INTO agent_memory
                        (session_id, user_id, user_prompt, ai_response, plan_summary, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    rusqlite::params![
                        interaction.session_id,
                        interaction.user_id,
                        prompt,
                        response,
                        summary,
                        now
                    ],
                )?;
                Ok(conn.last_insert_rowid())
            })
            .await
    }

    /// All exchanges of a session, oldest first.
    #[instrument(skip(self))]
    pub async fn session_entries(&self, session_id: &str) -> StoreResult<Vec<MemoryEntry>> {
        self.select(
            "WHERE session_id = ?1 ORDER BY id ASC LIMIT -1",
            session_id,
        )
        .await
    }

    /// A user's exchanges across sessions, newest first.
    #[instrument(skip(self))]
    pub async fn user_history(&self, user_id: &str, limit: usize) -> StoreResult<Vec<MemoryEntry>> {
        let clause = format!("WHERE user_id = ?1 ORDER BY id DESC LIMIT {limit}");
        self.select(&clause, user_id).await
    }

    // ── internals ────────────────────────────────────────────────────

    async fn recent(&self, session_id: &str, limit: usize) -> StoreResult<Vec<MemoryEntry>> {
        let clause = format!("WHERE session_id = ?1 ORDER BY id DESC LIMIT {limit}");
        self.select(&clause, session_id).await
    }

    async fn select(&self, clause: &str, key: &str) -> StoreResult<Vec<MemoryEntry>> {
        let sql = format!(
            "SELECT id, session_id, user_id, user_prompt, ai_response, plan_summary, created_at
             FROM agent_memory {clause}"
        );
        let key = key.to_string();

        self.db
            .execute(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map([&key], |row| {
                    Ok((
                        MemoryEntry {
                            id: row.get(0)?,
                            session_id: row.get(1)?,
                            user_id: row.get(2)?,
                            prompt: row.get(3)?,
                            response: row.get(4)?,
                            plan_summary: None,
                            created_at: row.get(6)?,
                        },
                        row.get::<_, Option<String>>(5)?,
                    ))
                })?;

                let mut entries = Vec::new();
                for row in rows {
                    let (mut entry, summary) = row?;
                    entry.plan_summary = summary
                        .as_deref()
                        .map(serde_json::from_str)
                        .transpose()?;
                    entries.push(entry);
                }
                Ok(entries)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> MemoryStore {
        MemoryStore::new(Database::in_memory_migrated().await.unwrap())
    }

    fn exchange(session: &str, prompt: &str, response: &str) -> NewInteraction {
        NewInteraction {
            session_id: session.into(),
            user_id: "u-1".into(),
            prompt: prompt.into(),
            response: response.into(),
            plan_summary: Some(PlanSummary {
                complexity: "simple".into(),
                steps_count: 1,
            }),
        }
    }

    #[tokio::test]
    async fn empty_session_has_empty_context() {
        let store = store().await;
        assert_eq!(store.session_context("none", 10, 3000).await.unwrap(), "");
    }

    #[tokio::test]
    async fn context_is_chronological_and_separated() {
        let store = store().await;
        store.store_interaction(exchange("s", "first", "one")).await.unwrap();
        store.store_interaction(exchange("s", "second", "two")).await.unwrap();
        store.store_interaction(exchange("other", "noise", "x")).await.unwrap();

        let ctx = store.session_context("s", 10, 3000).await.unwrap();
        assert_eq!(ctx, "User: first\nAI: one\n---\nUser: second\nAI: two");
    }

    #[tokio::test]
    async fn context_keeps_only_the_latest_exchanges() {
        let store = store().await;
        for i in 0..5 {
            store
                .store_interaction(exchange("s", &format!("q{i}"), &format!("a{i}")))
                .await
                .unwrap();
        }
        let ctx = store.session_context("s", 2, 3000).await.unwrap();
        assert_eq!(ctx, "User: q3\nAI: a3\n---\nUser: q4\nAI: a4");
    }

    #[tokio::test]
    async fn context_stops_at_the_character_budget() {
        let store = store().await;
        let long = "y".repeat(400);
        store.store_interaction(exchange("s", "a", &long)).await.unwrap();
        store.store_interaction(exchange("s", "b", &long)).await.unwrap();

        // Each block is "User: a\nAI: " (12 chars) + 400.
        let ctx = store.session_context("s", 10, 500).await.unwrap();
        assert!(ctx.starts_with("User: a\n"));
        assert!(!ctx.contains("User: b"));
    }

    #[tokio::test]
    async fn snippets_are_capped_in_context() {
        let store = store().await;
        let long = "z".repeat(900);
        store.store_interaction(exchange("s", &long, "ok")).await.unwrap();
        let ctx = store.session_context("s", 10, 3000).await.unwrap();
        assert_eq!(ctx, format!("User: {}\nAI: ok", "z".repeat(500)));
    }

    #[tokio::test]
    async fn stored_text_is_truncated() {
        let store = store().await;
        let prompt = "p".repeat(6_000);
        let response = "r".repeat(12_000);
        store
            .store_interaction(exchange("s", &prompt, &response))
            .await
            .unwrap();
        let entries = store.session_entries("s").await.unwrap();
        assert_eq!(entries[0].prompt.len(), MAX_STORED_PROMPT_CHARS);
        assert_eq!(entries[0].response.len(), MAX_STORED_RESPONSE_CHARS);
        assert_eq!(entries[0].plan_summary.as_ref().unwrap().steps_count, 1);
    }

    #[tokio::test]
    async fn user_history_is_newest_first() {
        let store = store().await;
        store.store_interaction(exchange("s1", "old", "1")).await.unwrap();
        let mut no_plan = exchange("s2", "new", "2");
        no_plan.plan_summary = None;
        store.store_interaction(no_plan).await.unwrap();

        let history = store.user_history("u-1", 50).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].prompt, "new");
        assert!(history[0].plan_summary.is_none());
    }
}
