//! Integration tests for minimal-store against an on-disk database.

use minimal_store::{
    Database, MemoryStore, NewInteraction, NewRequest, NewResponse, NewStep, PlanSummary, RunStore,
};

// ═══════════════════════════════════════════════════════════════════════
//  Database lifecycle
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn open_and_migrate_on_disk_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data").join("minimal.db");

    let db = Database::open_and_migrate(path.clone()).await.unwrap();
    drop(db);
    let db = Database::open_and_migrate(path.clone()).await.unwrap();

    let count: i64 = db
        .execute(|conn| Ok(conn.query_row("SELECT count(*) FROM requests", [], |r| r.get(0))?))
        .await
        .unwrap();
    assert_eq!(count, 0);
    assert!(path.exists());
}

// ═══════════════════════════════════════════════════════════════════════
//  Full run lifecycle
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn full_run_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("runs.db");

    let request_id = {
        let db = Database::open_and_migrate(path.clone()).await.unwrap();
        let runs = RunStore::new(db.clone());
        let memory = MemoryStore::new(db);

        let request_id = runs
            .create_request(NewRequest {
                session_id: "session-a".into(),
                user_prompt: "Plan a trip to Lisbon".into(),
                intent: "complex".into(),
                strategy: "agent_multi".into(),
            })
            .await
            .unwrap();

        runs.store_plan(&request_id, &serde_json::json!({"steps": [1, 2]}))
            .await
            .unwrap();

        for (tool, output) in [("llm_generate", "itinerary"), ("llm_generate", "[ERROR] timeout")] {
            runs.create_step(NewStep {
                request_id: request_id.clone(),
                step_type: format!("agent_tool:{tool}"),
                model_name: "gemini-2.5-flash".into(),
                input_prompt: "Plan a trip".into(),
                output_text: output.into(),
                tokens_used: 100,
                latency_ms: 900,
            })
            .await
            .unwrap();
        }

        runs.create_response(NewResponse {
            request_id: request_id.clone(),
            final_response: "itinerary".into(),
            models_used: serde_json::json!({"models": ["gemini-2.5-flash"], "strategy": "agent"}),
            latency_ms: 1_900,
            estimated_cost: 0.00002,
        })
        .await
        .unwrap();

        memory
            .store_interaction(NewInteraction {
                session_id: "session-a".into(),
                user_id: "user-1".into(),
                prompt: "Plan a trip to Lisbon".into(),
                response: "itinerary".into(),
                plan_summary: Some(PlanSummary {
                    complexity: "complex".into(),
                    steps_count: 2,
                }),
            })
            .await
            .unwrap();

        request_id
    };

    let db = Database::open_and_migrate(path).await.unwrap();
    let runs = RunStore::new(db.clone());
    let memory = MemoryStore::new(db);

    let request = runs.get_request(&request_id).await.unwrap();
    assert_eq!(request.intent, "complex");

    let steps = runs.list_steps(&request_id).await.unwrap();
    assert_eq!(steps.len(), 2);
    assert!(steps[1].output_text.starts_with("[ERROR] "));

    let response = runs.get_response(&request_id).await.unwrap().unwrap();
    assert_eq!(response.final_response, "itinerary");
    assert_eq!(response.models_used["strategy"], "agent");

    let ctx = memory.session_context("session-a", 10, 3000).await.unwrap();
    assert_eq!(ctx, "User: Plan a trip to Lisbon\nAI: itinerary");
}
