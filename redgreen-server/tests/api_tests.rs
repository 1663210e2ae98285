//! Integration tests for redgreen-server API endpoints
//!
//! Tests cover:
//! - Session start: slot assignment, duplicate and capacity rejection
//! - Scene sequencing from familiarization through finish
//! - Response scoring and submission validation
//! - Timeout checks, slot reassignment and early session end
//! - Request bodies with string ids or that fail to parse
//! - Monitoring summaries, ignore flag and health

mod helpers;

use axum::http::StatusCode;
use helpers::{frames, setup};
use redgreen_common::db::SessionRecord;
use serde_json::json;
use sqlx::Row;

async fn profile_slot(app: &helpers::TestApp, session_id: i64) -> i64 {
    sqlx::query("SELECT profile_slot FROM sessions WHERE id = ?")
        .bind(session_id)
        .fetch_one(&app.pool)
        .await
        .unwrap()
        .get("profile_slot")
}

async fn save(app: &helpers::TestApp, session_id: i64, trial_id: i64, f: bool, j: bool) -> (StatusCode, serde_json::Value) {
    app.post(
        "/save_data",
        json!({
            "session_id": session_id,
            "unique_trial_id": trial_id,
            "recordedKeyStates": frames(10, f, j),
            "counterbalance": false,
        }),
    )
    .await
}

/// Each progress counter equals the completed rows of its kind, plus at
/// most one served trial awaiting its score
async fn assert_counters_track_completed_rows(app: &helpers::TestApp, session_id: i64) {
    let progress: String = sqlx::query_scalar("SELECT progress_json FROM session_progress WHERE session_id = ?")
        .bind(session_id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    let progress: serde_json::Value = serde_json::from_str(&progress).unwrap();

    for (counter, kind) in [("ftrial_i", "ftrial"), ("trial_i", "trial")] {
        let served = progress[counter].as_i64().unwrap();
        let completed: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM trials WHERE session_id = ? AND trial_kind = ? AND completed = 1",
        )
        .bind(session_id)
        .bind(kind)
        .fetch_one(&app.pool)
        .await
        .unwrap();
        assert!(
            served == completed || served == completed + 1,
            "{} = {} with {} completed {} rows",
            counter,
            served,
            completed,
            kind
        );
    }
}

async fn trial_rows(app: &helpers::TestApp, session_id: i64, completed: bool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM trials WHERE session_id = ? AND completed = ?")
        .bind(session_id)
        .bind(completed)
        .fetch_one(&app.pool)
        .await
        .unwrap()
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn test_health_endpoint() {
    let app = setup(2).await;
    let (status, body) = app.get("/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "redgreen-server");
    assert!(body["version"].is_string());
}

// =============================================================================
// Session start
// =============================================================================

#[tokio::test]
async fn test_start_experiment_returns_session_info() {
    let app = setup(2).await;
    let (status, body) = app
        .post("/start_experiment/redgreen?PROLIFIC_PID=p-1&STUDY_ID=s&SESSION_ID=x", json!(null))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["experiment_name"], "redgreen");
    assert_eq!(body["num_ftrials"], 2);
    assert_eq!(body["num_trials"], 2);
    assert_eq!(body["timeout_period_seconds"], 7200.0);
    assert_eq!(body["check_timeout_interval_seconds"], 300.0);
    assert!(body["start_time_utc"].is_string());

    let session_id = body["session_id"].as_i64().unwrap();
    assert_eq!(profile_slot(&app, session_id).await, 0);
}

#[tokio::test]
async fn test_duplicate_pid_rejected() {
    let app = setup(4).await;
    app.start("p-dup").await;

    let (status, body) = app
        .post("/start_experiment/redgreen?PROLIFIC_PID=p-dup", json!(null))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "duplicate_pid");
    assert!(body["message"].as_str().unwrap().contains("already done this experiment"));
}

#[tokio::test]
async fn test_placeholder_pid_may_repeat() {
    let app = setup(4).await;
    let first = app.start("default_pid").await;
    let second = app.start("default_pid").await;

    assert_eq!(profile_slot(&app, first).await, 0);
    assert_eq!(profile_slot(&app, second).await, 1);
}

#[tokio::test]
async fn test_capacity_exceeded() {
    let app = setup(2).await;
    app.start("p-a").await;
    app.start("p-b").await;

    let (status, body) = app
        .post("/start_experiment/redgreen?PROLIFIC_PID=p-c", json!(null))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "max_participants_reached");
}

#[tokio::test]
async fn test_unknown_experiment_is_not_found() {
    let app = setup(2).await;
    let (status, body) = app
        .post("/start_experiment/bluegreen?PROLIFIC_PID=p-a", json!(null))
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("bluegreen"));
}

// =============================================================================
// Full round trip
// =============================================================================

#[tokio::test]
async fn test_full_session_round_trip() {
    let app = setup(2).await;
    let session_id = app.start("p-round").await;
    assert_counters_track_completed_rows(&app, session_id).await;

    // Familiarization 0 (F1, red)
    let scene = app.next_scene(session_id).await;
    assert_counters_track_completed_rows(&app, session_id).await;
    assert_eq!(scene["is_ftrial"], true);
    assert_eq!(scene["ftrial_i"], 1);
    assert_eq!(scene["worldWidth"], 20);
    assert_eq!(scene["rg_outcome"], "red");
    assert_eq!(scene["radius"], 0.5);
    assert_eq!(scene["finish"], false);
    let trial_id = scene["unique_trial_id"].as_i64().unwrap();
    assert!(trial_id > 0);

    let (status, body) = save(&app, session_id, trial_id, true, false).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "success");
    assert_eq!(body["score"], 120.0);
    assert_counters_track_completed_rows(&app, session_id).await;

    // Familiarization 1 (F2, green)
    let scene = app.next_scene(session_id).await;
    assert_eq!(scene["ftrial_i"], 2);
    assert_counters_track_completed_rows(&app, session_id).await;
    let trial_id = scene["unique_trial_id"].as_i64().unwrap();
    let (_, body) = save(&app, session_id, trial_id, true, false).await;
    assert_eq!(body["score"], -80.0);
    assert_counters_track_completed_rows(&app, session_id).await;

    // Transition screen creates no trial row
    let scene = app.next_scene(session_id).await;
    assert_counters_track_completed_rows(&app, session_id).await;
    assert_eq!(scene["fam_to_exp_page"], true);
    assert_eq!(scene["is_ftrial"], false);
    assert_eq!(scene["unique_trial_id"], -1);
    assert_eq!(scene["counterbalance"], false);
    let (status, _) = save(&app, session_id, -1, true, false).await;
    assert_eq!(status.as_u16(), 405);

    // Experimental trials
    for expected in 1..=2 {
        let scene = app.next_scene(session_id).await;
        assert_eq!(scene["is_trial"], true);
        assert_eq!(scene["fam_to_exp_page"], false);
        assert_eq!(scene["trial_i"], expected);
        assert_counters_track_completed_rows(&app, session_id).await;
        let trial_id = scene["unique_trial_id"].as_i64().unwrap();
        let (status, _) = save(&app, session_id, trial_id, false, false).await;
        assert_eq!(status, StatusCode::OK);
        assert_counters_track_completed_rows(&app, session_id).await;
    }

    let scene = app.next_scene(session_id).await;
    assert_eq!(scene["finish"], true);
    assert_eq!(scene["unique_trial_id"], -1);
    assert_eq!(scene["average_score"], 20.0);

    // Progress record is gone after finishing
    let (status, _) = app
        .post("/load_next_scene", json!({ "session_id": session_id }))
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let row = sqlx::query("SELECT * FROM sessions WHERE id = ?")
        .bind(session_id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    let session = SessionRecord::from_row(&row).unwrap();
    assert!(session.completed);
    assert!(session.end_time.unwrap() >= session.start_time);
    assert!(session.time_taken_secs.is_some());

    let trial_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM trials WHERE session_id = ?")
        .bind(session_id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(trial_rows, 4);

    // Monitoring summary reflects the finished session
    let (status, body) = app.get("/sessions").await;
    assert_eq!(status, StatusCode::OK);
    let summary = &body[0];
    assert_eq!(summary["id"], session_id);
    assert_eq!(summary["completed"], true);
    assert_eq!(summary["num_ftrials_completed"], 2);
    assert_eq!(summary["num_trials_completed"], 2);
    assert_eq!(summary["trial_scores"].as_array().unwrap().len(), 2);
    assert_eq!(summary["time_series_data"]["uncertain"].as_array().unwrap().len(), 20);
    assert_eq!(summary["time_series_data"]["uncertain"][0], true);
}

#[tokio::test]
async fn test_unscored_trial_is_served_again() {
    let app = setup(2).await;
    let session_id = app.start("p-refresh").await;

    let first = app.next_scene(session_id).await;
    let again = app.next_scene(session_id).await;

    assert_eq!(first["ftrial_i"], 1);
    assert_eq!(again["ftrial_i"], 1);
    assert_eq!(again["is_ftrial"], true);
    assert_ne!(first["unique_trial_id"], again["unique_trial_id"]);

    // The abandoned row stays incomplete and is not counted
    assert_counters_track_completed_rows(&app, session_id).await;
    assert_eq!(trial_rows(&app, session_id, false).await, 2);
    assert_eq!(trial_rows(&app, session_id, true).await, 0);

    let trial_id = again["unique_trial_id"].as_i64().unwrap();
    let (status, _) = save(&app, session_id, trial_id, true, false).await;
    assert_eq!(status, StatusCode::OK);
    assert_counters_track_completed_rows(&app, session_id).await;

    let next = app.next_scene(session_id).await;
    assert_eq!(next["ftrial_i"], 2);
    assert_counters_track_completed_rows(&app, session_id).await;
    assert_eq!(trial_rows(&app, session_id, true).await, 1);
}

// =============================================================================
// Scene and save validation
// =============================================================================

#[tokio::test]
async fn test_load_next_scene_unknown_session() {
    let app = setup(2).await;

    let (status, _) = app.post("/load_next_scene", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app.post("/load_next_scene", json!({ "session_id": 42 })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Session not found in database");
}

#[tokio::test]
async fn test_save_data_validation_codes() {
    let app = setup(2).await;
    let session_id = app.start("p-val").await;
    let trial_id = app.next_scene(session_id).await["unique_trial_id"].as_i64().unwrap();

    let (status, body) = app.post("/save_data", json!({})).await;
    assert_eq!(status.as_u16(), 401);
    assert_eq!(body["error"], "Session ID not provided");

    let (status, _) = save(&app, session_id + 100, trial_id, true, false).await;
    assert_eq!(status.as_u16(), 402);

    let (status, _) = save(&app, session_id, trial_id + 100, true, false).await;
    assert_eq!(status.as_u16(), 405);

    let (status, body) = app
        .post(
            "/save_data",
            json!({ "session_id": session_id, "unique_trial_id": trial_id, "recordedKeyStates": [] }),
        )
        .await;
    assert_eq!(status.as_u16(), 406);
    assert_eq!(body["error"], "No key state data provided");
}

#[tokio::test]
async fn test_counterbalanced_submission_swaps_keys() {
    let app = setup(2).await;
    let session_id = app.start("p-cb").await;
    let trial_id = app.next_scene(session_id).await["unique_trial_id"].as_i64().unwrap();

    // F1 is red; with keys swapped, holding J reads as red
    let (status, body) = app
        .post(
            "/save_data",
            json!({
                "session_id": session_id,
                "unique_trial_id": trial_id,
                "recordedKeyStates": frames(4, false, true),
                "counterbalance": true,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["score"], 120.0);

    let stored: i64 = sqlx::query_scalar("SELECT SUM(f_pressed) FROM key_frames WHERE trial_id = ?")
        .bind(trial_id)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(stored, 4);
}

#[tokio::test]
async fn test_session_id_sent_as_string() {
    let app = setup(2).await;
    let session_id = app.start("p-text").await;
    let id = session_id.to_string();

    let (status, scene) = app.post("/load_next_scene", json!({ "session_id": id })).await;
    assert_eq!(status, StatusCode::OK, "{}", scene);
    let trial_id = scene["unique_trial_id"].as_i64().unwrap().to_string();

    let (status, body) = app
        .post(
            "/save_data",
            json!({
                "session_id": id,
                "unique_trial_id": trial_id,
                "recordedKeyStates": frames(10, true, false),
                "counterbalance": false,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["score"], 120.0);

    let (status, body) = app.post("/check_timeout", json!({ "session_id": id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "active");

    let (status, _) = app.post("/end_session", json!({ "session_id": id })).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.post("/check_timeout", json!({ "session_id": "seven" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_malformed_save_body_is_unhandled() {
    let app = setup(2).await;
    let session_id = app.start("p-broken").await;
    let trial_id = app.next_scene(session_id).await["unique_trial_id"].as_i64().unwrap();

    // Frame without its key map
    let (status, body) = app
        .post(
            "/save_data",
            json!({
                "session_id": session_id,
                "unique_trial_id": trial_id,
                "recordedKeyStates": [{ "frame": 0 }],
            }),
        )
        .await;
    assert_eq!(status.as_u16(), 555);
    assert!(body["error"].is_string());

    let (status, body) = app.post_raw("/save_data", "{not json").await;
    assert_eq!(status.as_u16(), 555);
    assert!(body["error"].is_string());

    // Nothing was scored
    assert_eq!(trial_rows(&app, session_id, true).await, 0);
}

#[tokio::test]
async fn test_malformed_bodies_get_json_errors() {
    let app = setup(2).await;

    for uri in ["/load_next_scene", "/check_timeout", "/end_session", "/sessions/1/ignore"] {
        let (status, body) = app.post_raw(uri, "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert!(body["error"].is_string(), "{}: {}", uri, body);
    }
}

// =============================================================================
// Timeout and end session
// =============================================================================

#[tokio::test]
async fn test_check_timeout_active() {
    let app = setup(2).await;
    let session_id = app.start("p-live").await;

    let (status, body) = app.post("/check_timeout", json!({ "session_id": session_id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "active");
}

#[tokio::test]
async fn test_timeout_frees_slot() {
    let app = setup(2).await;
    let stale = app.start("p-stale").await;
    app.start("p-other").await;
    app.backdate(stale, 3).await;

    let (status, body) = app.post("/check_timeout", json!({ "session_id": stale })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "timeout");
    assert!(body["start_time_utc"].is_string());
    assert!(body["current_time_utc"].is_string());

    let has_timed_out: bool = sqlx::query_scalar("SELECT has_timed_out FROM sessions WHERE id = ?")
        .bind(stale)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert!(has_timed_out);

    let (status, _) = app.post("/load_next_scene", json!({ "session_id": stale })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    // The expired slot goes to the next participant
    let fresh = app.start("p-fresh").await;
    assert_eq!(profile_slot(&app, fresh).await, 0);
}

#[tokio::test]
async fn test_reassigned_slot_drops_expired_progress() {
    let app = setup(2).await;
    let expired = app.start("p-away").await;
    app.next_scene(expired).await;
    app.backdate(expired, 3).await;

    let next = app.start("p-next").await;
    assert_eq!(profile_slot(&app, next).await, 0);

    // The expired participant can no longer be served a scene
    let (status, _) = app.post("/load_next_scene", json!({ "session_id": expired })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let progress_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM session_progress")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(progress_rows, 1);

    // Only a timeout check marks the session timed out
    let has_timed_out: bool = sqlx::query_scalar("SELECT has_timed_out FROM sessions WHERE id = ?")
        .bind(expired)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert!(!has_timed_out);

    // The served trial row is kept for analysis
    assert_eq!(trial_rows(&app, expired, false).await, 1);
}

#[tokio::test]
async fn test_check_timeout_validation() {
    let app = setup(2).await;

    let (status, _) = app.post("/check_timeout", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.post("/check_timeout", json!({ "session_id": 7 })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_end_session_removes_progress() {
    let app = setup(2).await;
    let session_id = app.start("p-leave").await;

    for _ in 0..2 {
        let (status, _) = app.post("/end_session", json!({ "session_id": session_id })).await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, _) = app.post("/load_next_scene", json!({ "session_id": session_id })).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _) = app.post("/end_session", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Ignore flag
// =============================================================================

#[tokio::test]
async fn test_ignored_session_keeps_slot() {
    let app = setup(2).await;
    let ignored = app.start("p-ignored").await;
    app.backdate(ignored, 5).await;

    let (status, body) = app
        .post(&format!("/sessions/{}/ignore", ignored), json!({ "ignore": true }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ignore_data"], true);

    let next = app.start("p-next").await;
    assert_eq!(profile_slot(&app, next).await, 1);

    let (status, _) = app
        .post("/sessions/999/ignore", json!({ "ignore": true }))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
