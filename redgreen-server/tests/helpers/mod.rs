//! Shared fixtures for redgreen-server integration tests

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use redgreen_common::config::ServerConfig;
use redgreen_common::db::init_database;
use redgreen_server::{build_router, AppState};
use serde_json::Value;
use sqlx::SqlitePool;
use std::path::Path;
use tempfile::TempDir;
use tower::util::ServiceExt; // for `oneshot`

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    // Held so the dataset and database outlive the test
    _root: TempDir,
}

/// Write one trial folder with a `data.json`
pub fn write_trial(dataset: &Path, name: &str, outcome: &str) {
    let dir = dataset.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    let data = serde_json::json!({
        "barriers": [{"x": 1.234, "y": 2.0, "width": 3.0, "height": 0.5}],
        "occluders": [],
        "step_data": {"0": {"x": 1.0, "y": 1.0}, "1": {"x": 1.5, "y": 1.25}},
        "red_sensor": {"x": 0.0, "y": 0.0, "width": 2.0, "height": 1.0},
        "green_sensor": {"x": 18.0, "y": 0.0, "width": 2.0, "height": 1.0},
        "timestep": 0.1,
        "target": {"size": 1.0},
        "rg_outcome": outcome,
    });
    std::fs::write(dir.join("data.json"), data.to_string()).unwrap();
}

/// App over two familiarization and two experimental trials
pub async fn setup(num_participants: u32) -> TestApp {
    let root = TempDir::new().unwrap();
    let dataset = root.path().join("trial_data").join("pilot");
    write_trial(&dataset, "F1", "red");
    write_trial(&dataset, "F2", "green");
    write_trial(&dataset, "E1", "red");
    write_trial(&dataset, "E3", "green");

    let mut config = ServerConfig {
        num_participants,
        participant_buffer: 0,
        timeout_period_secs: 2 * 3600,
        ..Default::default()
    };
    config.experiments.clear();
    config.experiments.insert("redgreen".into(), "pilot".into());

    let pool = init_database(&root.path().join("test.db")).await.unwrap();
    let state = AppState::new(pool.clone(), config, root.path().to_path_buf());

    TestApp {
        router: build_router(state),
        pool,
        _root: root,
    }
}

impl TestApp {
    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    /// POST `body` verbatim under a JSON content type
    pub async fn post_raw(&self, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Should read body");
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Should parse JSON")
        };
        (status, body)
    }

    /// Start a session for `pid` and return its id
    pub async fn start(&self, pid: &str) -> i64 {
        let (status, body) = self
            .post(
                &format!("/start_experiment/redgreen?PROLIFIC_PID={}&STUDY_ID=s1&SESSION_ID=p1", pid),
                Value::Null,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "start failed: {}", body);
        body["session_id"].as_i64().unwrap()
    }

    pub async fn next_scene(&self, session_id: i64) -> Value {
        let (status, body) = self
            .post("/load_next_scene", serde_json::json!({ "session_id": session_id }))
            .await;
        assert_eq!(status, StatusCode::OK, "load_next_scene failed: {}", body);
        body
    }

    /// Move a session's start time back by `hours`
    pub async fn backdate(&self, session_id: i64, hours: i64) {
        sqlx::query("UPDATE sessions SET start_time = ? WHERE id = ?")
            .bind(chrono::Utc::now() - chrono::Duration::hours(hours))
            .bind(session_id)
            .execute(&self.pool)
            .await
            .unwrap();
    }
}

/// `count` frames with only the given keys held
pub fn frames(count: usize, f: bool, j: bool) -> Value {
    Value::Array(
        (0..count)
            .map(|i| serde_json::json!({ "frame": i, "keys": { "f": f, "j": j } }))
            .collect(),
    )
}
