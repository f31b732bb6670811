//! Integration tests for CLI output against a stubbed dashboard backend.
//!
//! The default behavior is quiet (no logs). Use -v/--verbose to enable logs.

use std::process::{Command, Output};

use serde_json::{Value, json};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Run the binary with an isolated HOME and working directory so no user or
/// project config leaks in.
fn run_scrapewatch(api_url: &str, args: &[&str]) -> Output {
    let home = TempDir::new().expect("temp home");
    Command::new(env!("CARGO_BIN_EXE_scrapewatch"))
        .args(args)
        .args(["--no-color", "--api-url", api_url])
        .env("HOME", home.path())
        .env_remove("RUST_LOG")
        .env_remove("SCRAPEWATCH_API_URL")
        .env_remove("SCRAPEWATCH_WS_URL")
        .current_dir(home.path())
        .output()
        .expect("Failed to execute scrapewatch")
}

fn api_url(server: &MockServer) -> String {
    format!("{}/api", server.uri())
}

fn sessions_body() -> Value {
    json!({
        "data": [
            {
                "_id": "s1",
                "name": "weekly crawl",
                "status": "running",
                "config": { "maxDepth": 2 },
                "currentDepth": 1,
                "totalProfiles": 40,
                "scrapedProfiles": 10
            },
            { "_id": "s2", "name": "done", "status": "completed" }
        ]
    })
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sessions_table_stdout_is_clean() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sessions_body()))
        .mount(&server)
        .await;

    let output = run_scrapewatch(&api_url(&server), &["sessions"]);
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(output.status.success(), "stderr: {}", stderr);
    assert!(stdout.contains("weekly crawl"));
    assert!(stdout.contains("1/2"));
    assert!(stdout.contains("10/40"));
    assert!(stdout.contains("2 sessions"));
    assert!(
        !stdout.contains(r#""event":"#),
        "stdout should not contain JSON logs, got: {}",
        stdout
    );
    assert!(
        stderr.is_empty(),
        "Default quiet mode should have empty stderr, got: {}",
        stderr
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_sessions_json_is_parseable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sessions_body()))
        .mount(&server)
        .await;

    let output = run_scrapewatch(&api_url(&server), &["sessions", "--json"]);
    assert!(output.status.success());

    let sessions: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    let sessions = sessions.as_array().expect("array");
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions[0]["_id"], "s1");
    assert_eq!(sessions[1]["status"], "completed");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_profiles_sends_one_based_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/dashboard/session/s1/profiles"))
        .and(query_param("page", "2"))
        .and(query_param("offset", "20"))
        .and(query_param("status", "failed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "profiles": [
                    { "_id": "p1", "username": "alice", "status": "failed", "depth": 1, "error": "private account" }
                ],
                "pagination": { "totalCount": 21, "page": 2, "limit": 20, "totalPages": 2, "hasMore": false }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let output = run_scrapewatch(
        &api_url(&server),
        &["profiles", "--session", "s1", "--status", "failed", "--page", "2", "--limit", "20"],
    );
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("alice"));
    assert!(stdout.contains("private account"));
    assert!(stdout.contains("Page 2 of 2 (21 total)"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_delete_running_session_is_refused() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sessions/s1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "_id": "s1", "name": "weekly crawl", "status": "running" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/sessions/s1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let output = run_scrapewatch(&api_url(&server), &["delete", "s1"]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("Failed to Delete Session"), "stderr: {}", stderr);
    assert!(stderr.contains("Please stop it first"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pause_announces_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sessions/s1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "_id": "s1", "name": "weekly crawl", "status": "running" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/sessions/s1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
        .expect(1)
        .mount(&server)
        .await;

    let output = run_scrapewatch(&api_url(&server), &["pause", "s1"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(stdout.contains("\"weekly crawl\" has been paused"), "stdout: {}", stdout);
}

#[test]
fn test_health_offline_exits_non_zero() {
    let output = run_scrapewatch("http://127.0.0.1:9/api", &["health", "--json"]);

    assert!(!output.status.success());
    let body: Value = serde_json::from_slice(&output.stdout).expect("valid JSON");
    assert_eq!(body["online"], false);
    assert_eq!(body["api"], "http://127.0.0.1:9/api");
}
