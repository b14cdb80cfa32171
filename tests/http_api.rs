//! HTTP API integration tests.
//!
//! Starts the axum router on an ephemeral port backed by an in-memory
//! database and exercises it with reqwest.

use std::sync::Arc;

use noisedash_lib::{
    api::{self, AppState},
    db::{Database, NewVolumeReading},
    monitor::AudioLevelMonitor,
    process::{ProcessCommand, ProcessController},
    sampler::{HttpReadingSink, ReadingSink, VolumeSampler},
    settings::SettingsStore,
};
use serde_json::{json, Value};

fn test_state(name: &str, command: ProcessCommand) -> AppState {
    let db = Database::in_memory().unwrap();
    let settings_path = std::env::temp_dir()
        .join(format!("noisedash-http-{}-{name}", std::process::id()))
        .join("settings.json");

    AppState {
        db: db.clone(),
        sampler: VolumeSampler::new(Arc::new(db)),
        monitor: AudioLevelMonitor::new(),
        process: ProcessController::new(command),
        settings: Arc::new(SettingsStore::new(settings_path).unwrap()),
    }
}

/// Bind to port 0 and return the actual address.
async fn start_server(state: AppState) -> String {
    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

async fn start_default(name: &str) -> String {
    start_server(test_state(name, ProcessCommand::new("sleep").arg("30"))).await
}

#[tokio::test]
async fn stored_reading_comes_back_in_history() {
    let base = start_default("history").await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/readings"))
        .json(&json!({
            "timestamp": "2024-01-01T09:00:00Z",
            "volume": 40,
            "ambient": 55,
            "isActive": true,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["success"], true);
    assert!(!created["id"].as_str().unwrap().is_empty());

    let resp = client
        .get(format!(
            "{base}/readings?startDate=2024-01-01T00:00:00Z&endDate=2024-01-02T00:00:00Z"
        ))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    let readings = body["readings"].as_array().unwrap();
    assert_eq!(readings.len(), 1);
    assert_eq!(readings[0]["id"], created["id"]);
    assert_eq!(readings[0]["volume"], 40.0);
    assert_eq!(readings[0]["isActive"], true);
    assert!(readings[0].get("noiseType").is_none());
    assert_eq!(body["stats"]["avgVolume"], 40.0);
    assert_eq!(body["stats"]["totalReadings"], 1);

    let resp = client
        .get(format!("{base}/readings?startDate=2024-01-02"))
        .send()
        .await
        .unwrap();
    let body: Value = resp.json().await.unwrap();
    assert!(body["readings"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn missing_fields_are_rejected() {
    let base = start_default("missing").await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/readings"))
        .json(&json!({ "volume": 40 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body,
        json!({ "error": "Missing required fields: timestamp, volume, ambient" })
    );
}

#[tokio::test]
async fn bad_query_params_are_client_errors() {
    let base = start_default("badquery").await;
    let client = reqwest::Client::new();

    for query in ["limit=-5", "limit=ten", "startDate=yesterday"] {
        let resp = client
            .get(format!("{base}/readings?{query}"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400, "query {query}");
        let body: Value = resp.json().await.unwrap();
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn empty_store_reports_zero_stats() {
    let base = start_default("empty").await;
    let client = reqwest::Client::new();

    let body: Value = client
        .get(format!("{base}/readings/stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["avgVolume"], 0.0);
    assert_eq!(body["maxVolume"], 0.0);
    assert_eq!(body["minVolume"], 0.0);
    assert_eq!(body["totalReadings"], 0);
    assert!(body["timeRange"]["start"].is_string());

    let recent: Value = client
        .get(format!("{base}/readings/recent"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(recent, json!([]));
}

#[tokio::test]
async fn purge_deletes_only_old_readings() {
    let base = start_default("purge").await;
    let client = reqwest::Client::new();

    let old = chrono::Utc::now() - chrono::Duration::days(40);
    for timestamp in [old.to_rfc3339(), chrono::Utc::now().to_rfc3339()] {
        let resp = client
            .post(format!("{base}/readings"))
            .json(&json!({ "timestamp": timestamp, "volume": 10, "ambient": 10 }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }

    let body: Value = client
        .delete(format!("{base}/readings?olderThanDays=30"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body, json!({ "deleted": 1 }));
}

#[tokio::test]
async fn huge_purge_age_is_rejected_and_store_keeps_working() {
    let base = start_default("hugepurge").await;
    let client = reqwest::Client::new();

    let resp = client
        .delete(format!("{base}/readings?olderThanDays=100000000"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(format!("{base}/readings"))
        .json(&json!({ "timestamp": "2024-01-01T09:00:00Z", "volume": 40, "ambient": 55 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client.get(format!("{base}/readings")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn five_digit_year_timestamp_is_rejected() {
    let base = start_default("farfuture").await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/readings"))
        .json(&json!({ "timestamp": 253_402_300_800_000_i64, "volume": 40, "ambient": 55 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);

    let resp = client
        .post(format!("{base}/readings"))
        .json(&json!({ "timestamp": "2024-01-01T09:00:00Z", "volume": 40, "ambient": 55 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    for path in ["readings", "readings/stats"] {
        let resp = client.get(format!("{base}/{path}")).send().await.unwrap();
        assert_eq!(resp.status(), 200, "GET /{path}");
    }
}

#[tokio::test]
async fn http_sink_posts_to_a_running_instance() {
    let state = test_state("httpsink", ProcessCommand::new("sleep").arg("30"));
    let db = state.db.clone();
    let base = start_server(state).await;
    let sink = HttpReadingSink::new(format!("{base}/readings"));

    let id = sink
        .submit(NewVolumeReading {
            timestamp: Some(chrono::Utc::now()),
            volume: 35.0,
            ambient: 50.0,
            is_active: true,
            noise_type: Some("Low".into()),
            location: Some("office".into()),
        })
        .await
        .unwrap();

    let stored = db.recent_volume_readings(10).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].id, id);
    assert_eq!(stored[0].noise_type.as_deref(), Some("Low"));
    assert_eq!(stored[0].location.as_deref(), Some("office"));

    // NaN serializes as null, which the endpoint reports as a missing field.
    let rejected = sink
        .submit(NewVolumeReading {
            timestamp: Some(chrono::Utc::now()),
            volume: f64::NAN,
            ambient: 50.0,
            is_active: false,
            noise_type: None,
            location: None,
        })
        .await;
    assert!(rejected.is_err());
    assert_eq!(db.recent_volume_readings(10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_noise_cancel_action_is_rejected() {
    let base = start_default("action").await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/noise-cancel"))
        .json(&json!({ "action": "pause" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Invalid action. Use \"start\" or \"stop\"");

    let body: Value = client
        .post(format!("{base}/noise-cancel"))
        .json(&json!({ "action": "stop" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(
        body,
        json!({ "success": false, "message": "No process running" })
    );
}

#[cfg(unix)]
#[tokio::test]
async fn noise_cancel_start_status_stop() {
    let base = start_default("lifecycle").await;
    let client = reqwest::Client::new();

    let started: Value = client
        .post(format!("{base}/noise-cancel"))
        .json(&json!({ "action": "start" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(started["success"], true);
    assert_eq!(started["message"], "Noise cancellation started");
    let pid = started["pid"].as_u64().unwrap();

    let status: Value = client
        .get(format!("{base}/noise-cancel"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status, json!({ "isRunning": true, "pid": pid }));

    let stopped: Value = client
        .post(format!("{base}/noise-cancel"))
        .json(&json!({ "action": "stop" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stopped["message"], "Noise cancellation stopped");

    let status: Value = client
        .get(format!("{base}/noise-cancel"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status, json!({ "isRunning": false, "pid": null }));
}

#[tokio::test]
async fn spawn_failure_is_a_server_error() {
    let state = test_state(
        "spawnfail",
        ProcessCommand::new("/nonexistent/noise-cancel-binary"),
    );
    let base = start_server(state).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/noise-cancel"))
        .json(&json!({ "action": "start" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Failed to control noise cancellation");
}

#[tokio::test]
async fn volume_updates_are_visible_and_loggable() {
    let state = test_state("volume", ProcessCommand::new("sleep").arg("30"));
    let db = state.db.clone();
    let base = start_server(state).await;
    let client = reqwest::Client::new();

    let snapshot: Value = client
        .put(format!("{base}/volume"))
        .json(&json!({ "volume": 72.5, "ambient": 80, "isActive": true }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(snapshot["volume"], 72.5);
    assert_eq!(snapshot["noiseType"], "High");
    assert_eq!(snapshot["isLogging"], false);
    assert_eq!(snapshot["isMonitoring"], false);

    let current: Value = client
        .get(format!("{base}/volume"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(current, snapshot);

    let logged: Value = client
        .post(format!("{base}/volume/log"))
        .json(&json!({ "volume": 95, "ambient": 97 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(logged, json!({ "success": true }));

    let stored = db.recent_volume_readings(10).await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].noise_type.as_deref(), Some("Very High"));
    assert_eq!(stored[0].location.as_deref(), Some("default"));
}

#[tokio::test]
async fn sampler_can_be_toggled() {
    let base = start_default("sampler").await;
    let client = reqwest::Client::new();

    let started: Value = client
        .post(format!("{base}/sampler"))
        .json(&json!({ "action": "start" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(started["success"], true);

    let current: Value = client
        .get(format!("{base}/volume"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(current["isLogging"], true);

    client
        .post(format!("{base}/sampler"))
        .json(&json!({ "action": "stop" }))
        .send()
        .await
        .unwrap();
    let current: Value = client
        .get(format!("{base}/volume"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(current["isLogging"], false);
}

#[tokio::test]
async fn settings_round_trip_and_validate() {
    let base = start_default("settings").await;
    let client = reqwest::Client::new();

    let defaults: Value = client
        .get(format!("{base}/settings"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(defaults["location"], "default");

    let updated = json!({
        "location": "office",
        "schedule": { "enabled": true, "start": "08:00", "end": "18:30" },
    });
    let resp = client
        .put(format!("{base}/settings"))
        .json(&updated)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let saved: Value = resp.json().await.unwrap();
    assert_eq!(saved, updated);

    let resp = client
        .put(format!("{base}/settings"))
        .json(&json!({
            "location": "office",
            "schedule": { "enabled": true, "start": "8am", "end": "18:30" },
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}
