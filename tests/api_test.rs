use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

use codemetal_fanflow::store::MemoryStore;
use codemetal_fanflow::{routes, Engine, EngineSettings};

#[derive(Debug, Deserialize)]
struct Reading {
    device_id: String,
    temperature: f64,
    humidity: f64,
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct Device {
    device_id: String,
    relay_state: bool,
    auto_mode: bool,
    temp_threshold_high: f64,
    temp_threshold_low: f64,
}

#[derive(Debug, Deserialize)]
struct Point {
    timestamp: DateTime<Utc>,
    avg_temperature: f64,
    avg_humidity: f64,
    reading_count: usize,
}

#[derive(Debug, Deserialize)]
struct Rollup {
    device_id: String,
    avg_temperature: f64,
    min_temperature: f64,
    max_temperature: f64,
    fan_runtime_minutes: i32,
}

/// Serve the real router with a fresh memory store on an ephemeral port.
async fn spawn_app() -> Result<String> {
    // ---
    let store = Arc::new(MemoryStore::new());
    let offset = FixedOffset::east_opt(0).expect("valid offset");
    let engine = Arc::new(Engine::with_store(store, EngineSettings::with_offset(offset)));
    let app = routes::router(engine);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move { axum::serve(listener, app).await });

    Ok(format!("http://{}", addr))
}

async fn post_reading(client: &Client, base: &str, body: serde_json::Value) -> Result<reqwest::Response> {
    Ok(client.post(format!("{}/api/telemetry", base)).json(&body).send().await?)
}

async fn get_device(client: &Client, base: &str, id: &str) -> Result<Device> {
    Ok(client
        .get(format!("{}/api/devices/{}", base, id))
        .send()
        .await?
        .json()
        .await?)
}

#[tokio::test]
async fn health_reports_engine_settings() -> Result<()> {
    // ---
    let base = spawn_app().await?;
    let body: serde_json::Value = reqwest::get(format!("{}/health", base)).await?.json().await?;

    assert_eq!(body["status"], "ok");
    assert_eq!(body["utc_offset_minutes"], 0);
    assert_eq!(body["rollup_strategy"], "recompute");
    Ok(())
}

#[tokio::test]
async fn ingest_creates_device_with_defaults() -> Result<()> {
    // ---
    let base = spawn_app().await?;
    let client = Client::new();

    let resp = post_reading(
        &client,
        &base,
        json!({"device_id": "fan-1", "temperature": 22.5, "humidity": 41.0}),
    )
    .await?;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let reading: Reading = resp.json().await?;
    assert_eq!(reading.device_id, "fan-1");
    assert_eq!(reading.temperature, 22.5);
    assert_eq!(reading.humidity, 41.0);
    assert!(Utc::now() - reading.timestamp < Duration::minutes(1));

    let device = get_device(&client, &base, "fan-1").await?;
    assert_eq!(device.device_id, "fan-1");
    assert!(!device.relay_state);
    assert!(device.auto_mode);
    assert_eq!(device.temp_threshold_high, 28.0);
    assert_eq!(device.temp_threshold_low, 24.0);

    let devices: Vec<Device> = client
        .get(format!("{}/api/devices", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(devices.len(), 1);
    Ok(())
}

#[tokio::test]
async fn malformed_reading_is_rejected_without_side_effects() -> Result<()> {
    // ---
    let base = spawn_app().await?;
    let client = Client::new();

    let resp = post_reading(&client, &base, json!({"device_id": "fan-1", "temperature": 22.5})).await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await?;
    assert!(body["error"].as_str().unwrap_or_default().contains("humidity"));

    let resp = post_reading(&client, &base, json!({"device_id": "", "temperature": 1.0, "humidity": 2.0})).await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = client.get(format!("{}/api/devices/fan-1", base)).send().await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn relay_follows_hysteresis() -> Result<()> {
    // ---
    let base = spawn_app().await?;
    let client = Client::new();

    for (temp, expected) in [(29.0, true), (26.0, true), (23.0, false)] {
        post_reading(&client, &base, json!({"device_id": "fan-1", "temperature": temp, "humidity": 50.0}))
            .await?
            .error_for_status()?;
        let device = get_device(&client, &base, "fan-1").await?;
        assert_eq!(device.relay_state, expected, "after reading at {}", temp);
    }

    let command: serde_json::Value = client
        .get(format!("{}/api/devices/fan-1/command", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(command["relay"], false);
    assert_eq!(command["auto_mode"], true);
    Ok(())
}

#[tokio::test]
async fn manual_mode_and_set_relay() -> Result<()> {
    // ---
    let base = spawn_app().await?;
    let client = Client::new();
    post_reading(&client, &base, json!({"device_id": "fan-1", "temperature": 20.0, "humidity": 50.0}))
        .await?
        .error_for_status()?;

    let set_relay = format!("{}/api/devices/fan-1/set_relay", base);

    // state is ignored while the device is in auto mode
    let body: serde_json::Value = client
        .post(&set_relay)
        .json(&json!({"state": true, "auto_mode": false}))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["status"], "device updated");
    assert_eq!(body["relay_state"], false);
    assert_eq!(body["auto_mode"], false);

    let body: serde_json::Value = client
        .post(&set_relay)
        .json(&json!({"state": true, "temp_threshold_high": 30.0}))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body["relay_state"], true);
    assert_eq!(body["temp_threshold_high"], 30.0);

    // a cold reading does not switch it off in manual mode
    post_reading(&client, &base, json!({"device_id": "fan-1", "temperature": 10.0, "humidity": 50.0}))
        .await?
        .error_for_status()?;
    assert!(get_device(&client, &base, "fan-1").await?.relay_state);

    let decision: serde_json::Value = client
        .get(format!("{}/api/devices/fan-1/decide?temperature=5", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(decision["relay_state"], true);
    assert_eq!(decision["changed"], false);

    let resp = client
        .post(format!("{}/api/devices/ghost/set_relay", base))
        .json(&json!({"state": true}))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn hourly_series_has_six_buckets() -> Result<()> {
    // ---
    let base = spawn_app().await?;
    let client = Client::new();

    let empty: Vec<Point> = client
        .get(format!("{}/api/telemetry?timespan=1h", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(empty.len(), 6);
    assert!(empty.iter().all(|p| p.avg_temperature == 0.0 && p.avg_humidity == 0.0 && p.reading_count == 0));
    assert!(empty.windows(2).all(|w| w[1].timestamp - w[0].timestamp == Duration::minutes(10)));

    let ts = Utc::now() - Duration::minutes(2);
    for (temp, humidity) in [(22.0, 40.0), (24.0, 60.0)] {
        post_reading(
            &client,
            &base,
            json!({"device_id": "fan-1", "temperature": temp, "humidity": humidity, "timestamp": ts}),
        )
        .await?
        .error_for_status()?;
    }

    let series: Vec<Point> = client
        .get(format!("{}/api/telemetry?timespan=1h&device_id=fan-1", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(series.len(), 6);

    let filled: Vec<&Point> = series.iter().filter(|p| p.reading_count > 0).collect();
    assert_eq!(filled.len(), 1);
    assert_eq!(filled[0].avg_temperature, 23.0);
    assert_eq!(filled[0].avg_humidity, 50.0);

    let other: Vec<Point> = client
        .get(format!("{}/api/telemetry?timespan=1h&device_id=fan-2", base))
        .send()
        .await?
        .json()
        .await?;
    assert!(other.iter().all(|p| p.reading_count == 0));
    Ok(())
}

#[tokio::test]
async fn series_window_sizes_and_validation() -> Result<()> {
    // ---
    let base = spawn_app().await?;
    let client = Client::new();

    for (span, expected) in [("24h", 24), ("7d", 7)] {
        let series: Vec<Point> = client
            .get(format!("{}/api/telemetry?timespan={}", base, span))
            .send()
            .await?
            .json()
            .await?;
        assert_eq!(series.len(), expected, "timespan {}", span);
    }

    let resp = client.get(format!("{}/api/telemetry?timespan=1y", base)).send().await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn daily_log_tracks_statistics() -> Result<()> {
    // ---
    let base = spawn_app().await?;
    let client = Client::new();

    for temp in [20.0, 30.0, 40.0] {
        post_reading(&client, &base, json!({"device_id": "fan-1", "temperature": temp, "humidity": 50.0}))
            .await?
            .error_for_status()?;
    }

    let logs: Vec<Rollup> = client
        .get(format!("{}/api/daily-logs?device_id=fan-1&days=1", base))
        .send()
        .await?
        .json()
        .await?;

    // readings are stamped "now"; around midnight they may straddle two days
    let total_runtime: i32 = logs.iter().map(|r| r.fan_runtime_minutes).sum();
    assert_eq!(total_runtime, 2, "relay on at 30 and 40");
    if logs.len() == 1 {
        let log = &logs[0];
        assert_eq!(log.device_id, "fan-1");
        assert_eq!(log.avg_temperature, 30.0);
        assert_eq!(log.min_temperature, 20.0);
        assert_eq!(log.max_temperature, 40.0);
    }
    Ok(())
}

#[tokio::test]
async fn decide_requires_numeric_temperature() -> Result<()> {
    // ---
    let base = spawn_app().await?;
    let client = Client::new();
    post_reading(&client, &base, json!({"device_id": "fan-1", "temperature": 20.0, "humidity": 50.0}))
        .await?
        .error_for_status()?;

    for query in ["", "?temperature=", "?temperature=warm"] {
        let resp = client
            .get(format!("{}/api/devices/fan-1/decide{}", base, query))
            .send()
            .await?;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "query {:?}", query);
        let body: serde_json::Value = resp.json().await?;
        assert!(body["error"].as_str().unwrap_or_default().contains("temperature"));
    }
    Ok(())
}

#[tokio::test]
async fn daily_log_rejects_huge_lookback() -> Result<()> {
    // ---
    let base = spawn_app().await?;
    let resp = reqwest::get(format!("{}/api/daily-logs?days={}", base, u32::MAX)).await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = resp.json().await?;
    assert!(body["error"].as_str().unwrap_or_default().contains("days"));
    Ok(())
}
