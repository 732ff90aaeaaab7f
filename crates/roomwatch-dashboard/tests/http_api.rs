//! REST surface tests driven through the router with `oneshot`.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use common::{Harness, SAMPLE_LINE};
use roomwatch_dashboard::{create_router, DashboardConfig};
use serde_json::{json, Value};
use tower::ServiceExt;

fn router(harness: &Harness) -> Router {
    create_router(harness.app_state(DashboardConfig::default()))
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_status_before_any_data() {
    let harness = Harness::new();
    let app = router(&harness);

    let (status, body) = call(&app, get("/api/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true, "data": null, "connected": false}));
}

#[tokio::test]
async fn test_status_reflects_latest_reading() {
    let harness = Harness::new();
    let app = router(&harness);
    harness.transport.connect().await.unwrap();
    harness.feed(SAMPLE_LINE).await;

    let (_, body) = call(&app, get("/api/status")).await;
    assert_eq!(body["connected"], true);
    assert_eq!(body["data"]["occupied"], 0);
    assert_eq!(body["data"]["motion"], 1);
    assert_eq!(body["data"]["distance"], 150);
    assert_eq!(body["data"]["lights"], 0);
    assert!(body["data"]["captured_at"].is_string());
}

#[tokio::test]
async fn test_led_rejected_while_disconnected() {
    let harness = Harness::new();
    let app = router(&harness);

    for uri in ["/api/led/on", "/api/led/off"] {
        let (status, body) = call(&app, post_empty(uri)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, json!({"success": false, "error": "Device not connected"}));
    }
    assert!(harness.device.written_lines().is_empty());
}

#[tokio::test]
async fn test_led_commands_reach_device() {
    let harness = Harness::new();
    let app = router(&harness);
    harness.transport.connect().await.unwrap();

    let (status, body) = call(&app, post_empty("/api/led/on")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert!(body["message"].is_string());
    harness.wait_for_write("LED_ON").await;

    let (status, _) = call(&app, post_empty("/api/led/off")).await;
    assert_eq!(status, StatusCode::OK);
    harness.wait_for_write("LED_OFF").await;

    assert_eq!(harness.device.written_lines(), vec!["LED_ON", "LED_OFF"]);
}

#[tokio::test]
async fn test_generic_command_relay() {
    let harness = Harness::new();
    let app = router(&harness);
    harness.transport.connect().await.unwrap();

    let (status, body) = call(&app, post_json("/api/command", json!({"command": "BUZZ"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    harness.wait_for_write("BUZZ").await;
}

#[tokio::test]
async fn test_empty_command_is_bad_request() {
    let harness = Harness::new();
    let app = router(&harness);
    harness.transport.connect().await.unwrap();

    let (status, body) = call(&app, post_json("/api/command", json!({"command": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());

    let (status, body) = call(&app, post_json("/api/command", json!({}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    assert!(harness.device.written_lines().is_empty());
}

#[tokio::test]
async fn test_command_rejected_while_disconnected() {
    let harness = Harness::new();
    let app = router(&harness);

    let (status, body) =
        call(&app, post_json("/api/command", json!({"command": "LED_ON"}))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "Device not connected");
}

#[tokio::test]
async fn test_history_count_and_order() {
    let harness = Harness::with_history(3);
    let app = router(&harness);
    harness.transport.connect().await.unwrap();
    for seq in 1..=4 {
        harness.feed(&format!(r#"{{"seq":{seq}}}"#)).await;
    }

    let seqs = |body: &Value| -> Vec<i64> {
        body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|s| s["seq"].as_i64().unwrap())
            .collect()
    };

    let (status, body) = call(&app, get("/api/history")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(seqs(&body), vec![2, 3, 4]);

    let (_, body) = call(&app, get("/api/history?count=2")).await;
    assert_eq!(seqs(&body), vec![3, 4]);

    let (_, body) = call(&app, get("/api/history?count=50")).await;
    assert_eq!(seqs(&body), vec![2, 3, 4]);

    for lenient in ["/api/history?count=abc", "/api/history?count=0", "/api/history?count=-1"] {
        let (status, body) = call(&app, get(lenient)).await;
        assert_eq!(status, StatusCode::OK, "{lenient}");
        assert_eq!(seqs(&body), vec![2, 3, 4], "{lenient}");
    }
}

#[tokio::test]
async fn test_stats_counts_every_reading() {
    let harness = Harness::with_history(2);
    let app = router(&harness);
    harness.transport.connect().await.unwrap();
    for _ in 0..5 {
        harness.feed(SAMPLE_LINE).await;
    }
    // Malformed lines are not counted.
    harness.device.send_line("{garbage");
    harness.feed(SAMPLE_LINE).await;

    let (status, body) = call(&app, get("/api/stats")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["connected"], true);
    assert_eq!(body["data"]["totalReadings"], 6);
    assert!(body["data"]["uptime"].as_u64().is_some());
}

#[tokio::test]
async fn test_ports_listing() {
    let harness = Harness::new();
    let app = router(&harness);

    let (status, body) = call(&app, get("/api/ports")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "success": true,
            "ports": [
                {"path": "/dev/ttyACM0", "manufacturer": "Arduino (www.arduino.cc)"},
                {"path": "/dev/ttyS0"}
            ]
        })
    );
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let harness = Harness::new();
    let app = router(&harness);

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("roomwatch_serial_connected"));
    assert!(text.contains("roomwatch_readings_total"));
}
