//! Integration tests for the `mpxrds-engine` control API.
//!
//! Exercises the HTTP surface the three CLI tools speak to: health,
//! fmmod gains/stereo-mode/LPF/pre-emphasis, RDS text/identity fields,
//! and RTP receiver add/remove.

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use mpxrds_engine::api::{build_router, ApiState};
use mpxrds_engine::rtp::RtpSinkHandle;
use mpxrds_engine::SharedState;

fn setup_test_server() -> (axum::Router, ApiState) {
    let state = ApiState {
        shared: Arc::new(SharedState::new()),
        rtp_sink: RtpSinkHandle::default(),
    };
    (build_router(state.clone()), state)
}

async fn make_request(app: &axum::Router, method: Method, path: &str, body: Option<Value>) -> (StatusCode, Option<Value>) {
    let mut builder = Request::builder().method(method).uri(path);
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let request = match body {
        Some(b) => builder.body(Body::from(b.to_string())).unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json_body = if bytes.is_empty() { None } else { Some(serde_json::from_slice(&bytes).unwrap()) };
    (status, json_body)
}

#[tokio::test]
async fn health_endpoint_reports_ok() {
    let (app, _) = setup_test_server();
    let (status, body) = make_request(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["status"], "ok");
}

#[tokio::test]
async fn fmmod_dump_reflects_default_state() {
    let (app, _) = setup_test_server();
    let (status, body) = make_request(&app, Method::GET, "/fmmod", None).await;
    assert_eq!(status, StatusCode::OK);
    let body = body.unwrap();
    assert_eq!(body["stereo_mode"], "dsb");
    assert_eq!(body["lpf_enabled"], true);
}

#[tokio::test]
async fn fmmod_set_gain_updates_dump() {
    let (app, _) = setup_test_server();
    let (status, body) = make_request(
        &app,
        Method::POST,
        "/fmmod/gain",
        Some(json!({"channel": "pilot", "percent": 12})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["ok"], true);

    let (_, dump) = make_request(&app, Method::GET, "/fmmod", None).await;
    assert_eq!(dump.unwrap()["gain_pilot_percent"], 12);
}

#[tokio::test]
async fn fmmod_set_stereo_mode_rejects_out_of_range_selector() {
    let (app, _) = setup_test_server();
    let (status, _) = make_request(&app, Method::POST, "/fmmod/stereo_mode", Some(json!({"selector": 9}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = make_request(&app, Method::POST, "/fmmod/stereo_mode", Some(json!({"selector": 3}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["stereo_mode"], "mono");
}

#[tokio::test]
async fn fmmod_set_preemphasis_selects_time_constant() {
    let (app, _) = setup_test_server();
    let (status, body) = make_request(&app, Method::POST, "/fmmod/preemphasis", Some(json!({"selector": 1}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["preemphasis"], "75us");
}

#[tokio::test]
async fn rds_set_pi_and_pty_round_trip_through_dump() {
    let (app, _) = setup_test_server();
    let (status, _) = make_request(&app, Method::POST, "/rds/pi", Some(json!({"pi": 0xA1B2}))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = make_request(&app, Method::POST, "/rds/pty", Some(json!({"pty": 32}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = make_request(&app, Method::POST, "/rds/pty", Some(json!({"pty": 5}))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, dump) = make_request(&app, Method::GET, "/rds", None).await;
    let dump = dump.unwrap();
    assert_eq!(dump["pi"], "A1B2");
    assert_eq!(dump["pty"], 5);
}

#[tokio::test]
async fn rds_set_ps_rejects_overlong_string_and_accepts_valid_one() {
    let (app, _) = setup_test_server();
    let (status, _) = make_request(&app, Method::POST, "/rds/ps", Some(json!({"text": "WAY TOO LONG PS"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = make_request(&app, Method::POST, "/rds/ps", Some(json!({"text": "TEST____"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.unwrap()["changed"], true);

    let (_, dump) = make_request(&app, Method::GET, "/rds", None).await;
    let dump = dump.unwrap();
    assert_eq!(dump["ps"], "TEST____");
    assert_eq!(dump["ps_set"], true);
}

#[tokio::test]
async fn rds_set_rt_idempotent_set_does_not_report_change() {
    let (app, _) = setup_test_server();
    let (_, first) = make_request(&app, Method::POST, "/rds/rt", Some(json!({"text": "Hello World!"}))).await;
    assert_eq!(first.unwrap()["changed"], true);

    let (_, second) = make_request(&app, Method::POST, "/rds/rt", Some(json!({"text": "Hello World!"}))).await;
    assert_eq!(second.unwrap()["changed"], false);
}

#[tokio::test]
async fn rds_ecc_and_lic_zero_clear_set_flag() {
    let (app, _) = setup_test_server();
    make_request(&app, Method::POST, "/rds/ecc", Some(json!({"ecc": 0xE1}))).await;
    let (_, dump) = make_request(&app, Method::GET, "/rds", None).await;
    assert_eq!(dump.unwrap()["ecc_set"], true);

    make_request(&app, Method::POST, "/rds/ecc", Some(json!({"ecc": 0}))).await;
    let (_, dump) = make_request(&app, Method::GET, "/rds", None).await;
    assert_eq!(dump.unwrap()["ecc_set"], false);
}

#[tokio::test]
async fn rtp_receiver_add_and_remove_round_trip() {
    let (app, _) = setup_test_server();
    let (status, _) = make_request(
        &app,
        Method::POST,
        "/rtp/receivers",
        Some(json!({"action": "add", "addr": "239.0.0.1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, dump) = make_request(&app, Method::GET, "/rtp", None).await;
    let receivers = dump.unwrap()["receivers"].as_array().unwrap().clone();
    assert!(receivers.iter().any(|v| v == "239.0.0.1"));

    let (status, _) = make_request(
        &app,
        Method::POST,
        "/rtp/receivers",
        Some(json!({"action": "remove", "addr": "239.0.0.1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, dump) = make_request(&app, Method::GET, "/rtp", None).await;
    let receivers = dump.unwrap()["receivers"].as_array().unwrap().clone();
    assert!(!receivers.iter().any(|v| v == "239.0.0.1"));
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let (app, _) = setup_test_server();
    let (status, _) = make_request(&app, Method::GET, "/nonexistent", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
