//! Read-only HTTP API over a live coordinator

mod helpers;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use helpers::{airing, build_coordinator, small_config, ScriptedSource, EDITION_YEAR};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use t2k_tracker::coordinator::PollOutcome;
use t2k_tracker::models::NotificationSettings;
use t2k_tracker::rules::RuleBook;
use t2k_tracker::{build_router, AppState};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

struct TestApp {
    harness: helpers::Harness,
    state: AppState,
}

fn app(source: Arc<ScriptedSource>) -> TestApp {
    let harness = build_coordinator(
        source,
        small_config(),
        RuleBook::default(),
        NotificationSettings::default(),
    );
    let state = AppState::new(
        harness.coordinator.subscribe(),
        harness.coordinator.subscribe_diagnostics(),
        harness.event_bus.clone(),
        5,
        EDITION_YEAR,
    );
    TestApp { harness, state }
}

async fn get(state: &AppState, uri: &str) -> (StatusCode, Value) {
    let response = build_router(state.clone())
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

#[tokio::test]
async fn test_health_reports_chart_and_module() {
    let test = app(Arc::new(ScriptedSource::new(vec![])));

    let (status, body) = get(&test.state, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["module"], "t2k-tracker");
    assert_eq!(body["chart_entries"], 5);
    assert_eq!(body["edition_year"], EDITION_YEAR);
    assert_eq!(body["diagnostics"]["polls"], 0);
}

#[tokio::test]
async fn test_health_degraded_while_source_down() {
    let test = app(Arc::new(ScriptedSource::new(vec![
        t2k_tracker::scraper::TierOutcome::Error("connection refused".into()),
    ])));
    let outcome = test.harness.coordinator.poll(&CancellationToken::new()).await;
    assert!(matches!(outcome, PollOutcome::Unavailable { .. }));

    let (_, body) = get(&test.state, "/health").await;
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["diagnostics"]["consecutive_failures"], 1);
}

#[tokio::test]
async fn test_current_is_404_until_resolved() {
    let test = app(Arc::new(ScriptedSource::new(vec![airing(
        "Queen",
        "Bohemian Rhapsody",
    )])));

    let (status, body) = get(&test.state, "/current").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");

    test.harness.coordinator.poll(&CancellationToken::new()).await;

    let (status, body) = get(&test.state, "/current").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entry"]["title"], "Bohemian Rhapsody");
    assert_eq!(body["entry"]["position"], 1);
    assert_eq!(body["trend"]["direction"], "up");
    assert_eq!(body["trend_label"], "↑ 1");
    assert_eq!(body["source_tier"], "structured");
    assert_eq!(body["occurrence_epoch"], 1);
}

#[tokio::test]
async fn test_state_and_upcoming_follow_coordinator() {
    let test = app(Arc::new(ScriptedSource::new(vec![airing(
        "Eagles",
        "Hotel California",
    )])));
    test.harness.coordinator.poll(&CancellationToken::new()).await;

    let (status, state) = get(&test.state, "/state").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(state["current"]["entry"]["position"], 2);
    assert_eq!(state["diagnostics"]["polls"], 1);

    let (status, upcoming) = get(&test.state, "/upcoming").await;
    assert_eq!(status, StatusCode::OK);
    let positions: Vec<u64> = upcoming
        .as_array()
        .unwrap()
        .iter()
        .map(|song| song["entry"]["position"].as_u64().unwrap())
        .collect();
    assert_eq!(positions, vec![3, 4, 5]);
    assert_eq!(upcoming[0]["occurrence_epoch"], 0);
    assert_eq!(upcoming[0]["source_tier"], Value::Null);
}

#[tokio::test]
async fn test_event_stream_is_sse() {
    let test = app(Arc::new(ScriptedSource::new(vec![])));
    let shutdown = CancellationToken::new();
    shutdown.cancel();
    let state = test.state.clone().with_shutdown(shutdown);

    let response = build_router(state)
        .oneshot(Request::builder().uri("/events").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()[header::CONTENT_TYPE].to_str().unwrap();
    assert!(content_type.starts_with("text/event-stream"));
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let test = app(Arc::new(ScriptedSource::new(vec![])));
    let (status, _) = get(&test.state, "/does-not-exist").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
