use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, NaiveDateTime};
use tempfile::TempDir;
use tower::ServiceExt;

use slotbook::config::AppConfig;
use slotbook::db::Db;
use slotbook::handlers;
use slotbook::services::clock::ManualClock;
use slotbook::state::AppState;

// ── Helpers ──

const TOKEN: &str = "test-token";

// Mon-Sat 09:00-17:00, Sunday closed.
const SCHEDULE: &str = r#"{"slot_granularity_minutes":30,"business_hours":[
    {"weekday":0,"is_open":false,"open_time":"09:00","close_time":"17:00"},
    {"weekday":1,"is_open":true,"open_time":"09:00","close_time":"17:00"},
    {"weekday":2,"is_open":true,"open_time":"09:00","close_time":"17:00"},
    {"weekday":3,"is_open":true,"open_time":"09:00","close_time":"17:00"},
    {"weekday":4,"is_open":true,"open_time":"09:00","close_time":"17:00"},
    {"weekday":5,"is_open":true,"open_time":"09:00","close_time":"17:00"},
    {"weekday":6,"is_open":true,"open_time":"09:00","close_time":"17:00"}]}"#;

fn test_config(database_url: &str) -> AppConfig {
    AppConfig {
        database_url: database_url.to_string(),
        admin_token: TOKEN.to_string(),
        business_name: "Sparkle Cleaning".to_string(),
        ..AppConfig::default()
    }
}

fn start_time() -> NaiveDateTime {
    NaiveDateTime::parse_from_str("2024-05-31 12:00", "%Y-%m-%d %H:%M").unwrap()
}

/// The returned directory holds the database file; keep it alive for the test.
fn test_state() -> (Arc<AppState>, Arc<ManualClock>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("slotbook.db").to_str().unwrap().to_string();
    let clock = Arc::new(ManualClock::new(start_time()));
    let db = Db::open(&path).unwrap();
    let state = Arc::new(AppState::new(db, test_config(&path), clock.clone()));
    (state, clock, dir)
}

fn test_app(state: Arc<AppState>) -> Router {
    handlers::router(state)
}

async fn send(state: &Arc<AppState>, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let res = test_app(state.clone()).oneshot(req).await.unwrap();
    let status = res.status();
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

async fn get(state: &Arc<AppState>, uri: &str) -> (StatusCode, serde_json::Value) {
    send(
        state,
        Request::builder().uri(uri).body(Body::empty()).unwrap(),
    )
    .await
}

async fn post(state: &Arc<AppState>, uri: &str, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
    send(
        state,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

async fn admin_post(state: &Arc<AppState>, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
    send(
        state,
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Authorization", format!("Bearer {TOKEN}"))
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
}

async fn open_business(state: &Arc<AppState>) {
    let (status, _) = admin_post(state, "/api/admin/schedule", SCHEDULE).await;
    assert_eq!(status, StatusCode::OK);
}

async fn hold(
    state: &Arc<AppState>,
    date: &str,
    start: &str,
    end: &str,
    owner: &str,
) -> (StatusCode, serde_json::Value) {
    post(
        state,
        "/api/holds",
        serde_json::json!({
            "date": date,
            "start_time": start,
            "end_time": end,
            "owner_token": owner,
            "lease_minutes": 15,
        }),
    )
    .await
}

fn slot<'a>(slots: &'a serde_json::Value, time: &str) -> &'a serde_json::Value {
    slots
        .as_array()
        .unwrap()
        .iter()
        .find(|s| s["time"] == time)
        .unwrap_or_else(|| panic!("no slot at {time}"))
}

// ── Health ──

#[tokio::test]
async fn test_health() {
    let (state, _, _dir) = test_state();
    let (status, json) = get(&state, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

// ── Availability ──

#[tokio::test]
async fn test_unconfigured_business_is_closed() {
    let (state, _, _dir) = test_state();

    let (status, json) = get(&state, "/api/availability?date=2024-06-03&duration=60").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, serde_json::json!([]));

    let (status, json) = get(&state, "/api/availability/month?year=2024&month=6&duration=60").await;
    assert_eq!(status, StatusCode::OK);
    let days = json.as_object().unwrap();
    assert_eq!(days.len(), 30);
    assert!(days.values().all(|v| v == false));
}

#[tokio::test]
async fn test_four_hour_job_last_start() {
    let (state, _, _dir) = test_state();
    open_business(&state).await;

    let (status, json) = get(&state, "/api/availability?date=2024-06-01&duration=240").await;
    assert_eq!(status, StatusCode::OK);
    let slots = json.as_array().unwrap();
    assert_eq!(slots.first().unwrap()["time"], "09:00");
    assert_eq!(slots.last().unwrap()["time"], "13:00");
    assert_eq!(slots.len(), 9);
}

#[tokio::test]
async fn test_sunday_closed_for_any_duration() {
    let (state, _, _dir) = test_state();
    open_business(&state).await;

    for duration in [30, 120, 480] {
        let uri = format!("/api/availability?date=2024-06-02&duration={duration}");
        let (status, json) = get(&state, &uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!([]));
    }
}

#[tokio::test]
async fn test_availability_rejects_bad_input() {
    let (state, _, _dir) = test_state();

    let (status, _) = get(&state, "/api/availability?date=2024-06-01&duration=0").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&state, "/api/availability?date=2024-06-01&duration=5000").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&state, "/api/availability?date=June-first&duration=60").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = get(&state, "/api/availability/month?year=2024&month=13&duration=60").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_month_agrees_with_day_view() {
    let (state, _, _dir) = test_state();
    open_business(&state).await;

    // Take the whole of Saturday 2024-06-08 for a full-day job.
    let (status, held) = hold(&state, "2024-06-08", "09:00", "17:00", "x").await;
    assert_eq!(status, StatusCode::CREATED);
    let id = held["id"].as_str().unwrap();
    let (status, _) = post(&state, &format!("/api/holds/{id}/confirm"), serde_json::json!({"owner_token": "x"})).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, month) = get(&state, "/api/availability/month?year=2024&month=6&duration=120").await;
    let month = month.as_object().unwrap();
    assert_eq!(month["2024-06-08"], false);
    assert_eq!(month["2024-06-09"], false);
    assert_eq!(month["2024-06-10"], true);

    for (day, free) in month {
        let (_, slots) = get(&state, &format!("/api/availability?date={day}&duration=120")).await;
        let any_free = slots.as_array().unwrap().iter().any(|s| s["available"] == true);
        assert_eq!(free.as_bool().unwrap(), any_free, "mismatch on {day}");
    }
}

// ── Holds ──

#[tokio::test]
async fn test_competing_holds_then_confirm() {
    let (state, _, _dir) = test_state();
    open_business(&state).await;

    let (status, a) = hold(&state, "2024-06-01", "10:00", "11:00", "x").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(a["start_time"], "10:00");
    assert!(a.get("owner_token").is_none());

    let (status, b) = hold(&state, "2024-06-01", "10:00", "11:00", "y").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(b["code"], "conflict");

    let id = a["id"].as_str().unwrap();
    let (status, booking) = post(&state, &format!("/api/holds/{id}/confirm"), serde_json::json!({"owner_token": "x"})).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booking["date"], "2024-06-01");
    assert_eq!(booking["start_time"], "10:00");
    assert_eq!(booking["end_time"], "11:00");
    assert_eq!(booking["status"], "pending");

    let (_, slots) = get(&state, "/api/availability?date=2024-06-01&duration=60").await;
    assert_eq!(slot(&slots, "10:00")["available"], false);
    assert_eq!(slot(&slots, "11:00")["available"], true);

    // The hold is gone: confirming again is a stale reference.
    let (status, json) = post(&state, &format!("/api/holds/{id}/confirm"), serde_json::json!({"owner_token": "x"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "not_found");
}

#[tokio::test]
async fn test_lease_expiry_frees_slot() {
    let (state, clock, _dir) = test_state();
    open_business(&state).await;

    let (status, a) = hold(&state, "2024-06-01", "10:00", "11:00", "x").await;
    assert_eq!(status, StatusCode::CREATED);
    let id = a["id"].as_str().unwrap();

    clock.advance(Duration::minutes(16));

    let (status, json) = post(&state, &format!("/api/holds/{id}/confirm"), serde_json::json!({"owner_token": "x"})).await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(json["code"], "expired");

    let (_, slots) = get(&state, "/api/availability?date=2024-06-01&duration=60").await;
    assert_eq!(slot(&slots, "10:00")["available"], true);

    let (status, _) = hold(&state, "2024-06-01", "10:00", "11:00", "y").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_extend_keeps_hold_alive() {
    let (state, clock, _dir) = test_state();
    open_business(&state).await;

    let (_, a) = hold(&state, "2024-06-01", "10:00", "11:00", "x").await;
    let id = a["id"].as_str().unwrap();

    clock.advance(Duration::minutes(10));
    let (status, extended) = post(
        &state,
        &format!("/api/holds/{id}/extend"),
        serde_json::json!({"owner_token": "x", "lease_minutes": 15}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(extended["expires_at"], "2024-05-31T12:25:00");

    clock.advance(Duration::minutes(10));
    let (status, _) = post(&state, &format!("/api/holds/{id}/confirm"), serde_json::json!({"owner_token": "x"})).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_release_requires_owner() {
    let (state, _, _dir) = test_state();
    open_business(&state).await;

    let (_, a) = hold(&state, "2024-06-01", "10:00", "11:00", "x").await;
    let id = a["id"].as_str().unwrap();
    let uri = format!("/api/holds/{id}/release");

    let (status, json) = post(&state, &uri, serde_json::json!({"owner_token": "y"})).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["code"], "not_owner");

    let (status, json) = post(&state, &uri, serde_json::json!({"owner_token": "x"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ok"], true);

    let (status, _) = post(&state, &uri, serde_json::json!({"owner_token": "x"})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = hold(&state, "2024-06-01", "10:00", "11:00", "y").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn test_hold_must_be_an_offered_slot() {
    let (state, _, _dir) = test_state();
    open_business(&state).await;

    // Off the 30-minute grid.
    let (status, _) = hold(&state, "2024-06-01", "10:10", "11:10", "x").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Past closing.
    let (status, _) = hold(&state, "2024-06-01", "16:30", "17:30", "x").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Sunday.
    let (status, _) = hold(&state, "2024-06-02", "10:00", "11:00", "x").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Already started (clock is 2024-05-31 12:00).
    let (status, _) = hold(&state, "2024-05-31", "10:00", "11:00", "x").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Missing owner.
    let (status, _) = hold(&state, "2024-06-01", "10:00", "11:00", " ").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_availability_answers_while_a_hold_waits_for_the_write_lock() {
    let (state, _, dir) = test_state();
    open_business(&state).await;

    // Another process sharing the file holds SQLite's write lock.
    let other = rusqlite::Connection::open(dir.path().join("slotbook.db")).unwrap();
    other.execute_batch("BEGIN IMMEDIATE").unwrap();

    let writer_state = state.clone();
    let pending_hold =
        tokio::spawn(async move { hold(&writer_state, "2024-06-01", "10:00", "11:00", "x").await });
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;

    let (status, slots) = tokio::time::timeout(
        std::time::Duration::from_secs(2),
        get(&state, "/api/availability?date=2024-06-01&duration=60"),
    )
    .await
    .expect("availability stalled behind the waiting hold");
    assert_eq!(status, StatusCode::OK);
    assert_eq!(slot(&slots, "10:00")["available"], true);
    assert!(!pending_hold.is_finished());

    other.execute_batch("COMMIT").unwrap();
    let (status, _) = pending_hold.await.unwrap();
    assert_eq!(status, StatusCode::CREATED);
}

// ── Admin ──

#[tokio::test]
async fn test_admin_requires_auth() {
    let (state, _, _dir) = test_state();

    let (status, _) = get(&state, "/api/admin/bookings").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(
        &state,
        Request::builder()
            .uri("/api/admin/schedule")
            .header("Authorization", "Bearer wrong-token")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_admin_schedule_round_trip() {
    let (state, _, _dir) = test_state();
    open_business(&state).await;

    let (status, json) = send(
        &state,
        Request::builder()
            .uri("/api/admin/schedule")
            .header("Authorization", format!("Bearer {TOKEN}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["slot_granularity_minutes"], 30);
    assert_eq!(json["business_hours"].as_array().unwrap().len(), 7);

    let (status, _) = admin_post(
        &state,
        "/api/admin/schedule",
        r#"{"slot_granularity_minutes":30,"business_hours":[
            {"weekday":1,"is_open":true,"open_time":"17:00","close_time":"09:00"}]}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_admin_cancel_frees_slot_and_revive_rechecks() {
    let (state, _, _dir) = test_state();
    open_business(&state).await;

    let (_, a) = hold(&state, "2024-06-01", "10:00", "11:00", "x").await;
    let id = a["id"].as_str().unwrap();
    let (_, first) = post(&state, &format!("/api/holds/{id}/confirm"), serde_json::json!({"owner_token": "x"})).await;
    let first_id = first["id"].as_str().unwrap();

    let (status, json) = admin_post(
        &state,
        &format!("/api/admin/bookings/{first_id}/status"),
        r#"{"status":"cancelled"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "cancelled");

    let (status, _) = hold(&state, "2024-06-01", "10:00", "11:00", "y").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, json) = admin_post(
        &state,
        &format!("/api/admin/bookings/{first_id}/status"),
        r#"{"status":"confirmed"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "conflict");

    let (status, _) = admin_post(
        &state,
        "/api/admin/bookings/missing/status",
        r#"{"status":"confirmed"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, json) = send(
        &state,
        Request::builder()
            .uri("/api/admin/bookings?status=cancelled")
            .header("Authorization", format!("Bearer {TOKEN}"))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let list = json.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["id"], first_id);
}

// ── Calendar ──

#[tokio::test]
async fn test_calendar_download() {
    let (state, _, _dir) = test_state();
    open_business(&state).await;

    let (_, a) = hold(&state, "2024-06-01", "13:00", "17:00", "x").await;
    let id = a["id"].as_str().unwrap();
    let (_, booking) = post(&state, &format!("/api/holds/{id}/confirm"), serde_json::json!({"owner_token": "x"})).await;
    let booking_id = booking["id"].as_str().unwrap();

    let res = test_app(state.clone())
        .oneshot(
            Request::builder()
                .uri(format!("/calendar/{booking_id}.ics"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        res.headers().get("content-type").unwrap(),
        "text/calendar; charset=utf-8"
    );
    let body = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let ics = String::from_utf8(body.to_vec()).unwrap();
    assert!(ics.contains("DTSTART:20240601T130000"));
    assert!(ics.contains("DTEND:20240601T170000"));
    assert!(ics.contains("SUMMARY:Cleaning appointment with Sparkle Cleaning"));

    let (status, _) = get(&state, "/calendar/nope.ics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
