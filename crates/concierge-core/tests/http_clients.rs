//! Integration test: assistant and appointments clients against an in-process API stub.
//!
//! The stub answers like the scheduling server: every route wraps its payload in
//! `{success, data, message, error}` and error statuses still carry that envelope.

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{DateTime, Local, NaiveDate, TimeZone, Timelike, Utc};
use concierge_core::{
    AppointmentDraft, AppointmentPatch, AppointmentStatus, AppointmentsClient, AssistantDispatch,
    CoreError, DispatchError, HttpAssistantClient, ReplyCategory, REQUEST_FAILED,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/api", addr)
}

fn appointment_json(id: &str, title: &str) -> Value {
    json!({
        "id": id,
        "title": title,
        "description": "",
        "startTime": "2025-06-02T14:00:00",
        "endTime": "2025-06-02T15:00:00",
        "attendees": ["John"],
        "location": "",
        "status": "scheduled"
    })
}

async fn chat(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    let message = body["message"].as_str().unwrap_or_default();
    match message {
        "" => (
            StatusCode::BAD_REQUEST,
            Json(json!({"success": false, "error": "Message is required"})),
        ),
        "schedule" => (
            StatusCode::OK,
            Json(json!({"success": true, "data": {
                "reply": "Great! I've scheduled your appointment.",
                "action": "schedule",
                "data": appointment_json("a1", "Meeting with John")
            }})),
        ),
        "slots" => (
            StatusCode::OK,
            Json(json!({"success": true, "data": {
                "reply": "I found 2 available time slots.",
                "action": "check_availability"
            }})),
        ),
        "crash" => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"success": false, "error": "Internal server error"})),
        ),
        "empty" => (StatusCode::OK, Json(json!({"success": true}))),
        "refused" => (StatusCode::OK, Json(json!({"success": false}))),
        "gateway" => (StatusCode::BAD_GATEWAY, Json(json!({"success": false}))),
        other => (
            StatusCode::OK,
            Json(json!({"success": true, "data": {
                "reply": format!("You said: {}", other),
                "action": "other"
            }})),
        ),
    }
}

fn assistant_app() -> Router {
    Router::new().route("/api/chat", post(chat))
}

async fn assistant() -> HttpAssistantClient {
    HttpAssistantClient::new(serve(assistant_app()).await, Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn chat_reply_maps_action_to_category() {
    let client = assistant().await;

    let reply = client.send("schedule").await.unwrap();
    assert_eq!(reply.category, Some(ReplyCategory::Appointment));
    assert_eq!(reply.reply_text, "Great! I've scheduled your appointment.");
    assert_eq!(reply.data.unwrap()["id"], "a1");

    let reply = client.send("slots").await.unwrap();
    assert_eq!(reply.category, Some(ReplyCategory::Availability));

    let reply = client.send("hello").await.unwrap();
    assert_eq!(reply.category, None);
    assert_eq!(reply.reply_text, "You said: hello");
}

#[tokio::test]
async fn chat_errors_carry_the_server_reason() {
    let client = assistant().await;
    assert_eq!(
        client.send("crash").await,
        Err(DispatchError::Remote {
            reason: Some("Internal server error".into())
        })
    );
    assert_eq!(
        client.send("").await,
        Err(DispatchError::Remote {
            reason: Some("Message is required".into())
        })
    );
    assert_eq!(
        client.send("empty").await,
        Err(DispatchError::Remote { reason: None })
    );
    assert_eq!(
        client.send("refused").await,
        Err(DispatchError::Remote { reason: None })
    );
}

#[tokio::test]
async fn error_status_without_text_reads_as_request_failed() {
    let client = assistant().await;
    let err = client.send("gateway").await.unwrap_err();
    assert_eq!(
        err,
        DispatchError::Remote {
            reason: Some(REQUEST_FAILED.into())
        }
    );
    assert_eq!(err.reason(), Some("API request failed"));
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client =
        HttpAssistantClient::new(format!("http://{}/api", addr), Duration::from_secs(2)).unwrap();
    match client.send("hello").await {
        Err(err @ DispatchError::Transport(_)) => assert!(err.reason().is_some()),
        other => panic!("expected transport error, got {:?}", other),
    }
}

#[derive(Default)]
struct Recorded {
    list_query: Option<HashMap<String, String>>,
    created: Option<Value>,
    updated: Option<(String, Value)>,
    availability: Option<Value>,
}

fn appointments_app(recorded: Arc<Mutex<Recorded>>) -> Router {
    let r_list = Arc::clone(&recorded);
    let r_create = Arc::clone(&recorded);
    let r_update = Arc::clone(&recorded);
    let r_avail = Arc::clone(&recorded);
    Router::new()
        .route(
            "/api/appointments",
            get(move |Query(q): Query<HashMap<String, String>>| {
                let recorded = Arc::clone(&r_list);
                async move {
                    recorded.lock().unwrap().list_query = Some(q);
                    Json(json!({"success": true, "data": [
                        appointment_json("a1", "Dentist"),
                        appointment_json("a2", "Standup")
                    ]}))
                }
            })
            .post(move |Json(body): Json<Value>| {
                let recorded = Arc::clone(&r_create);
                async move {
                    let title = body["title"].as_str().unwrap_or_default().to_string();
                    recorded.lock().unwrap().created = Some(body);
                    (
                        StatusCode::CREATED,
                        Json(json!({"success": true, "data": appointment_json("new", &title)})),
                    )
                }
            }),
        )
        .route(
            "/api/appointments/:id",
            put(move |Path(id): Path<String>, Json(body): Json<Value>| {
                let recorded = Arc::clone(&r_update);
                async move {
                    if id == "missing" {
                        return (
                            StatusCode::NOT_FOUND,
                            Json(json!({"success": false, "error": "Appointment not found"})),
                        );
                    }
                    let title = body["title"].as_str().unwrap_or("Dentist").to_string();
                    recorded.lock().unwrap().updated = Some((id.clone(), body));
                    (
                        StatusCode::OK,
                        Json(json!({"success": true, "data": appointment_json(&id, &title)})),
                    )
                }
            })
            .delete(|Path(id): Path<String>| async move {
                if id == "missing" {
                    (
                        StatusCode::NOT_FOUND,
                        Json(json!({"success": false, "error": "Appointment not found"})),
                    )
                } else {
                    (
                        StatusCode::OK,
                        Json(json!({"success": true, "message": "Appointment cancelled successfully"})),
                    )
                }
            }),
        )
        .route(
            "/api/availability",
            post(move |Json(body): Json<Value>| {
                let recorded = Arc::clone(&r_avail);
                async move {
                    recorded.lock().unwrap().availability = Some(body);
                    Json(json!({"success": true, "data": [
                        {"start": "2025-06-02T09:00:00", "end": "2025-06-02T10:00:00", "available": true},
                        {"start": "2025-06-02T09:30:00", "end": "2025-06-02T10:30:00", "available": true}
                    ]}))
                }
            }),
        )
        .route(
            "/api/health",
            get(|| async { Json(json!({"status": "healthy", "timestamp": "2025-06-01T12:00:00"})) }),
        )
}

/// A local wall-clock time, as the server stores it.
fn local(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    let naive = NaiveDate::from_ymd_opt(y, m, d)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap();
    Local
        .from_local_datetime(&naive)
        .earliest()
        .unwrap()
        .with_timezone(&Utc)
}

async fn appointments() -> (AppointmentsClient, Arc<Mutex<Recorded>>) {
    let recorded = Arc::new(Mutex::new(Recorded::default()));
    let base = serve(appointments_app(Arc::clone(&recorded))).await;
    (
        AppointmentsClient::new(base, Duration::from_secs(5)).unwrap(),
        recorded,
    )
}

#[tokio::test]
async fn list_sends_range_and_decodes_camel_case() {
    let (client, recorded) = appointments().await;
    let start = local(2025, 6, 1, 0);

    let list = client.list(Some(start), None).await.unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].title, "Dentist");
    assert_eq!(list[0].start_time.with_timezone(&Local).hour(), 14);
    assert_eq!(list[1].status, AppointmentStatus::Scheduled);

    let query = recorded.lock().unwrap().list_query.clone().unwrap();
    assert_eq!(query.get("start").map(String::as_str), Some("2025-06-01T00:00:00"));
    assert!(!query.contains_key("end"));
}

#[tokio::test]
async fn create_update_cancel_round_trip() {
    let (client, recorded) = appointments().await;
    let start = local(2025, 6, 2, 14);

    let created = client
        .create(&AppointmentDraft {
            title: "Meeting with John".into(),
            description: None,
            start_time: start,
            end_time: start + chrono::Duration::hours(1),
            attendees: vec!["John".into()],
            location: None,
        })
        .await
        .unwrap();
    assert_eq!(created.id, "new");
    let sent = recorded.lock().unwrap().created.clone().unwrap();
    assert_eq!(sent["title"], "Meeting with John");
    assert_eq!(sent["startTime"], "2025-06-02T14:00:00");
    assert_eq!(sent["endTime"], "2025-06-02T15:00:00");
    assert!(sent.get("description").is_none());

    let patch = AppointmentPatch {
        title: Some("Moved meeting".into()),
        ..Default::default()
    };
    let updated = client.update("a1", &patch).await.unwrap();
    assert_eq!(updated.title, "Moved meeting");
    let (id, body) = recorded.lock().unwrap().updated.clone().unwrap();
    assert_eq!(id, "a1");
    assert_eq!(body, json!({"title": "Moved meeting"}));

    assert_eq!(
        client.cancel("a1").await.unwrap().as_deref(),
        Some("Appointment cancelled successfully")
    );
}

#[tokio::test]
async fn not_found_surfaces_api_error_text() {
    let (client, _) = appointments().await;
    match client.cancel("missing").await {
        Err(CoreError::Api(msg)) => assert_eq!(msg, "Appointment not found"),
        other => panic!("expected api error, got {:?}", other),
    }
    match client.update("missing", &AppointmentPatch::default()).await {
        Err(CoreError::Api(msg)) => assert_eq!(msg, "Appointment not found"),
        other => panic!("expected api error, got {:?}", other),
    }
}

#[tokio::test]
async fn availability_and_health() {
    let (client, recorded) = appointments().await;
    let date = NaiveDate::from_ymd_opt(2025, 6, 2).unwrap();

    let slots = client.check_availability(date, 60).await.unwrap();
    assert_eq!(slots.len(), 2);
    assert!(slots.iter().all(|s| s.available));
    assert_eq!(slots[0].start.with_timezone(&Local).hour(), 9);
    assert_eq!((slots[0].end - slots[0].start).num_minutes(), 60);

    let body = recorded.lock().unwrap().availability.clone().unwrap();
    assert_eq!(body, json!({"date": "2025-06-02T00:00:00", "duration": 60}));

    let health = client.health().await.unwrap();
    assert_eq!(health.status, "healthy");
}
