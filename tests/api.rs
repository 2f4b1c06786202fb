use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use cinema_booking::config::Config;
use cinema_booking::models::{NewUser, UserRole};
use cinema_booking::{app, AppState};

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(v) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(serde_json::to_vec(&v).unwrap())
        }
        None => Body::empty(),
    };
    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

struct Setup {
    app: Router,
    user_id: i64,
    showtime_id: i64,
    seats: Vec<i64>,
}

fn test_state() -> Arc<AppState> {
    AppState::in_memory(Config::in_memory())
}

async fn setup() -> Setup {
    let state = test_state();
    let user = state
        .store
        .insert_user(NewUser {
            name: "Timur".into(),
            email: "timur@example.com".into(),
            password_hash: "x".into(),
            role: UserRole::User,
        })
        .await
        .unwrap();
    let app = app(state);

    let (status, studio) = send(
        &app,
        Method::POST,
        "/api/studios",
        Some(json!({ "name": "Hall A", "rows": 2, "seats_per_row": 3, "total_seats": 6 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, movie) = send(
        &app,
        Method::POST,
        "/api/movies",
        Some(json!({
            "title": "Past Lives",
            "genre": "drama",
            "duration_minutes": 106,
            "rating": "PG-13",
            "status": "now_playing"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, showtime) = send(
        &app,
        Method::POST,
        "/api/showtimes",
        Some(json!({
            "movie_id": movie["id"],
            "studio_id": studio["id"],
            "show_date": "2030-01-01",
            "start_time": "18:00:00",
            "end_time": "20:00:00",
            "price": 50000
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let seats = studio["seats"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["id"].as_i64().unwrap())
        .collect();
    Setup {
        app,
        user_id: user.id,
        showtime_id: showtime["id"].as_i64().unwrap(),
        seats,
    }
}

#[tokio::test]
async fn test_health() {
    let app = app(test_state());
    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["store"], "memory");
}

#[tokio::test]
async fn test_studio_creation_returns_seats() {
    let s = setup().await;
    assert_eq!(s.seats.len(), 6);

    let (status, body) = send(&s.app, Method::GET, "/api/studios/1/seats", None).await;
    assert_eq!(status, StatusCode::OK);
    let labels: Vec<&str> = body.as_array().unwrap().iter().map(|s| s["label"].as_str().unwrap()).collect();
    assert_eq!(labels, ["A1", "A2", "A3", "B1", "B2", "B3"]);
}

#[tokio::test]
async fn test_layout_mismatch_is_structured_422() {
    let app = app(test_state());
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/studios",
        Some(json!({ "name": "Odd", "rows": 2, "seats_per_row": 3, "total_seats": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "layout_mismatch");
    assert_eq!(body["details"]["computed"], 6);
}

#[tokio::test]
async fn test_overlapping_showtime_is_409() {
    let s = setup().await;
    let (status, body) = send(
        &s.app,
        Method::POST,
        "/api/showtimes",
        Some(json!({
            "movie_id": 1,
            "studio_id": 1,
            "show_date": "2030-01-01",
            "start_time": "19:00:00",
            "end_time": "21:00:00",
            "price": 50000
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "schedule_conflict");
    assert_eq!(body["details"]["conflicting_showtime_id"], s.showtime_id);
}

#[tokio::test]
async fn test_booking_flow_over_http() {
    let s = setup().await;
    let (status, receipt) = send(
        &s.app,
        Method::POST,
        "/api/bookings",
        Some(json!({
            "user_id": s.user_id,
            "showtime_id": s.showtime_id,
            "seat_ids": [s.seats[0], s.seats[1]],
            "client_total": 100000
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["booking"]["status"], "pending");
    assert_eq!(receipt["booking"]["total_price"], 100_000);
    assert_eq!(receipt["client_total_matched"], true);
    let booking_id = receipt["booking"]["id"].as_i64().unwrap();

    let uri = format!("/api/showtimes/{}/seats", s.showtime_id);
    let (_, map) = send(&s.app, Method::GET, &uri, None).await;
    assert_eq!(map[0]["status"], "held");
    assert_eq!(map[2]["status"], "available");

    let status_uri = format!("/api/bookings/{booking_id}/status");
    let (status, body) = send(&s.app, Method::PATCH, &status_uri, Some(json!({ "status": "confirmed" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "confirmed");

    let (status, body) = send(
        &s.app,
        Method::POST,
        "/api/bookings",
        Some(json!({
            "user_id": s.user_id,
            "showtime_id": s.showtime_id,
            "seat_ids": [s.seats[1], s.seats[2]]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "seat_conflict");
    assert_eq!(body["details"]["seat_ids"], json!([s.seats[1]]));

    let (status, body) = send(&s.app, Method::PATCH, &status_uri, Some(json!({ "status": "pending" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "invalid_transition");

    // the show has not happened yet
    let (status, body) = send(&s.app, Method::PATCH, &status_uri, Some(json!({ "status": "completed" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "showtime_not_ended");
    assert_eq!(body["details"]["showtime_id"], json!(s.showtime_id));

    let (status, _) = send(&s.app, Method::PATCH, &status_uri, Some(json!({ "status": "cancelled" }))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, map) = send(&s.app, Method::GET, &uri, None).await;
    assert!(map.as_array().unwrap().iter().all(|s| s["status"] == "available"));
}

#[tokio::test]
async fn test_reservation_then_booking() {
    let s = setup().await;
    let (status, hold) = send(
        &s.app,
        Method::POST,
        "/api/reservations",
        Some(json!({ "showtime_id": s.showtime_id, "seat_ids": [s.seats[3]], "hold_seconds": 120 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let token = hold["token"].as_str().unwrap().to_string();

    let (status, receipt) = send(
        &s.app,
        Method::POST,
        "/api/bookings",
        Some(json!({
            "user_id": s.user_id,
            "showtime_id": s.showtime_id,
            "reservation_token": token
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(receipt["booking"]["seat_count"], 1);

    // bound holds are released through the booking, not the reservation
    let (status, body) = send(&s.app, Method::DELETE, &format!("/api/reservations/{token}"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "resource_in_use");
}

#[tokio::test]
async fn test_abandon_reservation() {
    let s = setup().await;
    let (_, hold) = send(
        &s.app,
        Method::POST,
        "/api/reservations",
        Some(json!({ "showtime_id": s.showtime_id, "seat_ids": [s.seats[0], s.seats[1]] })),
    )
    .await;
    let token = hold["token"].as_str().unwrap().to_string();

    let (status, body) = send(&s.app, Method::DELETE, &format!("/api/reservations/{token}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["released_seats"], 2);

    let unknown = uuid::Uuid::new_v4();
    let (status, body) = send(&s.app, Method::DELETE, &format!("/api/reservations/{unknown}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn test_add_seats_and_delete_booking() {
    let s = setup().await;
    let (_, receipt) = send(
        &s.app,
        Method::POST,
        "/api/bookings",
        Some(json!({ "user_id": s.user_id, "showtime_id": s.showtime_id, "seat_ids": [s.seats[0]] })),
    )
    .await;
    let booking_id = receipt["booking"]["id"].as_i64().unwrap();

    let (status, body) = send(
        &s.app,
        Method::POST,
        &format!("/api/bookings/{booking_id}/seats"),
        Some(json!({ "seat_ids": [s.seats[4], s.seats[5]] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["seat_count"], 3);
    assert_eq!(body["total_price"], 150_000);
    assert_eq!(body["seats"].as_array().unwrap().len(), 3);

    let (status, _) = send(&s.app, Method::DELETE, &format!("/api/bookings/{booking_id}"), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&s.app, Method::GET, &format!("/api/bookings/{booking_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_showtime_with_bookings() {
    let s = setup().await;
    send(
        &s.app,
        Method::POST,
        "/api/bookings",
        Some(json!({ "user_id": s.user_id, "showtime_id": s.showtime_id, "seat_ids": [s.seats[0]] })),
    )
    .await;

    let uri = format!("/api/showtimes/{}", s.showtime_id);
    let (status, body) = send(&s.app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "showtime_has_bookings");

    let (status, body) = send(&s.app, Method::DELETE, &format!("{uri}?force=true"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cancelled_bookings"][0]["status"], "cancelled");
}

#[tokio::test]
async fn test_user_registration() {
    let app = app(test_state());
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/users",
        Some(json!({ "name": "Ayan", "email": "not-an-email", "password": "long-enough" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["details"][0]["field"], "email");

    let (status, user) = send(
        &app,
        Method::POST,
        "/api/users",
        Some(json!({ "name": "Ayan", "email": "Ayan@Example.com", "password": "long-enough" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(user["email"], "ayan@example.com");
    assert_eq!(user["role"], "user");
    assert!(user.get("password_hash").is_none());

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/users",
        Some(json!({ "name": "Ayan 2", "email": "ayan@example.com", "password": "long-enough" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn test_unknown_booking_is_404() {
    let app = app(test_state());
    let (status, body) = send(&app, Method::GET, "/api/bookings/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "booking 999 not found");
}
