use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{get, patch, post};
use axum::Router;
use chrono::Utc;
use tower::ServiceExt;

use tourbook::config::AppConfig;
use tourbook::db;
use tourbook::db::queries;
use tourbook::handlers;
use tourbook::models::{Item, User};
use tourbook::services::auth;
use tourbook::state::AppState;

// ── Helpers ──

fn test_config() -> AppConfig {
    AppConfig {
        port: 5000,
        database_url: ":memory:".to_string(),
        jwt_secret: "test-secret".to_string(),
        token_ttl_hours: 24,
    }
}

fn test_state() -> Arc<AppState> {
    let conn = db::init_db(":memory:").unwrap();
    Arc::new(AppState {
        db: Arc::new(Mutex::new(conn)),
        config: test_config(),
    })
}

fn test_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/auth/register", post(handlers::auth::register))
        .route("/api/auth/login", post(handlers::auth::login))
        .route("/api/bookings", post(handlers::bookings::create_booking))
        .route("/api/bookings", get(handlers::bookings::all_bookings))
        .route(
            "/api/bookings/my-bookings",
            get(handlers::bookings::my_bookings),
        )
        .route(
            "/api/bookings/stats/overview",
            get(handlers::bookings::booking_stats),
        )
        .route(
            "/api/bookings/user/:user_id",
            get(handlers::bookings::bookings_for_user),
        )
        .route("/api/bookings/:id", get(handlers::bookings::get_booking))
        .route(
            "/api/bookings/:id/cancel",
            patch(handlers::bookings::cancel_booking),
        )
        .route(
            "/api/bookings/:id/status",
            patch(handlers::bookings::update_booking_status),
        )
        .with_state(state)
}

fn seed_user(state: &AppState, id: &str, is_admin: bool) -> String {
    let user = User {
        id: id.to_string(),
        username: format!("user-{id}"),
        email: format!("{id}@example.com"),
        password_hash: auth::hash_password("password123").unwrap(),
        is_admin,
        created_at: Utc::now().naive_utc(),
    };
    {
        let db = state.db.lock().unwrap();
        queries::insert_user(&db, &user).unwrap();
    }
    auth::issue_token(id, &state.config.jwt_secret, 24).unwrap()
}

fn seed_item(state: &AppState, id: &str, price: f64, spots: i64) {
    let now = Utc::now().naive_utc();
    let item = Item {
        id: id.to_string(),
        name: "Bali Adventure Tour".to_string(),
        description: "7-day beach and temple tour".to_string(),
        destination: "Bali, Indonesia".to_string(),
        duration_days: 7,
        price,
        category: "Tour".to_string(),
        available_spots: spots,
        is_available: spots > 0,
        image_url: String::new(),
        created_at: now,
        updated_at: now,
    };
    let db = state.db.lock().unwrap();
    queries::insert_item(&db, &item).unwrap();
}

fn item_spots(state: &AppState, id: &str) -> (i64, bool) {
    let db = state.db.lock().unwrap();
    let item = queries::get_item_by_id(&db, id).unwrap().unwrap();
    (item.available_spots, item.is_available)
}

fn booking_body(item_id: &str, people: i64) -> String {
    serde_json::json!({
        "itemId": item_id,
        "bookingDate": "2026-09-01",
        "numberOfPeople": people,
        "customerInfo": {
            "fullName": "Alice Example",
            "phone": "+15551110000",
            "email": "alice@example.com",
            "specialRequests": "window seat"
        }
    })
    .to_string()
}

async fn send_json(
    app: Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<String>,
) -> (StatusCode, serde_json::Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {token}"));
    }
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let res = app.oneshot(request).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

// ── Auth ──

#[tokio::test]
async fn test_register_and_login_flow() {
    let state = test_state();

    let (status, _) = send_json(
        test_app(state.clone()),
        "POST",
        "/api/auth/register",
        None,
        Some(r#"{"username":"bob","email":"bob@example.com","password":"secretpw"}"#.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Duplicate email is rejected
    let (status, json) = send_json(
        test_app(state.clone()),
        "POST",
        "/api/auth/register",
        None,
        Some(r#"{"username":"bob2","email":"bob@example.com","password":"secretpw"}"#.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "email already exists");

    let (status, json) = send_json(
        test_app(state.clone()),
        "POST",
        "/api/auth/login",
        None,
        Some(r#"{"email":"bob@example.com","password":"secretpw"}"#.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["username"], "bob");
    assert_eq!(json["user"]["isAdmin"], false);
    let token = json["token"].as_str().unwrap().to_string();

    // The issued token authenticates a protected endpoint
    let (status, json) = send_json(
        test_app(state),
        "GET",
        "/api/bookings/my-bookings",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["totalItems"], 0);
}

#[tokio::test]
async fn test_login_unknown_email() {
    let state = test_state();
    let (status, _) = send_json(
        test_app(state),
        "POST",
        "/api/auth/login",
        None,
        Some(r#"{"email":"nobody@example.com","password":"x"}"#.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_login_wrong_password() {
    let state = test_state();
    seed_user(&state, "u1", false);

    let (status, json) = send_json(
        test_app(state),
        "POST",
        "/api/auth/login",
        None,
        Some(r#"{"email":"u1@example.com","password":"wrong"}"#.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "invalid credentials");
}

#[tokio::test]
async fn test_missing_token_unauthorized() {
    let state = test_state();
    let (status, _) = send_json(test_app(state), "GET", "/api/bookings/my-bookings", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_garbage_token_unauthorized() {
    let state = test_state();
    let (status, _) = send_json(
        test_app(state),
        "GET",
        "/api/bookings/my-bookings",
        Some("not-a-jwt"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ── Booking creation ──

#[tokio::test]
async fn test_create_booking_decrements_spots() {
    let state = test_state();
    let token = seed_user(&state, "u1", false);
    seed_item(&state, "t1", 100.0, 5);

    let (status, json) = send_json(
        test_app(state.clone()),
        "POST",
        "/api/bookings",
        Some(&token),
        Some(booking_body("t1", 3)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["message"], "booking created successfully");
    assert_eq!(json["booking"]["totalPrice"], 300.0);
    assert_eq!(json["booking"]["status"], "pending");
    assert_eq!(json["booking"]["paymentStatus"], "pending");
    assert_eq!(json["booking"]["user"]["username"], "user-u1");
    assert_eq!(json["booking"]["item"]["name"], "Bali Adventure Tour");
    assert_eq!(json["booking"]["customerInfo"]["fullName"], "Alice Example");
    assert!(json["booking"]["bookingReference"]
        .as_str()
        .unwrap()
        .starts_with("BK"));

    assert_eq!(item_spots(&state, "t1"), (2, true));
}

#[tokio::test]
async fn test_create_booking_missing_item() {
    let state = test_state();
    let token = seed_user(&state, "u1", false);

    let (status, json) = send_json(
        test_app(state),
        "POST",
        "/api/bookings",
        Some(&token),
        Some(booking_body("nope", 1)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "item not found");
}

#[tokio::test]
async fn test_create_booking_insufficient_spots() {
    let state = test_state();
    let token = seed_user(&state, "u1", false);
    seed_item(&state, "t1", 100.0, 2);

    let (status, json) = send_json(
        test_app(state.clone()),
        "POST",
        "/api/bookings",
        Some(&token),
        Some(booking_body("t1", 3)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "only 2 spots available, requested 3");

    // Nothing was reserved
    assert_eq!(item_spots(&state, "t1"), (2, true));
}

#[tokio::test]
async fn test_create_booking_invalid_date() {
    let state = test_state();
    let token = seed_user(&state, "u1", false);
    seed_item(&state, "t1", 100.0, 5);

    let body = serde_json::json!({
        "itemId": "t1",
        "bookingDate": "next tuesday",
        "numberOfPeople": 1,
        "customerInfo": {"fullName": "A", "phone": "1", "email": "a@b.c"}
    })
    .to_string();
    let (status, _) = send_json(test_app(state), "POST", "/api/bookings", Some(&token), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_booking_missing_customer_fields() {
    let state = test_state();
    let token = seed_user(&state, "u1", false);
    seed_item(&state, "t1", 100.0, 5);

    let body = serde_json::json!({
        "itemId": "t1",
        "bookingDate": "2026-09-01",
        "numberOfPeople": 1,
        "customerInfo": {"fullName": "  ", "phone": "1", "email": "a@b.c"}
    })
    .to_string();
    let (status, _) = send_json(test_app(state), "POST", "/api/bookings", Some(&token), Some(body)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ── Listing & fetching ──

#[tokio::test]
async fn test_my_bookings_pagination_and_filter() {
    let state = test_state();
    let token = seed_user(&state, "u1", false);
    seed_item(&state, "t1", 10.0, 100);

    for _ in 0..12 {
        let (status, _) = send_json(
            test_app(state.clone()),
            "POST",
            "/api/bookings",
            Some(&token),
            Some(booking_body("t1", 1)),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, json) = send_json(
        test_app(state.clone()),
        "GET",
        "/api/bookings/my-bookings?page=2&limit=5",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["bookings"].as_array().unwrap().len(), 5);
    assert_eq!(json["totalPages"], 3);
    assert_eq!(json["currentPage"], 2);
    assert_eq!(json["totalItems"], 12);

    // Status filter: nothing is confirmed yet
    let (_, json) = send_json(
        test_app(state.clone()),
        "GET",
        "/api/bookings/my-bookings?status=confirmed",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(json["totalItems"], 0);

    // Invalid filter value is rejected at the boundary
    let (status, _) = send_json(
        test_app(state),
        "GET",
        "/api/bookings/my-bookings?status=bogus",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_booking_owner_admin_and_stranger() {
    let state = test_state();
    let owner_token = seed_user(&state, "u1", false);
    let stranger_token = seed_user(&state, "u2", false);
    let admin_token = seed_user(&state, "admin", true);
    seed_item(&state, "t1", 100.0, 5);

    let (_, json) = send_json(
        test_app(state.clone()),
        "POST",
        "/api/bookings",
        Some(&owner_token),
        Some(booking_body("t1", 1)),
    )
    .await;
    let booking_id = json["booking"]["id"].as_str().unwrap().to_string();

    let (status, json) = send_json(
        test_app(state.clone()),
        "GET",
        &format!("/api/bookings/{booking_id}"),
        Some(&owner_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["booking"]["userId"], "u1");

    let (status, _) = send_json(
        test_app(state.clone()),
        "GET",
        &format!("/api/bookings/{booking_id}"),
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send_json(
        test_app(state),
        "GET",
        &format!("/api/bookings/{booking_id}"),
        Some(&stranger_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

// ── Cancellation ──

#[tokio::test]
async fn test_cancel_booking_restores_spots() {
    let state = test_state();
    let token = seed_user(&state, "u1", false);
    seed_item(&state, "t1", 100.0, 3);

    let (_, json) = send_json(
        test_app(state.clone()),
        "POST",
        "/api/bookings",
        Some(&token),
        Some(booking_body("t1", 3)),
    )
    .await;
    let booking_id = json["booking"]["id"].as_str().unwrap().to_string();
    assert_eq!(item_spots(&state, "t1"), (0, false));

    let (status, json) = send_json(
        test_app(state.clone()),
        "PATCH",
        &format!("/api/bookings/{booking_id}/cancel"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["booking"]["status"], "cancelled");
    assert_eq!(item_spots(&state, "t1"), (3, true));

    // A second cancel is rejected and leaves the item untouched
    let (status, json) = send_json(
        test_app(state.clone()),
        "PATCH",
        &format!("/api/bookings/{booking_id}/cancel"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "cannot cancel booking with status: cancelled");
    assert_eq!(item_spots(&state, "t1"), (3, true));
}

#[tokio::test]
async fn test_cancel_requires_ownership() {
    let state = test_state();
    let owner_token = seed_user(&state, "u1", false);
    let stranger_token = seed_user(&state, "u2", false);
    seed_item(&state, "t1", 100.0, 5);

    let (_, json) = send_json(
        test_app(state.clone()),
        "POST",
        "/api/bookings",
        Some(&owner_token),
        Some(booking_body("t1", 2)),
    )
    .await;
    let booking_id = json["booking"]["id"].as_str().unwrap().to_string();

    let (status, _) = send_json(
        test_app(state.clone()),
        "PATCH",
        &format!("/api/bookings/{booking_id}/cancel"),
        Some(&stranger_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(item_spots(&state, "t1"), (3, true));
}

// ── Admin endpoints ──

#[tokio::test]
async fn test_admin_endpoints_reject_non_admin() {
    let state = test_state();
    let token = seed_user(&state, "u1", false);

    for uri in [
        "/api/bookings",
        "/api/bookings/user/u1",
        "/api/bookings/stats/overview",
    ] {
        let (status, _) = send_json(test_app(state.clone()), "GET", uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "expected 403 for {uri}");
    }

    let (status, _) = send_json(
        test_app(state),
        "PATCH",
        "/api/bookings/some-id/status",
        Some(&token),
        Some(r#"{"status":"confirmed"}"#.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_admin_list_all_with_filter() {
    let state = test_state();
    let user_token = seed_user(&state, "u1", false);
    let admin_token = seed_user(&state, "admin", true);
    seed_item(&state, "t1", 50.0, 20);

    for _ in 0..3 {
        send_json(
            test_app(state.clone()),
            "POST",
            "/api/bookings",
            Some(&user_token),
            Some(booking_body("t1", 1)),
        )
        .await;
    }

    let (status, json) = send_json(
        test_app(state.clone()),
        "GET",
        "/api/bookings",
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["totalItems"], 3);

    let (status, json) = send_json(
        test_app(state),
        "GET",
        "/api/bookings?status=cancelled",
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["totalItems"], 0);
}

#[tokio::test]
async fn test_admin_update_status_and_payment() {
    let state = test_state();
    let user_token = seed_user(&state, "u1", false);
    let admin_token = seed_user(&state, "admin", true);
    seed_item(&state, "t1", 100.0, 5);

    let (_, json) = send_json(
        test_app(state.clone()),
        "POST",
        "/api/bookings",
        Some(&user_token),
        Some(booking_body("t1", 2)),
    )
    .await;
    let booking_id = json["booking"]["id"].as_str().unwrap().to_string();

    let (status, json) = send_json(
        test_app(state.clone()),
        "PATCH",
        &format!("/api/bookings/{booking_id}/status"),
        Some(&admin_token),
        Some(r#"{"status":"confirmed","paymentStatus":"paid"}"#.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["booking"]["status"], "confirmed");
    assert_eq!(json["booking"]["paymentStatus"], "paid");

    // Invalid enum value is a validation error
    let (status, _) = send_json(
        test_app(state.clone()),
        "PATCH",
        &format!("/api/bookings/{booking_id}/status"),
        Some(&admin_token),
        Some(r#"{"status":"teleported"}"#.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Admin cancellation restores spots
    let (status, _) = send_json(
        test_app(state.clone()),
        "PATCH",
        &format!("/api/bookings/{booking_id}/status"),
        Some(&admin_token),
        Some(r#"{"status":"cancelled"}"#.to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(item_spots(&state, "t1"), (5, true));
}

#[tokio::test]
async fn test_admin_bookings_for_user_sorted() {
    let state = test_state();
    let user_token = seed_user(&state, "u1", false);
    let admin_token = seed_user(&state, "admin", true);
    seed_item(&state, "t1", 10.0, 100);

    for people in [1, 3, 2] {
        send_json(
            test_app(state.clone()),
            "POST",
            "/api/bookings",
            Some(&user_token),
            Some(booking_body("t1", people)),
        )
        .await;
    }

    let (status, json) = send_json(
        test_app(state.clone()),
        "GET",
        "/api/bookings/user/u1?sortBy=numberOfPeople&sortOrder=asc",
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["user"]["username"], "user-u1");
    let people: Vec<i64> = json["bookings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["numberOfPeople"].as_i64().unwrap())
        .collect();
    assert_eq!(people, vec![1, 2, 3]);

    // Unknown user is a 404
    let (status, _) = send_json(
        test_app(state.clone()),
        "GET",
        "/api/bookings/user/ghost",
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Invalid payment status filter is rejected
    let (status, _) = send_json(
        test_app(state),
        "GET",
        "/api/bookings/user/u1?paymentStatus=gold",
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stats_overview() {
    let state = test_state();
    let user_token = seed_user(&state, "u1", false);
    let admin_token = seed_user(&state, "admin", true);
    seed_item(&state, "t1", 100.0, 50);

    let mut ids = vec![];
    for people in [1, 2, 3] {
        let (_, json) = send_json(
            test_app(state.clone()),
            "POST",
            "/api/bookings",
            Some(&user_token),
            Some(booking_body("t1", people)),
        )
        .await;
        ids.push(json["booking"]["id"].as_str().unwrap().to_string());
    }

    // Mark the 2-person booking as confirmed and paid
    send_json(
        test_app(state.clone()),
        "PATCH",
        &format!("/api/bookings/{}/status", ids[1]),
        Some(&admin_token),
        Some(r#"{"status":"confirmed","paymentStatus":"paid"}"#.to_string()),
    )
    .await;

    let (status, json) = send_json(
        test_app(state),
        "GET",
        "/api/bookings/stats/overview",
        Some(&admin_token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["totalBookings"], 3);
    // Only the paid booking counts toward revenue: 2 people x 100.00
    assert_eq!(json["totalRevenue"], 200.0);

    let stats = json["stats"].as_array().unwrap();
    let pending = stats.iter().find(|s| s["status"] == "pending").unwrap();
    assert_eq!(pending["count"], 2);
    assert_eq!(pending["totalRevenue"], 400.0);
    let confirmed = stats.iter().find(|s| s["status"] == "confirmed").unwrap();
    assert_eq!(confirmed["count"], 1);
}

// ── Health ──

#[tokio::test]
async fn test_health() {
    let state = test_state();
    let (status, json) = send_json(test_app(state), "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}
