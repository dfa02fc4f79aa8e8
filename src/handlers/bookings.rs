use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::db::queries::{BookingFilter, BookingSort, SortField, SortOrder};
use crate::errors::AppError;
use crate::handlers::auth::AccountSummary;
use crate::models::{BookingDetail, BookingStatus, CustomerInfo, PaymentStatus};
use crate::services::auth;
use crate::services::booking::{self, NewBooking};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

fn parse_status_filter(value: Option<&str>) -> Result<Option<BookingStatus>, AppError> {
    match value {
        None => Ok(None),
        Some(s) => BookingStatus::parse(s)
            .map(Some)
            .ok_or_else(|| AppError::Validation("invalid status value".to_string())),
    }
}

fn parse_payment_filter(value: Option<&str>) -> Result<Option<PaymentStatus>, AppError> {
    match value {
        None => Ok(None),
        Some(s) => PaymentStatus::parse(s)
            .map(Some)
            .ok_or_else(|| AppError::Validation("invalid payment status value".to_string())),
    }
}

fn page_params(page: Option<i64>, limit: Option<i64>) -> (i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    (page, limit)
}

fn total_pages(total: i64, limit: i64) -> i64 {
    (total + limit - 1) / limit
}

// POST /api/bookings
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub item_id: String,
    pub booking_date: String,
    pub number_of_people: i64,
    pub customer_info: CustomerInfoRequest,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfoRequest {
    pub full_name: String,
    pub phone: String,
    pub email: String,
    #[serde(default)]
    pub special_requests: String,
}

#[derive(Serialize)]
pub struct BookingResponse {
    pub message: String,
    pub booking: BookingDetail,
}

pub async fn create_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, AppError> {
    let user = auth::authenticate(&state, &headers)?;

    let customer_info = CustomerInfo {
        full_name: body.customer_info.full_name.trim().to_string(),
        phone: body.customer_info.phone.trim().to_string(),
        email: body.customer_info.email.trim().to_string(),
        special_requests: body.customer_info.special_requests.trim().to_string(),
    };
    if customer_info.full_name.is_empty()
        || customer_info.phone.is_empty()
        || customer_info.email.is_empty()
    {
        return Err(AppError::Validation(
            "customer fullName, phone and email are required".to_string(),
        ));
    }

    let booking_date = NaiveDate::parse_from_str(body.booking_date.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::Validation("invalid booking date, expected YYYY-MM-DD".to_string()))?;

    let request = NewBooking {
        item_id: body.item_id,
        booking_date,
        number_of_people: body.number_of_people,
        customer_info,
    };

    let detail = {
        let mut db = state.db.lock().unwrap();
        let created = booking::create_booking(&mut db, &user.id, &request)?;
        queries::get_booking_detail(&db, &created.id)?
            .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?
    };

    Ok((
        StatusCode::CREATED,
        Json(BookingResponse {
            message: "booking created successfully".to_string(),
            booking: detail,
        }),
    ))
}

// GET /api/bookings/my-bookings
#[derive(Deserialize)]
pub struct MyBookingsQuery {
    pub status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingListResponse {
    pub bookings: Vec<BookingDetail>,
    pub total_pages: i64,
    pub current_page: i64,
    pub total_items: i64,
}

pub async fn my_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<MyBookingsQuery>,
) -> Result<Json<BookingListResponse>, AppError> {
    let user = auth::authenticate(&state, &headers)?;

    let (page, limit) = page_params(query.page, query.limit);
    let filter = BookingFilter {
        user_id: Some(user.id),
        status: parse_status_filter(query.status.as_deref())?,
        payment_status: None,
    };

    let (bookings, total) = {
        let db = state.db.lock().unwrap();
        let bookings = queries::list_bookings(
            &db,
            &filter,
            &BookingSort::default(),
            limit,
            (page - 1) * limit,
        )?;
        let total = queries::count_bookings(&db, &filter)?;
        (bookings, total)
    };

    Ok(Json(BookingListResponse {
        bookings,
        total_pages: total_pages(total, limit),
        current_page: page,
        total_items: total,
    }))
}

// GET /api/bookings (admin)
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllBookingsQuery {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

pub async fn all_bookings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AllBookingsQuery>,
) -> Result<Json<BookingListResponse>, AppError> {
    let user = auth::authenticate(&state, &headers)?;
    auth::require_admin(&user)?;

    let (page, limit) = page_params(query.page, query.limit);
    let filter = BookingFilter {
        user_id: None,
        status: parse_status_filter(query.status.as_deref())?,
        payment_status: parse_payment_filter(query.payment_status.as_deref())?,
    };

    let (bookings, total) = {
        let db = state.db.lock().unwrap();
        let bookings = queries::list_bookings(
            &db,
            &filter,
            &BookingSort::default(),
            limit,
            (page - 1) * limit,
        )?;
        let total = queries::count_bookings(&db, &filter)?;
        (bookings, total)
    };

    Ok(Json(BookingListResponse {
        bookings,
        total_pages: total_pages(total, limit),
        current_page: page,
        total_items: total,
    }))
}

// GET /api/bookings/user/:user_id (admin)
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBookingsQuery {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBookingsResponse {
    pub bookings: Vec<BookingDetail>,
    pub total_pages: i64,
    pub current_page: i64,
    pub total_items: i64,
    pub user: AccountSummary,
}

pub async fn bookings_for_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
    Query(query): Query<UserBookingsQuery>,
) -> Result<Json<UserBookingsResponse>, AppError> {
    let caller = auth::authenticate(&state, &headers)?;
    auth::require_admin(&caller)?;

    let (page, limit) = page_params(query.page, query.limit);
    let filter = BookingFilter {
        user_id: Some(user_id.clone()),
        status: parse_status_filter(query.status.as_deref())?,
        payment_status: parse_payment_filter(query.payment_status.as_deref())?,
    };

    // Unknown sort fields fall back to createdAt rather than erroring.
    let sort = BookingSort {
        field: query
            .sort_by
            .as_deref()
            .and_then(SortField::parse)
            .unwrap_or(SortField::CreatedAt),
        order: query
            .sort_order
            .as_deref()
            .map(SortOrder::parse)
            .unwrap_or(SortOrder::Desc),
    };

    let (target, bookings, total) = {
        let db = state.db.lock().unwrap();
        let target = queries::get_user_by_id(&db, &user_id)?
            .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;
        let bookings = queries::list_bookings(&db, &filter, &sort, limit, (page - 1) * limit)?;
        let total = queries::count_bookings(&db, &filter)?;
        (target, bookings, total)
    };

    Ok(Json(UserBookingsResponse {
        bookings,
        total_pages: total_pages(total, limit),
        current_page: page,
        total_items: total,
        user: AccountSummary::from_user(&target),
    }))
}

// GET /api/bookings/:id
pub async fn get_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = auth::authenticate(&state, &headers)?;

    let detail = {
        let db = state.db.lock().unwrap();
        queries::get_booking_detail(&db, &id)?
    }
    .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?;

    if detail.booking.user_id != user.id && !user.is_admin {
        return Err(AppError::Forbidden("access denied".to_string()));
    }

    Ok(Json(serde_json::json!({ "booking": detail })))
}

// PATCH /api/bookings/:id/cancel
pub async fn cancel_booking(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    let user = auth::authenticate(&state, &headers)?;

    let booking = {
        let mut db = state.db.lock().unwrap();
        booking::cancel_booking(&mut db, &id, &user.id)?
    };

    Ok(Json(serde_json::json!({
        "message": "booking cancelled successfully",
        "booking": booking,
    })))
}

// PATCH /api/bookings/:id/status (admin)
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
    pub payment_status: Option<String>,
}

pub async fn update_booking_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<BookingResponse>, AppError> {
    let user = auth::authenticate(&state, &headers)?;
    auth::require_admin(&user)?;

    let status = parse_status_filter(body.status.as_deref())?;
    let payment_status = parse_payment_filter(body.payment_status.as_deref())?;

    let detail = {
        let mut db = state.db.lock().unwrap();
        booking::update_booking_status(&mut db, &id, status, payment_status)?;
        queries::get_booking_detail(&db, &id)?
            .ok_or_else(|| AppError::NotFound("booking not found".to_string()))?
    };

    Ok(Json(BookingResponse {
        message: "booking updated successfully".to_string(),
        booking: detail,
    }))
}

// GET /api/bookings/stats/overview (admin)
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub stats: Vec<StatusStat>,
    pub total_bookings: i64,
    pub total_revenue: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusStat {
    pub status: BookingStatus,
    pub count: i64,
    pub total_revenue: f64,
}

pub async fn booking_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<StatsResponse>, AppError> {
    let user = auth::authenticate(&state, &headers)?;
    auth::require_admin(&user)?;

    let stats = {
        let db = state.db.lock().unwrap();
        queries::get_booking_stats(&db)?
    };

    Ok(Json(StatsResponse {
        stats: stats
            .by_status
            .into_iter()
            .map(|s| StatusStat {
                status: s.status,
                count: s.count,
                total_revenue: s.total_revenue,
            })
            .collect(),
        total_bookings: stats.total_bookings,
        total_revenue: stats.total_revenue,
    }))
}
