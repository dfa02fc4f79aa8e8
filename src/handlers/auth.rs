use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::User;
use crate::services::auth;
use crate::state::AppState;

// POST /api/auth/register
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let username = body.username.trim().to_string();
    let email = body.email.trim().to_lowercase();

    if username.is_empty() || email.is_empty() || body.password.is_empty() {
        return Err(AppError::Validation(
            "username, email and password are required".to_string(),
        ));
    }

    {
        let db = state.db.lock().unwrap();
        if queries::get_user_by_email(&db, &email)?.is_some() {
            return Err(AppError::Validation("email already exists".to_string()));
        }
    }

    let user = User {
        id: Uuid::new_v4().to_string(),
        username,
        email,
        password_hash: auth::hash_password(&body.password)?,
        is_admin: false,
        created_at: Utc::now().naive_utc(),
    };

    {
        let db = state.db.lock().unwrap();
        queries::insert_user(&db, &user)?;
    }

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "message": "user registered successfully" })),
    ))
}

// POST /api/auth/login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user: AccountSummary,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub id: String,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
}

impl AccountSummary {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            email: user.email.clone(),
            is_admin: user.is_admin,
        }
    }
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let email = body.email.trim().to_lowercase();

    let user = {
        let db = state.db.lock().unwrap();
        queries::get_user_by_email(&db, &email)?
    }
    .ok_or_else(|| AppError::NotFound("user not found".to_string()))?;

    if !auth::verify_password(&body.password, &user.password_hash) {
        return Err(AppError::Validation("invalid credentials".to_string()));
    }

    let token = auth::issue_token(&user.id, &state.config.jwt_secret, state.config.token_ttl_hours)?;

    Ok(Json(LoginResponse {
        token,
        user: AccountSummary::from_user(&user),
    }))
}
