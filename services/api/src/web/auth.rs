//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user registration, login, and logout.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use bookflow_core::{PortError, User};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;
use utoipa::ToSchema;

use crate::error::HttpError;
use crate::web::middleware::{session_id_from, SESSION_COOKIE};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /users/register - Create a new user account
#[utoipa::path(
    post,
    path = "/users/register",
    tag = "users",
    request_body = CredentialsRequest,
    responses(
        (status = 201, description = "User created successfully", body = UserResponse),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Email already registered"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let email = req.email.trim().to_lowercase();
    if !looks_like_email(&email) {
        return Err(HttpError::bad_request("Invalid email address"));
    }
    if req.password.is_empty() {
        return Err(HttpError::bad_request("Password must not be empty"));
    }

    let password_hash = hash_password(&req.password)?;

    let user = state
        .identity
        .create_user(&email, &password_hash)
        .await
        .map_err(|e| match e {
            PortError::Conflict(_) => HttpError::new(StatusCode::CONFLICT, "Email already registered"),
            other => {
                error!("Failed to create user: {:?}", other);
                HttpError::internal("Failed to create user")
            }
        })?;

    let cookie = start_session(&state, user.id).await?;
    info!("Registered user {}", user.id);

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(UserResponse::from(user)),
    ))
}

/// POST /users/login - Login with existing account
#[utoipa::path(
    post,
    path = "/users/login",
    tag = "users",
    request_body = CredentialsRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CredentialsRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let email = req.email.trim().to_lowercase();
    let user_creds = state
        .identity
        .get_credentials_by_email(&email)
        .await
        .map_err(|_| HttpError::unauthorized("Incorrect email or password"))?;

    let parsed_hash = PasswordHash::new(&user_creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        HttpError::internal("Authentication error")
    })?;

    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();
    if !valid {
        return Err(HttpError::unauthorized("Incorrect email or password"));
    }

    let cookie = start_session(&state, user_creds.user_id).await?;

    let response = AuthResponse {
        user_id: user_creds.user_id,
        email: user_creds.email,
    };
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /users/logout - Logout and invalidate session
#[utoipa::path(
    post,
    path = "/users/logout",
    tag = "users",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HttpError> {
    let auth_session_id =
        session_id_from(&headers).ok_or_else(|| HttpError::unauthorized("No session found"))?;

    state
        .identity
        .delete_auth_session(&auth_session_id)
        .await
        .map_err(|e| {
            error!("Failed to delete auth session: {:?}", e);
            HttpError::internal("Failed to logout")
        })?;

    let cookie = format!(
        "{}=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0",
        SESSION_COOKIE
    );
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)]))
}

/// GET /users/me - The authenticated user
#[utoipa::path(
    get,
    path = "/users/me",
    tag = "users",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<UserResponse>, HttpError> {
    let user = state
        .identity
        .get_user(user_id)
        .await
        .map_err(|_| HttpError::unauthorized("Could not validate credentials"))?;
    Ok(Json(user.into()))
}

//=========================================================================================
// Helpers
//=========================================================================================

fn hash_password(password: &str) -> Result<String, HttpError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            HttpError::internal("Failed to hash password")
        })
}

/// Persists a new auth session and returns the `Set-Cookie` value for it.
async fn start_session(state: &AppState, user_id: Uuid) -> Result<String, HttpError> {
    let auth_session_id = Uuid::new_v4().to_string();
    let (expires_at, max_age) = session_expiry(Utc::now(), state.config.session_ttl_days)
        .ok_or_else(|| {
            error!(
                "Session lifetime of {} days is out of range",
                state.config.session_ttl_days
            );
            HttpError::internal("Failed to create session")
        })?;

    state
        .identity
        .create_auth_session(&auth_session_id, user_id, expires_at)
        .await
        .map_err(|e| {
            error!("Failed to create auth session: {:?}", e);
            HttpError::internal("Failed to create session")
        })?;

    Ok(format!(
        "{}={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        SESSION_COOKIE, auth_session_id, max_age
    ))
}

/// Expiry instant and cookie `Max-Age` (seconds) for a session started at `now`.
/// `None` when the lifetime is not positive or the expiry is not representable.
fn session_expiry(now: DateTime<Utc>, ttl_days: i64) -> Option<(DateTime<Utc>, i64)> {
    if ttl_days <= 0 {
        return None;
    }
    let ttl = Duration::try_days(ttl_days)?;
    let expires_at = now.checked_add_signed(ttl)?;
    Some((expires_at, ttl.num_seconds()))
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}
