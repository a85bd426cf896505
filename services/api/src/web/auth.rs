//! services/api/src/web/auth.rs
//!
//! Authentication endpoints for user signup, login, and logout.
//! Passwords are argon2-hashed unconditionally; nothing plaintext is stored.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::middleware::{effective_role, session_cookie};
use crate::web::state::AppState;
use bookcorner_core::ports::PortError;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub nickname: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub email: String,
    pub nickname: String,
    pub role: String,
}

fn session_set_cookie(session_id: &str) -> String {
    format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        session_id,
        Duration::days(30).num_seconds()
    )
}

/// Maps a credentials lookup failure onto the HTTP surface. Only an account
/// that genuinely does not exist reads as bad credentials; a store outage
/// must not masquerade as a wrong password.
fn credentials_error_response(e: PortError) -> (StatusCode, String) {
    match e {
        PortError::NotFound(_) => (
            StatusCode::UNAUTHORIZED,
            "Invalid email or password".to_string(),
        ),
        PortError::Unavailable(msg) => {
            error!("Account store unavailable during login: {msg}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "Login is temporarily unavailable".to_string(),
            )
        }
        other => {
            error!("Failed to get credentials: {other:?}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication error".to_string(),
            )
        }
    }
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/signup - Create a new account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "Account created successfully", body = AuthResponse),
        (status = 409, description = "Email or nickname already registered"),
        (status = 422, description = "Invalid request"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Validate the identity fields
    let email = req.email.trim().to_lowercase();
    let nickname = req.nickname.trim().to_string();
    if email.is_empty() || !email.contains('@') || nickname.is_empty() || req.password.is_empty() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "Email, nickname and password are all required".to_string(),
        ));
    }

    // 2. Hash the password
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let password_hash = argon2
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to hash password".to_string(),
            )
        })?
        .to_string();

    // 3. Create the account
    let account = state
        .accounts
        .create_account(&email, &nickname, &password_hash)
        .await
        .map_err(|e| match e {
            PortError::Conflict(what) => (StatusCode::CONFLICT, format!("{what} already exists")),
            other => {
                error!("Failed to create account: {:?}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to create account".to_string(),
                )
            }
        })?;

    // 4. Open an auth session and hand back the cookie
    let auth_session_id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(30);
    state
        .accounts
        .create_auth_session(&auth_session_id, &account.email, expires_at)
        .await
        .map_err(|e| {
            error!("Failed to create auth session: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create session".to_string(),
            )
        })?;

    // The owner signing up for the first time gets owner controls right
    // away, same promotion as login and the middleware.
    let role = effective_role(
        state.config.owner_email.as_deref(),
        &account.email,
        account.role,
    );
    let response = AuthResponse {
        email: account.email,
        nickname: account.nickname,
        role: role.as_str().to_string(),
    };

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, session_set_cookie(&auth_session_id))],
        Json(response),
    ))
}

/// POST /auth/login - Login with an existing account
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let email = req.email.trim().to_lowercase();

    // 1. Get the stored credentials. Unknown email and bad password produce
    //    the same message; a store failure does not.
    let creds = state
        .accounts
        .get_credentials(&email)
        .await
        .map_err(credentials_error_response)?;

    // 2. Verify the password
    let parsed_hash = PasswordHash::new(&creds.hashed_password).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Authentication error".to_string(),
        )
    })?;

    let valid = Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .is_ok();
    if !valid {
        return Err((
            StatusCode::UNAUTHORIZED,
            "Invalid email or password".to_string(),
        ));
    }

    // 3. Open an auth session
    let auth_session_id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(30);
    state
        .accounts
        .create_auth_session(&auth_session_id, &creds.email, expires_at)
        .await
        .map_err(|e| {
            error!("Failed to create auth session: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create session".to_string(),
            )
        })?;

    // 4. Report the effective role so the client renders the right controls;
    //    every mutation is still checked server-side regardless.
    let role = effective_role(state.config.owner_email.as_deref(), &creds.email, creds.role);

    let response = AuthResponse {
        email: creds.email,
        nickname: creds.nickname,
        role: role.as_str().to_string(),
    };

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session_set_cookie(&auth_session_id))],
        Json(response),
    ))
}

/// POST /auth/logout - Logout and invalidate the session
#[utoipa::path(
    post,
    path = "/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session")
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: axum::http::HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // 1. Extract the session cookie
    let auth_session_id = session_cookie(&headers)
        .map(str::to_string)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    // 2. Delete the auth session from the database
    state
        .accounts
        .delete_auth_session(&auth_session_id)
        .await
        .map_err(|e| {
            error!("Failed to delete auth session: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to logout".to_string(),
            )
        })?;

    // 3. Drop the session's scratch state (favorites, pending edit)
    state.sessions.remove(&auth_session_id).await;

    // 4. Clear the cookie
    let cookie = "session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0";
    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]))
}
