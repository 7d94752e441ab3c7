//! services/api/src/web/auth.rs
//!
//! Authentication endpoints: anonymous session bootstrap, email/password
//! signup and login, logout, session listing/revocation, and credential
//! change. Credentials themselves never leave the database; only argon2
//! hashes are stored.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::web::middleware::session_cookie;
use crate::web::state::AppState;

/// Sessions live this long; there is no sliding renewal.
const SESSION_DAYS: i64 = 30;
/// Checked before any remote call is issued.
const MIN_PASSWORD_LEN: usize = 8;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub email: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct SessionInfo {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Whether this row is the session making the request.
    pub current: bool,
}

//=========================================================================================
// Helpers
//=========================================================================================

fn hash_password(password: &str) -> Result<String, (StatusCode, String)> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            error!("Failed to hash password: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to hash password".to_string(),
            )
        })
}

fn verify_password(password: &str, hashed: &str) -> Result<bool, (StatusCode, String)> {
    let parsed_hash = PasswordHash::new(hashed).map_err(|e| {
        error!("Failed to parse password hash: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Authentication error".to_string(),
        )
    })?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

fn check_new_password(password: &str, confirm: Option<&str>) -> Result<(), (StatusCode, String)> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("Password must be at least {} characters", MIN_PASSWORD_LEN),
        ));
    }
    if let Some(confirm) = confirm {
        if confirm != password {
            return Err((StatusCode::BAD_REQUEST, "Passwords do not match".to_string()));
        }
    }
    Ok(())
}

/// Mints an auth session for the user and returns the Set-Cookie value.
async fn start_session(
    state: &AppState,
    user_id: Uuid,
) -> Result<String, (StatusCode, String)> {
    let auth_session_id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + Duration::days(SESSION_DAYS);

    state
        .identity
        .create_auth_session(&auth_session_id, user_id, expires_at)
        .await
        .map_err(|e| {
            error!("Failed to create auth session: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create session".to_string(),
            )
        })?;

    Ok(format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        auth_session_id,
        Duration::days(SESSION_DAYS).num_seconds()
    ))
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /auth/anonymous - Bootstrap a session without an account
#[utoipa::path(
    post,
    path = "/auth/anonymous",
    responses(
        (status = 201, description = "Anonymous session created", body = AuthResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn anonymous_handler(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let user = state.identity.create_anonymous_user().await.map_err(|e| {
        error!("Failed to create anonymous user: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to create user".to_string(),
        )
    })?;

    let cookie = start_session(&state, user.user_id).await?;

    let response = AuthResponse {
        user_id: user.user_id,
        email: None,
    };

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(response),
    ))
}

/// POST /auth/signup - Create a new user account
#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User created successfully", body = AuthResponse),
        (status = 400, description = "Invalid request"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn signup_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    check_new_password(&req.password, None)?;

    let password_hash = hash_password(&req.password)?;

    let user = state
        .identity
        .create_user_with_email(&req.email, &password_hash)
        .await
        .map_err(|e| {
            error!("Failed to create user: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to create user".to_string(),
            )
        })?;

    let cookie = start_session(&state, user.user_id).await?;

    let response = AuthResponse {
        user_id: user.user_id,
        email: user.email,
    };

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(response),
    ))
}

/// POST /auth/login - Login with existing account
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
    let user_creds = state
        .identity
        .get_user_by_email(&req.email)
        .await
        .map_err(|e| {
            error!("Failed to get user: {:?}", e);
            (
                StatusCode::UNAUTHORIZED,
                "Invalid email or password".to_string(),
            )
        })?;

    if !verify_password(&req.password, &user_creds.hashed_password)? {
        return Err((
            StatusCode::UNAUTHORIZED,
            "Invalid email or password".to_string(),
        ));
    }

    let cookie = start_session(&state, user_creds.user_id).await?;

    let response = AuthResponse {
        user_id: user_creds.user_id,
        email: Some(user_creds.email),
    };

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie)], Json(response)))
}

/// POST /auth/logout - Logout and invalidate session
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
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let auth_session_id = session_cookie(&headers)
        .ok_or((StatusCode::UNAUTHORIZED, "No session found".to_string()))?;

    state
        .identity
        .delete_auth_session(auth_session_id)
        .await
        .map_err(|e| {
            error!("Failed to delete auth session: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to logout".to_string(),
            )
        })?;

    let cookie = "session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0";

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]))
}

/// POST /auth/register - Attach email/password credentials to the current
/// (anonymous) account, converting it into a registered one.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Account registered", body = AuthResponse),
        (status = 400, description = "Invalid request"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<SignupRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    check_new_password(&req.password, None)?;

    let password_hash = hash_password(&req.password)?;

    let user = state
        .identity
        .attach_email(user_id, &req.email, &password_hash)
        .await
        .map_err(|e| {
            error!("Failed to register account: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to register account".to_string(),
            )
        })?;

    Ok(Json(AuthResponse {
        user_id: user.user_id,
        email: user.email,
    }))
}

/// POST /auth/password - Change the account password
#[utoipa::path(
    post,
    path = "/auth/password",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password updated"),
        (status = 400, description = "Validation failed"),
        (status = 401, description = "Current password is wrong")
    )
)]
pub async fn change_password_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    check_new_password(&req.new_password, Some(&req.confirm_password))?;

    let creds = state.identity.get_credentials(user_id).await.map_err(|e| {
        error!("Failed to load credentials: {:?}", e);
        (
            StatusCode::BAD_REQUEST,
            "No credentials on file for this account".to_string(),
        )
    })?;

    if !verify_password(&req.current_password, &creds.hashed_password)? {
        return Err((
            StatusCode::UNAUTHORIZED,
            "Current password is incorrect".to_string(),
        ));
    }

    let password_hash = hash_password(&req.new_password)?;
    state
        .identity
        .update_password(user_id, &password_hash)
        .await
        .map_err(|e| {
            error!("Failed to update password: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update password".to_string(),
            )
        })?;

    Ok(StatusCode::OK)
}

/// GET /auth/sessions - List this account's sessions
#[utoipa::path(
    get,
    path = "/auth/sessions",
    responses(
        (status = 200, description = "Sessions for the current account", body = [SessionInfo])
    )
)]
pub async fn list_sessions_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let current_id = session_cookie(&headers).unwrap_or_default().to_string();

    let sessions = state
        .identity
        .list_auth_sessions(user_id)
        .await
        .map_err(|e| {
            error!("Failed to list auth sessions: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to list sessions".to_string(),
            )
        })?;

    let response: Vec<SessionInfo> = sessions
        .into_iter()
        .map(|s| SessionInfo {
            current: s.id == current_id,
            id: s.id,
            created_at: s.created_at,
            expires_at: s.expires_at,
        })
        .collect();

    Ok(Json(response))
}

/// DELETE /auth/sessions/{id} - Revoke one session
#[utoipa::path(
    delete,
    path = "/auth/sessions/{id}",
    params(("id" = String, Path, description = "The session to revoke")),
    responses(
        (status = 200, description = "Session revoked"),
        (status = 404, description = "No such session on this account")
    )
)]
pub async fn revoke_session_handler(
    State(state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    // Only sessions belonging to the caller can be revoked.
    let sessions = state
        .identity
        .list_auth_sessions(user_id)
        .await
        .map_err(|e| {
            error!("Failed to list auth sessions: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to revoke session".to_string(),
            )
        })?;

    if !sessions.iter().any(|s| s.id == session_id) {
        return Err((StatusCode::NOT_FOUND, "No such session".to_string()));
    }

    state
        .identity
        .delete_auth_session(&session_id)
        .await
        .map_err(|e| {
            error!("Failed to delete auth session: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to revoke session".to_string(),
            )
        })?;

    Ok(StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_passwords_are_rejected_before_any_remote_call() {
        assert!(check_new_password("hunter2", None).is_err());
        assert!(check_new_password("long enough", None).is_ok());
    }

    #[test]
    fn mismatched_confirmation_is_rejected() {
        let err = check_new_password("long enough", Some("different")).unwrap_err();
        assert_eq!(err.0, StatusCode::BAD_REQUEST);
        assert_eq!(err.1, "Passwords do not match");
        assert!(check_new_password("long enough", Some("long enough")).is_ok());
    }

    #[test]
    fn password_hashes_verify_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong pony", &hash).unwrap());
    }
}
