//! Self-issued credential exchange: registration, login and the bearer-token
//! extractor that gates campaign mutations.

use std::str::FromStr;
use std::sync::Arc;

use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use axum::extract::{FromRequestParts, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use edurelief_core::session::normalize_email;
use edurelief_core::{CoreError, Principal, Role};
use password_hash::{PasswordHash, SaltString};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::ApiState;
use crate::db;
use crate::errors::{ApiError, Result};

// ─────────────────────────────────────────────────────────
// Credentials
// ─────────────────────────────────────────────────────────

fn random_bytes<const N: usize>() -> Result<[u8; N]> {
    let mut bytes = [0u8; N];
    getrandom::getrandom(&mut bytes).map_err(|e| ApiError::PasswordHash(e.to_string()))?;
    Ok(bytes)
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt_bytes = random_bytes::<16>()?;
    let salt =
        SaltString::encode_b64(&salt_bytes).map_err(|e| ApiError::PasswordHash(e.to_string()))?;
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::PasswordHash(e.to_string()))?
        .to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    match PasswordHash::new(hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Run CPU-bound password work on the blocking pool.
async fn off_runtime<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::PasswordHash(e.to_string()))
}

/// 32 random bytes, hex-encoded.
pub fn issue_token() -> Result<String> {
    Ok(hex::encode(random_bytes::<32>()?))
}

// ─────────────────────────────────────────────────────────
// Bearer extractor
// ─────────────────────────────────────────────────────────

/// The authenticated principal behind the request's bearer token.
///
/// Rejects with 401 when the header is missing, malformed, unknown or expired.
pub struct AuthUser(pub Principal);

#[axum::async_trait]
impl FromRequestParts<Arc<ApiState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<ApiState>) -> Result<Self> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CoreError::Unauthorized("missing bearer token".into()))?;

        let principal = db::principal_for_token(&state.pool, token, Utc::now().timestamp())
            .await?
            .ok_or_else(|| CoreError::Unauthorized("invalid or expired token".into()))?;
        Ok(AuthUser(principal))
    }
}

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub role: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub user: Principal,
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `POST /auth/register`
pub async fn register(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse> {
    let email = normalize_email(&req.email)?;
    if req.password.is_empty() {
        return Err(CoreError::Validation("password must not be empty".into()).into());
    }
    let role = Role::from_str(&req.role)?;

    let principal = Principal {
        id: Uuid::new_v4().to_string(),
        email,
        role,
    };
    let password = req.password;
    let hash = off_runtime(move || hash_password(&password)).await??;
    if !db::insert_user(&state.pool, &principal, &hash).await? {
        warn!("Registration rejected: email already in use");
        return Err(CoreError::DuplicateEmail("Email exists".into()).into());
    }

    info!(principal_id = %principal.id, role = %principal.role, "Registered");
    Ok((StatusCode::CREATED, Json(principal)))
}

/// `POST /auth/login`
pub async fn login(
    State(state): State<Arc<ApiState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let invalid = || ApiError::from(CoreError::InvalidCredentials("Invalid credentials".into()));

    let email = req.email.trim().to_lowercase();
    let user = db::find_user_by_email(&state.pool, &email)
        .await?
        .ok_or_else(invalid)?;
    let (hash, password) = (user.password_hash.clone(), req.password);
    if !off_runtime(move || verify_password(&hash, &password)).await? {
        warn!(principal_id = %user.id, "Login rejected: bad password");
        return Err(invalid());
    }

    let principal = user.principal()?;
    let token = issue_token()?;
    let expires_at = Utc::now().timestamp() + state.config.token_ttl_secs;
    db::insert_token(&state.pool, &token, &principal.id, expires_at).await?;

    info!(principal_id = %principal.id, "Logged in");
    Ok(Json(LoginResponse {
        access_token: token,
        token_type: "bearer",
        user: principal,
    }))
}
