//! Identity strategies.
//!
//! Both strategies reduce to "produce a bearer token and a principal record":
//!
//! * [`CredentialExchange`]: the campaign API issues its own tokens from
//!   `POST /auth/login` and registers users on `POST /auth/register`.
//! * [`ExternalProvider`]: an OAuth2 identity provider issues an
//!   audience-scoped access token; the principal is read from `/userinfo` and
//!   sessions are silently refreshed with the `refresh_token` grant.
//!
//! The strategy is chosen once at startup (see [`crate::config`]).

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::client::{read_error_body, ErrorBody};
use crate::errors::{CoreError, Result};
use crate::types::{Principal, Role, Session};

const INVALID_CREDENTIALS: &str = "Invalid credentials";
const EMAIL_EXISTS: &str = "Email exists";

/// Capability interface over an identity backend.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    async fn login(&self, email: &str, password: &str) -> Result<Session>;

    async fn register(&self, email: &str, password: &str, role: Role) -> Result<Principal>;

    /// Exchange an expiring session for a fresh one.
    ///
    /// Returns `Ok(None)` when the strategy cannot refresh this session.
    async fn refresh(&self, _session: &Session) -> Result<Option<Session>> {
        Ok(None)
    }
}

// ─────────────────────────────────────────────────────────
// Self-issued credential exchange
// ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
    user: Principal,
}

pub struct CredentialExchange {
    http: Client,
    base_url: String,
}

impl CredentialExchange {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

/// Map a failed identity response to the taxonomy, falling back to
/// `on_status` when the body carries no code.
async fn identity_failure(
    resp: Response,
    on_status: impl FnOnce(StatusCode, Option<String>) -> CoreError,
) -> CoreError {
    let status = resp.status();
    match read_error_body(resp).await {
        Some(ErrorBody {
            error: Some(code),
            detail,
        }) => CoreError::from_code(&code, detail.unwrap_or_default(), None),
        Some(ErrorBody { detail, .. }) => on_status(status, detail),
        None => on_status(status, None),
    }
}

#[async_trait]
impl IdentityProvider for CredentialExchange {
    fn name(&self) -> &'static str {
        "credentials"
    }

    async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let resp = self
            .http
            .post(format!("{}/auth/login", self.base_url))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await?;
        debug!(status = %resp.status(), "POST /auth/login");

        if !resp.status().is_success() {
            return Err(identity_failure(resp, |status, detail| match status {
                StatusCode::UNAUTHORIZED => CoreError::InvalidCredentials(
                    detail.unwrap_or_else(|| INVALID_CREDENTIALS.to_string()),
                ),
                _ => CoreError::AuthService(detail),
            })
            .await);
        }

        let body: LoginResponse = resp.json().await?;
        Ok(Session::new(body.access_token, body.user))
    }

    async fn register(&self, email: &str, password: &str, role: Role) -> Result<Principal> {
        let resp = self
            .http
            .post(format!("{}/auth/register", self.base_url))
            .json(&json!({ "email": email, "password": password, "role": role }))
            .send()
            .await?;
        debug!(status = %resp.status(), "POST /auth/register");

        if !resp.status().is_success() {
            return Err(identity_failure(resp, |status, detail| match status {
                StatusCode::CONFLICT => CoreError::DuplicateEmail(
                    detail.unwrap_or_else(|| EMAIL_EXISTS.to_string()),
                ),
                StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                    CoreError::Validation(detail.unwrap_or_else(|| "invalid registration".into()))
                }
                _ => CoreError::AuthService(detail),
            })
            .await);
        }

        Ok(resp.json().await?)
    }
}

// ─────────────────────────────────────────────────────────
// Third-party identity provider
// ─────────────────────────────────────────────────────────

/// Settings for [`ExternalProvider`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Base URL of the tenant, e.g. `https://edurelief.eu.auth0.com`.
    pub issuer: String,
    pub client_id: String,
    /// Audience of the access token (the campaign API).
    pub audience: String,
    /// Database connection used for signups.
    pub connection: String,
    /// Namespaced claim carrying the role in `/userinfo`.
    pub role_claim: String,
    pub scope: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    email: String,
    #[serde(flatten)]
    claims: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct SignupResponse {
    #[serde(alias = "_id", alias = "user_id")]
    id: String,
    email: String,
}

#[derive(Debug, Default, Deserialize)]
struct ProviderError {
    error: Option<String>,
    error_description: Option<String>,
    code: Option<String>,
    description: Option<String>,
}

impl ProviderError {
    async fn read(resp: Response) -> Self {
        resp.json().await.unwrap_or_default()
    }

    fn message(self) -> Option<String> {
        self.error_description.or(self.description)
    }
}

pub struct ExternalProvider {
    http: Client,
    config: ProviderConfig,
}

impl ExternalProvider {
    pub fn new(http: Client, mut config: ProviderConfig) -> Self {
        config.issuer = config.issuer.trim_end_matches('/').to_string();
        Self { http, config }
    }

    async fn request_token(&self, grant: Value) -> Result<TokenResponse> {
        let resp = self
            .http
            .post(format!("{}/oauth/token", self.config.issuer))
            .json(&grant)
            .send()
            .await?;
        debug!(status = %resp.status(), "POST /oauth/token");

        if resp.status().is_success() {
            return Ok(resp.json().await?);
        }
        let err = ProviderError::read(resp).await;
        Err(match err.error.as_deref() {
            Some("invalid_grant" | "access_denied" | "unauthorized") => {
                CoreError::InvalidCredentials(
                    err.message()
                        .unwrap_or_else(|| INVALID_CREDENTIALS.to_string()),
                )
            }
            _ => CoreError::AuthService(err.message()),
        })
    }

    async fn principal_for(&self, access_token: &str) -> Result<Principal> {
        let resp = self
            .http
            .get(format!("{}/userinfo", self.config.issuer))
            .bearer_auth(access_token)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(CoreError::AuthService(ProviderError::read(resp).await.message()));
        }

        let info: UserInfo = resp.json().await?;
        let role = info
            .claims
            .get(&self.config.role_claim)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                CoreError::AuthService(Some(format!(
                    "identity provider did not supply the {} claim",
                    self.config.role_claim
                )))
            })?
            .parse::<Role>()
            .map_err(|e| CoreError::AuthService(Some(e.to_string())))?;

        Ok(Principal {
            id: info.sub,
            email: info.email.to_lowercase(),
            role,
        })
    }

    fn session_from(token: TokenResponse, principal: Principal) -> Session {
        Session {
            expires_at: token
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs)),
            refresh_token: token.refresh_token,
            ..Session::new(token.access_token, principal)
        }
    }
}

#[async_trait]
impl IdentityProvider for ExternalProvider {
    fn name(&self) -> &'static str {
        "provider"
    }

    async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let token = self
            .request_token(json!({
                "grant_type": "password",
                "username": email,
                "password": password,
                "client_id": self.config.client_id,
                "audience": self.config.audience,
                "scope": self.config.scope,
            }))
            .await?;
        let principal = self.principal_for(&token.access_token).await?;
        Ok(Self::session_from(token, principal))
    }

    async fn register(&self, email: &str, password: &str, role: Role) -> Result<Principal> {
        let resp = self
            .http
            .post(format!("{}/dbconnections/signup", self.config.issuer))
            .json(&json!({
                "client_id": self.config.client_id,
                "connection": self.config.connection,
                "email": email,
                "password": password,
                "user_metadata": { "role": role },
            }))
            .send()
            .await?;
        debug!(status = %resp.status(), "POST /dbconnections/signup");

        if !resp.status().is_success() {
            let err = ProviderError::read(resp).await;
            return Err(match err.code.as_deref() {
                Some("user_exists" | "invalid_signup") => CoreError::DuplicateEmail(
                    err.message().unwrap_or_else(|| EMAIL_EXISTS.to_string()),
                ),
                Some("invalid_password" | "password_strength_error") => {
                    CoreError::Validation(err.message().unwrap_or_else(|| "weak password".into()))
                }
                _ => CoreError::AuthService(err.message()),
            });
        }

        let body: SignupResponse = resp.json().await?;
        Ok(Principal {
            id: body.id,
            email: body.email.to_lowercase(),
            role,
        })
    }

    async fn refresh(&self, session: &Session) -> Result<Option<Session>> {
        let Some(refresh_token) = session.refresh_token.as_deref() else {
            return Ok(None);
        };
        let mut token = self
            .request_token(json!({
                "grant_type": "refresh_token",
                "client_id": self.config.client_id,
                "refresh_token": refresh_token,
            }))
            .await?;
        // Providers that do not rotate refresh tokens omit it from the response.
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }
        Ok(Some(Self::session_from(token, session.principal.clone())))
    }
}
