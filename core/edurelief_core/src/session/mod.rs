//! # Identity Session Manager
//!
//! Owns the authenticated-principal lifecycle: login, registration, logout,
//! persisted session restore, and the bearer header attached to outgoing
//! requests.
//!
//! The manager holds the current [`Session`] in memory and mirrors it to a
//! [`SessionStore`]. Reads (`current_principal`, `authorization_header`) never
//! touch storage. Writes go to storage first and only then to memory, so a
//! failed persist leaves the previous session in place.

pub mod identity;
pub mod store;

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use regex::Regex;
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::errors::{CoreError, Result};
use crate::types::{Principal, Role, Session};

pub use identity::{CredentialExchange, ExternalProvider, IdentityProvider, ProviderConfig};
pub use store::{FileSessionStore, MemorySessionStore, SessionStore};

use store::{Entries, EXPIRES_AT_KEY, REFRESH_TOKEN_KEY, TOKEN_KEY, USER_KEY};

fn email_pattern() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
    })
}

/// Lower-case and validate an email address.
pub fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    if !email_pattern().is_match(&email) {
        return Err(CoreError::Validation(format!("invalid email address: {email}")));
    }
    Ok(email)
}

fn encode(session: &Session) -> Result<Entries> {
    let mut entries = Entries::new();
    entries.insert(TOKEN_KEY.into(), session.token.clone());
    entries.insert(
        USER_KEY.into(),
        serde_json::to_string(&session.principal)
            .map_err(|e| CoreError::Storage(e.to_string()))?,
    );
    if let Some(exp) = session.expires_at {
        entries.insert(EXPIRES_AT_KEY.into(), exp.to_rfc3339());
    }
    if let Some(refresh) = &session.refresh_token {
        entries.insert(REFRESH_TOKEN_KEY.into(), refresh.clone());
    }
    Ok(entries)
}

/// Rebuild a session; `None` unless both the token and the principal parse.
fn decode(entries: &Entries) -> Option<Session> {
    let token = entries.get(TOKEN_KEY).filter(|t| !t.is_empty())?;
    let principal: Principal = serde_json::from_str(entries.get(USER_KEY)?).ok()?;
    let expires_at = match entries.get(EXPIRES_AT_KEY) {
        Some(raw) => Some(
            DateTime::parse_from_rfc3339(raw)
                .ok()?
                .with_timezone(&Utc),
        ),
        None => None,
    };
    Some(Session {
        token: token.clone(),
        principal,
        expires_at,
        refresh_token: entries.get(REFRESH_TOKEN_KEY).cloned(),
    })
}

pub struct SessionManager {
    provider: Box<dyn IdentityProvider>,
    store: Box<dyn SessionStore>,
    current: RwLock<Option<Session>>,
    restored: OnceCell<()>,
}

impl SessionManager {
    pub fn new(provider: Box<dyn IdentityProvider>, store: Box<dyn SessionStore>) -> Self {
        Self {
            provider,
            store,
            current: RwLock::new(None),
            restored: OnceCell::new(),
        }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Authenticate and make the resulting session current.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || password.is_empty() {
            return Err(CoreError::InvalidCredentials(
                "Email and password are required".into(),
            ));
        }

        let session = self.provider.login(&email, password).await?;
        self.install(session.clone())?;
        info!(
            principal_id = %session.principal.id,
            role = %session.principal.role,
            provider = self.provider.name(),
            "Logged in"
        );
        Ok(session)
    }

    /// Create a principal. Does not log in.
    pub async fn register(&self, email: &str, password: &str, role: Role) -> Result<Principal> {
        let email = normalize_email(email)?;
        if password.is_empty() {
            return Err(CoreError::Validation("password must not be empty".into()));
        }

        let principal = self.provider.register(&email, password, role).await?;
        info!(principal_id = %principal.id, role = %principal.role, "Registered");
        Ok(principal)
    }

    /// Rehydrate the persisted session. Only the first call reads storage;
    /// concurrent callers wait for it and all see the same outcome.
    pub async fn restore_session(&self) -> Option<Session> {
        self.restored.get_or_init(|| self.rehydrate()).await;
        self.current_session()
    }

    async fn rehydrate(&self) {
        let entries = match self.store.load() {
            Ok(entries) => entries,
            Err(CoreError::Validation(e)) => {
                warn!("Discarding unreadable persisted session: {e}");
                self.clear_persisted();
                return;
            }
            Err(e) => {
                warn!("Could not read persisted session: {e}");
                return;
            }
        };

        let Some(session) = decode(&entries) else {
            if !entries.is_empty() {
                warn!("Discarding malformed persisted session");
                self.clear_persisted();
            }
            return;
        };

        let session = if session.is_expired(Utc::now()) {
            match self.provider.refresh(&session).await {
                Ok(Some(fresh)) => {
                    if let Err(e) = encode(&fresh).and_then(|entries| self.store.replace(entries)) {
                        warn!("Could not persist refreshed session: {e}");
                    }
                    fresh
                }
                Err(e) if e.is_retryable() => {
                    // Keep the stored tokens; the next start can try again.
                    warn!(principal_id = %session.principal.id, "Session refresh unavailable: {e}");
                    return;
                }
                Ok(None) | Err(_) => {
                    warn!(principal_id = %session.principal.id, "Persisted session expired");
                    self.clear_persisted();
                    return;
                }
            }
        } else {
            session
        };

        info!(principal_id = %session.principal.id, "Session restored");
        *self.current.write() = Some(session);
    }

    /// Silently refresh the current session through the identity strategy.
    ///
    /// Returns `Ok(None)` when there is no session or the strategy cannot
    /// refresh it; the current session is then left as is.
    pub async fn refresh(&self) -> Result<Option<Session>> {
        let Some(session) = self.current_session() else {
            return Ok(None);
        };
        let Some(fresh) = self.provider.refresh(&session).await? else {
            return Ok(None);
        };
        self.install(fresh.clone())?;
        Ok(Some(fresh))
    }

    /// Forget the session in memory and on disk. Idempotent.
    pub fn logout(&self) {
        let previous = self.current.write().take();
        self.clear_persisted();
        if let Some(session) = previous {
            info!(principal_id = %session.principal.id, "Logged out");
        }
    }

    pub fn current_principal(&self) -> Option<Principal> {
        self.current.read().as_ref().map(|s| s.principal.clone())
    }

    pub fn current_session(&self) -> Option<Session> {
        self.current.read().clone()
    }

    /// `Bearer <token>` for the current session.
    pub fn authorization_header(&self) -> Option<String> {
        self.current.read().as_ref().map(Session::bearer)
    }

    fn install(&self, session: Session) -> Result<()> {
        self.store.replace(encode(&session)?)?;
        *self.current.write() = Some(session);
        Ok(())
    }

    fn clear_persisted(&self) {
        if let Err(e) = self.store.clear() {
            warn!("Could not clear persisted session: {e}");
        }
    }
}
