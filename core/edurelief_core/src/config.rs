//! Client configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use reqwest::Client;

use crate::client::CampaignClient;
use crate::errors::{CoreError, Result};
use crate::session::{
    CredentialExchange, ExternalProvider, FileSessionStore, IdentityProvider, ProviderConfig,
    SessionManager,
};

/// Which identity strategy backs the session manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityStrategy {
    /// Tokens issued by the campaign API itself.
    Credentials,
    /// Tokens issued by a third-party OAuth2 provider.
    Provider(ProviderConfig),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL of the campaign API (e.g. http://localhost:8000)
    pub api_url: String,
    /// Where the session is persisted between runs
    pub session_file: PathBuf,
    pub identity: IdentityStrategy,
    /// Per-request timeout on the HTTP boundary
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str| {
            lookup(key).ok_or_else(|| {
                CoreError::Validation(format!("{key} environment variable is required"))
            })
        };

        let identity = match var("EDURELIEF_IDENTITY", "credentials").as_str() {
            "credentials" => IdentityStrategy::Credentials,
            "provider" => IdentityStrategy::Provider(ProviderConfig {
                issuer: required("AUTH_PROVIDER_ISSUER")?,
                client_id: required("AUTH_PROVIDER_CLIENT_ID")?,
                audience: required("AUTH_PROVIDER_AUDIENCE")?,
                connection: var(
                    "AUTH_PROVIDER_CONNECTION",
                    "Username-Password-Authentication",
                ),
                role_claim: var("AUTH_PROVIDER_ROLE_CLAIM", "https://edurelief.app/role"),
                scope: var("AUTH_PROVIDER_SCOPE", "openid profile email offline_access"),
            }),
            other => {
                return Err(CoreError::Validation(format!(
                    "Invalid EDURELIEF_IDENTITY: {other}"
                )))
            }
        };

        Ok(ClientConfig {
            api_url: var("EDURELIEF_API_URL", "http://localhost:8000"),
            session_file: PathBuf::from(var("EDURELIEF_SESSION_FILE", ".edurelief/session.json")),
            identity,
            request_timeout: Duration::from_secs(
                var("EDURELIEF_TIMEOUT_SECS", "30")
                    .parse()
                    .map_err(|_| CoreError::Validation("Invalid EDURELIEF_TIMEOUT_SECS".into()))?,
            ),
        })
    }

    pub fn http_client(&self) -> Result<Client> {
        Ok(Client::builder().timeout(self.request_timeout).build()?)
    }

    /// Instantiate the configured identity strategy.
    pub fn identity_provider(&self, http: Client) -> Box<dyn IdentityProvider> {
        match &self.identity {
            IdentityStrategy::Credentials => {
                Box::new(CredentialExchange::new(http, self.api_url.clone()))
            }
            IdentityStrategy::Provider(provider) => {
                Box::new(ExternalProvider::new(http, provider.clone()))
            }
        }
    }

    /// Session manager and campaign client sharing one HTTP connection pool.
    pub fn build(&self) -> Result<(SessionManager, CampaignClient)> {
        let http = self.http_client()?;
        let sessions = SessionManager::new(
            self.identity_provider(http.clone()),
            Box::new(FileSessionStore::new(self.session_file.clone())),
        );
        Ok((sessions, CampaignClient::new(http, self.api_url.clone())))
    }
}
