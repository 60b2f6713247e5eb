//! HTTP client for the campaign endpoints.
//!
//! Every mutating call evaluates the authorization policy and validates its
//! input locally before anything goes on the wire; a denied call never reaches
//! the server. The server remains the security boundary and repeats every
//! check.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::directory::CampaignFilter;
use crate::errors::{CoreError, Result};
use crate::lifecycle::{check_amount, validate_new};
use crate::policy::{can, Action};
use crate::types::{Campaign, NewCampaign, Session};

/// Error body produced by the campaign API: `{"error": <code>, "detail": <msg>}`.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    pub error: Option<String>,
    pub detail: Option<String>,
}

/// Parse an error body, tolerating plain-text and empty responses.
pub(crate) async fn read_error_body(resp: Response) -> Option<ErrorBody> {
    let text = resp.text().await.ok()?;
    if text.trim().is_empty() {
        return None;
    }
    Some(serde_json::from_str(&text).unwrap_or(ErrorBody {
        error: None,
        detail: Some(text),
    }))
}

/// Map a non-success campaign response onto the error taxonomy.
async fn campaign_failure(resp: Response, resource: Option<&str>) -> CoreError {
    let status = resp.status();
    let body = read_error_body(resp).await.unwrap_or_default();
    let detail = body
        .detail
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());

    if let Some(code) = body.error {
        return CoreError::from_code(&code, detail, resource.map(str::to_string));
    }
    match status {
        StatusCode::UNAUTHORIZED => CoreError::Unauthorized(detail),
        StatusCode::FORBIDDEN => CoreError::Forbidden(detail),
        StatusCode::NOT_FOUND => CoreError::NotFound(resource.unwrap_or(&detail).to_string()),
        s if s.is_server_error() => CoreError::Transport(format!("{status}: {detail}")),
        _ => CoreError::Validation(detail),
    }
}

#[derive(Debug, Deserialize)]
struct DonationReceipt {
    current_amount: i64,
    is_active: bool,
}

#[derive(Clone)]
pub struct CampaignClient {
    http: Client,
    base_url: String,
}

impl CampaignClient {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(req: RequestBuilder, session: Option<&Session>) -> RequestBuilder {
        match session {
            Some(s) => req.bearer_auth(&s.token),
            None => req,
        }
    }

    /// `GET /campaigns/`. Needs no session.
    pub async fn list(&self, filter: &CampaignFilter) -> Result<Vec<Campaign>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(owner) = &filter.owner_id {
            query.push(("owner_id", owner.clone()));
        }
        if let Some(search) = &filter.search {
            query.push(("search", search.clone()));
        }
        query.push(("include_closed", (!filter.active_only).to_string()));

        let resp = self.http.get(self.url("/campaigns/")).query(&query).send().await?;
        debug!(status = %resp.status(), "GET /campaigns/");
        if !resp.status().is_success() {
            return Err(campaign_failure(resp, None).await);
        }
        Ok(resp.json().await?)
    }

    /// `GET /campaigns/{id}`; `None` on 404.
    pub async fn get(&self, id: &str) -> Result<Option<Campaign>> {
        let resp = self
            .http
            .get(self.url(&format!("/campaigns/{id}")))
            .send()
            .await?;
        match resp.status() {
            StatusCode::NOT_FOUND => Ok(None),
            s if s.is_success() => Ok(Some(resp.json().await?)),
            _ => Err(campaign_failure(resp, Some(id)).await),
        }
    }

    /// `POST /campaigns/`.
    pub async fn create(&self, session: Option<&Session>, draft: &NewCampaign) -> Result<Campaign> {
        if !can(session.map(|s| &s.principal), Action::CreateCampaign) {
            return Err(CoreError::Forbidden(
                "only students or parents can launch campaigns".into(),
            ));
        }
        validate_new(draft)?;

        let req = self.http.post(self.url("/campaigns/")).json(draft);
        let resp = Self::authorized(req, session).send().await?;
        debug!(status = %resp.status(), "POST /campaigns/");
        if !resp.status().is_success() {
            return Err(campaign_failure(resp, None).await);
        }
        Ok(resp.json().await?)
    }

    /// `POST /campaigns/{id}/donate`.
    ///
    /// Returns `campaign` with the server-reported totals applied. Callers that
    /// want the full server view should refresh with [`Self::get`]; a failed
    /// refresh does not undo the donation.
    pub async fn donate(
        &self,
        session: Option<&Session>,
        campaign: &Campaign,
        amount: i64,
    ) -> Result<Campaign> {
        check_amount(amount)?;
        if !can(session.map(|s| &s.principal), Action::Donate(campaign)) {
            if !campaign.is_active {
                return Err(CoreError::CampaignClosed(campaign.id.clone()));
            }
            return Err(CoreError::Forbidden("only donors can contribute".into()));
        }

        let req = self
            .http
            .post(self.url(&format!("/campaigns/{}/donate", campaign.id)))
            .json(&json!({ "amount": amount }));
        let resp = Self::authorized(req, session).send().await?;
        debug!(status = %resp.status(), campaign_id = %campaign.id, "POST donate");
        if !resp.status().is_success() {
            return Err(campaign_failure(resp, Some(&campaign.id)).await);
        }

        let receipt: DonationReceipt = resp.json().await?;
        Ok(Campaign {
            current_amount: receipt.current_amount,
            is_active: receipt.is_active,
            ..campaign.clone()
        })
    }

    /// `GET /campaigns/me`: campaigns owned by the session's principal.
    pub async fn mine(&self, session: Option<&Session>) -> Result<Vec<Campaign>> {
        if !can(session.map(|s| &s.principal), Action::ViewOwnCampaigns) {
            return Err(CoreError::Forbidden(
                "only students or parents own campaigns".into(),
            ));
        }
        let req = self.http.get(self.url("/campaigns/me"));
        let resp = Self::authorized(req, session).send().await?;
        if !resp.status().is_success() {
            return Err(campaign_failure(resp, None).await);
        }
        Ok(resp.json().await?)
    }

    /// `DELETE /campaigns/{id}`.
    pub async fn delete(&self, session: Option<&Session>, campaign: &Campaign) -> Result<()> {
        if !can(session.map(|s| &s.principal), Action::DeleteCampaign(campaign)) {
            return Err(CoreError::Forbidden(
                "only the campaign owner can delete it".into(),
            ));
        }
        let req = self
            .http
            .delete(self.url(&format!("/campaigns/{}", campaign.id)));
        let resp = Self::authorized(req, session).send().await?;
        debug!(status = %resp.status(), campaign_id = %campaign.id, "DELETE campaign");
        if !resp.status().is_success() {
            return Err(campaign_failure(resp, Some(&campaign.id)).await);
        }
        Ok(())
    }
}
