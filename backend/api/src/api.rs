//! Campaign REST API.
//!
//! | Route | Auth | Handler |
//! |-------|------|---------|
//! | `GET /health` | none | [`health`] |
//! | `POST /auth/register`, `POST /auth/login` | none | [`crate::auth`] |
//! | `GET /campaigns/` | none | [`list_campaigns`] |
//! | `POST /campaigns/` | bearer | [`create_campaign`] |
//! | `GET /campaigns/me` | bearer | [`my_campaigns`] |
//! | `GET /campaigns/:id` | none | [`get_campaign`] |
//! | `DELETE /campaigns/:id` | bearer | [`delete_campaign`] |
//! | `POST /campaigns/:id/donate` | bearer | [`donate`] |
//! | `GET /campaigns/:id/donations` | bearer | [`campaign_donations`] |
//!
//! Every rule lives in the core engine and policy; handlers only translate.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use edurelief_core::lifecycle::{amount_from_json, goal_from_json};
use edurelief_core::{
    can, Action, Campaign, CampaignDirectory, CampaignEngine, CampaignFilter, CoreError,
    NewCampaign,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::warn;

use crate::auth::{self, AuthUser};
use crate::config::Config;
use crate::db;
use crate::errors::Result;

#[derive(Clone)]
pub struct ApiState {
    pub pool: SqlitePool,
    pub config: Config,
    pub engine: CampaignEngine,
    pub directory: CampaignDirectory,
}

impl ApiState {
    pub fn new(pool: SqlitePool, config: Config) -> Self {
        let repo = Arc::new(db::SqliteCampaigns::new(pool.clone()));
        Self {
            engine: CampaignEngine::new(repo.clone()),
            directory: CampaignDirectory::new(repo),
            pool,
            config,
        }
    }
}

pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/campaigns", get(list_campaigns).post(create_campaign))
        .route("/campaigns/", get(list_campaigns).post(create_campaign))
        .route("/campaigns/me", get(my_campaigns))
        .route("/campaigns/:id", get(get_campaign).delete(delete_campaign))
        .route("/campaigns/:id/donate", post(donate))
        .route("/campaigns/:id/donations", get(campaign_donations))
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub owner_id: Option<String>,
    pub search: Option<String>,
    /// Funded campaigns are hidden unless asked for.
    pub include_closed: Option<bool>,
}

#[derive(Deserialize)]
pub struct CreateCampaignRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub goal_amount: Value,
}

#[derive(Deserialize)]
pub struct DonationRequest {
    pub amount: Value,
}

#[derive(Serialize)]
pub struct DonationResponse {
    pub message: &'static str,
    pub current_amount: i64,
    pub is_active: bool,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /campaigns/`
///
/// Public listing; only active campaigns unless `include_closed=true`.
pub async fn list_campaigns(
    State(state): State<Arc<ApiState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Campaign>>> {
    let filter = CampaignFilter {
        owner_id: query.owner_id,
        search: query.search,
        active_only: !query.include_closed.unwrap_or(false),
    };
    Ok(Json(state.directory.list(&filter).await?))
}

/// `GET /campaigns/me`
///
/// Campaigns owned by the caller; students and parents only.
pub async fn my_campaigns(
    State(state): State<Arc<ApiState>>,
    AuthUser(principal): AuthUser,
) -> Result<Json<Vec<Campaign>>> {
    if !can(Some(&principal), Action::ViewOwnCampaigns) {
        warn!(principal_id = %principal.id, "view_own_campaigns denied");
        return Err(CoreError::Forbidden("only students or parents own campaigns".into()).into());
    }
    Ok(Json(state.directory.by_owner(&principal.id).await?))
}

/// `GET /campaigns/:id`
pub async fn get_campaign(
    State(state): State<Arc<ApiState>>,
    Path(campaign_id): Path<String>,
) -> Result<Json<Campaign>> {
    let campaign = state
        .directory
        .by_id(&campaign_id)
        .await?
        .ok_or(CoreError::NotFound(campaign_id))?;
    Ok(Json(campaign))
}

/// `POST /campaigns/`
pub async fn create_campaign(
    State(state): State<Arc<ApiState>>,
    AuthUser(principal): AuthUser,
    Json(req): Json<CreateCampaignRequest>,
) -> Result<impl IntoResponse> {
    // Deny before looking at the payload.
    if !can(Some(&principal), Action::CreateCampaign) {
        warn!(principal_id = %principal.id, "create_campaign denied");
        return Err(CoreError::Forbidden("only students or parents can launch campaigns".into()).into());
    }
    let draft = NewCampaign {
        title: req.title,
        description: req.description,
        goal_amount: goal_from_json(&req.goal_amount)?,
    };
    let mut campaign = state.engine.create_campaign(Some(&principal), draft).await?;

    if state.config.auto_verify_campaigns {
        campaign.is_verified = db::set_verified(&state.pool, &campaign.id, true).await?;
    }
    Ok((StatusCode::CREATED, Json(campaign)))
}

/// `POST /campaigns/:id/donate`
pub async fn donate(
    State(state): State<Arc<ApiState>>,
    AuthUser(principal): AuthUser,
    Path(campaign_id): Path<String>,
    Json(req): Json<DonationRequest>,
) -> Result<Json<DonationResponse>> {
    let amount = amount_from_json(&req.amount)?;
    let campaign = state
        .engine
        .record_donation(&campaign_id, Some(&principal), amount)
        .await?;
    Ok(Json(DonationResponse {
        message: "Donation successful",
        current_amount: campaign.current_amount,
        is_active: campaign.is_active,
    }))
}

/// `GET /campaigns/:id/donations`
///
/// The audit ledger, visible to the campaign owner only.
pub async fn campaign_donations(
    State(state): State<Arc<ApiState>>,
    AuthUser(principal): AuthUser,
    Path(campaign_id): Path<String>,
) -> Result<Json<Vec<db::DonationRecord>>> {
    let campaign = state
        .directory
        .by_id(&campaign_id)
        .await?
        .ok_or_else(|| CoreError::NotFound(campaign_id.clone()))?;
    if !can(Some(&principal), Action::ViewDonations(&campaign)) {
        warn!(principal_id = %principal.id, campaign_id = %campaign.id, "ledger access denied");
        return Err(CoreError::Forbidden("only the campaign owner can see its donations".into()).into());
    }
    Ok(Json(db::donations_for(&state.pool, &campaign.id).await?))
}

/// `DELETE /campaigns/:id`
pub async fn delete_campaign(
    State(state): State<Arc<ApiState>>,
    AuthUser(principal): AuthUser,
    Path(campaign_id): Path<String>,
) -> Result<Json<MessageResponse>> {
    state
        .engine
        .delete_campaign(&campaign_id, Some(&principal))
        .await?;
    Ok(Json(MessageResponse {
        message: "Campaign deleted",
    }))
}

// ─────────────────────────────────────────────────────────
// End-to-end tests
// ─────────────────────────────────────────────────────────
