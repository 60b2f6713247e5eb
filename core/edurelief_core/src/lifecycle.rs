//! # Campaign Lifecycle Engine
//!
//! Owns the campaign state machine and the accrual algorithm:
//!
//! ```text
//! ACTIVE ──donation(a), current + a <  goal──► ACTIVE  (current += a)
//! ACTIVE ──donation(a), current + a >= goal──► FUNDED  (current += a, overshoot kept)
//! FUNDED ──donation(a)──────────────────────► rejected, state unchanged
//! ```
//!
//! ## Architecture
//!
//! The arithmetic lives in synchronous free functions ([`validate_new`],
//! [`accrue`], [`progress_percent`]) so it can be checked without storage.
//! [`CampaignEngine`] wraps them with the authorization gate and persists
//! through a [`CampaignRepository`]. Every write to one campaign happens under
//! that campaign's lock, covering the read, the transition and the store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{info, warn};
use uuid::Uuid;

use crate::directory::CampaignRepository;
use crate::errors::{CoreError, Result};
use crate::policy::{can, Action};
use crate::types::{Campaign, CampaignId, Donation, NewCampaign, Principal};

// ─────────────────────────────────────────────────────────
// Pure transitions
// ─────────────────────────────────────────────────────────

/// Check a creation request against the campaign invariants.
pub fn validate_new(draft: &NewCampaign) -> Result<()> {
    if draft.title.trim().is_empty() {
        return Err(CoreError::Validation("title must not be empty".into()));
    }
    if draft.description.trim().is_empty() {
        return Err(CoreError::Validation("description must not be empty".into()));
    }
    if draft.goal_amount <= 0 {
        return Err(CoreError::Validation(format!(
            "goal_amount must be a positive integer, got {}",
            draft.goal_amount
        )));
    }
    Ok(())
}

/// Validate a donation amount.
pub fn check_amount(amount: i64) -> Result<i64> {
    if amount <= 0 {
        return Err(CoreError::InvalidAmount(amount.to_string()));
    }
    Ok(amount)
}

/// Read a donation amount from untyped JSON, rejecting fractions and strings.
pub fn amount_from_json(value: &Value) -> Result<i64> {
    let amount = value
        .as_i64()
        .ok_or_else(|| CoreError::InvalidAmount(value.to_string()))?;
    check_amount(amount)
}

/// Read a goal amount from untyped JSON.
pub fn goal_from_json(value: &Value) -> Result<i64> {
    match value.as_i64() {
        Some(goal) if goal > 0 => Ok(goal),
        _ => Err(CoreError::Validation(format!(
            "goal_amount must be a positive integer, got {value}"
        ))),
    }
}

/// Apply one donation to `campaign`, returning the next state.
///
/// The new amount and the new status are computed together and returned as
/// one value; the input is left untouched.
pub fn accrue(campaign: &Campaign, amount: i64) -> Result<Campaign> {
    let amount = check_amount(amount)?;
    if !campaign.is_active {
        return Err(CoreError::CampaignClosed(campaign.id.clone()));
    }
    let current_amount = campaign
        .current_amount
        .checked_add(amount)
        .ok_or_else(|| CoreError::InvalidAmount(amount.to_string()))?;
    Ok(Campaign {
        current_amount,
        is_active: current_amount < campaign.goal_amount,
        ..campaign.clone()
    })
}

/// `min(100, round(100 * current / goal))`, rounding halves up.
pub fn progress_percent(campaign: &Campaign) -> u8 {
    let goal = i128::from(campaign.goal_amount.max(1));
    let current = i128::from(campaign.current_amount.max(0));
    let rounded = (200 * current + goal) / (2 * goal);
    rounded.min(100) as u8
}

// ─────────────────────────────────────────────────────────
// Per-campaign write serialization
// ─────────────────────────────────────────────────────────

/// Keyed async mutexes, one per campaign that has been written to.
#[derive(Default)]
pub struct CampaignLocks {
    locks: parking_lot::Mutex<HashMap<CampaignId, Arc<Mutex<()>>>>,
}

impl CampaignLocks {
    pub async fn lock(&self, id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            locks
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }

    fn forget(&self, id: &str) {
        self.locks.lock().remove(id);
    }
}

// ─────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct CampaignEngine {
    repo: Arc<dyn CampaignRepository>,
    locks: Arc<CampaignLocks>,
}

impl CampaignEngine {
    pub fn new(repo: Arc<dyn CampaignRepository>) -> Self {
        Self {
            repo,
            locks: Arc::new(CampaignLocks::default()),
        }
    }

    /// Create a campaign owned by `owner`.
    pub async fn create_campaign(
        &self,
        owner: Option<&Principal>,
        draft: NewCampaign,
    ) -> Result<Campaign> {
        let owner = match owner {
            Some(p) if can(Some(p), Action::CreateCampaign) => p,
            _ => {
                warn!("create_campaign denied");
                return Err(CoreError::Forbidden(
                    "only students or parents can launch campaigns".into(),
                ));
            }
        };
        validate_new(&draft)?;

        let campaign = Campaign {
            id: Uuid::new_v4().to_string(),
            owner_id: owner.id.clone(),
            title: draft.title.trim().to_string(),
            description: draft.description.trim().to_string(),
            goal_amount: draft.goal_amount,
            current_amount: 0,
            is_active: true,
            is_verified: false,
        };
        self.repo.insert(&campaign).await?;

        info!(
            campaign_id = %campaign.id,
            owner_id = %owner.id,
            goal = campaign.goal_amount,
            "Campaign created"
        );
        Ok(campaign)
    }

    /// Accrue `amount` to the campaign identified by `campaign_id`.
    ///
    /// The campaign is re-read under its lock, so a stale copy held by the
    /// caller can never be written back.
    pub async fn record_donation(
        &self,
        campaign_id: &str,
        donor: Option<&Principal>,
        amount: i64,
    ) -> Result<Campaign> {
        check_amount(amount)?;

        let _guard = self.locks.lock(campaign_id).await;
        let campaign = self
            .repo
            .get(campaign_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(campaign_id.to_string()))?;

        if !can(donor, Action::Donate(&campaign)) {
            if !campaign.is_active {
                return Err(CoreError::CampaignClosed(campaign.id));
            }
            warn!(campaign_id, "donation denied");
            return Err(CoreError::Forbidden("only donors can contribute".into()));
        }

        let next = accrue(&campaign, amount)?;
        let donation = Donation {
            campaign_id: next.id.clone(),
            amount,
            donor_id: donor.map(|d| d.id.clone()),
            created_at: Utc::now(),
        };
        self.repo.save_accrual(&next, &donation).await?;

        info!(
            campaign_id,
            amount,
            current = next.current_amount,
            funded = !next.is_active,
            "Donation recorded"
        );
        Ok(next)
    }

    /// Delete a campaign; only its owner may do so.
    pub async fn delete_campaign(&self, campaign_id: &str, actor: Option<&Principal>) -> Result<()> {
        let _guard = self.locks.lock(campaign_id).await;
        let campaign = self
            .repo
            .get(campaign_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(campaign_id.to_string()))?;

        if !can(actor, Action::DeleteCampaign(&campaign)) {
            warn!(campaign_id, "delete_campaign denied");
            return Err(CoreError::Forbidden(
                "only the campaign owner can delete it".into(),
            ));
        }

        if !self.repo.remove(campaign_id).await? {
            return Err(CoreError::NotFound(campaign_id.to_string()));
        }
        self.locks.forget(campaign_id);

        info!(campaign_id, "Campaign deleted");
        Ok(())
    }
}
