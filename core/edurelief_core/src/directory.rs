//! # Campaign Directory
//!
//! Read-side access to campaigns plus the [`CampaignRepository`] seam that the
//! lifecycle engine writes through.
//!
//! The directory never caches: every read goes to the repository, so
//! deletions and accruals applied by the engine are visible to the next read.
//!
//! | Implementation     | Where                 |
//! |--------------------|-----------------------|
//! | [`MemoryCampaigns`]| in-process, this crate|
//! | SQLite store       | `backend/api`         |

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::errors::Result;
use crate::types::{Campaign, CampaignId, Donation};

/// Storage contract for campaigns.
///
/// Implementations only persist; they do not enforce lifecycle rules. Writes
/// for a single campaign are serialized by the engine before they reach the
/// repository.
#[async_trait]
pub trait CampaignRepository: Send + Sync {
    async fn insert(&self, campaign: &Campaign) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<Campaign>>;

    async fn all(&self) -> Result<Vec<Campaign>>;

    /// Returns `false` when no campaign with `id` existed.
    async fn remove(&self, id: &str) -> Result<bool>;

    /// Persist the post-accrual campaign and the donation that produced it as
    /// a single write.
    async fn save_accrual(&self, campaign: &Campaign, donation: &Donation) -> Result<()>;
}

/// Listing filter. All present criteria must match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignFilter {
    pub owner_id: Option<String>,
    /// Case-insensitive substring of the title or the description.
    pub search: Option<String>,
    /// Skip campaigns that already reached their goal.
    pub active_only: bool,
}

impl CampaignFilter {
    pub fn owned_by(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: Some(owner_id.into()),
            ..Self::default()
        }
    }

    pub fn matching(search: impl Into<String>) -> Self {
        Self {
            search: Some(search.into()),
            ..Self::default()
        }
    }

    pub fn matches(&self, campaign: &Campaign) -> bool {
        if self.active_only && !campaign.is_active {
            return false;
        }
        if let Some(owner) = &self.owner_id {
            if &campaign.owner_id != owner {
                return false;
            }
        }
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                campaign.title.to_lowercase().contains(&needle)
                    || campaign.description.to_lowercase().contains(&needle)
            }
        }
    }
}

#[derive(Clone)]
pub struct CampaignDirectory {
    repo: Arc<dyn CampaignRepository>,
}

impl CampaignDirectory {
    pub fn new(repo: Arc<dyn CampaignRepository>) -> Self {
        Self { repo }
    }

    /// Unordered listing of every campaign matching `filter`.
    pub async fn list(&self, filter: &CampaignFilter) -> Result<Vec<Campaign>> {
        let mut campaigns = self.repo.all().await?;
        campaigns.retain(|c| filter.matches(c));
        Ok(campaigns)
    }

    pub async fn by_id(&self, id: &str) -> Result<Option<Campaign>> {
        self.repo.get(id).await
    }

    /// Campaigns owned by `owner_id`; backs the owner dashboard.
    pub async fn by_owner(&self, owner_id: &str) -> Result<Vec<Campaign>> {
        self.list(&CampaignFilter::owned_by(owner_id)).await
    }
}

/// In-process repository with an audit ledger of accepted donations.
#[derive(Default)]
pub struct MemoryCampaigns {
    campaigns: RwLock<HashMap<CampaignId, Campaign>>,
    ledger: RwLock<Vec<Donation>>,
}

impl MemoryCampaigns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accepted donations, oldest first.
    pub fn donations(&self) -> Vec<Donation> {
        self.ledger.read().clone()
    }
}

#[async_trait]
impl CampaignRepository for MemoryCampaigns {
    async fn insert(&self, campaign: &Campaign) -> Result<()> {
        self.campaigns
            .write()
            .insert(campaign.id.clone(), campaign.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<Campaign>> {
        Ok(self.campaigns.read().get(id).cloned())
    }

    async fn all(&self) -> Result<Vec<Campaign>> {
        Ok(self.campaigns.read().values().cloned().collect())
    }

    async fn remove(&self, id: &str) -> Result<bool> {
        Ok(self.campaigns.write().remove(id).is_some())
    }

    async fn save_accrual(&self, campaign: &Campaign, donation: &Donation) -> Result<()> {
        // Both locks are taken before either write so readers never see the
        // ledger and the campaign disagree.
        let mut campaigns = self.campaigns.write();
        let mut ledger = self.ledger.write();
        campaigns.insert(campaign.id.clone(), campaign.clone());
        ledger.push(donation.clone());
        Ok(())
    }
}
