//! # Authorization Policy
//!
//! A pure decision function over a principal (or none) and an action on a
//! resource already in hand. Evaluation performs no I/O and never blocks, so it
//! can run before rendering a view as well as before every mutating call.
//!
//! Rules, first match wins:
//!
//! | Action              | Allowed when                                            |
//! |---------------------|---------------------------------------------------------|
//! | `CreateCampaign`    | role is STUDENT or PARENT                               |
//! | `DeleteCampaign(c)` | role is STUDENT or PARENT and principal owns `c`        |
//! | `Donate(c)`         | role is DONOR and `c` is active                         |
//! | `ViewCampaign(c)`   | always, authenticated or not                            |
//! | `ViewDashboard`     | any authenticated principal                             |
//! | `ViewOwnCampaigns`  | role is STUDENT or PARENT                               |
//! | `ViewDonations(c)`  | role is STUDENT or PARENT and principal owns `c`        |
//!
//! Anything else is denied.

use crate::types::{Campaign, Principal, Role};

/// An action together with the resource it targets.
#[derive(Debug, Clone, Copy)]
pub enum Action<'a> {
    CreateCampaign,
    DeleteCampaign(&'a Campaign),
    Donate(&'a Campaign),
    ViewCampaign(&'a Campaign),
    ViewDashboard,
    ViewOwnCampaigns,
    /// The donation ledger of one campaign.
    ViewDonations(&'a Campaign),
}

impl Action<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateCampaign => "create_campaign",
            Self::DeleteCampaign(_) => "delete_campaign",
            Self::Donate(_) => "donate",
            Self::ViewCampaign(_) => "view_campaign",
            Self::ViewDashboard => "view_dashboard",
            Self::ViewOwnCampaigns => "view_own_campaigns",
            Self::ViewDonations(_) => "view_donations",
        }
    }
}

/// Which dashboard a principal is entitled to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dashboard {
    /// Campaigns owned by the principal.
    OwnedCampaigns,
    /// Browsing and impact view over active campaigns.
    DonorImpact,
}

pub fn can(principal: Option<&Principal>, action: Action<'_>) -> bool {
    match (action, principal) {
        (Action::CreateCampaign, Some(p)) => p.role.is_campaign_owner(),
        (Action::DeleteCampaign(campaign) | Action::ViewDonations(campaign), Some(p)) => {
            p.role.is_campaign_owner() && p.id == campaign.owner_id
        }
        (Action::Donate(campaign), Some(p)) => p.role == Role::Donor && campaign.is_active,
        (Action::ViewCampaign(_), _) => true,
        (Action::ViewDashboard, Some(_)) => true,
        (Action::ViewOwnCampaigns, Some(p)) => p.role.is_campaign_owner(),
        _ => false,
    }
}

/// Role-specific dashboard, or `None` when the dashboard may not be viewed.
pub fn dashboard_for(principal: Option<&Principal>) -> Option<Dashboard> {
    let principal = principal.filter(|p| can(Some(p), Action::ViewDashboard))?;
    Some(match principal.role {
        Role::Student | Role::Parent => Dashboard::OwnedCampaigns,
        Role::Donor => Dashboard::DonorImpact,
    })
}
