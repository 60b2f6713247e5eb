//! # EduRelief Core
//!
//! Campaign funding and access control for students, parents and donors.
//!
//! | Component            | Module          | Entry point(s)                                   |
//! |----------------------|-----------------|--------------------------------------------------|
//! | Session Manager      | [`session`]     | [`SessionManager`]                               |
//! | Authorization Policy | [`policy`]      | [`can`], [`dashboard_for`]                       |
//! | Lifecycle Engine     | [`lifecycle`]   | [`CampaignEngine`], [`accrue`], [`progress_percent`] |
//! | Campaign Directory   | [`directory`]   | [`CampaignDirectory`], [`CampaignRepository`]    |
//! | API client           | [`client`]      | [`CampaignClient`]                               |
//!
//! ## Architecture
//!
//! There is no ambient "current user". The policy, the engine and the client
//! take the acting principal (or session) as an argument, so each can be
//! exercised without a live session. The session manager is the only owner of
//! session state and hands out snapshots.

pub mod client;
pub mod config;
pub mod directory;
pub mod errors;
pub mod lifecycle;
pub mod policy;
pub mod session;
pub mod types;

#[cfg(test)]
mod invariants;
#[cfg(test)]
mod test_client;
#[cfg(test)]
mod test_lifecycle;

pub use client::CampaignClient;
pub use config::{ClientConfig, IdentityStrategy};
pub use directory::{CampaignDirectory, CampaignFilter, CampaignRepository, MemoryCampaigns};
pub use errors::{CoreError, Result};
pub use lifecycle::{accrue, progress_percent, CampaignEngine};
pub use policy::{can, dashboard_for, Action, Dashboard};
pub use session::SessionManager;
pub use types::{Campaign, CampaignStatus, Donation, NewCampaign, Principal, Role, Session};
