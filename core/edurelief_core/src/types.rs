//! # Types
//!
//! Shared data structures used across all modules of the EduRelief core.
//!
//! ## Design decisions
//!
//! ### Status as a Finite-State Machine
//!
//! [`CampaignStatus`] is derived from the `is_active` flag and enforces a
//! forward-only lifecycle:
//!
//! ```text
//! Active ──donation (current < goal)──► Active
//! Active ──donation (current >= goal)─► Funded
//! ```
//!
//! `Funded` is terminal for accrual. Transitions are applied only by
//! [`crate::lifecycle::accrue`].
//!
//! ### Plain string identifiers
//!
//! Principals and campaigns are identified by UUID v4 strings, matching the
//! wire format of the campaign API.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

pub type PrincipalId = String;
pub type CampaignId = String;

/// Role of a registered principal. Immutable after registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// Fund seeker; owns campaigns.
    Student,
    /// Funder; donates to active campaigns.
    Donor,
    /// Parent of a student; owns campaigns on their behalf.
    Parent,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "STUDENT",
            Self::Donor => "DONOR",
            Self::Parent => "PARENT",
        }
    }

    /// Roles allowed to own campaigns.
    pub fn is_campaign_owner(&self) -> bool {
        matches!(self, Self::Student | Self::Parent)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STUDENT" => Ok(Self::Student),
            "DONOR" => Ok(Self::Donor),
            "PARENT" => Ok(Self::Parent),
            other => Err(CoreError::Validation(format!("unknown role: {other}"))),
        }
    }
}

/// A registered identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub email: String,
    pub role: Role,
}

/// Runtime binding between a [`Principal`] and proof of authentication.
///
/// A session always carries both the token and the principal; there is no
/// representation of one without the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub principal: Principal,
    /// Absent for self-issued tokens.
    pub expires_at: Option<DateTime<Utc>>,
    /// Only issued by third-party providers that support silent refresh.
    pub refresh_token: Option<String>,
}

impl Session {
    pub fn new(token: impl Into<String>, principal: Principal) -> Self {
        Self {
            token: token.into(),
            principal,
            expires_at: None,
            refresh_token: None,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

/// Accrual state of a campaign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CampaignStatus {
    /// Accepting donations.
    Active,
    /// Goal reached; no further donations accepted.
    Funded,
}

/// A funding request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub owner_id: PrincipalId,
    pub title: String,
    pub description: String,
    /// Fixed at creation; always positive.
    pub goal_amount: i64,
    /// Monotonically non-decreasing; starts at 0.
    pub current_amount: i64,
    /// `current_amount < goal_amount`, kept in step by the lifecycle engine.
    pub is_active: bool,
    /// Set by an external verifier, never by the lifecycle engine.
    pub is_verified: bool,
}

impl Campaign {
    pub fn status(&self) -> CampaignStatus {
        if self.is_active {
            CampaignStatus::Active
        } else {
            CampaignStatus::Funded
        }
    }

    pub fn progress_percent(&self) -> u8 {
        crate::lifecycle::progress_percent(self)
    }
}

/// Input for [`crate::lifecycle::CampaignEngine::create_campaign`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCampaign {
    pub title: String,
    pub description: String,
    pub goal_amount: i64,
}

/// A single accepted accrual event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donation {
    pub campaign_id: CampaignId,
    pub amount: i64,
    /// Present only when the donor was an authenticated DONOR.
    pub donor_id: Option<PrincipalId>,
    pub created_at: DateTime<Utc>,
}
