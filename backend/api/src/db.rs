//! Database layer: migrations, principals, bearer tokens and the SQLite
//! campaign repository.

use std::str::FromStr;

use async_trait::async_trait;
use edurelief_core::{Campaign, CampaignRepository, CoreError, Donation, Principal, Role};
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::errors::{storage, Result};

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    // Make sure the file is created if it doesn't exist yet.
    let options = SqliteConnectOptions::from_str(&url)?
        .create_if_missing(true)
        .foreign_keys(true);

    // Every connection to `:memory:` is its own database, so keep exactly one
    // and never recycle it.
    let pool = if url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?
    };

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

// ─────────────────────────────────────────────────────────
// Principals
// ─────────────────────────────────────────────────────────

/// A principal row including its password hash.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
}

impl UserRecord {
    pub fn principal(&self) -> std::result::Result<Principal, CoreError> {
        Ok(Principal {
            id: self.id.clone(),
            email: self.email.clone(),
            role: Role::from_str(&self.role)
                .map_err(|_| CoreError::Storage(format!("bad role for user {}", self.id)))?,
        })
    }
}

/// Insert a new principal. Returns `false` when the email is already taken.
pub async fn insert_user(pool: &SqlitePool, principal: &Principal, password_hash: &str) -> Result<bool> {
    let rows_affected = sqlx::query(
        r#"
        INSERT OR IGNORE INTO users (id, email, password_hash, role)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )
    .bind(&principal.id)
    .bind(&principal.email)
    .bind(password_hash)
    .bind(principal.role.as_str())
    .execute(pool)
    .await?
    .rows_affected();
    Ok(rows_affected == 1)
}

pub async fn find_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<UserRecord>> {
    let row = sqlx::query_as::<_, UserRecord>(
        "SELECT id, email, password_hash, role FROM users WHERE email = ?1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

// ─────────────────────────────────────────────────────────
// Bearer tokens
// ─────────────────────────────────────────────────────────

pub async fn insert_token(pool: &SqlitePool, token: &str, user_id: &str, expires_at: i64) -> Result<()> {
    sqlx::query("INSERT INTO auth_tokens (token, user_id, expires_at) VALUES (?1, ?2, ?3)")
        .bind(token)
        .bind(user_id)
        .bind(expires_at)
        .execute(pool)
        .await?;
    Ok(())
}

/// Resolve an unexpired token to its principal.
pub async fn principal_for_token(pool: &SqlitePool, token: &str, now: i64) -> Result<Option<Principal>> {
    let row = sqlx::query_as::<_, UserRecord>(
        r#"
        SELECT u.id, u.email, u.password_hash, u.role
        FROM   auth_tokens t
        JOIN   users u ON u.id = t.user_id
        WHERE  t.token = ?1 AND t.expires_at > ?2
        "#,
    )
    .bind(token)
    .bind(now)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|r| r.principal()).transpose()?)
}

/// Drop expired tokens. Returns how many were removed.
pub async fn purge_expired_tokens(pool: &SqlitePool, now: i64) -> Result<u64> {
    let removed = sqlx::query("DELETE FROM auth_tokens WHERE expires_at <= ?1")
        .bind(now)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(removed)
}

// ─────────────────────────────────────────────────────────
// Campaigns
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, sqlx::FromRow)]
struct CampaignRow {
    id: String,
    owner_id: String,
    title: String,
    description: String,
    goal_amount: i64,
    current_amount: i64,
    is_verified: bool,
    is_active: bool,
}

impl From<CampaignRow> for Campaign {
    fn from(row: CampaignRow) -> Self {
        Campaign {
            id: row.id,
            owner_id: row.owner_id,
            title: row.title,
            description: row.description,
            goal_amount: row.goal_amount,
            current_amount: row.current_amount,
            is_active: row.is_active,
            is_verified: row.is_verified,
        }
    }
}

const CAMPAIGN_COLUMNS: &str =
    "id, owner_id, title, description, goal_amount, current_amount, is_verified, is_active";

/// Set the externally managed verification flag.
pub async fn set_verified(pool: &SqlitePool, campaign_id: &str, verified: bool) -> Result<bool> {
    let rows_affected = sqlx::query("UPDATE campaigns SET is_verified = ?1 WHERE id = ?2")
        .bind(verified)
        .bind(campaign_id)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(rows_affected == 1)
}

/// Ledger entry as stored.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct DonationRecord {
    pub id: i64,
    pub campaign_id: String,
    pub donor_id: Option<String>,
    pub amount: i64,
    pub created_at: i64,
}

/// Donations recorded against a campaign, oldest first.
pub async fn donations_for(pool: &SqlitePool, campaign_id: &str) -> Result<Vec<DonationRecord>> {
    let rows = sqlx::query_as::<_, DonationRecord>(
        r#"
        SELECT id, campaign_id, donor_id, amount, created_at
        FROM   donations
        WHERE  campaign_id = ?1
        ORDER  BY id ASC
        "#,
    )
    .bind(campaign_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// [`CampaignRepository`] backed by the `campaigns` and `donations` tables.
#[derive(Clone)]
pub struct SqliteCampaigns {
    pool: SqlitePool,
}

impl SqliteCampaigns {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CampaignRepository for SqliteCampaigns {
    async fn insert(&self, campaign: &Campaign) -> edurelief_core::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO campaigns
                (id, owner_id, title, description, goal_amount, current_amount, is_verified, is_active)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&campaign.id)
        .bind(&campaign.owner_id)
        .bind(&campaign.title)
        .bind(&campaign.description)
        .bind(campaign.goal_amount)
        .bind(campaign.current_amount)
        .bind(campaign.is_verified)
        .bind(campaign.is_active)
        .execute(&self.pool)
        .await
        .map_err(storage)?;
        Ok(())
    }

    async fn get(&self, id: &str) -> edurelief_core::Result<Option<Campaign>> {
        let row = sqlx::query_as::<_, CampaignRow>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;
        Ok(row.map(Campaign::from))
    }

    async fn all(&self) -> edurelief_core::Result<Vec<Campaign>> {
        let rows = sqlx::query_as::<_, CampaignRow>(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM campaigns ORDER BY created_at ASC, rowid ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;
        Ok(rows.into_iter().map(Campaign::from).collect())
    }

    async fn remove(&self, id: &str) -> edurelief_core::Result<bool> {
        let rows_affected = sqlx::query("DELETE FROM campaigns WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(storage)?
            .rows_affected();
        Ok(rows_affected == 1)
    }

    async fn save_accrual(&self, campaign: &Campaign, donation: &Donation) -> edurelief_core::Result<()> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        let rows_affected = sqlx::query(
            "UPDATE campaigns SET current_amount = ?1, is_active = ?2 WHERE id = ?3",
        )
        .bind(campaign.current_amount)
        .bind(campaign.is_active)
        .bind(&campaign.id)
        .execute(&mut *tx)
        .await
        .map_err(storage)?
        .rows_affected();
        if rows_affected == 0 {
            return Err(CoreError::NotFound(campaign.id.clone()));
        }

        sqlx::query(
            r#"
            INSERT INTO donations (campaign_id, donor_id, amount, created_at)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(&donation.campaign_id)
        .bind(&donation.donor_id)
        .bind(donation.amount)
        .bind(donation.created_at.timestamp())
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        tx.commit().await.map_err(storage)
    }
}
