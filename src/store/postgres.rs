//! PostgreSQL listing store adapter.
//!
//! Amounts are persisted as decimal TEXT and addresses as 0x-hex TEXT, so a
//! row survives untouched by any numeric type coercion.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ethers::types::{Address, U256};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use tracing::info;
use uuid::Uuid;

use crate::domain::{Listing, ListingStatus};
use crate::error::{RentchainError, Result};
use crate::store::traits::ListingStore;

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Create a new PostgreSQL store
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("Connected to PostgreSQL");
        Ok(Self { pool })
    }

    /// Create a store from an existing connection pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn addr_to_text(address: Address) -> String {
    format!("0x{}", hex::encode(address.as_bytes()))
}

fn text_to_addr(raw: &str, column: &str) -> Result<Address> {
    raw.parse::<Address>()
        .map_err(|e| RentchainError::Internal(format!("corrupt {} '{}': {}", column, raw, e)))
}

fn text_to_u256(raw: &str, column: &str) -> Result<U256> {
    U256::from_dec_str(raw)
        .map_err(|e| RentchainError::Internal(format!("corrupt {} '{}': {}", column, raw, e)))
}

fn listing_from_row(row: &PgRow) -> Result<Listing> {
    let status_raw: String = row.try_get("status")?;
    let status = status_raw
        .parse::<ListingStatus>()
        .map_err(|e| RentchainError::Internal(format!("corrupt status '{}': {}", status_raw, e)))?;

    let contract_address = row
        .try_get::<Option<String>, _>("contract_address")?
        .map(|raw| text_to_addr(&raw, "contract_address"))
        .transpose()?;

    let duration: i64 = row.try_get("duration_days")?;

    Ok(Listing {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        owner: text_to_addr(&row.try_get::<String, _>("owner")?, "owner")?,
        renter: text_to_addr(&row.try_get::<String, _>("renter")?, "renter")?,
        content_hash: row.try_get("content_hash")?,
        rent_amount: text_to_u256(&row.try_get::<String, _>("rent_amount")?, "rent_amount")?,
        deposit_amount: text_to_u256(
            &row.try_get::<String, _>("deposit_amount")?,
            "deposit_amount",
        )?,
        duration_days: duration as u64,
        contract_address,
        status,
        image_url: row.try_get("image_url")?,
        needs_reconciliation: row.try_get("needs_reconciliation")?,
        last_reconciled_at: row.try_get::<Option<DateTime<Utc>>, _>("last_reconciled_at")?,
        last_known_chain_active: row.try_get("last_known_chain_active")?,
        last_known_chain_terminated: row.try_get("last_known_chain_terminated")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[async_trait]
impl ListingStore for PostgresStore {
    async fn insert(&self, listing: Listing) -> Result<Listing> {
        sqlx::query(
            r#"
            INSERT INTO listings (
                id, title, description, owner, renter, content_hash,
                rent_amount, deposit_amount, duration_days, contract_address,
                status, image_url, needs_reconciliation, last_reconciled_at,
                last_known_chain_active, last_known_chain_terminated,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                      $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(listing.id)
        .bind(&listing.title)
        .bind(&listing.description)
        .bind(addr_to_text(listing.owner))
        .bind(addr_to_text(listing.renter))
        .bind(&listing.content_hash)
        .bind(listing.rent_amount.to_string())
        .bind(listing.deposit_amount.to_string())
        .bind(listing.duration_days as i64)
        .bind(listing.contract_address.map(addr_to_text))
        .bind(listing.status.as_str())
        .bind(&listing.image_url)
        .bind(listing.needs_reconciliation)
        .bind(listing.last_reconciled_at)
        .bind(listing.last_known_chain_active)
        .bind(listing.last_known_chain_terminated)
        .bind(listing.created_at)
        .bind(listing.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(listing)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Listing>> {
        let row = sqlx::query("SELECT * FROM listings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(listing_from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<Listing>> {
        let rows = sqlx::query("SELECT * FROM listings ORDER BY created_at")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(listing_from_row).collect()
    }

    async fn list_by_owner(&self, owner: Address) -> Result<Vec<Listing>> {
        let rows = sqlx::query("SELECT * FROM listings WHERE owner = $1 ORDER BY created_at")
            .bind(addr_to_text(owner))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(listing_from_row).collect()
    }

    async fn list_reconcilable(&self) -> Result<Vec<Listing>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM listings
            WHERE status != 'terminated' AND contract_address IS NOT NULL
            ORDER BY needs_reconciliation DESC, last_reconciled_at ASC NULLS FIRST
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(listing_from_row).collect()
    }

    async fn update_status(&self, id: Uuid, status: ListingStatus) -> Result<Listing> {
        // Writers hold the per-listing in-flight marker, so read-then-write
        // is race-free here.
        let current = self
            .get(id)
            .await?
            .ok_or_else(|| RentchainError::NotFound(format!("listing {}", id)))?;
        if current.status.is_terminal() && status != current.status {
            return Err(RentchainError::InvalidStateTransition {
                from: current.status.to_string(),
                to: status.to_string(),
            });
        }

        let row = sqlx::query(
            "UPDATE listings SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status.as_str())
        .fetch_one(&self.pool)
        .await?;

        listing_from_row(&row)
    }

    async fn set_needs_reconciliation(&self, id: Uuid, needs: bool) -> Result<()> {
        let result = sqlx::query(
            "UPDATE listings SET needs_reconciliation = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(needs)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RentchainError::NotFound(format!("listing {}", id)));
        }
        Ok(())
    }

    async fn record_reconciliation(
        &self,
        id: Uuid,
        active: bool,
        terminated: bool,
    ) -> Result<Listing> {
        let row = sqlx::query(
            r#"
            UPDATE listings SET
                last_known_chain_active = $2,
                last_known_chain_terminated = $3,
                last_reconciled_at = NOW(),
                needs_reconciliation = FALSE,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(active)
        .bind(terminated)
        .fetch_one(&self.pool)
        .await?;

        listing_from_row(&row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_text_round_trips() {
        let address = Address::repeat_byte(0xab);
        let text = addr_to_text(address);
        assert!(text.starts_with("0x"));
        assert_eq!(text.len(), 42);
        assert_eq!(text_to_addr(&text, "owner").unwrap(), address);
    }

    #[test]
    fn amount_text_round_trips() {
        let amount = U256::from_dec_str("1500000000000000000").unwrap();
        assert_eq!(
            text_to_u256(&amount.to_string(), "rent_amount").unwrap(),
            amount
        );
        assert!(text_to_u256("1.5", "rent_amount").is_err());
    }
}
