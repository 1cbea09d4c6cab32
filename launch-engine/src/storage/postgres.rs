//! PostgreSQL identity store
//!
//! Runtime queries (no compile-time checking). Ownership changes go through
//! the PL/pgSQL functions in `migrations/`, one call per operation.

use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::time::Duration;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::core::types::{IdentitySummary, MintIdentity, NewIdentity, SupplyStats};
use crate::core::{IdentityStore, StorageError};

const SUMMARY_COLUMNS: &str = "public_address, queue_position, used, used_at, used_by, \
     assigned_wallet, assignment_note, reserved_at";

#[derive(Clone)]
pub struct PostgresIdentityStore {
    pool: PgPool,
}

impl PostgresIdentityStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&config.postgres_url)
            .await?;

        info!("Connected to PostgreSQL identity store");
        Ok(Self { pool })
    }

    /// Apply embedded migrations
    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::MigrationFailed(e.to_string()))
    }
}

#[async_trait]
impl IdentityStore for PostgresIdentityStore {
    async fn reserve_next(
        &self,
        wallet: Option<&str>,
        reserved_by: &str,
    ) -> Result<Option<MintIdentity>, StorageError> {
        let identity = sqlx::query_as::<_, MintIdentity>("SELECT * FROM reserve_mint_identity($1, $2)")
            .bind(wallet)
            .bind(reserved_by)
            .fetch_optional(&self.pool)
            .await?;
        Ok(identity)
    }

    async fn bind_launch(
        &self,
        address: &str,
        wallet: &str,
        message_hash: &str,
    ) -> Result<bool, StorageError> {
        let bound: bool = sqlx::query_scalar("SELECT bind_mint_identity($1, $2, $3)")
            .bind(address)
            .bind(wallet)
            .bind(message_hash)
            .fetch_one(&self.pool)
            .await?;
        Ok(bound)
    }

    async fn find_unused(&self, address: &str) -> Result<Option<MintIdentity>, StorageError> {
        let identity = sqlx::query_as::<_, MintIdentity>(
            "SELECT * FROM mint_identities WHERE public_address = $1 AND used = FALSE",
        )
        .bind(address)
        .fetch_optional(&self.pool)
        .await?;
        Ok(identity)
    }

    async fn mark_used(&self, address: &str, used_by: &str) -> Result<bool, StorageError> {
        let flipped: bool = sqlx::query_scalar("SELECT commit_mint_identity($1, $2)")
            .bind(address)
            .bind(used_by)
            .fetch_one(&self.pool)
            .await?;
        Ok(flipped)
    }

    async fn release(&self, address: &str) -> Result<bool, StorageError> {
        let released: bool = sqlx::query_scalar("SELECT release_mint_identity($1)")
            .bind(address)
            .fetch_one(&self.pool)
            .await?;
        Ok(released)
    }

    async fn release_expired(&self, max_age: Duration) -> Result<u64, StorageError> {
        let count: i64 = sqlx::query_scalar("SELECT reap_mint_reservations($1)")
            .bind(max_age.as_secs_f64())
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn insert_batch(&self, identities: &[NewIdentity]) -> Result<u64, StorageError> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;

        for identity in identities {
            let result = sqlx::query(
                r#"
                INSERT INTO mint_identities (id, public_address, secret_material)
                VALUES ($1, $2, $3)
                ON CONFLICT (public_address) DO NOTHING
                "#,
            )
            .bind(identity.id)
            .bind(&identity.public_address)
            .bind(&identity.secret_material)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn supply_stats(&self) -> Result<SupplyStats, StorageError> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE used = FALSE AND reserved_at IS NULL) AS available,
                COUNT(*) FILTER (WHERE used = TRUE) AS used,
                COUNT(*) FILTER (WHERE used = FALSE AND reserved_at IS NOT NULL) AS reserved,
                COUNT(*) FILTER (WHERE used = FALSE AND assigned_wallet IS NOT NULL) AS assigned
            FROM mint_identities
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(SupplyStats {
            total: row.try_get("total")?,
            available: row.try_get("available")?,
            used: row.try_get("used")?,
            reserved: row.try_get("reserved")?,
            assigned: row.try_get("assigned")?,
        })
    }

    async fn assign(
        &self,
        address: &str,
        wallet: &str,
        note: Option<&str>,
    ) -> Result<bool, StorageError> {
        let assigned: bool = sqlx::query_scalar("SELECT assign_mint_identity($1, $2, $3)")
            .bind(address)
            .bind(wallet)
            .bind(note)
            .fetch_one(&self.pool)
            .await?;
        Ok(assigned)
    }

    async fn unassign(&self, address: &str) -> Result<bool, StorageError> {
        let unassigned: bool = sqlx::query_scalar("SELECT unassign_mint_identity($1)")
            .bind(address)
            .fetch_one(&self.pool)
            .await?;
        Ok(unassigned)
    }

    async fn queue(&self, limit: i64, offset: i64) -> Result<Vec<IdentitySummary>, StorageError> {
        let query = format!(
            "SELECT {} FROM mint_identities WHERE used = FALSE \
             ORDER BY queue_position LIMIT $1 OFFSET $2",
            SUMMARY_COLUMNS
        );
        let rows = sqlx::query_as::<_, IdentitySummary>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn assigned_to(&self, wallet: &str) -> Result<Vec<IdentitySummary>, StorageError> {
        let query = format!(
            "SELECT {} FROM mint_identities WHERE used = FALSE AND assigned_wallet = $1 \
             ORDER BY queue_position",
            SUMMARY_COLUMNS
        );
        let rows = sqlx::query_as::<_, IdentitySummary>(&query)
            .bind(wallet)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }
}
