//! SQLite-backed credential store using sqlx.

use {
    async_trait::async_trait,
    chrono::{DateTime, Utc},
    sqlx::{
        Row, SqlitePool,
        sqlite::{SqlitePoolOptions, SqliteRow},
    },
};

use crate::{
    error::{StoreError, StoreResult},
    store::CredentialStore,
    types::{CredentialRecord, RecordStatus},
};

/// Credential rows in the `marketplace_credentials` table.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Create a new store with its own connection pool and run migrations.
    pub async fn new(database_url: &str) -> StoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        crate::run_migrations(&pool).await?;

        Ok(Self { pool })
    }

    /// Create a store using an existing pool (migrations must already be run).
    ///
    /// Call [`crate::run_migrations`] before using this constructor.
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a record or overwrite every column of an existing one.
    pub async fn upsert(&self, record: &CredentialRecord) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO marketplace_credentials (id, marketplace, status, access_token, refresh_token, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                marketplace = excluded.marketplace,
                status = excluded.status,
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                updated_at = excluded.updated_at",
        )
        .bind(&record.id)
        .bind(&record.marketplace)
        .bind(record.status.as_str())
        .bind(&record.access_token)
        .bind(&record.refresh_token)
        .bind(record.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn get(&self, id: &str) -> StoreResult<Option<CredentialRecord>> {
        let row = sqlx::query(
            "SELECT id, marketplace, status, access_token, refresh_token, updated_at
             FROM marketplace_credentials
             WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(record_from_row).transpose()
    }
}

fn record_from_row(row: &SqliteRow) -> StoreResult<CredentialRecord> {
    let id: String = row.get("id");
    let status: String = row.get("status");
    let status = RecordStatus::parse(&status)
        .ok_or_else(|| StoreError::message(format!("record {id}: unknown status {status:?}")))?;
    let updated_at: String = row.get("updated_at");
    let updated_at = DateTime::parse_from_rfc3339(&updated_at)
        .map_err(|e| StoreError::message(format!("record {id}: bad updated_at: {e}")))?
        .with_timezone(&Utc);

    Ok(CredentialRecord {
        marketplace: row.get("marketplace"),
        status,
        access_token: row.get("access_token"),
        refresh_token: row.get("refresh_token"),
        updated_at,
        id,
    })
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn find_active_records_with_secrets(&self) -> StoreResult<Vec<CredentialRecord>> {
        let rows = sqlx::query(
            "SELECT id, marketplace, status, access_token, refresh_token, updated_at
             FROM marketplace_credentials
             WHERE status = 'active'
               AND (COALESCE(access_token, '') <> '' OR COALESCE(refresh_token, '') <> '')
             ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn save_record(
        &self,
        scanned: &CredentialRecord,
        record: &CredentialRecord,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE marketplace_credentials
             SET access_token = ?, refresh_token = ?, updated_at = ?
             WHERE id = ? AND access_token IS ? AND refresh_token IS ?",
        )
        .bind(&record.access_token)
        .bind(&record.refresh_token)
        .bind(record.updated_at.to_rfc3339())
        .bind(&record.id)
        .bind(&scanned.access_token)
        .bind(&scanned.refresh_token)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            let exists = sqlx::query("SELECT 1 FROM marketplace_credentials WHERE id = ?")
                .bind(&record.id)
                .fetch_optional(&self.pool)
                .await?
                .is_some();
            return Err(if exists {
                StoreError::concurrent_modification(&record.id)
            } else {
                StoreError::record_not_found(&record.id)
            });
        }
        Ok(())
    }
}
