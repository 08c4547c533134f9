//! SQLite-backed migration ledger.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::Result;

use super::{
    MigrationRecord, MigrationRecordRow, MigrationStatus, MigrationStore, decode_rows,
};

/// SQLite-backed ledger store.
#[derive(Clone)]
pub struct SqliteMigrationStore {
    pool: SqlitePool,
}

impl SqliteMigrationStore {
    /// Create a new SQLite ledger store from an existing pool.
    ///
    /// The ledger table must exist; see [`crate::schema::run_sqlite`].
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn insert_record(&self, version: i64, status: MigrationStatus) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tenant_migration_records (version, status, created_at)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(version)
        .bind(status.as_str())
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl MigrationStore for SqliteMigrationStore {
    async fn retrieve_all_migration_records(&self) -> Result<Vec<MigrationRecord>> {
        let rows = sqlx::query_as::<_, MigrationRecordRow>(
            r#"
            SELECT id, version, status, created_at
            FROM tenant_migration_records
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        decode_rows(rows)
    }

    async fn create_migration_record(&self, version: i64) -> Result<()> {
        self.insert_record(version, MigrationStatus::Completed)
            .await
    }

    async fn create_failed_migration_record(&self, version: i64) -> Result<()> {
        self.insert_record(version, MigrationStatus::Failed).await
    }

    async fn create_skipped_migration_records(&self, versions: &[i64]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now();

        for version in versions {
            sqlx::query(
                r#"
                INSERT INTO tenant_migration_records (version, status, created_at)
                VALUES (?1, 'skipped', ?2)
                "#,
            )
            .bind(version)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
