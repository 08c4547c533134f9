// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL-backed migration ledger.

use sqlx::PgPool;

use crate::error::Result;

use super::{
    MigrationRecord, MigrationRecordRow, MigrationStatus, MigrationStore, decode_rows,
};

/// PostgreSQL-backed ledger store.
#[derive(Clone)]
pub struct PostgresMigrationStore {
    pool: PgPool,
}

impl PostgresMigrationStore {
    /// Create a new Postgres-backed ledger store.
    ///
    /// The ledger table must exist; see [`crate::schema::run_postgres`].
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_record(&self, version: i64, status: MigrationStatus) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tenant_migration_records (version, status, created_at)
            VALUES ($1, $2, NOW())
            "#,
        )
        .bind(version)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait::async_trait]
impl MigrationStore for PostgresMigrationStore {
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
        if versions.is_empty() {
            return Ok(());
        }

        // Single statement, so the batch lands atomically and in array order
        sqlx::query(
            r#"
            INSERT INTO tenant_migration_records (version, status, created_at)
            SELECT v.version, 'skipped', NOW()
            FROM unnest($1::bigint[]) WITH ORDINALITY AS v(version, ord)
            ORDER BY v.ord
            "#,
        )
        .bind(versions)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
