// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embedded schema for the migration ledger.
//!
//! The ledger table (`tenant_migration_records`) is created by sqlx's own
//! migrator before any tenant migration runs. Products embedding
//! tenant-migrate-core can call these functions directly.
//!
//! # Example
//!
//! ```ignore
//! use sqlx::PgPool;
//! use tenant_migrate_core::schema;
//!
//! let pool = PgPool::connect(&database_url).await?;
//! schema::run_postgres(&pool).await?;
//! ```

use sqlx::migrate::MigrateError;

/// PostgreSQL migrator for the ledger table.
pub static POSTGRES: sqlx::migrate::Migrator = sqlx::migrate!("./schema/postgresql");

/// SQLite migrator for the ledger table.
pub static SQLITE: sqlx::migrate::Migrator = sqlx::migrate!("./schema/sqlite");

/// Create or upgrade the ledger table on PostgreSQL.
///
/// Safe to call multiple times; already-applied steps are skipped.
pub async fn run_postgres(pool: &sqlx::PgPool) -> Result<(), MigrateError> {
    POSTGRES.run(pool).await
}

/// Create or upgrade the ledger table on SQLite.
///
/// Safe to call multiple times; already-applied steps are skipped.
pub async fn run_sqlite(pool: &sqlx::SqlitePool) -> Result<(), MigrateError> {
    SQLITE.run(pool).await
}
