// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared database handle.
//!
//! A [`Database`] is handed to every migration hook and backs the ledger
//! store and SQL tenant source. It is cheap to clone (pools are reference
//! counted).

use std::path::Path;
use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{PgPool, SqlitePool};
use tracing::info;

use crate::error::{MigrationError, Result};
use crate::schema;
use crate::store::{MigrationStore, PostgresMigrationStore, SqliteMigrationStore};

/// Database the migrations run against.
#[derive(Debug, Clone)]
pub enum Database {
    /// PostgreSQL connection pool.
    Postgres(PgPool),
    /// SQLite connection pool.
    Sqlite(SqlitePool),
}

impl Database {
    /// Connect using a `postgres://`/`postgresql://` or `sqlite:` URL.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            let pool = PgPoolOptions::new()
                .max_connections(max_connections)
                .connect(url)
                .await
                .map_err(|e| MigrationError::database("connect", e))?;
            Ok(Self::Postgres(pool))
        } else if url.starts_with("sqlite:") {
            let pool = SqlitePoolOptions::new()
                .max_connections(max_connections)
                .connect(url)
                .await
                .map_err(|e| MigrationError::database("connect", e))?;
            Ok(Self::Sqlite(pool))
        } else {
            Err(MigrationError::Database {
                operation: "connect".to_string(),
                details: "unsupported database URL scheme (expected postgres:// or sqlite:)"
                    .to_string(),
            })
        }
    }

    /// Open (creating if needed) a SQLite database file and its parent
    /// directories.
    pub async fn open_sqlite(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                MigrationError::database(
                    "create_dir",
                    format!("Failed to create directory {:?}: {}", parent, e),
                )
            })?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.to_string_lossy());
        Self::connect(&url, 1).await
    }

    /// Name of the backend, for logging.
    pub fn backend(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::Sqlite(_) => "sqlite",
        }
    }

    /// Create the ledger table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        match self {
            Self::Postgres(pool) => schema::run_postgres(pool).await?,
            Self::Sqlite(pool) => schema::run_sqlite(pool).await?,
        }
        info!(backend = self.backend(), "Migration ledger schema ready");
        Ok(())
    }

    /// Ledger store on this database.
    pub fn record_store(&self) -> Arc<dyn MigrationStore> {
        match self {
            Self::Postgres(pool) => Arc::new(PostgresMigrationStore::new(pool.clone())),
            Self::Sqlite(pool) => Arc::new(SqliteMigrationStore::new(pool.clone())),
        }
    }

    /// Check connectivity with a trivial query.
    pub async fn health_check(&self) -> Result<bool> {
        let healthy = match self {
            Self::Postgres(pool) => {
                let row: (i32,) = sqlx::query_as("SELECT 1").fetch_one(pool).await?;
                row.0 == 1
            }
            Self::Sqlite(pool) => {
                let row: (i64,) = sqlx::query_as("SELECT 1").fetch_one(pool).await?;
                row.0 == 1
            }
        };
        Ok(healthy)
    }

    /// Close the underlying pool.
    pub async fn close(&self) {
        match self {
            Self::Postgres(pool) => pool.close().await,
            Self::Sqlite(pool) => pool.close().await,
        }
    }
}
