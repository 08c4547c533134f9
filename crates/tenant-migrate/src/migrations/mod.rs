// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Application migration units.
//!
//! Every file here named `<version>_<name>.rs` registers one unit with
//! `register_migration!`. Adding a migration means adding a file and a
//! `mod` line below; the catalog picks it up at startup.

use anyhow::Result;
use tenant_migrate_core::{Database, TenantId};

#[path = "0001_create_tenant_settings.rs"]
mod create_tenant_settings;
#[path = "0002_seed_feature_flags.rs"]
mod seed_feature_flags;
#[path = "0003_rename_locale_setting.rs"]
mod rename_locale_setting;

/// Rewrite `$n` placeholders for SQLite.
fn for_backend(db: &Database, sql: &str) -> String {
    match db {
        Database::Postgres(_) => sql.to_string(),
        Database::Sqlite(_) => sql.replace('$', "?"),
    }
}

/// Run a statement without parameters.
pub(crate) async fn execute(db: &Database, sql: &str) -> Result<()> {
    match db {
        Database::Postgres(pool) => {
            sqlx::query(sql).execute(pool).await?;
        }
        Database::Sqlite(pool) => {
            sqlx::query(sql).execute(pool).await?;
        }
    }
    Ok(())
}

/// Run a statement whose only parameter (`$1`) is the tenant id.
pub(crate) async fn execute_for_tenant(db: &Database, sql: &str, tenant: &TenantId) -> Result<u64> {
    let sql = for_backend(db, sql);
    let affected = match db {
        Database::Postgres(pool) => sqlx::query(&sql)
            .bind(tenant.as_str())
            .execute(pool)
            .await?
            .rows_affected(),
        Database::Sqlite(pool) => sqlx::query(&sql)
            .bind(tenant.as_str())
            .execute(pool)
            .await?
            .rows_affected(),
    };
    Ok(affected)
}

/// Fetch a single count whose only parameter (`$1`) is the tenant id.
pub(crate) async fn count_for_tenant(db: &Database, sql: &str, tenant: &TenantId) -> Result<i64> {
    let sql = for_backend(db, sql);
    let count: i64 = match db {
        Database::Postgres(pool) => {
            sqlx::query_scalar(&sql)
                .bind(tenant.as_str())
                .fetch_one(pool)
                .await?
        }
        Database::Sqlite(pool) => {
            sqlx::query_scalar(&sql)
                .bind(tenant.as_str())
                .fetch_one(pool)
                .await?
        }
    };
    Ok(count)
}
