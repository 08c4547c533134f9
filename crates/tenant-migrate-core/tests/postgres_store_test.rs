// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL ledger and tenant source tests.
//!
//! Run with `TEST_DATABASE_URL=postgres://...`; skipped otherwise. Each test
//! works in its own schema so runs do not interfere.

mod common;

use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tenant_migrate_core::{
    Database, MigrationStatus, MigrationStore, PostgresMigrationStore, SqlTenantSource,
    TenantSource, schema,
};

/// Pool pinned to a fresh schema, with the ledger table created.
async fn isolated_pool(label: &str) -> Option<PgPool> {
    let database_url = std::env::var("TEST_DATABASE_URL").ok()?;
    let schema_name = format!(
        "tm_test_{}_{}",
        label,
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    );

    let admin = PgPool::connect(&database_url).await.ok()?;
    admin
        .execute(format!("CREATE SCHEMA {}", schema_name).as_str())
        .await
        .ok()?;
    admin.close().await;

    let search_path = format!("SET search_path TO {}", schema_name);
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .after_connect(move |conn, _meta| {
            let search_path = search_path.clone();
            Box::pin(async move {
                conn.execute(search_path.as_str()).await?;
                Ok(())
            })
        })
        .connect(&database_url)
        .await
        .ok()?;

    schema::run_postgres(&pool).await.ok()?;
    Some(pool)
}

#[tokio::test]
async fn test_postgres_ledger_round_trip() {
    skip_if_no_db!();

    let Some(pool) = isolated_pool("ledger").await else {
        eprintln!("Skipping test: failed to prepare database");
        return;
    };
    let store = PostgresMigrationStore::new(pool);

    assert!(store.retrieve_all_migration_records().await.unwrap().is_empty());

    store.create_skipped_migration_records(&[1, 2]).await.unwrap();
    store.create_migration_record(3).await.unwrap();
    store.create_failed_migration_record(4).await.unwrap();

    let records = store.retrieve_all_migration_records().await.unwrap();
    let summary: Vec<_> = records.iter().map(|r| (r.version, r.status)).collect();
    assert_eq!(
        summary,
        vec![
            (1, MigrationStatus::Skipped),
            (2, MigrationStatus::Skipped),
            (3, MigrationStatus::Completed),
            (4, MigrationStatus::Failed),
        ]
    );
    assert!(records.windows(2).all(|w| w[0].id < w[1].id));
}

#[tokio::test]
async fn test_postgres_empty_skip_batch_is_noop() {
    skip_if_no_db!();

    let Some(pool) = isolated_pool("empty_skip").await else {
        eprintln!("Skipping test: failed to prepare database");
        return;
    };
    let store = PostgresMigrationStore::new(pool);

    store.create_skipped_migration_records(&[]).await.unwrap();

    assert!(store.retrieve_all_migration_records().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_postgres_status_check_constraint() {
    skip_if_no_db!();

    let Some(pool) = isolated_pool("check").await else {
        eprintln!("Skipping test: failed to prepare database");
        return;
    };

    let result = sqlx::query(
        "INSERT INTO tenant_migration_records (version, status) VALUES (1, 'bogus')",
    )
    .execute(&pool)
    .await;

    assert!(result.is_err(), "unknown status must be rejected");
}

#[tokio::test]
async fn test_postgres_tenant_source_pages_integer_ids() {
    skip_if_no_db!();

    let Some(pool) = isolated_pool("tenants").await else {
        eprintln!("Skipping test: failed to prepare database");
        return;
    };
    sqlx::query("CREATE TABLE accounts (account_id BIGINT PRIMARY KEY)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO accounts (account_id) SELECT generate_series(1, 5)")
        .execute(&pool)
        .await
        .unwrap();

    let source = SqlTenantSource::new(Database::Postgres(pool), "accounts", "account_id", 2)
        .expect("valid source");
    let mut cursor = source.open().await.unwrap();
    let mut tenants = Vec::new();
    while let Some(tenant) = cursor.next_tenant().await.unwrap() {
        tenants.push(tenant.to_string());
    }

    // Text order, as documented for SqlTenantSource
    assert_eq!(tenants, vec!["1", "2", "3", "4", "5"]);
}
