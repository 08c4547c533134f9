// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! End-to-end runs against a SQLite file: real ledger, real tenant table,
//! migrations that write per-tenant rows.

mod common;

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use sqlx::SqlitePool;
use tenant_migrate_core::{
    Database, HookResult, Migration, MigrationCatalog, MigrationManager, MigrationStatus,
    SqlTenantSource, TenantId,
};

fn pool(db: &Database) -> anyhow::Result<&SqlitePool> {
    match db {
        Database::Sqlite(pool) => Ok(pool),
        Database::Postgres(_) => anyhow::bail!("expected a SQLite database"),
    }
}

/// Version 1: gives every tenant a welcome note.
struct WelcomeNote;

#[async_trait]
impl Migration for WelcomeNote {
    fn version(&self) -> i64 {
        1
    }

    fn name(&self) -> &str {
        "welcome_note"
    }

    async fn up(&self, db: &Database, tenant: &TenantId) -> HookResult {
        sqlx::query("INSERT INTO notes (tenant_id, body) VALUES (?1, 'welcome')")
            .bind(tenant.as_str())
            .execute(pool(db)?)
            .await?;
        Ok(())
    }

    fn has_test(&self) -> bool {
        true
    }

    async fn test(&self, db: &Database, tenant: &TenantId) -> HookResult {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notes WHERE tenant_id = ?1")
            .bind(tenant.as_str())
            .fetch_one(pool(db)?)
            .await?;
        anyhow::ensure!(count == 1, "expected one note for {}, found {}", tenant, count);
        Ok(())
    }
}

/// Version 2: uppercases notes, but chokes on a tenant named `broken`.
struct ShoutNotes;

#[async_trait]
impl Migration for ShoutNotes {
    fn version(&self) -> i64 {
        2
    }

    fn name(&self) -> &str {
        "shout_notes"
    }

    async fn up(&self, db: &Database, tenant: &TenantId) -> HookResult {
        sqlx::query("UPDATE notes SET body = UPPER(body) WHERE tenant_id = ?1")
            .bind(tenant.as_str())
            .execute(pool(db)?)
            .await?;
        if tenant.as_str() == "broken" {
            anyhow::bail!("tenant {} cannot be shouted at", tenant);
        }
        Ok(())
    }

    fn has_down(&self) -> bool {
        true
    }

    async fn down(&self, db: &Database, tenant: &TenantId) -> HookResult {
        sqlx::query("UPDATE notes SET body = LOWER(body) WHERE tenant_id = ?1")
            .bind(tenant.as_str())
            .execute(pool(db)?)
            .await
            .context("restoring notes")?;
        Ok(())
    }
}

async fn setup(tenants: &[&str]) -> (tempfile::TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_sqlite(dir.path().join("app.db"))
        .await
        .expect("open database");
    db.ensure_schema().await.unwrap();

    let pool = pool(&db).unwrap();
    sqlx::query("CREATE TABLE tenants (tenant_id TEXT PRIMARY KEY)")
        .execute(pool)
        .await
        .unwrap();
    sqlx::query("CREATE TABLE notes (tenant_id TEXT NOT NULL, body TEXT NOT NULL)")
        .execute(pool)
        .await
        .unwrap();
    for tenant in tenants {
        sqlx::query("INSERT INTO tenants (tenant_id) VALUES (?1)")
            .bind(*tenant)
            .execute(pool)
            .await
            .unwrap();
    }

    (dir, db)
}

fn manager(db: &Database) -> MigrationManager {
    let catalog = MigrationCatalog::from_migrations([
        Box::new(ShoutNotes) as Box<dyn Migration>,
        Box::new(WelcomeNote),
    ])
    .unwrap();
    let tenants = SqlTenantSource::new(db.clone(), "tenants", "tenant_id", 1).unwrap();
    MigrationManager::new(Arc::new(catalog), db.clone(), db.record_store(), Arc::new(tenants))
}

async fn notes(db: &Database) -> Vec<(String, String)> {
    sqlx::query_as("SELECT tenant_id, body FROM notes ORDER BY tenant_id")
        .fetch_all(pool(db).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_full_run_against_sqlite() {
    let (_dir, db) = setup(&["beta", "alpha"]).await;

    let report = manager(&db).execute_pending_migrations().await.unwrap();

    assert_eq!(report.applied_versions(), vec![1, 2]);
    assert_eq!(
        notes(&db).await,
        vec![
            ("alpha".to_string(), "WELCOME".to_string()),
            ("beta".to_string(), "WELCOME".to_string()),
        ]
    );

    let statuses: Vec<_> = db
        .record_store()
        .retrieve_all_migration_records()
        .await
        .unwrap()
        .into_iter()
        .map(|r| (r.version, r.status))
        .collect();
    assert_eq!(
        statuses,
        vec![(1, MigrationStatus::Completed), (2, MigrationStatus::Completed)]
    );

    // A second process finds nothing to do
    let again = manager(&db).execute_pending_migrations().await.unwrap();
    assert!(again.applied.is_empty());
}

#[tokio::test]
async fn test_failure_is_persisted_and_blocks_next_run() {
    let (_dir, db) = setup(&["alpha", "broken", "gamma"]).await;

    let err = manager(&db).execute_pending_migrations().await.unwrap_err();
    assert_eq!(err.error_code(), "HOOK_FAILED");

    // alpha stays migrated, broken was rolled back, gamma never ran
    assert_eq!(
        notes(&db).await,
        vec![
            ("alpha".to_string(), "WELCOME".to_string()),
            ("broken".to_string(), "welcome".to_string()),
            ("gamma".to_string(), "welcome".to_string()),
        ]
    );

    let status = manager(&db).status().await.unwrap();
    assert_eq!(status.failed().map(|m| m.version), Some(2));

    let err = manager(&db).execute_pending_migrations().await.unwrap_err();
    assert_eq!(err.error_code(), "FAILED_MIGRATION_DETECTED");
}

#[tokio::test]
async fn test_skip_on_fresh_install() {
    let (_dir, db) = setup(&["alpha"]).await;

    let report = manager(&db).skip_pending_migrations().await.unwrap();

    assert_eq!(report.skipped, 2);
    assert!(notes(&db).await.is_empty());

    let status = manager(&db).status().await.unwrap();
    assert_eq!(status.pending_count(), 0);
    assert!(
        status
            .migrations
            .iter()
            .all(|m| m.status == Some(MigrationStatus::Skipped))
    );
}
