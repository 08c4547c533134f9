// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for tenant-migrate-core integration tests.
//!
//! Provides recording migrations that log every hook call, scripted
//! failures, and a [`Harness`] wiring them to an in-memory ledger.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use tenant_migrate_core::{
    Database, HookResult, InMemoryMigrationStore, Migration, MigrationCatalog, MigrationError,
    MigrationManager, MigrationStatus, StaticTenantSource, TenantCursor, TenantId, TenantSource,
};

/// One hook invocation: (version, hook, tenant).
pub type Call = (i64, &'static str, String);

/// Hook calls shared by every migration of a test.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, version: i64, hook: &'static str, tenant: &TenantId) {
        self.0
            .lock()
            .unwrap()
            .push((version, hook, tenant.to_string()));
    }

    /// Every call so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    /// Calls to one hook, in order.
    pub fn calls_to(&self, hook: &str) -> Vec<(i64, String)> {
        self.calls()
            .into_iter()
            .filter(|(_, h, _)| *h == hook)
            .map(|(version, _, tenant)| (version, tenant))
            .collect()
    }

    /// Calls made for one migration version.
    pub fn calls_for(&self, version: i64) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|(v, _, _)| *v == version)
            .collect()
    }
}

/// Migration that records its hook calls and fails where told to.
pub struct RecordingMigration {
    version: i64,
    name: String,
    log: CallLog,
    test: bool,
    down: bool,
    fail_up_for: Option<String>,
    fail_test_for: Option<String>,
    fail_down: bool,
}

impl RecordingMigration {
    pub fn new(version: i64, log: &CallLog) -> Self {
        Self {
            version,
            name: format!("migration_{}", version),
            log: log.clone(),
            test: false,
            down: false,
            fail_up_for: None,
            fail_test_for: None,
            fail_down: false,
        }
    }

    pub fn with_test(mut self) -> Self {
        self.test = true;
        self
    }

    pub fn with_down(mut self) -> Self {
        self.down = true;
        self
    }

    pub fn failing_up_for(mut self, tenant: &str) -> Self {
        self.fail_up_for = Some(tenant.to_string());
        self
    }

    pub fn failing_test_for(mut self, tenant: &str) -> Self {
        self.fail_test_for = Some(tenant.to_string());
        self.test = true;
        self
    }

    pub fn failing_down(mut self) -> Self {
        self.fail_down = true;
        self.down = true;
        self
    }
}

#[async_trait]
impl Migration for RecordingMigration {
    fn version(&self) -> i64 {
        self.version
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn up(&self, _db: &Database, tenant: &TenantId) -> HookResult {
        self.log.push(self.version, "up", tenant);
        if self.fail_up_for.as_deref() == Some(tenant.as_str()) {
            anyhow::bail!("up failed for {}", tenant);
        }
        Ok(())
    }

    fn has_test(&self) -> bool {
        self.test
    }

    async fn test(&self, _db: &Database, tenant: &TenantId) -> HookResult {
        self.log.push(self.version, "test", tenant);
        if self.fail_test_for.as_deref() == Some(tenant.as_str()) {
            anyhow::bail!("verification failed for {}", tenant);
        }
        Ok(())
    }

    fn has_down(&self) -> bool {
        self.down
    }

    async fn down(&self, _db: &Database, tenant: &TenantId) -> HookResult {
        self.log.push(self.version, "down", tenant);
        if self.fail_down {
            anyhow::bail!("rollback failed for {}", tenant);
        }
        Ok(())
    }
}

/// Build a catalog from recording migrations.
pub fn catalog(migrations: Vec<RecordingMigration>) -> Arc<MigrationCatalog> {
    let units = migrations
        .into_iter()
        .map(|m| Box::new(m) as Box<dyn Migration>);
    Arc::new(MigrationCatalog::from_migrations(units).expect("valid catalog"))
}

/// A throwaway database handle for hooks that never touch it.
pub async fn scratch_db() -> Database {
    Database::connect("sqlite::memory:", 1)
        .await
        .expect("Failed to create in-memory SQLite database")
}

/// In-memory ledger, static tenants and a shared call log.
pub struct Harness {
    pub log: CallLog,
    pub store: Arc<InMemoryMigrationStore>,
    pub tenants: Arc<StaticTenantSource>,
    pub db: Database,
}

impl Harness {
    pub async fn new(tenants: &[&str]) -> Self {
        Self::with_records(tenants, std::iter::empty()).await
    }

    pub async fn with_records(
        tenants: &[&str],
        records: impl IntoIterator<Item = (i64, MigrationStatus)>,
    ) -> Self {
        Self {
            log: CallLog::new(),
            store: Arc::new(InMemoryMigrationStore::with_records(records)),
            tenants: Arc::new(StaticTenantSource::new(tenants.iter().copied())),
            db: scratch_db().await,
        }
    }

    pub fn manager(&self, migrations: Vec<RecordingMigration>) -> MigrationManager {
        MigrationManager::new(
            catalog(migrations),
            self.db.clone(),
            self.store.clone(),
            self.tenants.clone(),
        )
    }

    pub async fn ledger(&self) -> Vec<(i64, MigrationStatus)> {
        self.store
            .records()
            .await
            .into_iter()
            .map(|r| (r.version, r.status))
            .collect()
    }
}

/// Tenant source whose cursor fails after yielding `fail_after` tenants.
pub struct BrokenTenantSource {
    pub tenants: Vec<String>,
    pub fail_after: usize,
}

struct BrokenCursor {
    tenants: Vec<String>,
    fail_after: usize,
    position: usize,
}

#[async_trait]
impl TenantCursor for BrokenCursor {
    async fn next_tenant(&mut self) -> tenant_migrate_core::Result<Option<TenantId>> {
        if self.position == self.fail_after {
            return Err(MigrationError::TenantSource {
                details: "tenant directory unavailable".to_string(),
            });
        }
        let tenant = self.tenants.get(self.position).cloned().map(TenantId::from);
        self.position += 1;
        Ok(tenant)
    }
}

#[async_trait]
impl TenantSource for BrokenTenantSource {
    async fn open(&self) -> tenant_migrate_core::Result<Box<dyn TenantCursor>> {
        Ok(Box::new(BrokenCursor {
            tenants: self.tenants.clone(),
            fail_after: self.fail_after,
            position: 0,
        }))
    }
}

/// Unwrap a hook failure or panic with the actual error.
pub fn expect_hook_failure(err: MigrationError) -> Box<tenant_migrate_core::HookFailure> {
    match err {
        MigrationError::HookFailed(failure) => failure,
        other => panic!("expected HookFailed, got {:?}", other),
    }
}

/// Helper macro to skip tests if TEST_DATABASE_URL is not set.
#[macro_export]
macro_rules! skip_if_no_db {
    () => {
        if std::env::var("TEST_DATABASE_URL").is_err() {
            eprintln!("Skipping test: TEST_DATABASE_URL not set");
            return;
        }
    };
}
