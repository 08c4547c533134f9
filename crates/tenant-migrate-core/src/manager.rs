// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Execution manager.
//!
//! The manager computes the pending set from the ledger and applies each
//! pending migration to every tenant, strictly one at a time:
//!
//! ```text
//! for migration in pending (ascending version):
//!     cursor = tenants.open()
//!     for tenant in cursor:
//!         up(tenant); test(tenant)?            // test only if provided
//!         on failure: down(tenant)?            // this tenant only, if provided
//!                     record failed, abort run
//!     record completed
//! ```
//!
//! Both entry points take the manager by value, so a manager runs at most
//! once:
//!
//! ```compile_fail
//! # use std::sync::Arc;
//! # use tenant_migrate_core::{Database, InMemoryMigrationStore, MigrationCatalog, MigrationManager, StaticTenantSource};
//! # async fn run(catalog: Arc<MigrationCatalog>, db: Database) -> tenant_migrate_core::Result<()> {
//! let manager = MigrationManager::new(
//!     catalog,
//!     db,
//!     Arc::new(InMemoryMigrationStore::new()),
//!     Arc::new(StaticTenantSource::new(["acme"])),
//! );
//! manager.execute_pending_migrations().await?;
//! manager.execute_pending_migrations().await?; // use of moved value
//! # Ok(())
//! # }
//! ```
//!
//! A failing migration without a `down` hook leaves the tenants it already
//! migrated in their migrated state. The failed record blocks further runs
//! until an operator resolves it.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::catalog::MigrationCatalog;
use crate::database::Database;
use crate::error::{HookFailure, HookStage, MigrationError, Result, RollbackOutcome};
use crate::migration::Migration;
use crate::store::{MigrationRecord, MigrationStatus, MigrationStore};
use crate::tenants::{TenantId, TenantSource};

/// Time spent migrating one tenant.
#[derive(Debug, Clone)]
pub struct TenantRun {
    /// The tenant.
    pub tenant_id: TenantId,
    /// Wall time for `up` plus `test`.
    pub elapsed: Duration,
}

/// A migration that completed for every tenant.
#[derive(Debug, Clone)]
pub struct AppliedMigration {
    /// Migration version.
    pub version: i64,
    /// Migration name.
    pub name: String,
    /// Per-tenant timings, in tenant order.
    pub tenant_runs: Vec<TenantRun>,
}

/// Outcome of a successful [`MigrationManager::execute_pending_migrations`].
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Latest ledger record before the run.
    pub initial: Option<MigrationRecord>,
    /// Latest ledger record after the run.
    pub current: Option<MigrationRecord>,
    /// Migrations applied by this run, in order.
    pub applied: Vec<AppliedMigration>,
    /// Total wall time.
    pub elapsed: Duration,
}

impl RunReport {
    /// Version of the latest ledger record after the run.
    pub fn final_version(&self) -> Option<i64> {
        self.current.as_ref().map(|record| record.version)
    }

    /// Versions applied by this run.
    pub fn applied_versions(&self) -> Vec<i64> {
        self.applied.iter().map(|m| m.version).collect()
    }
}

/// Outcome of a successful [`MigrationManager::skip_pending_migrations`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkipReport {
    /// Number of versions marked as skipped.
    pub skipped: usize,
}

/// Ledger state of one discovered migration.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatusEntry {
    /// Migration version.
    pub version: i64,
    /// Migration name.
    pub name: String,
    /// Latest recorded status, `None` while pending.
    pub status: Option<MigrationStatus>,
    /// When the latest record was written.
    pub recorded_at: Option<DateTime<Utc>>,
}

/// Read-only view of the catalog against the ledger.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationStatusReport {
    /// Latest ledger record.
    pub current: Option<MigrationRecord>,
    /// One entry per discovered migration, ascending.
    pub migrations: Vec<MigrationStatusEntry>,
    /// Records whose version no discovered migration declares.
    pub orphans: Vec<MigrationRecord>,
}

impl MigrationStatusReport {
    /// Number of migrations with no record.
    pub fn pending_count(&self) -> usize {
        self.migrations.iter().filter(|m| m.status.is_none()).count()
    }

    /// First migration recorded as failed, if any.
    pub fn failed(&self) -> Option<&MigrationStatusEntry> {
        self.migrations
            .iter()
            .find(|m| m.status == Some(MigrationStatus::Failed))
    }
}

/// Applies pending migrations to every tenant.
pub struct MigrationManager {
    catalog: Arc<MigrationCatalog>,
    db: Database,
    store: Arc<dyn MigrationStore>,
    tenants: Arc<dyn TenantSource>,
}

impl MigrationManager {
    /// Create a manager over a discovered catalog.
    pub fn new(
        catalog: Arc<MigrationCatalog>,
        db: Database,
        store: Arc<dyn MigrationStore>,
        tenants: Arc<dyn TenantSource>,
    ) -> Self {
        Self {
            catalog,
            db,
            store,
            tenants,
        }
    }

    /// The discovered migrations.
    pub fn catalog(&self) -> &MigrationCatalog {
        &self.catalog
    }

    /// Latest ledger record, in stored order.
    pub async fn current_migration(&self) -> Result<Option<MigrationRecord>> {
        let mut records = self.store.retrieve_all_migration_records().await?;
        Ok(records.pop())
    }

    /// Discovered migrations that have no ledger record, ascending.
    ///
    /// Fails with [`MigrationError::FailedMigrationDetected`] if any record
    /// is marked failed.
    pub async fn pending(&self) -> Result<Vec<&dyn Migration>> {
        let records = self.store.retrieve_all_migration_records().await?;

        if let Some(record) = records
            .iter()
            .find(|r| r.status == MigrationStatus::Failed)
        {
            return Err(MigrationError::FailedMigrationDetected {
                record: record.clone(),
            });
        }

        let recorded: HashSet<i64> = records.iter().map(|r| r.version).collect();
        Ok(self
            .catalog
            .migrations()
            .filter(|m| !recorded.contains(&m.version()))
            .collect())
    }

    /// Compare the catalog with the ledger without changing anything.
    pub async fn status(&self) -> Result<MigrationStatusReport> {
        let records = self.store.retrieve_all_migration_records().await?;

        // Later records win if a version was recorded more than once
        let mut latest: HashMap<i64, &MigrationRecord> = HashMap::new();
        for record in &records {
            latest.insert(record.version, record);
        }

        let migrations = self
            .catalog
            .migrations()
            .map(|m| {
                let record = latest.get(&m.version());
                MigrationStatusEntry {
                    version: m.version(),
                    name: m.name().to_string(),
                    status: record.map(|r| r.status),
                    recorded_at: record.map(|r| r.created_at),
                }
            })
            .collect();

        let orphans: Vec<MigrationRecord> = records
            .iter()
            .filter(|r| self.catalog.get(r.version).is_none())
            .cloned()
            .collect();
        for orphan in &orphans {
            warn!(
                version = orphan.version,
                status = %orphan.status,
                "Ledger holds a record for a migration that is not in the catalog"
            );
        }

        Ok(MigrationStatusReport {
            current: records.last().cloned(),
            migrations,
            orphans,
        })
    }

    /// Mark every discovered migration as applied without running it.
    ///
    /// Only valid on an empty ledger (fresh installs).
    #[instrument(skip(self))]
    pub async fn skip_pending_migrations(self) -> Result<SkipReport> {
        if let Some(current) = self.current_migration().await? {
            return Err(MigrationError::SkipOnNonEmptyStore { current });
        }

        let versions = self.catalog.versions();
        self.store
            .create_skipped_migration_records(&versions)
            .await?;

        info!(
            count = versions.len(),
            latest = versions.last().copied(),
            "Marked migrations as skipped"
        );

        Ok(SkipReport {
            skipped: versions.len(),
        })
    }

    /// Apply every pending migration to every tenant.
    ///
    /// Stops at the first hook failure, after recording the migration as
    /// failed.
    #[instrument(skip(self))]
    pub async fn execute_pending_migrations(self) -> Result<RunReport> {
        let started = Instant::now();
        let initial = self.current_migration().await?;
        let pending = self.pending().await?;

        if pending.is_empty() {
            info!(
                current = initial.as_ref().map(|r| r.version),
                "No pending migrations"
            );
            return Ok(RunReport {
                current: initial.clone(),
                initial,
                applied: Vec::new(),
                elapsed: started.elapsed(),
            });
        }

        info!(
            count = pending.len(),
            from = initial.as_ref().map(|r| r.version),
            "Running pending migrations"
        );

        let mut applied = Vec::with_capacity(pending.len());
        for migration in pending {
            applied.push(self.apply(migration).await?);
        }

        let current = self.current_migration().await?;
        let elapsed = started.elapsed();

        info!(
            applied = applied.len(),
            version = current.as_ref().map(|r| r.version),
            elapsed_ms = elapsed.as_millis() as u64,
            "Migrations finished"
        );

        Ok(RunReport {
            initial,
            current,
            applied,
            elapsed,
        })
    }

    async fn apply(&self, migration: &dyn Migration) -> Result<AppliedMigration> {
        let version = migration.version();
        let name = migration.name();
        info!(version, name, "Starting migration");

        let mut cursor = self.tenants.open().await?;
        let mut tenant_runs = Vec::new();

        while let Some(tenant) = cursor.next_tenant().await? {
            info!(version, name, tenant_id = %tenant, "Migrating tenant");
            let started = Instant::now();

            if let Err((stage, error)) = self.run_hooks(migration, &tenant).await {
                return Err(self.abort(migration, tenant, stage, error).await);
            }

            let elapsed = started.elapsed();
            info!(
                version,
                name,
                tenant_id = %tenant,
                elapsed_ms = elapsed.as_millis() as u64,
                "Tenant migrated"
            );
            tenant_runs.push(TenantRun {
                tenant_id: tenant,
                elapsed,
            });
        }

        self.store.create_migration_record(version).await?;
        info!(version, name, tenants = tenant_runs.len(), "Migration completed");

        Ok(AppliedMigration {
            version,
            name: name.to_string(),
            tenant_runs,
        })
    }

    async fn run_hooks(
        &self,
        migration: &dyn Migration,
        tenant: &TenantId,
    ) -> std::result::Result<(), (HookStage, anyhow::Error)> {
        migration
            .up(&self.db, tenant)
            .await
            .map_err(|e| (HookStage::Up, e))?;

        if migration.has_test() {
            migration
                .test(&self.db, tenant)
                .await
                .map_err(|e| (HookStage::Test, e))?;
        }

        Ok(())
    }

    /// Roll back the failing tenant, record the failure, and build the error
    /// to return.
    async fn abort(
        &self,
        migration: &dyn Migration,
        tenant: TenantId,
        stage: HookStage,
        error: anyhow::Error,
    ) -> MigrationError {
        let version = migration.version();
        let name = migration.name();

        let rollback = if migration.has_down() {
            match migration.down(&self.db, &tenant).await {
                Ok(()) => RollbackOutcome::Succeeded,
                Err(e) => RollbackOutcome::Failed(e),
            }
        } else {
            warn!(
                version,
                name,
                tenant_id = %tenant,
                "Migration has no down hook; no rollback is possible"
            );
            RollbackOutcome::Unavailable
        };

        error!(
            version,
            name,
            tenant_id = %tenant,
            stage = %stage,
            error = %format!("{:#}", error),
            rollback = %rollback,
            "Migration failed"
        );

        if let Err(store_error) = self.store.create_failed_migration_record(version).await {
            error!(
                version,
                error = %store_error,
                "Failed to record failed migration"
            );
            return store_error;
        }

        MigrationError::HookFailed(Box::new(HookFailure {
            version,
            name: name.to_string(),
            tenant_id: tenant,
            stage,
            error,
            rollback,
        }))
    }
}
