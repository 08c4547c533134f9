// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory ledger for tests and embedding.
//!
//! Keeps records in a vector and logs every call so callers can assert on
//! exactly which ledger operations ran. Writes can be made to fail to
//! exercise persistence-failure paths.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::error::{MigrationError, Result};

use super::{MigrationRecord, MigrationStatus, MigrationStore};

/// A ledger operation observed by [`InMemoryMigrationStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    /// `retrieve_all_migration_records`
    RetrieveAll,
    /// `create_migration_record(version)`
    Completed(i64),
    /// `create_failed_migration_record(version)`
    Failed(i64),
    /// `create_skipped_migration_records(versions)`
    Skipped(Vec<i64>),
}

#[derive(Debug, Default)]
struct Ledger {
    records: Vec<MigrationRecord>,
    calls: Vec<StoreCall>,
}

/// In-memory ledger store.
#[derive(Debug, Default)]
pub struct InMemoryMigrationStore {
    ledger: Mutex<Ledger>,
    fail_writes: AtomicBool,
}

impl InMemoryMigrationStore {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ledger pre-populated with `(version, status)` records, in order.
    pub fn with_records(records: impl IntoIterator<Item = (i64, MigrationStatus)>) -> Self {
        let now = Utc::now();
        let records = records
            .into_iter()
            .enumerate()
            .map(|(idx, (version, status))| MigrationRecord {
                id: idx as i64 + 1,
                version,
                status,
                created_at: now,
            })
            .collect();

        Self {
            ledger: Mutex::new(Ledger {
                records,
                calls: Vec::new(),
            }),
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every subsequent write fail with a database error.
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of the stored records.
    pub async fn records(&self) -> Vec<MigrationRecord> {
        self.ledger.lock().await.records.clone()
    }

    /// Every call made against this store, in order.
    pub async fn calls(&self) -> Vec<StoreCall> {
        self.ledger.lock().await.calls.clone()
    }

    async fn append(&self, call: StoreCall, entries: &[(i64, MigrationStatus)]) -> Result<()> {
        let mut ledger = self.ledger.lock().await;
        ledger.calls.push(call);

        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(MigrationError::database(
                "insert",
                "in-memory ledger configured to fail writes",
            ));
        }

        let now = Utc::now();
        for &(version, status) in entries {
            let id = ledger.records.len() as i64 + 1;
            ledger.records.push(MigrationRecord {
                id,
                version,
                status,
                created_at: now,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MigrationStore for InMemoryMigrationStore {
    async fn retrieve_all_migration_records(&self) -> Result<Vec<MigrationRecord>> {
        let mut ledger = self.ledger.lock().await;
        ledger.calls.push(StoreCall::RetrieveAll);
        Ok(ledger.records.clone())
    }

    async fn create_migration_record(&self, version: i64) -> Result<()> {
        self.append(
            StoreCall::Completed(version),
            &[(version, MigrationStatus::Completed)],
        )
        .await
    }

    async fn create_failed_migration_record(&self, version: i64) -> Result<()> {
        self.append(StoreCall::Failed(version), &[(version, MigrationStatus::Failed)])
            .await
    }

    async fn create_skipped_migration_records(&self, versions: &[i64]) -> Result<()> {
        let entries: Vec<_> = versions
            .iter()
            .map(|&version| (version, MigrationStatus::Skipped))
            .collect();
        self.append(StoreCall::Skipped(versions.to_vec()), &entries)
            .await
    }
}
