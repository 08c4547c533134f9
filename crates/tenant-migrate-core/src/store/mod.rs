//! Migration ledger interfaces and backends.
//!
//! The ledger is append-only: the engine creates records and reads them back
//! in insertion order, but never updates or deletes them.

pub mod memory;
pub mod postgres;
pub mod sqlite;

pub use self::memory::{InMemoryMigrationStore, StoreCall};
pub use self::postgres::PostgresMigrationStore;
pub use self::sqlite::SqliteMigrationStore;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::{MigrationError, Result};

/// Outcome recorded for a migration version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MigrationStatus {
    /// Applied to every tenant.
    Completed,
    /// Marked as applied without running (fresh install).
    Skipped,
    /// A hook failed; blocks all further runs until resolved by hand.
    Failed,
}

impl MigrationStatus {
    /// Returns the string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        }
    }

    /// Parse a status from its stored form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(Self::Completed),
            "skipped" => Some(Self::Skipped),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for MigrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger record from the persistence layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationRecord {
    /// Database primary key; defines insertion order.
    pub id: i64,
    /// Migration version this record is about.
    pub version: i64,
    /// Recorded outcome.
    pub status: MigrationStatus,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
}

/// Raw ledger row; `status` is validated on conversion.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct MigrationRecordRow {
    pub id: i64,
    pub version: i64,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<MigrationRecordRow> for MigrationRecord {
    type Error = MigrationError;

    fn try_from(row: MigrationRecordRow) -> Result<Self> {
        let status = MigrationStatus::parse(&row.status).ok_or_else(|| {
            MigrationError::database(
                "decode_record",
                format!(
                    "record {} for version {} has unknown status '{}'",
                    row.id, row.version, row.status
                ),
            )
        })?;

        Ok(Self {
            id: row.id,
            version: row.version,
            status,
            created_at: row.created_at,
        })
    }
}

pub(crate) fn decode_rows(rows: Vec<MigrationRecordRow>) -> Result<Vec<MigrationRecord>> {
    rows.into_iter().map(MigrationRecord::try_from).collect()
}

/// Ledger operations used by the migration manager.
///
/// Each call is treated as atomic; the engine does not group calls into
/// transactions.
#[async_trait]
pub trait MigrationStore: Send + Sync {
    /// All records, in insertion order.
    async fn retrieve_all_migration_records(&self) -> Result<Vec<MigrationRecord>>;

    /// Append a `completed` record.
    async fn create_migration_record(&self, version: i64) -> Result<()>;

    /// Append a `failed` record.
    async fn create_failed_migration_record(&self, version: i64) -> Result<()>;

    /// Append one `skipped` record per version, all or nothing.
    async fn create_skipped_migration_records(&self, versions: &[i64]) -> Result<()>;
}
