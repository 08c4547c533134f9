// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for tenant-migrate-core.
//!
//! Every fault the engine can raise is a [`MigrationError`] variant with a
//! stable [`error_code`](MigrationError::error_code). Hook failures carry the
//! primary error and the outcome of the best-effort rollback side by side in
//! a [`HookFailure`].

use std::fmt;

use thiserror::Error;

use crate::store::MigrationRecord;
use crate::tenants::TenantId;

/// Result type using MigrationError
pub type Result<T> = std::result::Result<T, MigrationError>;

/// Errors raised while discovering, planning, or running migrations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MigrationError {
    /// A migration source name matched the naming convention but did not
    /// yield a usable version and name.
    #[error("Migration source '{source_name}' does not yield a version and a name")]
    InvalidSourceName {
        /// The offending source name.
        source_name: String,
    },

    /// A registered unit does not honor the migration contract.
    #[error("Migration '{source_name}' violates the migration contract: {reason}")]
    ContractViolation {
        /// Source the unit was built from.
        source_name: String,
        /// What was wrong with the unit.
        reason: String,
    },

    /// Two registered units claim the same version.
    #[error("Migration version {version} is declared by both '{first}' and '{second}'")]
    DuplicateVersion {
        /// The duplicated version.
        version: i64,
        /// Source registered first.
        first: String,
        /// Source registered second.
        second: String,
    },

    /// Skipping was requested against a ledger that already holds records.
    #[error(
        "Cannot skip migrations: ledger already holds version {} ({})",
        .current.version,
        .current.status
    )]
    SkipOnNonEmptyStore {
        /// The most recent record in the ledger.
        current: MigrationRecord,
    },

    /// The ledger holds a failed record; nothing runs until it is resolved.
    #[error(
        "Failed migration detected: version {} was recorded as failed at {}",
        .record.version,
        .record.created_at
    )]
    FailedMigrationDetected {
        /// The failed record.
        record: MigrationRecord,
    },

    /// A hook failed for some tenant; the run was aborted.
    #[error(transparent)]
    HookFailed(Box<HookFailure>),

    /// The tenant source could not enumerate tenants.
    #[error("Tenant source error: {details}")]
    TenantSource {
        /// Error details.
        details: String,
    },

    /// Database operation failed.
    #[error("Database error during '{operation}': {details}")]
    Database {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },
}

impl MigrationError {
    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidSourceName { .. } => "INVALID_SOURCE_NAME",
            Self::ContractViolation { .. } => "CONTRACT_VIOLATION",
            Self::DuplicateVersion { .. } => "DUPLICATE_VERSION",
            Self::SkipOnNonEmptyStore { .. } => "SKIP_ON_NON_EMPTY_STORE",
            Self::FailedMigrationDetected { .. } => "FAILED_MIGRATION_DETECTED",
            Self::HookFailed(_) => "HOOK_FAILED",
            Self::TenantSource { .. } => "TENANT_SOURCE_ERROR",
            Self::Database { .. } => "DATABASE_ERROR",
        }
    }

    /// Whether this error was raised while building the migration catalog.
    pub fn is_configuration_fault(&self) -> bool {
        matches!(
            self,
            Self::InvalidSourceName { .. }
                | Self::ContractViolation { .. }
                | Self::DuplicateVersion { .. }
        )
    }

    pub(crate) fn database(operation: &str, details: impl fmt::Display) -> Self {
        Self::Database {
            operation: operation.to_string(),
            details: details.to_string(),
        }
    }
}

impl From<sqlx::Error> for MigrationError {
    fn from(err: sqlx::Error) -> Self {
        MigrationError::database("query", err)
    }
}

impl From<sqlx::migrate::MigrateError> for MigrationError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        MigrationError::database("migrate", err)
    }
}

/// Hook that raised the primary failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HookStage {
    /// The `up` hook.
    Up,
    /// The `test` hook, run right after a successful `up`.
    Test,
}

impl HookStage {
    /// Returns the string representation of the stage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for HookStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to the per-tenant rollback after a hook failure.
#[derive(Debug)]
pub enum RollbackOutcome {
    /// The migration has no `down` hook.
    Unavailable,
    /// `down` ran and succeeded.
    Succeeded,
    /// `down` ran and failed as well.
    Failed(anyhow::Error),
}

impl RollbackOutcome {
    /// Returns the string representation of the outcome.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::Succeeded => "succeeded",
            Self::Failed(_) => "failed",
        }
    }
}

impl fmt::Display for RollbackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(err) => write!(f, "failed: {:#}", err),
            other => f.write_str(other.as_str()),
        }
    }
}

/// A hook failure for one (migration, tenant) pair.
///
/// The primary error is always preserved; a failing rollback is recorded
/// next to it rather than replacing it.
#[derive(Debug)]
pub struct HookFailure {
    /// Version of the failing migration.
    pub version: i64,
    /// Name of the failing migration.
    pub name: String,
    /// Tenant the hook was running for.
    pub tenant_id: TenantId,
    /// Hook that failed.
    pub stage: HookStage,
    /// The primary failure.
    pub error: anyhow::Error,
    /// Outcome of the rollback for this tenant.
    pub rollback: RollbackOutcome,
}

impl fmt::Display for HookFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Migration {} ({}) failed in '{}' for tenant '{}': {:#} (rollback {})",
            self.version, self.name, self.stage, self.tenant_id, self.error, self.rollback
        )
    }
}

impl std::error::Error for HookFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        let primary: &(dyn std::error::Error + 'static) = self.error.as_ref();
        Some(primary)
    }
}
