// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Migration unit contract and compile-time registration.
//!
//! A migration unit is any type implementing [`Migration`]. Units register
//! themselves with [`register_migration!`](crate::register_migration), which
//! records the defining source file so the catalog can derive the version and
//! name from the `<digits>_<name>.rs` convention.
//!
//! ```ignore
//! // src/migrations/0004_backfill_invoices.rs
//! use tenant_migrate_core::{Database, HookResult, Migration, TenantId};
//!
//! pub struct BackfillInvoices {
//!     version: i64,
//!     name: String,
//! }
//!
//! impl BackfillInvoices {
//!     pub fn new(version: i64, name: &str) -> Self {
//!         Self { version, name: name.to_string() }
//!     }
//! }
//!
//! #[async_trait::async_trait]
//! impl Migration for BackfillInvoices {
//!     fn version(&self) -> i64 { self.version }
//!     fn name(&self) -> &str { &self.name }
//!     async fn up(&self, db: &Database, tenant: &TenantId) -> HookResult { Ok(()) }
//! }
//!
//! tenant_migrate_core::register_migration!(BackfillInvoices);
//! ```

use async_trait::async_trait;

use crate::database::Database;
use crate::tenants::TenantId;

/// Result of a single hook invocation.
pub type HookResult = anyhow::Result<()>;

/// A versioned, self-contained change applied per tenant.
///
/// `up` is mandatory. `test` and `down` are optional capabilities: a unit
/// advertises them through [`has_test`](Migration::has_test) and
/// [`has_down`](Migration::has_down), and the engine only calls a hook that
/// is advertised.
#[async_trait]
pub trait Migration: Send + Sync {
    /// Version parsed from the source name.
    fn version(&self) -> i64;

    /// Name parsed from the source name.
    fn name(&self) -> &str;

    /// Apply the change for one tenant.
    async fn up(&self, db: &Database, tenant: &TenantId) -> HookResult;

    /// Whether the unit provides a `test` hook.
    fn has_test(&self) -> bool {
        false
    }

    /// Verify the change for one tenant, right after its `up`.
    async fn test(&self, _db: &Database, _tenant: &TenantId) -> HookResult {
        Ok(())
    }

    /// Whether the unit provides a `down` hook.
    fn has_down(&self) -> bool {
        false
    }

    /// Revert the change for one tenant after a failed `up` or `test`.
    async fn down(&self, _db: &Database, _tenant: &TenantId) -> HookResult {
        Ok(())
    }
}

/// Constructor for a registered unit, called with the parsed version and name.
pub type MigrationConstructor = fn(i64, &str) -> Box<dyn Migration>;

/// A registered migration unit: where it was defined and how to build it.
#[derive(Debug, Clone, Copy)]
pub struct MigrationSource {
    /// Source file the unit was registered from (as given by `file!()`).
    pub file: &'static str,
    /// Builds the unit.
    pub build: MigrationConstructor,
}

impl MigrationSource {
    /// Describe a migration unit.
    pub const fn new(file: &'static str, build: MigrationConstructor) -> Self {
        Self { file, build }
    }
}

// Register MigrationSource with inventory
inventory::collect!(MigrationSource);

/// All migration units registered in the final binary, in link order.
pub fn registered_sources() -> impl Iterator<Item = &'static MigrationSource> {
    inventory::iter::<MigrationSource>.into_iter()
}

/// Register a migration unit defined in the current file.
///
/// The type must provide `fn new(version: i64, name: &str) -> Self` and
/// implement [`Migration`]. The file name must follow `<digits>_<name>.rs`.
#[macro_export]
macro_rules! register_migration {
    ($unit:ty) => {
        $crate::inventory::submit! {
            $crate::migration::MigrationSource::new(file!(), |version, name| {
                ::std::boxed::Box::new(<$unit>::new(version, name))
            })
        }
    };
}
