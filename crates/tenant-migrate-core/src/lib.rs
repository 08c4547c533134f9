// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! tenant-migrate-core - Per-Tenant Migration Engine
//!
//! This crate discovers versioned migration units compiled into the binary,
//! works out which of them the ledger has not seen yet, and applies them to
//! every tenant of a multi-tenant database, one tenant at a time.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        tenant-migrate (binary)                           │
//! │            CLI, configuration, application migration units               │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌───────────────────────┐   ┌─────────────────────┐   ┌───────────────────┐
//! │   MigrationCatalog    │──▶│  MigrationManager   │◀──│   TenantSource    │
//! │ inventory registry,   │   │ pending set, hooks, │   │ fresh cursor per  │
//! │ naming, ordering      │   │ failure halt        │   │ migration         │
//! └───────────────────────┘   └─────────────────────┘   └───────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      MigrationStore (ledger)                             │
//! │         tenant_migration_records on PostgreSQL or SQLite                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Migration Units
//!
//! A unit implements [`Migration`] and registers itself with
//! [`register_migration!`] from a file named `<version>_<name>.rs`:
//!
//! | Hook | Required | When it runs |
//! |------|----------|--------------|
//! | `up` | Yes | Once per tenant |
//! | `test` | No | Right after `up` for the same tenant |
//! | `down` | No | For the failing tenant only, after `up` or `test` fails |
//!
//! # Ledger
//!
//! | Status | Written by | Meaning |
//! |--------|------------|---------|
//! | `completed` | run | Every tenant succeeded |
//! | `skipped` | skip | Marked applied on a fresh install |
//! | `failed` | run | A hook failed; blocks every later run until resolved by hand |
//!
//! Records are only ever appended.
//!
//! # Run State Machine
//!
//! ```text
//!   ┌─────────────┐  execute_pending_migrations(self)  ┌─────────┐
//!   │ NOT STARTED │───────────────────────────────────▶│ RUNNING │
//!   │ (owned mgr) │  skip_pending_migrations(self)     └────┬────┘
//!   └─────────────┘                                        │
//!                                             ┌────────────┴────────────┐
//!                                             ▼                         ▼
//!                                       ┌───────────┐             ┌─────────┐
//!                                       │ COMPLETED │             │ ABORTED │
//!                                       │ Ok(report)│             │ Err(..) │
//!                                       └───────────┘             └─────────┘
//! ```
//!
//! The manager is consumed on entry, so it cannot be run a second time.
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `TENANT_MIGRATE_DATABASE_URL` | Yes | - | PostgreSQL or SQLite connection string |
//! | `TENANT_MIGRATE_TENANT_TABLE` | No | `tenants` | Tenant directory table |
//! | `TENANT_MIGRATE_TENANT_COLUMN` | No | `tenant_id` | Tenant id column |
//! | `TENANT_MIGRATE_TENANT_PAGE_SIZE` | No | `100` | Tenants fetched per query |
//! | `TENANT_MIGRATE_MAX_CONNECTIONS` | No | `5` | Database pool size |
//!
//! # Modules
//!
//! - [`catalog`]: Discovery, naming and ordering of migration units
//! - [`config`]: Configuration from environment variables
//! - [`database`]: Shared database handle passed to hooks
//! - [`error`]: Error types with stable error codes
//! - [`manager`]: Pending-set computation and per-tenant execution
//! - [`migration`]: The migration unit contract and registry
//! - [`schema`]: Embedded ledger schema
//! - [`store`]: Ledger trait and PostgreSQL/SQLite/in-memory backends
//! - [`tenants`]: Tenant identifiers and tenant sources

#![deny(missing_docs)]

/// Discovery and ordering of registered migration units.
pub mod catalog;

/// Configuration loaded from environment variables.
pub mod config;

/// Database handle shared by hooks, ledger and tenant source.
pub mod database;

/// Error types with stable error codes.
pub mod error;

/// Execution manager: pending set, per-tenant hooks, failure halt.
pub mod manager;

/// Migration unit trait and compile-time registration.
pub mod migration;

/// Embedded SQL migrations for the ledger table.
pub mod schema;

/// Ledger of applied, skipped and failed migration versions.
pub mod store;

/// Tenant identifiers and sources.
pub mod tenants;

#[doc(hidden)]
pub use inventory;

pub use catalog::{MigrationCatalog, SourceName, classify_source_name};
pub use config::{Config, ConfigError};
pub use database::Database;
pub use error::{HookFailure, HookStage, MigrationError, Result, RollbackOutcome};
pub use manager::{
    AppliedMigration, MigrationManager, MigrationStatusEntry, MigrationStatusReport, RunReport,
    SkipReport, TenantRun,
};
pub use migration::{HookResult, Migration, MigrationSource};
pub use store::{
    InMemoryMigrationStore, MigrationRecord, MigrationStatus, MigrationStore,
    PostgresMigrationStore, SqliteMigrationStore, StoreCall,
};
pub use tenants::{SqlTenantSource, StaticTenantSource, TenantCursor, TenantId, TenantSource};
