// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! tenant-migrate - Per-Tenant Migration Runner
//!
//! Applies the migration units compiled into this binary (see
//! `src/migrations/`) to every tenant listed in the tenant table, recording
//! each version in the `tenant_migration_records` ledger.
//!
//! Exits non-zero on any failure. A failed migration leaves a `failed`
//! record that blocks later runs until an operator resolves it.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info, warn};

use tenant_migrate_core::{
    Config, Database, MigrationCatalog, MigrationError, MigrationManager, MigrationStatusReport,
    SqlTenantSource,
};

mod cli;
mod migrations;

use cli::{Cli, Commands};

const DEFAULT_LOG_FILTER: &str = "tenant_migrate=info,tenant_migrate_core=info";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load .env file (from crate directory or parent directories)
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;

    info!(
        tenant_table = %config.tenant_table,
        tenant_column = %config.tenant_column,
        page_size = config.tenant_page_size,
        "Configuration loaded"
    );

    // Connect to database
    let db = Database::connect(&config.database_url, config.max_connections)
        .await
        .map_err(log_failure)?;
    let healthy = db.health_check().await.map_err(log_failure)?;
    info!(backend = db.backend(), healthy, "Database connection established");

    db.ensure_schema().await.map_err(log_failure)?;

    let catalog = MigrationCatalog::discover().map_err(log_failure)?;
    let tenants = SqlTenantSource::new(
        db.clone(),
        &config.tenant_table,
        &config.tenant_column,
        config.tenant_page_size,
    )
    .map_err(log_failure)?;

    let manager = MigrationManager::new(
        Arc::new(catalog),
        db.clone(),
        db.record_store(),
        Arc::new(tenants),
    );

    let outcome = match cli.command {
        Commands::Run => run(manager).await,
        Commands::Skip => skip(manager).await,
        Commands::Status(args) => status(manager, args.json).await,
    };

    db.close().await;
    outcome
}

async fn run(manager: MigrationManager) -> Result<()> {
    let report = manager.execute_pending_migrations().await.map_err(log_failure)?;

    for applied in &report.applied {
        info!(
            version = applied.version,
            name = %applied.name,
            tenants = applied.tenant_runs.len(),
            "Applied"
        );
    }
    info!(
        applied = report.applied.len(),
        version = report.final_version(),
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Run complete"
    );
    Ok(())
}

async fn skip(manager: MigrationManager) -> Result<()> {
    let report = manager.skip_pending_migrations().await.map_err(log_failure)?;
    info!(skipped = report.skipped, "Skip complete");
    Ok(())
}

async fn status(manager: MigrationManager, json: bool) -> Result<()> {
    let report = manager.status().await.map_err(log_failure)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_status(&report);
    }

    if let Some(failed) = report.failed() {
        warn!(
            version = failed.version,
            name = %failed.name,
            "Ledger holds a failed migration; runs are blocked until it is resolved"
        );
    }
    Ok(())
}

fn print_status(report: &MigrationStatusReport) {
    println!("{:>8}  {:<10}  {}", "VERSION", "STATUS", "NAME");
    for entry in &report.migrations {
        let status = entry.status.map(|s| s.as_str()).unwrap_or("pending");
        println!("{:>8}  {:<10}  {}", entry.version, status, entry.name);
    }
    for orphan in &report.orphans {
        println!("{:>8}  {:<10}  {}", orphan.version, orphan.status.as_str(), "(unknown)");
    }
    println!(
        "\n{} migration(s), {} pending",
        report.migrations.len(),
        report.pending_count()
    );
}

/// Log a failure with its error code before handing it to `main`.
fn log_failure(err: MigrationError) -> anyhow::Error {
    error!(code = err.error_code(), "{}", err);
    err.into()
}
