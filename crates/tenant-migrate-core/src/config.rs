// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use crate::tenants::is_valid_identifier;

/// tenant-migrate configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL or SQLite connection URL
    pub database_url: String,
    /// Table listing the tenants
    pub tenant_table: String,
    /// Column holding the tenant identifier
    pub tenant_column: String,
    /// Tenants fetched per page
    pub tenant_page_size: u32,
    /// Database pool size
    pub max_connections: u32,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `TENANT_MIGRATE_DATABASE_URL`: PostgreSQL or SQLite connection string
    ///
    /// Optional (with defaults):
    /// - `TENANT_MIGRATE_TENANT_TABLE`: tenant directory table (default: tenants)
    /// - `TENANT_MIGRATE_TENANT_COLUMN`: tenant id column (default: tenant_id)
    /// - `TENANT_MIGRATE_TENANT_PAGE_SIZE`: tenants per page (default: 100)
    /// - `TENANT_MIGRATE_MAX_CONNECTIONS`: pool size (default: 5)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("TENANT_MIGRATE_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("TENANT_MIGRATE_DATABASE_URL"))?;

        let tenant_table = identifier_var("TENANT_MIGRATE_TENANT_TABLE", "tenants")?;
        let tenant_column = identifier_var("TENANT_MIGRATE_TENANT_COLUMN", "tenant_id")?;
        let tenant_page_size = positive_var("TENANT_MIGRATE_TENANT_PAGE_SIZE", "100")?;
        let max_connections = positive_var("TENANT_MIGRATE_MAX_CONNECTIONS", "5")?;

        Ok(Self {
            database_url,
            tenant_table,
            tenant_column,
            tenant_page_size,
            max_connections,
        })
    }
}

fn identifier_var(key: &'static str, default: &str) -> Result<String, ConfigError> {
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    if !is_valid_identifier(&value) {
        return Err(ConfigError::Invalid(key, "must be a plain SQL identifier"));
    }
    Ok(value)
}

fn positive_var(key: &'static str, default: &str) -> Result<u32, ConfigError> {
    let value: u32 = std::env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| ConfigError::Invalid(key, "must be a positive integer"))?;
    if value == 0 {
        return Err(ConfigError::Invalid(key, "must be a positive integer"));
    }
    Ok(value)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}
