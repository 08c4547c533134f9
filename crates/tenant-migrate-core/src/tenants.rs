// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Tenant enumeration.
//!
//! The engine never caches tenants. Every migration calls
//! [`TenantSource::open`] for a fresh [`TenantCursor`] and pulls one tenant
//! at a time, so tenants added or removed between migrations are picked up.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::database::Database;
use crate::error::{MigrationError, Result};

/// Opaque tenant identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Create a tenant identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for TenantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Pull-based iteration over tenants for a single migration.
#[async_trait]
pub trait TenantCursor: Send {
    /// Next tenant in source order, or `None` once the source is exhausted.
    async fn next_tenant(&mut self) -> Result<Option<TenantId>>;
}

/// Producer of a finite, restartable sequence of tenants.
#[async_trait]
pub trait TenantSource: Send + Sync {
    /// Start a new pass over the tenant set.
    async fn open(&self) -> Result<Box<dyn TenantCursor>>;
}

// ============================================================================
// Static Source
// ============================================================================

/// Tenant source over a fixed list, yielded in list order.
#[derive(Debug, Default)]
pub struct StaticTenantSource {
    tenants: Arc<[TenantId]>,
    opens: AtomicUsize,
}

impl StaticTenantSource {
    /// Create a source over the given tenants.
    pub fn new<I, T>(tenants: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<TenantId>,
    {
        Self {
            tenants: tenants.into_iter().map(Into::into).collect(),
            opens: AtomicUsize::new(0),
        }
    }

    /// How many passes have been started over this source.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

struct StaticTenantCursor {
    tenants: Arc<[TenantId]>,
    position: usize,
}

#[async_trait]
impl TenantCursor for StaticTenantCursor {
    async fn next_tenant(&mut self) -> Result<Option<TenantId>> {
        let tenant = self.tenants.get(self.position).cloned();
        if tenant.is_some() {
            self.position += 1;
        }
        Ok(tenant)
    }
}

#[async_trait]
impl TenantSource for StaticTenantSource {
    async fn open(&self) -> Result<Box<dyn TenantCursor>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StaticTenantCursor {
            tenants: self.tenants.clone(),
            position: 0,
        }))
    }
}

// ============================================================================
// SQL Source
// ============================================================================

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").expect("valid regex")
});

/// Whether `name` is safe to splice into SQL as a (optionally schema-qualified)
/// table or column name.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Tenant source backed by a tenant directory table.
///
/// Tenants are read in ascending text order of the tenant column, one page at
/// a time, using keyset pagination. Only one page is held in memory.
#[derive(Debug, Clone)]
pub struct SqlTenantSource {
    db: Database,
    first_page_sql: String,
    next_page_sql: String,
    page_size: i64,
}

impl SqlTenantSource {
    /// Create a source reading `column` from `table`.
    pub fn new(db: Database, table: &str, column: &str, page_size: u32) -> Result<Self> {
        for identifier in [table, column] {
            if !is_valid_identifier(identifier) {
                return Err(MigrationError::TenantSource {
                    details: format!("'{}' is not a valid SQL identifier", identifier),
                });
            }
        }
        if page_size == 0 {
            return Err(MigrationError::TenantSource {
                details: "page size must be positive".to_string(),
            });
        }

        let (limit, after, after_limit) = match db {
            Database::Postgres(_) => ("$1", "$1", "$2"),
            Database::Sqlite(_) => ("?1", "?1", "?2"),
        };
        // NULL ids name no tenant; repeated ids are migrated once.
        let select = format!(
            "SELECT DISTINCT CAST({column} AS TEXT) AS tenant_id FROM {table} WHERE {column} IS NOT NULL"
        );

        Ok(Self {
            first_page_sql: format!("{select} ORDER BY tenant_id LIMIT {limit}"),
            next_page_sql: format!(
                "{select} AND CAST({column} AS TEXT) > {after} ORDER BY tenant_id LIMIT {after_limit}"
            ),
            db,
            page_size: i64::from(page_size),
        })
    }
}

#[async_trait]
impl TenantSource for SqlTenantSource {
    async fn open(&self) -> Result<Box<dyn TenantCursor>> {
        Ok(Box::new(SqlTenantCursor {
            source: self.clone(),
            buffer: VecDeque::new(),
            last: None,
            exhausted: false,
        }))
    }
}

struct SqlTenantCursor {
    source: SqlTenantSource,
    buffer: VecDeque<TenantId>,
    last: Option<String>,
    exhausted: bool,
}

impl SqlTenantCursor {
    async fn fetch_page(&mut self) -> Result<()> {
        let source = &self.source;
        let rows: Vec<String> = match (&source.db, &self.last) {
            (Database::Postgres(pool), None) => {
                sqlx::query_scalar(&source.first_page_sql)
                    .bind(source.page_size)
                    .fetch_all(pool)
                    .await
            }
            (Database::Postgres(pool), Some(last)) => {
                sqlx::query_scalar(&source.next_page_sql)
                    .bind(last)
                    .bind(source.page_size)
                    .fetch_all(pool)
                    .await
            }
            (Database::Sqlite(pool), None) => {
                sqlx::query_scalar(&source.first_page_sql)
                    .bind(source.page_size)
                    .fetch_all(pool)
                    .await
            }
            (Database::Sqlite(pool), Some(last)) => {
                sqlx::query_scalar(&source.next_page_sql)
                    .bind(last)
                    .bind(source.page_size)
                    .fetch_all(pool)
                    .await
            }
        }
        .map_err(|e| MigrationError::TenantSource {
            details: e.to_string(),
        })?;

        debug!(count = rows.len(), after = ?self.last, "Fetched tenant page");

        if (rows.len() as i64) < self.source.page_size {
            self.exhausted = true;
        }
        if let Some(last) = rows.last() {
            self.last = Some(last.clone());
        }
        self.buffer.extend(rows.into_iter().map(TenantId::from));
        Ok(())
    }
}

#[async_trait]
impl TenantCursor for SqlTenantCursor {
    async fn next_tenant(&mut self) -> Result<Option<TenantId>> {
        if self.buffer.is_empty() && !self.exhausted {
            self.fetch_page().await?;
        }
        Ok(self.buffer.pop_front())
    }
}
