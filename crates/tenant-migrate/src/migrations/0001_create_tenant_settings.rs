// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-tenant key/value settings, seeded with a default locale.

use async_trait::async_trait;
use tenant_migrate_core::{Database, HookResult, Migration, TenantId, register_migration};

use super::{count_for_tenant, execute, execute_for_tenant};

pub struct CreateTenantSettings {
    version: i64,
    name: String,
}

impl CreateTenantSettings {
    pub fn new(version: i64, name: &str) -> Self {
        Self {
            version,
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl Migration for CreateTenantSettings {
    fn version(&self) -> i64 {
        self.version
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn up(&self, db: &Database, tenant: &TenantId) -> HookResult {
        // Shared table; first tenant creates it
        execute(
            db,
            r#"
            CREATE TABLE IF NOT EXISTS tenant_settings (
                tenant_id TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (tenant_id, key)
            )
            "#,
        )
        .await?;

        execute_for_tenant(
            db,
            r#"
            INSERT INTO tenant_settings (tenant_id, key, value)
            VALUES ($1, 'locale', 'en')
            ON CONFLICT (tenant_id, key) DO NOTHING
            "#,
            tenant,
        )
        .await?;
        Ok(())
    }

    fn has_test(&self) -> bool {
        true
    }

    async fn test(&self, db: &Database, tenant: &TenantId) -> HookResult {
        let count = count_for_tenant(
            db,
            "SELECT COUNT(*) FROM tenant_settings WHERE tenant_id = $1 AND key = 'locale'",
            tenant,
        )
        .await?;
        anyhow::ensure!(count == 1, "tenant {} has no locale setting", tenant);
        Ok(())
    }

    fn has_down(&self) -> bool {
        true
    }

    async fn down(&self, db: &Database, tenant: &TenantId) -> HookResult {
        execute_for_tenant(
            db,
            "DELETE FROM tenant_settings WHERE tenant_id = $1 AND key = 'locale'",
            tenant,
        )
        .await?;
        Ok(())
    }
}

register_migration!(CreateTenantSettings);
