// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Default feature flags. Insert-only, so there is nothing to roll back.

use async_trait::async_trait;
use tenant_migrate_core::{Database, HookResult, Migration, TenantId, register_migration};

use super::execute_for_tenant;

pub struct SeedFeatureFlags {
    version: i64,
    name: String,
}

impl SeedFeatureFlags {
    pub fn new(version: i64, name: &str) -> Self {
        Self {
            version,
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl Migration for SeedFeatureFlags {
    fn version(&self) -> i64 {
        self.version
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn up(&self, db: &Database, tenant: &TenantId) -> HookResult {
        execute_for_tenant(
            db,
            r#"
            INSERT INTO tenant_settings (tenant_id, key, value)
            VALUES ($1, 'feature.bulk_invoices', 'off')
            ON CONFLICT (tenant_id, key) DO NOTHING
            "#,
            tenant,
        )
        .await?;
        Ok(())
    }
}

register_migration!(SeedFeatureFlags);
