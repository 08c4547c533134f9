// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Moves `locale` under the `ui.` namespace.

use async_trait::async_trait;
use tenant_migrate_core::{Database, HookResult, Migration, TenantId, register_migration};

use super::{count_for_tenant, execute_for_tenant};

pub struct RenameLocaleSetting {
    version: i64,
    name: String,
}

impl RenameLocaleSetting {
    pub fn new(version: i64, name: &str) -> Self {
        Self {
            version,
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl Migration for RenameLocaleSetting {
    fn version(&self) -> i64 {
        self.version
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn up(&self, db: &Database, tenant: &TenantId) -> HookResult {
        let renamed = execute_for_tenant(
            db,
            "UPDATE tenant_settings SET key = 'ui.locale' WHERE tenant_id = $1 AND key = 'locale'",
            tenant,
        )
        .await?;
        tracing::debug!(tenant_id = %tenant, renamed, "Renamed locale setting");
        Ok(())
    }

    fn has_test(&self) -> bool {
        true
    }

    async fn test(&self, db: &Database, tenant: &TenantId) -> HookResult {
        let remaining = count_for_tenant(
            db,
            "SELECT COUNT(*) FROM tenant_settings WHERE tenant_id = $1 AND key = 'locale'",
            tenant,
        )
        .await?;
        let renamed = count_for_tenant(
            db,
            "SELECT COUNT(*) FROM tenant_settings WHERE tenant_id = $1 AND key = 'ui.locale'",
            tenant,
        )
        .await?;
        anyhow::ensure!(
            remaining == 0 && renamed == 1,
            "tenant {} has {} 'locale' and {} 'ui.locale' settings",
            tenant,
            remaining,
            renamed
        );
        Ok(())
    }

    fn has_down(&self) -> bool {
        true
    }

    async fn down(&self, db: &Database, tenant: &TenantId) -> HookResult {
        execute_for_tenant(
            db,
            "UPDATE tenant_settings SET key = 'locale' WHERE tenant_id = $1 AND key = 'ui.locale'",
            tenant,
        )
        .await?;
        Ok(())
    }
}

register_migration!(RenameLocaleSetting);
