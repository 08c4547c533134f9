// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Discovery and ordering of migration units.
//!
//! The catalog is built once at startup from the registered
//! [`MigrationSource`]s. Source names are parsed as `<digits>_<name>.rs`:
//!
//! | Source name | Outcome |
//! |-------------|---------|
//! | `0003_add_invoice_index.rs` | unit, version 3, name `add_invoice_index` |
//! | `0003_add_invoice_index.rs.bk` | build byproduct, skipped silently |
//! | `helpers.rs` | unrecognized, skipped with a warning |
//!
//! Any fault past the naming check (unparseable version, a unit that
//! disagrees with its source name, duplicate versions) is fatal.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info, warn};

use crate::error::{MigrationError, Result};
use crate::migration::{Migration, MigrationSource, registered_sources};

/// Extensions accepted for migration unit sources.
pub const SOURCE_EXTENSIONS: &[&str] = &["rs"];

/// Suffixes of build byproducts that may sit next to migration sources.
pub const BYPRODUCT_SUFFIXES: &[&str] = &[".rs.bk", ".map", ".d", ".orig"];

static SOURCE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    let extensions = SOURCE_EXTENSIONS.join("|");
    Regex::new(&format!(r"^(\d+)_([\S_]+)\.({extensions})$")).expect("valid regex")
});

/// How a source name was classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceName {
    /// A migration unit source.
    Unit {
        /// Version from the leading digits.
        version: i64,
        /// Name following the first underscore.
        name: String,
    },
    /// A known build byproduct; ignored without comment.
    Byproduct,
    /// Anything else; ignored with a warning.
    Unrecognized,
}

/// Classify a source file name (a path is reduced to its file name first).
pub fn classify_source_name(source: &str) -> Result<SourceName> {
    let file_name = Path::new(source)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(source);

    let Some(captures) = SOURCE_NAME.captures(file_name) else {
        if BYPRODUCT_SUFFIXES
            .iter()
            .any(|suffix| file_name.ends_with(suffix))
        {
            return Ok(SourceName::Byproduct);
        }
        return Ok(SourceName::Unrecognized);
    };

    let (Some(version), Some(name)) = (captures.get(1), captures.get(2)) else {
        return Err(MigrationError::InvalidSourceName {
            source_name: file_name.to_string(),
        });
    };

    let version = version
        .as_str()
        .parse::<i64>()
        .map_err(|_| MigrationError::InvalidSourceName {
            source_name: file_name.to_string(),
        })?;

    Ok(SourceName::Unit {
        version,
        name: name.as_str().to_string(),
    })
}

struct CatalogEntry {
    source_name: String,
    migration: Box<dyn Migration>,
}

/// Migration units sorted by ascending version.
pub struct MigrationCatalog {
    entries: Vec<CatalogEntry>,
}

impl fmt::Debug for MigrationCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| &e.source_name))
            .finish()
    }
}

impl MigrationCatalog {
    /// Build the catalog from every unit registered in this binary.
    pub fn discover() -> Result<Self> {
        Self::from_sources(registered_sources())
    }

    /// Build the catalog from an explicit list of sources.
    pub fn from_sources<'a>(sources: impl IntoIterator<Item = &'a MigrationSource>) -> Result<Self> {
        let mut entries: Vec<CatalogEntry> = Vec::new();
        let mut seen: HashMap<i64, String> = HashMap::new();

        for source in sources {
            let (version, name) = match classify_source_name(source.file)? {
                SourceName::Unit { version, name } => (version, name),
                SourceName::Byproduct => {
                    debug!(source = source.file, "Ignoring build byproduct");
                    continue;
                }
                SourceName::Unrecognized => {
                    warn!(
                        source = source.file,
                        "Ignoring migration source that does not match <version>_<name>.rs"
                    );
                    continue;
                }
            };

            let source_name = Path::new(source.file)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(source.file)
                .to_string();

            let migration = (source.build)(version, &name);
            check_contract(&source_name, version, &name, migration.as_ref())?;

            if let Some(first) = seen.insert(version, source_name.clone()) {
                return Err(MigrationError::DuplicateVersion {
                    version,
                    first,
                    second: source_name,
                });
            }

            entries.push(CatalogEntry {
                source_name,
                migration,
            });
        }

        Ok(Self::sorted(entries))
    }

    /// Build the catalog from units constructed by the caller.
    ///
    /// There is no source name to check against, so only the name and
    /// version uniqueness rules apply.
    pub fn from_migrations(migrations: impl IntoIterator<Item = Box<dyn Migration>>) -> Result<Self> {
        let mut entries: Vec<CatalogEntry> = Vec::new();
        let mut seen: HashMap<i64, String> = HashMap::new();

        for migration in migrations {
            let source_name = format!("{}_{}", migration.version(), migration.name());
            if migration.name().trim().is_empty() {
                return Err(MigrationError::ContractViolation {
                    source_name,
                    reason: "name must not be empty".to_string(),
                });
            }
            if let Some(first) = seen.insert(migration.version(), source_name.clone()) {
                return Err(MigrationError::DuplicateVersion {
                    version: migration.version(),
                    first,
                    second: source_name,
                });
            }
            entries.push(CatalogEntry {
                source_name,
                migration,
            });
        }

        Ok(Self::sorted(entries))
    }

    fn sorted(mut entries: Vec<CatalogEntry>) -> Self {
        entries.sort_by_key(|entry| entry.migration.version());

        info!(
            count = entries.len(),
            latest = entries.last().map(|e| e.migration.version()),
            "Discovered migrations"
        );

        Self { entries }
    }

    /// Units in ascending version order.
    pub fn migrations(&self) -> impl Iterator<Item = &dyn Migration> {
        self.entries.iter().map(|entry| entry.migration.as_ref())
    }

    /// Versions in ascending order.
    pub fn versions(&self) -> Vec<i64> {
        self.migrations().map(|m| m.version()).collect()
    }

    /// Look up a unit by version.
    pub fn get(&self, version: i64) -> Option<&dyn Migration> {
        self.entries
            .binary_search_by_key(&version, |entry| entry.migration.version())
            .ok()
            .map(|idx| self.entries[idx].migration.as_ref())
    }

    /// Number of units.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no units were discovered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn check_contract(
    source_name: &str,
    version: i64,
    name: &str,
    migration: &dyn Migration,
) -> Result<()> {
    let violation = |reason: String| MigrationError::ContractViolation {
        source_name: source_name.to_string(),
        reason,
    };

    if migration.version() != version {
        return Err(violation(format!(
            "reports version {} but its source declares {}",
            migration.version(),
            version
        )));
    }
    if migration.name() != name {
        return Err(violation(format!(
            "reports name '{}' but its source declares '{}'",
            migration.name(),
            name
        )));
    }
    if migration.name().trim().is_empty() {
        return Err(violation("name must not be empty".to_string()));
    }
    Ok(())
}
