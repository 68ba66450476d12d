//! Package/module resolution
//!
//! Picks the single catalog row answering a (package, module?, version?) query.
//!
//! | module  | version  | rule                                                         |
//! |---------|----------|--------------------------------------------------------------|
//! | known   | specific | exact match                                                  |
//! | known   | latest   | best version type, then highest sort key                     |
//! | unknown | specific | longest module path                                          |
//! | unknown | latest   | best version type, then highest sort key, then longest module |
//!
//! Version type preference is release > prerelease > pseudo. Two modules of
//! equal path length claiming the same package at the same version cannot
//! happen in a consistent catalog and is reported as
//! [`StorageError::Integrity`] instead of being resolved arbitrarily.

use tracing::{debug, error, warn};

use crate::catalog::error::{ResolveError, StorageError};
use crate::catalog::reader::CatalogReader;
use crate::catalog::types::{CatalogEntry, ModulePathSelector, VersionSelector};
use crate::version::canonical::CanonicalVersion;

/// Resolve a package query to one catalog row
pub fn resolve<R: CatalogReader + ?Sized>(
    reader: &R,
    package_path: &str,
    module: &ModulePathSelector,
    version: &VersionSelector,
) -> Result<CatalogEntry, ResolveError> {
    validate(package_path, module, version)?;
    debug!(
        "Resolving {} (module: {:?}, version: {})",
        package_path, module, version
    );

    let found = match (module, version) {
        (ModulePathSelector::Known(module_path), VersionSelector::Specific(version)) => {
            reader.find_exact(package_path, module_path, version)?
        }
        (ModulePathSelector::Known(module_path), VersionSelector::Latest) => {
            let entries = reader.find_all_by_package_and_module(package_path, module_path)?;
            select_latest(&entries)?.cloned()
        }
        (ModulePathSelector::Unknown, VersionSelector::Specific(version)) => {
            let entries = reader.find_all_by_package_and_version(package_path, version)?;
            select_longest_module(&entries)?.cloned()
        }
        (ModulePathSelector::Unknown, VersionSelector::Latest) => {
            let entries = reader.find_all_by_package(package_path)?;
            select_latest(&entries)?.cloned()
        }
    };

    found.ok_or_else(|| ResolveError::NotFound(describe(package_path, module, version)))
}

/// Select the latest entry: best version type, highest sort key, longest module path
pub fn select_latest(entries: &[CatalogEntry]) -> Result<Option<&CatalogEntry>, StorageError> {
    let Some(best_type) = entries.iter().map(|e| e.version_type).max() else {
        return Ok(None);
    };

    let Some(best_key) = entries
        .iter()
        .filter(|e| e.version_type == best_type)
        .map(|e| &e.sort_key)
        .max()
    else {
        return Ok(None);
    };

    let candidates = entries
        .iter()
        .filter(|e| e.version_type == best_type && &e.sort_key == best_key)
        .collect();

    longest_module(candidates)
}

/// Select the entry with the longest module path
pub fn select_longest_module(
    entries: &[CatalogEntry],
) -> Result<Option<&CatalogEntry>, StorageError> {
    longest_module(entries.iter().collect())
}

fn longest_module(candidates: Vec<&CatalogEntry>) -> Result<Option<&CatalogEntry>, StorageError> {
    let Some(max_len) = candidates.iter().map(|e| e.module_path.len()).max() else {
        return Ok(None);
    };

    let winners: Vec<&CatalogEntry> = candidates
        .into_iter()
        .filter(|e| e.module_path.len() == max_len)
        .collect();

    match winners.as_slice() {
        [winner] => Ok(Some(*winner)),
        _ => {
            let claims: Vec<String> = winners
                .iter()
                .map(|e| format!("{}@{}", e.module_path, e.version))
                .collect();
            let message = format!(
                "package {} has {} equally ranked rows: {}",
                winners[0].package_path,
                winners.len(),
                claims.join(", ")
            );
            error!("{}", message);
            Err(StorageError::Integrity(message))
        }
    }
}

fn validate(
    package_path: &str,
    module: &ModulePathSelector,
    version: &VersionSelector,
) -> Result<(), ResolveError> {
    if package_path.is_empty() {
        return Err(ResolveError::InvalidArgument(
            "package path is empty".to_string(),
        ));
    }

    if let ModulePathSelector::Known(module_path) = module {
        if module_path.is_empty() {
            return Err(ResolveError::InvalidArgument(
                "module path is empty".to_string(),
            ));
        }
    }

    if let VersionSelector::Specific(version) = version {
        CanonicalVersion::parse(version).map_err(|e| {
            warn!("Rejected version for {}: {}", package_path, e);
            ResolveError::InvalidArgument(e.to_string())
        })?;
    }

    Ok(())
}

fn describe(package_path: &str, module: &ModulePathSelector, version: &VersionSelector) -> String {
    match module {
        ModulePathSelector::Known(module_path) => {
            format!("{} in module {} at {}", package_path, module_path, version)
        }
        ModulePathSelector::Unknown => format!("{} at {}", package_path, version),
    }
}
