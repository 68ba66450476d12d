//! Read-side seam between the resolver and catalog storage

#[cfg(test)]
use mockall::automock;

use crate::catalog::error::StorageError;
use crate::catalog::types::CatalogEntry;

/// Static lookups the resolver needs from the catalog
///
/// Implementations return rows with the sort key and version type that were
/// stored at insert time. Row order is not significant.
#[cfg_attr(test, automock)]
pub trait CatalogReader: Send + Sync {
    /// Get the row for an exact (package, module, version) combination
    fn find_exact(
        &self,
        package_path: &str,
        module_path: &str,
        version: &str,
    ) -> Result<Option<CatalogEntry>, StorageError>;

    /// Get every version of a package within one module
    fn find_all_by_package_and_module(
        &self,
        package_path: &str,
        module_path: &str,
    ) -> Result<Vec<CatalogEntry>, StorageError>;

    /// Get every module publishing a package at one version
    fn find_all_by_package_and_version(
        &self,
        package_path: &str,
        version: &str,
    ) -> Result<Vec<CatalogEntry>, StorageError>;

    /// Get every (module, version) publishing a package
    fn find_all_by_package(&self, package_path: &str) -> Result<Vec<CatalogEntry>, StorageError>;
}
