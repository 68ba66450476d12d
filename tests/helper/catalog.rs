//! Catalog test utilities

use tempfile::TempDir;

use modcatalog::catalog::{ModuleVersion, PackageMeta, PackageVersion, SqliteCatalog};

/// Create an on-disk catalog in a fresh temp directory
///
/// The TempDir must be kept alive for as long as the catalog is used.
pub fn create_test_catalog() -> (TempDir, SqliteCatalog) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("catalog.db");
    let catalog = SqliteCatalog::new(&db_path).unwrap();
    (temp_dir, catalog)
}

/// A package with a synopsis derived from its path
pub fn package(path: &str) -> PackageVersion {
    let name = path.rsplit('/').next().unwrap_or(path).to_string();
    PackageVersion {
        path: path.to_string(),
        meta: PackageMeta {
            synopsis: format!("Package {} does things.", name),
            name,
            ..PackageMeta::default()
        },
    }
}

/// A module version publishing the given packages
pub fn module_version(module_path: &str, version: &str, packages: &[&str]) -> ModuleVersion {
    ModuleVersion {
        module_path: module_path.to_string(),
        version: version.to_string(),
        packages: packages.iter().map(|path| package(path)).collect(),
    }
}
