use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension, Row};
use tracing::{debug, info};

use crate::catalog::error::StorageError;
use crate::catalog::exclusion::ExclusionSource;
use crate::catalog::reader::CatalogReader;
use crate::catalog::types::{
    CatalogEntry, License, ModuleVersion, PackageMeta, PackageVersion, Symbol,
};
use crate::version::canonical::{CanonicalVersion, VersionType};
use crate::version::sort_key::SortKey;

/// Columns selected for every catalog entry lookup
const ENTRY_SELECT: &str = r#"
    SELECT p.path, m.module_path, m.version, m.version_type, m.sort_key
    FROM packages p
    JOIN modules m ON p.module_id = m.id
"#;

pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    pub fn new(db_path: &Path) -> Result<Self, StorageError> {
        info!("Opening catalog database at {:?}", db_path);

        let conn = Connection::open(db_path)?;

        // Enable WAL mode for better concurrency
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        Self::from_connection(conn)
    }

    /// Open a private in-memory catalog
    pub fn in_memory() -> Result<Self, StorageError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        // Packages are removed with their module version
        conn.pragma_update(None, "foreign_keys", "ON")?;
        debug!("Database connection established");

        let catalog = Self {
            conn: Mutex::new(conn),
        };

        catalog.create_schema()?;
        info!("Catalog initialized successfully");

        Ok(catalog)
    }

    /// Acquire database connection lock with proper error handling
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, StorageError> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn current_timestamp_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn create_schema(&self) -> Result<(), StorageError> {
        debug!("Creating database schema");

        let conn = self.lock_conn()?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS modules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                module_path TEXT NOT NULL,
                version TEXT NOT NULL,
                sort_key TEXT NOT NULL,
                version_type TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                UNIQUE(module_path, version)
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_modules_sort_key ON modules(module_path, sort_key)",
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS packages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                module_id INTEGER NOT NULL,
                path TEXT NOT NULL,
                name TEXT NOT NULL,
                synopsis TEXT NOT NULL,
                licenses TEXT NOT NULL,
                documentation TEXT,
                symbols TEXT NOT NULL,
                FOREIGN KEY (module_id) REFERENCES modules(id) ON DELETE CASCADE,
                UNIQUE(module_id, path)
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_packages_path ON packages(path)",
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS excluded_prefixes (
                prefix TEXT PRIMARY KEY,
                created_by TEXT NOT NULL,
                reason TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        debug!("Database schema created successfully");
        Ok(())
    }

    /// Store a module version and all of its packages.
    ///
    /// The sort key and version type are computed here and never change
    /// afterwards. Ingesting the same module version again replaces its
    /// package rows.
    pub fn insert_module(&self, module: &ModuleVersion) -> Result<(), StorageError> {
        if module.module_path.is_empty() {
            return Err(StorageError::InvalidRow("module path is empty".to_string()));
        }
        for package in &module.packages {
            if !is_within_module(&package.path, &module.module_path) {
                return Err(StorageError::InvalidRow(format!(
                    "package {} is not inside module {}",
                    package.path, module.module_path
                )));
            }
        }

        let version = CanonicalVersion::parse(&module.version)?;
        let sort_key = version.sort_key();
        let version_type = version.version_type();

        debug!(
            "Saving {} packages for {}@{}",
            module.packages.len(),
            module.module_path,
            module.version
        );

        let now = Self::current_timestamp_ms();

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        // Build metadata does not change the sort key, so two spellings of
        // one version would rank equally
        let same_key: Option<String> = tx
            .query_row(
                r#"
                SELECT version FROM modules
                WHERE module_path = ?1 AND sort_key = ?2 AND version <> ?3
                "#,
                (&module.module_path, sort_key.as_str(), &module.version),
                |row| row.get(0),
            )
            .optional()?;
        if let Some(existing) = same_key {
            return Err(StorageError::InvalidRow(format!(
                "{}@{} has the same precedence as stored version {}",
                module.module_path, module.version, existing
            )));
        }

        tx.execute(
            r#"
            INSERT INTO modules (module_path, version, sort_key, version_type, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(module_path, version) DO NOTHING
            "#,
            (
                &module.module_path,
                &module.version,
                sort_key.as_str(),
                version_type.as_str(),
                now,
            ),
        )?;

        let module_id: i64 = tx.query_row(
            "SELECT id FROM modules WHERE module_path = ?1 AND version = ?2",
            (&module.module_path, &module.version),
            |row| row.get(0),
        )?;

        tx.execute("DELETE FROM packages WHERE module_id = ?1", [module_id])?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO packages (module_id, path, name, synopsis, licenses, documentation, symbols)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )?;
            for PackageVersion { path, meta } in &module.packages {
                stmt.execute((
                    module_id,
                    path,
                    &meta.name,
                    &meta.synopsis,
                    serde_json::to_string(&meta.licenses)?,
                    &meta.documentation,
                    serde_json::to_string(&meta.symbols)?,
                ))?;
            }
        }

        tx.commit()?;

        info!(
            "Saved {}@{} ({}, {} packages)",
            module.module_path,
            module.version,
            version_type,
            module.packages.len()
        );
        Ok(())
    }

    /// Remove one module version with its packages.
    ///
    /// Returns false if the module version was not in the catalog.
    pub fn delete_module(&self, module_path: &str, version: &str) -> Result<bool, StorageError> {
        let conn = self.lock_conn()?;
        let rows_deleted = conn.execute(
            "DELETE FROM modules WHERE module_path = ?1 AND version = ?2",
            (module_path, version),
        )?;

        debug!("Deleted {}@{}: {}", module_path, version, rows_deleted > 0);
        Ok(rows_deleted > 0)
    }

    /// Remove every version of a module, e.g. when it is superseded by an
    /// alternative module path.
    ///
    /// Returns the number of module versions removed.
    pub fn delete_module_versions(&self, module_path: &str) -> Result<usize, StorageError> {
        let conn = self.lock_conn()?;
        let rows_deleted = conn.execute(
            "DELETE FROM modules WHERE module_path = ?1",
            [module_path],
        )?;

        info!("Deleted {} versions of {}", rows_deleted, module_path);
        Ok(rows_deleted)
    }

    /// All versions of a module, newest first
    pub fn module_versions(&self, module_path: &str) -> Result<Vec<String>, StorageError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT version FROM modules WHERE module_path = ?1 ORDER BY sort_key DESC",
        )?;

        let versions = stmt
            .query_map([module_path], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(versions)
    }

    /// Documentation payload for a resolved entry
    pub fn get_package(&self, entry: &CatalogEntry) -> Result<Option<PackageMeta>, StorageError> {
        let conn = self.lock_conn()?;
        let row = conn
            .query_row(
                r#"
                SELECT p.name, p.synopsis, p.licenses, p.documentation, p.symbols
                FROM packages p
                JOIN modules m ON p.module_id = m.id
                WHERE p.path = ?1 AND m.module_path = ?2 AND m.version = ?3
                "#,
                (&entry.package_path, &entry.module_path, &entry.version),
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<String>>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((name, synopsis, licenses, documentation, symbols)) = row else {
            return Ok(None);
        };

        Ok(Some(PackageMeta {
            name,
            synopsis,
            licenses: serde_json::from_str::<Vec<License>>(&licenses)?,
            documentation,
            symbols: serde_json::from_str::<Vec<Symbol>>(&symbols)?,
        }))
    }

    /// Record an excluded prefix. Re-inserting an existing prefix keeps the
    /// original record.
    pub fn insert_excluded_prefix(
        &self,
        prefix: &str,
        created_by: &str,
        reason: &str,
    ) -> Result<(), StorageError> {
        if prefix.is_empty() {
            return Err(StorageError::InvalidRow("excluded prefix is empty".to_string()));
        }

        let now = Self::current_timestamp_ms();
        let conn = self.lock_conn()?;
        conn.execute(
            r#"
            INSERT INTO excluded_prefixes (prefix, created_by, reason, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(prefix) DO NOTHING
            "#,
            (prefix, created_by, reason, now),
        )?;

        info!("Excluded prefix {} ({}: {})", prefix, created_by, reason);
        Ok(())
    }

    fn query_entries(
        &self,
        condition: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<CatalogEntry>, StorageError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(&format!("{} WHERE {}", ENTRY_SELECT, condition))?;

        let rows = stmt
            .query_map(params, EntryRow::from_row)?
            .collect::<Result<Vec<EntryRow>, _>>()?;

        rows.into_iter().map(CatalogEntry::try_from).collect()
    }
}

/// Raw columns of an entry lookup
struct EntryRow {
    package_path: String,
    module_path: String,
    version: String,
    version_type: String,
    sort_key: String,
}

impl EntryRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            package_path: row.get(0)?,
            module_path: row.get(1)?,
            version: row.get(2)?,
            version_type: row.get(3)?,
            sort_key: row.get(4)?,
        })
    }
}

impl TryFrom<EntryRow> for CatalogEntry {
    type Error = StorageError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        let version_type = row.version_type.parse::<VersionType>().map_err(|e| {
            StorageError::InvalidRow(format!("{} for {}@{}", e, row.module_path, row.version))
        })?;

        Ok(CatalogEntry {
            package_path: row.package_path,
            module_path: row.module_path,
            version: row.version,
            version_type,
            sort_key: SortKey::from_stored(row.sort_key),
        })
    }
}

/// A package belongs to a module when its path is the module path or lies
/// below it
fn is_within_module(package_path: &str, module_path: &str) -> bool {
    match package_path.strip_prefix(module_path) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

impl CatalogReader for SqliteCatalog {
    fn find_exact(
        &self,
        package_path: &str,
        module_path: &str,
        version: &str,
    ) -> Result<Option<CatalogEntry>, StorageError> {
        let entries = self.query_entries(
            "p.path = ?1 AND m.module_path = ?2 AND m.version = ?3",
            (package_path, module_path, version),
        )?;
        Ok(entries.into_iter().next())
    }

    fn find_all_by_package_and_module(
        &self,
        package_path: &str,
        module_path: &str,
    ) -> Result<Vec<CatalogEntry>, StorageError> {
        self.query_entries(
            "p.path = ?1 AND m.module_path = ?2",
            (package_path, module_path),
        )
    }

    fn find_all_by_package_and_version(
        &self,
        package_path: &str,
        version: &str,
    ) -> Result<Vec<CatalogEntry>, StorageError> {
        self.query_entries("p.path = ?1 AND m.version = ?2", (package_path, version))
    }

    fn find_all_by_package(&self, package_path: &str) -> Result<Vec<CatalogEntry>, StorageError> {
        self.query_entries("p.path = ?1", [package_path])
    }
}

impl ExclusionSource for SqliteCatalog {
    fn excluded_prefixes(&self) -> Result<Vec<String>, StorageError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare("SELECT prefix FROM excluded_prefixes ORDER BY prefix")?;

        let prefixes = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(prefixes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::types::{SymbolKind, VersionSelector};
    use crate::version::sort_key::encode;
    use rstest::rstest;
    use tempfile::TempDir;

    fn module(module_path: &str, version: &str, packages: &[&str]) -> ModuleVersion {
        ModuleVersion {
            module_path: module_path.to_string(),
            version: version.to_string(),
            packages: packages
                .iter()
                .map(|path| PackageVersion {
                    path: path.to_string(),
                    meta: PackageMeta {
                        name: path.rsplit('/').next().unwrap_or(path).to_string(),
                        ..PackageMeta::default()
                    },
                })
                .collect(),
        }
    }

    #[test]
    fn insert_module_stores_sort_key_and_version_type() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let catalog = SqliteCatalog::new(&db_path).unwrap();

        catalog
            .insert_module(&module("github.com/a/b", "v1.2.0-rc.1", &["github.com/a/b"]))
            .unwrap();

        let entry = catalog
            .find_exact("github.com/a/b", "github.com/a/b", "v1.2.0-rc.1")
            .unwrap()
            .unwrap();

        assert_eq!(entry.version_type, VersionType::Prerelease);
        assert_eq!(entry.sort_key, encode("v1.2.0-rc.1").unwrap());
    }

    #[rstest]
    #[case("not-a-version")]
    #[case("v1.0")]
    #[case("v1.0.123456789012345678901")]
    fn insert_module_rejects_invalid_versions(#[case] version: &str) {
        let catalog = SqliteCatalog::in_memory().unwrap();

        let result = catalog.insert_module(&module("m", version, &["m"]));

        assert!(matches!(result, Err(StorageError::Version(_))));
        assert!(catalog.module_versions("m").unwrap().is_empty());
    }

    #[rstest]
    #[case("github.com/a/b", "github.com/a/bc")]
    #[case("github.com/a/b", "github.com/a")]
    #[case("", "x")]
    fn insert_module_rejects_packages_outside_module(
        #[case] module_path: &str,
        #[case] package_path: &str,
    ) {
        let catalog = SqliteCatalog::in_memory().unwrap();

        let result = catalog.insert_module(&module(module_path, "v1.0.0", &[package_path]));

        assert!(matches!(result, Err(StorageError::InvalidRow(_))));
    }

    #[test]
    fn insert_module_twice_replaces_packages() {
        let catalog = SqliteCatalog::in_memory().unwrap();

        catalog
            .insert_module(&module("m", "v1.0.0", &["m/a", "m/b"]))
            .unwrap();
        catalog
            .insert_module(&module("m", "v1.0.0", &["m/a"]))
            .unwrap();

        assert_eq!(catalog.find_all_by_package("m/a").unwrap().len(), 1);
        assert!(catalog.find_all_by_package("m/b").unwrap().is_empty());
        assert_eq!(catalog.module_versions("m").unwrap(), vec!["v1.0.0"]);
    }

    #[rstest]
    #[case("v1.0.0", "v1.0.0+meta")]
    #[case("v2.0.0+incompatible", "v2.0.0")]
    #[case("v1.0.0-rc.1+a", "v1.0.0-rc.1+b")]
    fn insert_module_rejects_version_with_same_precedence(
        #[case] stored: &str,
        #[case] duplicate: &str,
    ) {
        let catalog = SqliteCatalog::in_memory().unwrap();
        catalog.insert_module(&module("m", stored, &["m"])).unwrap();

        let result = catalog.insert_module(&module("m", duplicate, &["m"]));

        assert!(matches!(result, Err(StorageError::InvalidRow(_))));
        assert_eq!(catalog.module_versions("m").unwrap(), vec![stored]);
    }

    #[test]
    fn same_version_in_other_module_is_accepted() {
        let catalog = SqliteCatalog::in_memory().unwrap();
        catalog.insert_module(&module("m", "v1.0.0", &["m"])).unwrap();

        catalog
            .insert_module(&module("n", "v1.0.0+meta", &["n"]))
            .unwrap();

        assert_eq!(catalog.module_versions("n").unwrap(), vec!["v1.0.0+meta"]);
    }

    #[test]
    fn module_versions_are_ordered_newest_first() {
        let catalog = SqliteCatalog::in_memory().unwrap();

        for version in [
            "v1.9.0",
            "v1.10.0",
            "v1.10.0-rc.2",
            "v1.10.0-rc.10",
            "v0.0.0-20190101000000-abcdef123456",
            "v1.2.0",
        ] {
            catalog.insert_module(&module("m", version, &["m"])).unwrap();
        }

        assert_eq!(
            catalog.module_versions("m").unwrap(),
            vec![
                "v1.10.0",
                "v1.10.0-rc.10",
                "v1.10.0-rc.2",
                "v1.9.0",
                "v1.2.0",
                "v0.0.0-20190101000000-abcdef123456",
            ]
        );
    }

    #[test]
    fn find_queries_filter_on_their_columns() {
        let catalog = SqliteCatalog::in_memory().unwrap();
        catalog
            .insert_module(&module("m1", "v1.0.0", &["m1/x", "m1/y"]))
            .unwrap();
        catalog
            .insert_module(&module("m1", "v1.1.0", &["m1/x"]))
            .unwrap();
        catalog
            .insert_module(&module("m1/x", "v1.0.0", &["m1/x"]))
            .unwrap();

        assert_eq!(catalog.find_all_by_package("m1/x").unwrap().len(), 3);
        assert_eq!(
            catalog
                .find_all_by_package_and_module("m1/x", "m1")
                .unwrap()
                .len(),
            2
        );
        assert_eq!(
            catalog
                .find_all_by_package_and_version("m1/x", "v1.0.0")
                .unwrap()
                .len(),
            2
        );
        assert!(catalog.find_exact("m1/y", "m1", "v1.1.0").unwrap().is_none());
    }

    #[test]
    fn delete_module_cascades_to_packages() {
        let catalog = SqliteCatalog::in_memory().unwrap();
        catalog
            .insert_module(&module("m", "v1.0.0", &["m", "m/sub"]))
            .unwrap();

        assert!(catalog.delete_module("m", "v1.0.0").unwrap());
        assert!(!catalog.delete_module("m", "v1.0.0").unwrap());

        assert!(catalog.find_all_by_package("m/sub").unwrap().is_empty());
    }

    #[test]
    fn delete_module_versions_removes_every_version() {
        let catalog = SqliteCatalog::in_memory().unwrap();
        catalog.insert_module(&module("m", "v1.0.0", &["m"])).unwrap();
        catalog.insert_module(&module("m", "v1.1.0", &["m"])).unwrap();
        catalog.insert_module(&module("m/v2", "v2.0.0", &["m/v2"])).unwrap();

        assert_eq!(catalog.delete_module_versions("m").unwrap(), 2);
        assert!(catalog.module_versions("m").unwrap().is_empty());
        assert_eq!(catalog.module_versions("m/v2").unwrap(), vec!["v2.0.0"]);
    }

    #[test]
    fn get_package_decodes_json_columns() {
        let catalog = SqliteCatalog::in_memory().unwrap();
        let meta = PackageMeta {
            name: "sub".to_string(),
            synopsis: "Package sub does things.".to_string(),
            licenses: vec![License {
                types: vec!["MIT".to_string()],
                file_path: "LICENSE".to_string(),
            }],
            documentation: Some("<p>docs</p>".to_string()),
            symbols: vec![Symbol {
                name: "Do".to_string(),
                kind: SymbolKind::Function,
                synopsis: "func Do() error".to_string(),
            }],
        };
        catalog
            .insert_module(&ModuleVersion {
                module_path: "m".to_string(),
                version: "v1.0.0".to_string(),
                packages: vec![PackageVersion {
                    path: "m/sub".to_string(),
                    meta: meta.clone(),
                }],
            })
            .unwrap();

        let entry = catalog.find_exact("m/sub", "m", "v1.0.0").unwrap().unwrap();

        assert_eq!(catalog.get_package(&entry).unwrap(), Some(meta));
    }

    #[test]
    fn get_package_returns_none_for_missing_entry() {
        let catalog = SqliteCatalog::in_memory().unwrap();
        let entry = CatalogEntry {
            package_path: "m".to_string(),
            module_path: "m".to_string(),
            version: "v1.0.0".to_string(),
            version_type: VersionType::Release,
            sort_key: encode("v1.0.0").unwrap(),
        };

        assert_eq!(catalog.get_package(&entry).unwrap(), None);
    }

    #[test]
    fn unknown_version_type_in_row_is_rejected() {
        let catalog = SqliteCatalog::in_memory().unwrap();
        catalog.insert_module(&module("m", "v1.0.0", &["m"])).unwrap();
        catalog
            .lock_conn()
            .unwrap()
            .execute("UPDATE modules SET version_type = 'bogus'", [])
            .unwrap();

        assert!(matches!(
            catalog.find_all_by_package("m"),
            Err(StorageError::InvalidRow(_))
        ));
    }

    #[test]
    fn excluded_prefixes_are_stored_once_and_sorted() {
        let catalog = SqliteCatalog::in_memory().unwrap();

        catalog
            .insert_excluded_prefix("github.com/spam", "admin", "spam")
            .unwrap();
        catalog
            .insert_excluded_prefix("github.com/bad/mod@v1.0.0", "admin", "license")
            .unwrap();
        catalog
            .insert_excluded_prefix("github.com/spam", "other", "duplicate")
            .unwrap();

        assert_eq!(
            catalog.excluded_prefixes().unwrap(),
            vec!["github.com/bad/mod@v1.0.0", "github.com/spam"]
        );
    }

    #[test]
    fn insert_excluded_prefix_rejects_empty_prefix() {
        let catalog = SqliteCatalog::in_memory().unwrap();

        assert!(matches!(
            catalog.insert_excluded_prefix("", "admin", "oops"),
            Err(StorageError::InvalidRow(_))
        ));
    }

    #[test]
    fn catalog_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        {
            let catalog = SqliteCatalog::new(&db_path).unwrap();
            catalog.insert_module(&module("m", "v1.0.0", &["m"])).unwrap();
        }

        let catalog = SqliteCatalog::new(&db_path).unwrap();
        let resolved = crate::catalog::resolver::resolve(
            &catalog,
            "m",
            &crate::catalog::types::ModulePathSelector::Unknown,
            &VersionSelector::Latest,
        )
        .unwrap();
        assert_eq!(resolved.version, "v1.0.0");
    }

    #[rstest]
    #[case("m", "m", true)]
    #[case("m/sub", "m", true)]
    #[case("ma", "m", false)]
    #[case("x/m", "m", false)]
    fn is_within_module_returns_expected(
        #[case] package_path: &str,
        #[case] module_path: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(is_within_module(package_path, module_path), expected);
    }
}
