use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use modcatalog::catalog::{
    CatalogReader, ExcludedPrefixCache, ModulePathSelector, SqliteCatalog, VersionSelector,
    resolve,
};
use modcatalog::config::{CatalogConfig, log_path};
use modcatalog::version::CanonicalVersion;

#[derive(Parser)]
#[command(name = "modcatalog")]
#[command(version, about = "Package/module catalog with version ordering")]
struct Cli {
    /// JSON configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Catalog database (overrides the configuration)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the sort key and type of a version
    SortKey { version: String },
    /// Resolve a package to the catalog row serving it
    Resolve {
        package: String,
        /// Module publishing the package (any module if omitted)
        #[arg(long)]
        module: Option<String>,
        /// Version or "latest"
        #[arg(long, default_value = VersionSelector::LATEST)]
        version: VersionSelector,
    },
    /// List versions of a module, newest first
    Versions { module: String },
    /// Exclude a path prefix (or path@version) from the catalog
    Exclude {
        prefix: String,
        #[arg(long)]
        reason: String,
        #[arg(long, default_value = "modcatalog")]
        by: String,
    },
    /// Check whether a path is excluded
    CheckExcluded {
        path: String,
        #[arg(long)]
        version: Option<String>,
    },
}

fn open_catalog(db: Option<&Path>, config: &CatalogConfig) -> anyhow::Result<Arc<SqliteCatalog>> {
    let db_path = db.map(Path::to_path_buf).unwrap_or_else(|| config.db_path());
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Arc::new(SqliteCatalog::new(&db_path)?))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => CatalogConfig::from_file(path)?,
        None => CatalogConfig::default(),
    };
    let _guard = modcatalog::logging::init(&config.log, &log_path())?;

    match cli.command {
        Command::SortKey { version } => {
            let parsed = CanonicalVersion::parse(&version)?;
            println!("{}\t{}", parsed.sort_key(), parsed.version_type());
        }
        Command::Resolve {
            package,
            module,
            version,
        } => {
            let catalog = open_catalog(cli.db.as_deref(), &config)?;
            let module = ModulePathSelector::from_option(module.as_deref());
            let entry = resolve(catalog.as_ref(), &package, &module, &version)?;
            info!("Resolved {} to {}@{}", package, entry.module_path, entry.version);

            println!(
                "{}\t{}\t{}\t{}",
                entry.package_path, entry.module_path, entry.version, entry.version_type
            );
            if let Some(meta) = catalog.get_package(&entry)? {
                if !meta.synopsis.is_empty() {
                    println!("{}", meta.synopsis);
                }
            }
        }
        Command::Versions { module } => {
            let catalog = open_catalog(cli.db.as_deref(), &config)?;
            for version in catalog.module_versions(&module)? {
                println!("{}", version);
            }
        }
        Command::Exclude { prefix, reason, by } => {
            let catalog = open_catalog(cli.db.as_deref(), &config)?;
            catalog.insert_excluded_prefix(&prefix, &by, &reason)?;
            println!("excluded {}", prefix);
        }
        Command::CheckExcluded { path, version } => {
            let catalog = open_catalog(cli.db.as_deref(), &config)?;
            let cache = ExcludedPrefixCache::new(
                Arc::clone(&catalog),
                config.exclusions.refresh_interval(),
            );
            let excluded = cache.is_excluded(&path, version.as_deref())?;
            let rows = catalog.find_all_by_package(&path)?.len();
            println!("{}\texcluded={}\tcatalog_rows={}", path, excluded, rows);
        }
    }

    Ok(())
}
