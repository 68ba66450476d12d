//! Package/module catalog
//!
//! Stores module versions with their packages and answers "which row serves
//! this package?" queries.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Ingestion  │────▶│SqliteCatalog│◀────│  Resolver   │
//! │  (caller)   │     │  (storage)  │     │ (precedence)│
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                            │                   │
//!                            ▼                   ▼
//!                     ┌─────────────┐     ┌─────────────┐
//!                     │  Excluded   │     │CatalogReader│
//!                     │prefix cache │     │   (trait)   │
//!                     └─────────────┘     └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`resolver`]: Resolution precedence over catalog rows
//! - [`reader`]: Trait for the lookups the resolver needs
//! - [`sqlite`]: SQLite-backed catalog storage
//! - [`exclusion`]: Read-through cache of excluded prefixes with a poller
//! - [`types`]: Catalog rows, selectors and package metadata
//! - [`error`]: Error types for storage and resolution

pub mod error;
pub mod exclusion;
pub mod reader;
pub mod resolver;
pub mod sqlite;
pub mod types;

pub use error::{ResolveError, StorageError};
pub use exclusion::{ExcludedPrefixCache, ExclusionSource};
pub use reader::CatalogReader;
pub use resolver::{resolve, select_latest, select_longest_module};
pub use sqlite::SqliteCatalog;
pub use types::{
    CatalogEntry, License, ModulePathSelector, ModuleVersion, PackageMeta, PackageVersion,
    Symbol, SymbolKind, VersionSelector,
};
