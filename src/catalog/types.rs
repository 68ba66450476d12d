//! Catalog row and query types

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::version::canonical::VersionType;
use crate::version::sort_key::SortKey;

/// One (module path, version, package path) combination in the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Import path of the package (e.g., "github.com/a/b/c/sub")
    pub package_path: String,
    /// Path of the module publishing the package (e.g., "github.com/a/b")
    pub module_path: String,
    /// Canonical version string as published
    pub version: String,
    /// Release / prerelease / pseudo, computed at insert
    pub version_type: VersionType,
    /// Sort key computed at insert
    pub sort_key: SortKey,
}

/// Which module a package is requested from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModulePathSelector {
    /// Caller knows the module path
    Known(String),
    /// Any module publishing the package
    Unknown,
}

impl ModulePathSelector {
    /// Build a selector from an optional module path
    pub fn from_option(module_path: Option<&str>) -> Self {
        match module_path {
            Some(path) => ModulePathSelector::Known(path.to_string()),
            None => ModulePathSelector::Unknown,
        }
    }
}

/// Which version of a package is requested
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSelector {
    /// A canonical version string (e.g., "v1.2.3")
    Specific(String),
    /// The preferred version under release > prerelease > pseudo
    Latest,
}

impl VersionSelector {
    pub const LATEST: &'static str = "latest";
}

impl FromStr for VersionSelector {
    type Err = std::convert::Infallible;

    /// "latest" selects the latest version, anything else is taken as a
    /// specific version and validated at resolve time
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == Self::LATEST {
            Ok(VersionSelector::Latest)
        } else {
            Ok(VersionSelector::Specific(s.to_string()))
        }
    }
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSelector::Specific(version) => f.write_str(version),
            VersionSelector::Latest => f.write_str(Self::LATEST),
        }
    }
}

/// License detected in a module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct License {
    /// SPDX identifiers (e.g., ["MIT"])
    pub types: Vec<String>,
    /// Path of the license file relative to the module root
    pub file_path: String,
}

/// Exported symbol of a package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    /// One-line declaration shown in listings
    pub synopsis: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Constant,
    Variable,
    Function,
    Type,
    Field,
    Method,
}

/// Documentation payload stored for each package
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PackageMeta {
    /// Package name (last element of the import path for most packages)
    pub name: String,
    /// First sentence of the package documentation
    pub synopsis: String,
    pub licenses: Vec<License>,
    /// Rendered documentation, absent when the package could not be documented
    pub documentation: Option<String>,
    pub symbols: Vec<Symbol>,
}

/// A package as ingested with its module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageVersion {
    pub path: String,
    pub meta: PackageMeta,
}

/// Unit of ingestion: one version of one module with all its packages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleVersion {
    pub module_path: String,
    pub version: String,
    pub packages: Vec<PackageVersion>,
}
