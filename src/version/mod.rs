//! Version ordering
//!
//! Turns canonical version strings into values that can be compared and
//! stored for ordering.
//!
//! ```text
//! "v1.13.0-beta.1" ──parse──▶ CanonicalVersion ──extract_parts──▶ VersionParts ──▶ SortKey
//!                                   │
//!                                   └──▶ VersionType (release / prerelease / pseudo)
//! ```
//!
//! # Modules
//!
//! - [`canonical`]: Strict parser, precedence ordering and version type
//! - [`sort_key`]: Fixed-width, byte-comparable sort keys
//! - [`error`]: Error types for malformed versions

pub mod canonical;
pub mod error;
pub mod sort_key;

pub use canonical::{CanonicalVersion, PrereleaseField, VersionType, compare, is_pseudo_version};
pub use error::VersionError;
pub use sort_key::{SortKey, VersionParts, encode, extract_parts};
