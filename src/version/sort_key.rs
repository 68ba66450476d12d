//! Sort keys for canonical versions
//!
//! A sort key is a string whose byte-wise order matches semantic-version
//! precedence, so it can be stored next to a version row and used directly
//! in `ORDER BY`.
//!
//! Layout: `MAJOR.MINOR.PATCH-FIELDS`
//! - MAJOR, MINOR, PATCH: zero-padded to 20 digits
//! - FIELDS: `~` for a release, otherwise the prerelease fields joined by `,`
//!   - numeric field: zero-padded to 20 digits
//!   - other field: `:` followed by the literal field
//!
//! `,` sorts before every legal field character (including `-`), `:` sorts
//! after every digit, and `~` sorts after both, which gives:
//! fewer fields < more fields, numeric < alphanumeric, prerelease < release.
//!
//! ```text
//! v1.13.0-beta.1 -> 00000000000000000001.00000000000000000013.00000000000000000000-:beta,00000000000000000001
//! v1.0.0         -> 00000000000000000001.00000000000000000000.00000000000000000000-~
//! ```

use std::fmt;

use crate::version::canonical::{CanonicalVersion, PrereleaseField};
use crate::version::error::VersionError;

/// Width every numeric field is padded to. Longer fields are rejected.
pub const NUMERIC_WIDTH: usize = 20;

/// Field substituted for a missing prerelease
pub const RELEASE_SENTINEL: &str = "~";

const FIELD_SEPARATOR: &str = ",";
const ALPHANUMERIC_MARKER: char = ':';

/// Byte-wise comparable encoding of a version
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SortKey(String);

impl SortKey {
    /// Wrap a key read back from storage
    pub fn from_stored(key: String) -> Self {
        Self(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Zero-padded pieces of a version, before they are joined into a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionParts {
    pub major: String,
    pub minor: String,
    pub patch: String,
    /// Padded numeric fields and literal alphanumeric fields, or the
    /// release sentinel alone
    pub prerelease: Vec<String>,
}

impl VersionParts {
    /// Join the parts into a sort key
    pub fn to_sort_key(&self) -> SortKey {
        let fields: Vec<String> = self
            .prerelease
            .iter()
            .map(|field| {
                if field == RELEASE_SENTINEL || field.bytes().all(|b| b.is_ascii_digit()) {
                    field.clone()
                } else {
                    format!("{}{}", ALPHANUMERIC_MARKER, field)
                }
            })
            .collect();

        SortKey(format!(
            "{}.{}.{}-{}",
            self.major,
            self.minor,
            self.patch,
            fields.join(FIELD_SEPARATOR)
        ))
    }
}

impl From<&CanonicalVersion> for VersionParts {
    fn from(version: &CanonicalVersion) -> Self {
        let prerelease = if version.is_prerelease() {
            version
                .prerelease
                .iter()
                .map(|field| match field {
                    PrereleaseField::Numeric(n) => pad(*n),
                    PrereleaseField::Alphanumeric(s) => s.clone(),
                })
                .collect()
        } else {
            vec![RELEASE_SENTINEL.to_string()]
        };

        Self {
            major: pad(version.major),
            minor: pad(version.minor),
            patch: pad(version.patch),
            prerelease,
        }
    }
}

impl CanonicalVersion {
    pub fn sort_key(&self) -> SortKey {
        VersionParts::from(self).to_sort_key()
    }
}

/// Split a version into padded parts.
///
/// Build metadata is dropped. Fails with [`VersionError::Malformed`] on
/// non-canonical input and [`VersionError::FieldTooLong`] when a numeric
/// field exceeds [`NUMERIC_WIDTH`] digits.
pub fn extract_parts(version: &str) -> Result<VersionParts, VersionError> {
    let parsed = CanonicalVersion::parse(version)?;
    Ok(VersionParts::from(&parsed))
}

/// Encode a version string into its sort key
pub fn encode(version: &str) -> Result<SortKey, VersionError> {
    extract_parts(version).map(|parts| parts.to_sort_key())
}

fn pad(n: u128) -> String {
    format!("{:0width$}", n, width = NUMERIC_WIDTH)
}
