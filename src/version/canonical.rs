//! Canonical version parsing
//!
//! A canonical version has the form `vMAJOR.MINOR.PATCH[-PRERELEASE][+BUILD]`:
//! - `v1.2.3`
//! - `v1.2.3-rc.1`
//! - `v2.0.0+incompatible`
//! - `v0.0.0-20210101000000-abcdef123456` (pseudo-version)
//!
//! Parsing is strict. Anything that is not already canonical is rejected
//! instead of being normalized.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;

use crate::version::error::VersionError;
use crate::version::sort_key::NUMERIC_WIDTH;

/// Matches the three pseudo-version shapes:
/// - vX.0.0-yyyymmddhhmmss-abcdefabcdef
/// - vX.Y.Z-0.yyyymmddhhmmss-abcdefabcdef
/// - vX.Y.Z-pre.0.yyyymmddhhmmss-abcdefabcdef
static PSEUDO_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^v[0-9]+\.(0\.0-|[0-9]+\.[0-9]+-([^+]*\.)?0\.)[0-9]{14}-[A-Za-z0-9]+(\+[0-9A-Za-z-]+(\.[0-9A-Za-z-]+)*)?$",
    )
    .expect("pseudo-version pattern is valid")
});

/// A single dot-separated prerelease identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PrereleaseField {
    /// Purely numeric identifier, compared numerically
    Numeric(u128),
    /// Identifier containing at least one non-digit, compared by ASCII order
    Alphanumeric(String),
}

impl Ord for PrereleaseField {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (PrereleaseField::Numeric(a), PrereleaseField::Numeric(b)) => a.cmp(b),
            (PrereleaseField::Numeric(_), PrereleaseField::Alphanumeric(_)) => Ordering::Less,
            (PrereleaseField::Alphanumeric(_), PrereleaseField::Numeric(_)) => Ordering::Greater,
            (PrereleaseField::Alphanumeric(a), PrereleaseField::Alphanumeric(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for PrereleaseField {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PrereleaseField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrereleaseField::Numeric(n) => write!(f, "{}", n),
            PrereleaseField::Alphanumeric(s) => f.write_str(s),
        }
    }
}

/// Kind of a version, in increasing order of preference for "latest"
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VersionType {
    /// Synthesized from a commit (v0.0.0-20210101000000-abcdef123456)
    Pseudo,
    /// Tagged prerelease (v1.0.0-rc.1)
    Prerelease,
    /// Tagged release (v1.0.0)
    Release,
}

impl VersionType {
    /// Determine the type of a version string
    pub fn of(version: &str) -> Result<Self, VersionError> {
        let parsed = CanonicalVersion::parse(version)?;
        Ok(parsed.version_type())
    }

    /// Returns the string representation stored alongside each row
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionType::Pseudo => "pseudo",
            VersionType::Prerelease => "prerelease",
            VersionType::Release => "release",
        }
    }
}

impl FromStr for VersionType {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pseudo" => Ok(VersionType::Pseudo),
            "prerelease" => Ok(VersionType::Prerelease),
            "release" => Ok(VersionType::Release),
            _ => Err(VersionError::UnknownType(s.to_string())),
        }
    }
}

impl fmt::Display for VersionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parsed canonical version
///
/// `Ord` follows semantic-version precedence and falls back to the build
/// metadata only to stay consistent with `Eq`. Use [`CanonicalVersion::cmp_precedence`]
/// when build metadata must be ignored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalVersion {
    pub major: u128,
    pub minor: u128,
    pub patch: u128,
    pub prerelease: Vec<PrereleaseField>,
    pub build: Option<String>,
}

impl CanonicalVersion {
    /// Parse a canonical version string
    pub fn parse(version: &str) -> Result<Self, VersionError> {
        let Some(rest) = version.strip_prefix('v') else {
            return Err(malformed(version, "missing leading 'v'"));
        };

        let (rest, build) = match rest.split_once('+') {
            Some((rest, build)) => {
                validate_build(version, build)?;
                (rest, Some(build.to_string()))
            }
            None => (rest, None),
        };

        let (core, prerelease) = match rest.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (rest, None),
        };

        let numbers: Vec<&str> = core.split('.').collect();
        let [major, minor, patch] = numbers.as_slice() else {
            return Err(malformed(version, "expected MAJOR.MINOR.PATCH"));
        };

        let prerelease = match prerelease {
            Some(pre) => parse_prerelease(version, pre)?,
            None => Vec::new(),
        };

        Ok(Self {
            major: parse_numeric(version, major)?,
            minor: parse_numeric(version, minor)?,
            patch: parse_numeric(version, patch)?,
            prerelease,
            build,
        })
    }

    pub fn is_prerelease(&self) -> bool {
        !self.prerelease.is_empty()
    }

    /// Classify as release, prerelease or pseudo-version
    pub fn version_type(&self) -> VersionType {
        if !self.is_prerelease() {
            VersionType::Release
        } else if PSEUDO_VERSION.is_match(&self.to_string()) {
            VersionType::Pseudo
        } else {
            VersionType::Prerelease
        }
    }

    /// Compare by semantic-version precedence, ignoring build metadata
    pub fn cmp_precedence(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (self.is_prerelease(), other.is_prerelease()) {
                (false, false) => Ordering::Equal,
                (false, true) => Ordering::Greater,
                (true, false) => Ordering::Less,
                // Vec ordering is field-by-field, shorter first on a common prefix
                (true, true) => self.prerelease.cmp(&other.prerelease),
            })
    }
}

impl Ord for CanonicalVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_precedence(other)
            .then_with(|| self.build.cmp(&other.build))
    }
}

impl PartialOrd for CanonicalVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for CanonicalVersion {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CanonicalVersion::parse(s)
    }
}

impl fmt::Display for CanonicalVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}.{}.{}", self.major, self.minor, self.patch)?;
        if self.is_prerelease() {
            let fields: Vec<String> = self.prerelease.iter().map(|p| p.to_string()).collect();
            write!(f, "-{}", fields.join("."))?;
        }
        if let Some(build) = &self.build {
            write!(f, "+{}", build)?;
        }
        Ok(())
    }
}

/// Check if a version is a pseudo-version.
///
/// Returns false for strings that are not canonical versions at all.
pub fn is_pseudo_version(version: &str) -> bool {
    matches!(VersionType::of(version), Ok(VersionType::Pseudo))
}

/// Compare two version strings by precedence
pub fn compare(a: &str, b: &str) -> Result<Ordering, VersionError> {
    let a = CanonicalVersion::parse(a)?;
    let b = CanonicalVersion::parse(b)?;
    Ok(a.cmp_precedence(&b))
}

fn malformed(version: &str, reason: &str) -> VersionError {
    VersionError::Malformed(format!("{}: {}", version, reason))
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-')
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Parse an all-digit field. Leading zeros are not canonical.
fn parse_numeric(version: &str, field: &str) -> Result<u128, VersionError> {
    if !is_numeric(field) {
        return Err(malformed(
            version,
            &format!("'{}' is not a non-negative integer", field),
        ));
    }
    if field.len() > 1 && field.starts_with('0') {
        return Err(malformed(
            version,
            &format!("'{}' has a leading zero", field),
        ));
    }
    if field.len() > NUMERIC_WIDTH {
        return Err(VersionError::FieldTooLong {
            field: field.to_string(),
            digits: field.len(),
        });
    }
    // At most 20 digits always fits in u128
    field
        .parse::<u128>()
        .map_err(|e| malformed(version, &e.to_string()))
}

fn parse_prerelease(version: &str, prerelease: &str) -> Result<Vec<PrereleaseField>, VersionError> {
    prerelease
        .split('.')
        .map(|field| {
            if !is_identifier(field) {
                return Err(malformed(
                    version,
                    &format!("invalid prerelease field '{}'", field),
                ));
            }
            if is_numeric(field) {
                parse_numeric(version, field).map(PrereleaseField::Numeric)
            } else {
                Ok(PrereleaseField::Alphanumeric(field.to_string()))
            }
        })
        .collect()
}

fn validate_build(version: &str, build: &str) -> Result<(), VersionError> {
    if build.split('.').all(is_identifier) {
        Ok(())
    } else {
        Err(malformed(version, &format!("invalid build metadata '{}'", build)))
    }
}
