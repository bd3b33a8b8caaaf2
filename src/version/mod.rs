//! Semantic version parsing, constraint matching and comparison.
//!
//! Every version string handled by the engine is parsed strictly with the
//! [`semver`] crate: `MAJOR.MINOR.PATCH[-PRERELEASE][+BUILD]`, no `v` prefix.
//! Ordering always follows semver precedence, which ignores build metadata.
//!
//! # Module Organization
//!
//! - [`constraints`] - Range/constraint parsing and best-match selection
//! - [`comparison`] - Precedence ordering and diff classification
//!
//! # Constraint Syntax
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `1.2.3` | Exactly that version |
//! | `^1.2.0` | Compatible within the major version |
//! | `~1.2.0` | Compatible within the minor version |
//! | `>=1.0.0, <2.0.0` | Comparator set (commas or spaces) |
//! | `^1.0.0 \|\| ^2.0.0` | Any of the alternatives |
//! | `*`, `latest`, empty | Any stable version |

use semver::Version;

use crate::core::{EngineError, EngineResult};

pub mod comparison;
pub mod constraints;

pub use comparison::{DiffType, diff_type, sort_descending};
pub use constraints::VersionConstraint;

/// Parse a version string, mapping failures to [`EngineError::InvalidVersionFormat`].
///
/// # Examples
///
/// ```rust
/// use tmplver::version::parse_version;
///
/// assert!(parse_version("1.0.0-beta.1+build.5").is_ok());
/// assert!(parse_version("v1.0.0").is_err());
/// assert!(parse_version("1.0").is_err());
/// ```
pub fn parse_version(version: &str) -> EngineResult<Version> {
    Version::parse(version.trim()).map_err(|e| EngineError::InvalidVersionFormat {
        version: version.to_string(),
        reason: e.to_string(),
    })
}

/// The release triple of a version, with prerelease and build metadata dropped.
#[must_use]
pub fn release_of(version: &Version) -> Version {
    Version::new(version.major, version.minor, version.patch)
}
