//! Precedence ordering and diff classification between versions.

use semver::Version;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// The level at which two versions first differ.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiffType {
    /// MAJOR differs
    Major,
    /// MINOR differs
    Minor,
    /// PATCH differs
    Patch,
    /// Only the prerelease segment differs
    Prerelease,
}

impl fmt::Display for DiffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Major => "major",
            Self::Minor => "minor",
            Self::Patch => "patch",
            Self::Prerelease => "prerelease",
        };
        f.write_str(name)
    }
}

/// Classify the difference between two versions.
///
/// Versions that share a release triple are classified as
/// [`DiffType::Prerelease`].
///
/// # Examples
///
/// ```rust
/// use tmplver::version::{DiffType, diff_type};
/// use semver::Version;
///
/// let a = Version::parse("1.2.3")?;
/// assert_eq!(diff_type(&a, &Version::parse("2.0.0")?), DiffType::Major);
/// assert_eq!(diff_type(&a, &Version::parse("1.3.0")?), DiffType::Minor);
/// assert_eq!(diff_type(&a, &Version::parse("1.2.4")?), DiffType::Patch);
/// assert_eq!(diff_type(&a, &Version::parse("1.2.3-rc.1")?), DiffType::Prerelease);
/// # Ok::<(), semver::Error>(())
/// ```
#[must_use]
pub fn diff_type(from: &Version, to: &Version) -> DiffType {
    if from.major != to.major {
        DiffType::Major
    } else if from.minor != to.minor {
        DiffType::Minor
    } else if from.patch != to.patch {
        DiffType::Patch
    } else {
        DiffType::Prerelease
    }
}

/// Compare two versions by semver precedence, ignoring build metadata.
#[must_use]
pub fn precedence(a: &Version, b: &Version) -> Ordering {
    a.cmp_precedence(b)
}

/// Sort items in descending precedence order (newest first).
///
/// Items whose key does not parse sort last, keeping their relative order.
pub fn sort_descending<T>(items: &mut [T], key: impl Fn(&T) -> &str) {
    items.sort_by(|a, b| {
        match (Version::parse(key(a)), Version::parse(key(b))) {
            (Ok(va), Ok(vb)) => precedence(&vb, &va),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => Ordering::Equal,
        }
    });
}
