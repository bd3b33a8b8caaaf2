//! Version constraint parsing and best-match selection.
//!
//! A [`VersionConstraint`] is the parsed form of a range expression such as
//! `^1.2.0`. It is used both when validating dependency declarations and when
//! resolving a template under the `range` strategy.
//!
//! # Parsing Rules
//!
//! 1. `*`, `latest` and the empty string match any stable version
//! 2. A bare version (`1.2.3`, no operator) is an exact match
//! 3. Everything else is a semver requirement; comparators may be separated by
//!    commas or whitespace, `a - b` is an inclusive hyphen range and `||`
//!    separates alternatives
//!
//! A bare version means "exactly this version" here, unlike
//! [`semver::VersionReq`] where it means `^1.2.3`.
//!
//! # Prerelease Handling
//!
//! Requirements follow semver rules: a prerelease only matches when a
//! comparator names the same `MAJOR.MINOR.PATCH` with a prerelease. When the
//! caller opts into prereleases, a prerelease also matches if its release
//! triple does and it is not below any lower bound of the requirement, so
//! `1.0.0-rc.1` never satisfies `^1.0.0`.
//!
//! # Examples
//!
//! ```rust
//! use tmplver::version::VersionConstraint;
//! use semver::Version;
//!
//! let constraint = VersionConstraint::parse("^1.0.0")?;
//! let versions = vec![
//!     Version::parse("2.0.0")?,
//!     Version::parse("1.5.0")?,
//!     Version::parse("1.2.0")?,
//! ];
//!
//! let best = constraint.find_best_match(&versions, false).unwrap();
//! assert_eq!(best, &Version::parse("1.5.0")?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use semver::{BuildMetadata, Op, Version, VersionReq};
use std::cmp::Ordering;
use std::fmt;

use super::release_of;
use crate::core::{EngineError, EngineResult};

/// A parsed version constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// `*`, `latest` or empty
    Any,
    /// A bare version without operator
    Exact(Version),
    /// One or more alternative requirements (joined by `||`)
    Requirement(Vec<VersionReq>),
}

impl VersionConstraint {
    /// Parse a constraint string.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidVersionConstraint`] when an alternative is
    /// not a valid semver requirement.
    pub fn parse(constraint: &str) -> EngineResult<Self> {
        let trimmed = constraint.trim();

        if trimmed.is_empty() || trimmed == "*" || trimmed.eq_ignore_ascii_case("latest") {
            return Ok(Self::Any);
        }

        if !trimmed.starts_with(['^', '~', '>', '<', '=']) {
            if let Ok(version) = Version::parse(trimmed) {
                return Ok(Self::Exact(version));
            }
        }

        let mut alternatives = Vec::new();
        for alternative in trimmed.split("||") {
            let normalized = normalize_requirement(alternative);
            let req = VersionReq::parse(&normalized).map_err(|e| {
                EngineError::InvalidVersionConstraint {
                    constraint: constraint.to_string(),
                    reason: e.to_string(),
                }
            })?;
            alternatives.push(req);
        }

        Ok(Self::Requirement(alternatives))
    }

    /// Check whether `version` satisfies this constraint.
    ///
    /// With `include_prerelease`, a prerelease version also matches when its
    /// release triple does and it sits at or above every lower bound, and
    /// [`VersionConstraint::Any`] accepts prereleases.
    #[must_use]
    pub fn matches(&self, version: &Version, include_prerelease: bool) -> bool {
        match self {
            Self::Any => include_prerelease || version.pre.is_empty(),
            Self::Exact(exact) => exact == version,
            Self::Requirement(alternatives) => alternatives.iter().any(|req| {
                req.matches(version)
                    || (include_prerelease
                        && !version.pre.is_empty()
                        && req.matches(&release_of(version))
                        && within_lower_bounds(req, version))
            }),
        }
    }

    /// Return the highest-precedence version that satisfies the constraint.
    #[must_use]
    pub fn find_best_match<'a>(
        &self,
        versions: &'a [Version],
        include_prerelease: bool,
    ) -> Option<&'a Version> {
        versions.iter().filter(|v| self.matches(v, include_prerelease)).max()
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "*"),
            Self::Exact(v) => write!(f, "={v}"),
            Self::Requirement(alternatives) => {
                let parts: Vec<String> = alternatives.iter().map(ToString::to_string).collect();
                write!(f, "{}", parts.join(" || "))
            }
        }
    }
}

/// A prerelease sorts below its own release, so matching the release triple
/// is not enough: it must also not precede any comparator's lower bound.
fn within_lower_bounds(req: &VersionReq, version: &Version) -> bool {
    req.comparators.iter().all(|comparator| match comparator.op {
        Op::Exact | Op::Greater | Op::GreaterEq | Op::Tilde | Op::Caret | Op::Wildcard => {
            let lower = Version {
                major: comparator.major,
                minor: comparator.minor.unwrap_or(0),
                patch: comparator.patch.unwrap_or(0),
                pre: comparator.pre.clone(),
                build: BuildMetadata::EMPTY,
            };
            version.cmp_precedence(&lower) != Ordering::Less
        }
        _ => true,
    })
}

/// Turn whitespace-separated comparators and hyphen ranges into the
/// comma-separated form [`VersionReq`] accepts.
fn normalize_requirement(requirement: &str) -> String {
    let requirement = requirement.trim();

    if requirement.contains(',') {
        return requirement.to_string();
    }

    let tokens: Vec<&str> = requirement.split_whitespace().collect();

    if let [low, "-", high] = tokens.as_slice() {
        return format!(">={low}, <={high}");
    }

    // Re-attach bare operators (">= 1.0.0") to the version that follows them.
    let mut comparators: Vec<String> = Vec::new();
    let mut pending_op: Option<&str> = None;
    for token in tokens {
        let is_bare_op = token.chars().all(|c| matches!(c, '^' | '~' | '>' | '<' | '='));
        if is_bare_op {
            pending_op = Some(token);
            continue;
        }
        match pending_op.take() {
            Some(op) => comparators.push(format!("{op}{token}")),
            None => comparators.push(token.to_string()),
        }
    }
    if let Some(op) = pending_op {
        comparators.push(op.to_string());
    }

    comparators.join(", ")
}
