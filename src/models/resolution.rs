//! Transient resolution results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::constants::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_FAN_OUT, UNRESOLVED};

/// How a constraint is turned into a concrete version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionStrategy {
    /// The constraint must name a candidate verbatim
    Exact,
    /// Highest candidate, constraint ignored
    Latest,
    /// Highest candidate satisfying the constraint as a semver range
    #[default]
    Range,
    /// Highest non-deprecated prerelease, constraint ignored
    Prerelease,
}

impl fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Exact => "exact",
            Self::Latest => "latest",
            Self::Range => "range",
            Self::Prerelease => "prerelease",
        };
        f.write_str(name)
    }
}

impl FromStr for ResolutionStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "exact" => Ok(Self::Exact),
            "latest" => Ok(Self::Latest),
            "range" => Ok(Self::Range),
            "prerelease" => Ok(Self::Prerelease),
            other => Err(format!("unknown resolution strategy '{other}'")),
        }
    }
}

/// Options shared by the requested template and all of its dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolveOptions {
    pub include_prerelease: bool,
    pub strategy: ResolutionStrategy,
    /// Deepest dependency level followed; the requested template is depth 0
    pub max_depth: usize,
    /// Maximum declarations followed per resolved version
    pub max_fan_out: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            include_prerelease: false,
            strategy: ResolutionStrategy::Range,
            max_depth: DEFAULT_MAX_DEPTH,
            max_fan_out: DEFAULT_MAX_FAN_OUT,
        }
    }
}

impl ResolveOptions {
    pub fn with_strategy(mut self, strategy: ResolutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn include_prerelease(mut self, include: bool) -> Self {
        self.include_prerelease = include;
        self
    }

    pub fn with_limits(mut self, max_depth: usize, max_fan_out: usize) -> Self {
        self.max_depth = max_depth;
        self.max_fan_out = max_fan_out;
        self
    }
}

/// One entry of the flattened dependency list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDependency {
    pub template_id: String,
    pub requested_constraint: String,
    /// Concrete version, or [`UNRESOLVED`]
    pub resolved_version: String,
    /// `template@version` that declared this dependency
    pub required_by: String,
    /// 1 for direct dependencies
    pub depth: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ResolvedDependency {
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.resolved_version != UNRESOLVED
    }
}

/// Distinct versions of the same template reached through different paths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionConflict {
    pub template_id: String,
    pub conflicting_versions: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl fmt::Display for VersionConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let versions: Vec<&str> = self.conflicting_versions.iter().map(String::as_str).collect();
        write!(f, "Version conflict for '{}': {}", self.template_id, versions.join(", "))
    }
}

/// Result of resolving a template and its transitive dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionResolution {
    pub template_id: String,
    pub requested_constraint: String,
    pub resolved_version: String,
    pub strategy: ResolutionStrategy,
    /// Depth-first, not deduplicated
    pub dependencies: Vec<ResolvedDependency>,
    /// Reported, never auto-resolved
    pub conflicts: Vec<VersionConflict>,
    /// `template@version` labels, dependencies before dependents; empty when
    /// the resolved graph is cyclic
    #[serde(default)]
    pub install_order: Vec<String>,
}

impl VersionResolution {
    #[must_use]
    pub fn has_conflicts(&self) -> bool {
        !self.conflicts.is_empty()
    }

    /// Entries that could not be resolved.
    pub fn unresolved(&self) -> impl Iterator<Item = &ResolvedDependency> {
        self.dependencies.iter().filter(|d| !d.is_resolved())
    }
}
