//! Version records and the declarations they carry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One published version of a template.
///
/// Records are immutable once admitted to the store; only `deprecated` may
/// change afterwards. Superseding a record requires a new version plus a
/// migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    /// Semver string, unique within the template
    pub version: String,
    /// Owning template identifier
    pub template_id: String,
    /// When the version was created
    pub release_date: DateTime<Utc>,
    /// Opaque identity of the creator
    pub author: String,
    /// Source control reference the version was cut from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_ref: Option<String>,
    /// Free-form release notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changelog: Option<String>,
    /// Declared as breaking by the author
    #[serde(default)]
    pub breaking: bool,
    /// Excluded from resolution once set
    #[serde(default)]
    pub deprecated: bool,
    /// Derived from the prerelease segment at creation time
    #[serde(default)]
    pub prerelease: bool,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Ordered dependency declarations
    #[serde(default)]
    pub dependencies: Vec<DependencyDeclaration>,
    #[serde(default)]
    pub compatibility: Compatibility,
    #[serde(default)]
    pub compliance: ComplianceMetadata,
}

impl VersionRecord {
    /// Build a record from caller input. `prerelease` is derived from the
    /// version string, never taken from the caller.
    pub(crate) fn from_new(template_id: &str, new: NewVersion, prerelease: bool) -> Self {
        Self {
            version: new.version.trim().to_string(),
            template_id: template_id.to_string(),
            release_date: new.release_date.unwrap_or_else(Utc::now),
            author: new.author,
            commit_ref: new.commit_ref,
            changelog: new.changelog,
            breaking: new.breaking,
            deprecated: false,
            prerelease,
            tags: new.tags,
            dependencies: new.dependencies,
            compatibility: new.compatibility,
            compliance: new.compliance,
        }
    }

    /// `template@version` label used in logs and dependency graphs.
    #[must_use]
    pub fn display_name(&self) -> String {
        format!("{}@{}", self.template_id, self.version)
    }
}

/// Caller input for creating a version.
///
/// # Examples
///
/// ```rust
/// use tmplver::models::{DependencyDeclaration, NewVersion};
///
/// let new = NewVersion::new("1.2.0", "alice")
///     .breaking(true)
///     .with_tag("stable")
///     .with_dependency(DependencyDeclaration::runtime("base-layout", "^2.0.0"));
/// assert_eq!(new.dependencies.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct NewVersion {
    pub version: String,
    pub author: String,
    pub release_date: Option<DateTime<Utc>>,
    pub commit_ref: Option<String>,
    pub changelog: Option<String>,
    pub breaking: bool,
    pub tags: BTreeSet<String>,
    pub dependencies: Vec<DependencyDeclaration>,
    pub compatibility: Compatibility,
    pub compliance: ComplianceMetadata,
}

impl NewVersion {
    pub fn new(version: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            author: author.into(),
            ..Self::default()
        }
    }

    pub fn breaking(mut self, breaking: bool) -> Self {
        self.breaking = breaking;
        self
    }

    pub fn with_changelog(mut self, changelog: impl Into<String>) -> Self {
        self.changelog = Some(changelog.into());
        self
    }

    pub fn with_commit_ref(mut self, commit_ref: impl Into<String>) -> Self {
        self.commit_ref = Some(commit_ref.into());
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.insert(tag.into());
        self
    }

    pub fn with_dependency(mut self, dependency: DependencyDeclaration) -> Self {
        self.dependencies.push(dependency);
        self
    }

    pub fn with_compatibility(mut self, compatibility: Compatibility) -> Self {
        self.compatibility = compatibility;
        self
    }

    pub fn with_compliance(mut self, compliance: ComplianceMetadata) -> Self {
        self.compliance = compliance;
        self
    }
}

/// A dependency of one template version on another template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDeclaration {
    pub dependency_id: String,
    /// Range expression, e.g. `^1.2.0`
    pub version_constraint: String,
    #[serde(default)]
    pub kind: DependencyKind,
    /// Only required declarations are validated at creation time
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

const fn default_required() -> bool {
    true
}

impl DependencyDeclaration {
    /// A required runtime dependency.
    pub fn runtime(dependency_id: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self {
            dependency_id: dependency_id.into(),
            version_constraint: constraint.into(),
            kind: DependencyKind::Runtime,
            required: true,
            reason: None,
        }
    }

    /// A non-required optional dependency.
    pub fn optional(dependency_id: impl Into<String>, constraint: impl Into<String>) -> Self {
        Self {
            kind: DependencyKind::Optional,
            required: false,
            ..Self::runtime(dependency_id, constraint)
        }
    }

    pub fn with_kind(mut self, kind: DependencyKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    #[default]
    Runtime,
    Peer,
    Dev,
    Optional,
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Runtime => "runtime",
            Self::Peer => "peer",
            Self::Dev => "dev",
            Self::Optional => "optional",
        };
        f.write_str(name)
    }
}

/// Environment a version declares support for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Compatibility {
    /// Supported frameworks; empty means "any"
    #[serde(default)]
    pub frameworks: BTreeSet<String>,
    /// Range the target runtime version must satisfy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_version_range: Option<String>,
    /// Range the target tool version should satisfy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_version_range: Option<String>,
    /// Supported platforms; empty means "any"
    #[serde(default)]
    pub platforms: BTreeSet<String>,
}

impl Compatibility {
    pub fn with_framework(mut self, framework: impl Into<String>) -> Self {
        self.frameworks.insert(framework.into());
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platforms.insert(platform.into());
        self
    }

    pub fn with_runtime_range(mut self, range: impl Into<String>) -> Self {
        self.runtime_version_range = Some(range.into());
        self
    }

    pub fn with_tool_range(mut self, range: impl Into<String>) -> Self {
        self.tool_version_range = Some(range.into());
        self
    }
}

/// Compliance attributes carried by a version and stamped on its audit events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceMetadata {
    #[serde(default)]
    pub classification: Classification,
    #[serde(default)]
    pub data_protection_compliant: bool,
    #[serde(default)]
    pub accessibility_level: AccessibilityLevel,
    #[serde(default)]
    pub approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Classification {
    #[default]
    Open,
    Restricted,
    Confidential,
    Secret,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Open => "OPEN",
            Self::Restricted => "RESTRICTED",
            Self::Confidential => "CONFIDENTIAL",
            Self::Secret => "SECRET",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AccessibilityLevel {
    #[default]
    A,
    AA,
    AAA,
}
