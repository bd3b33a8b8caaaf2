//! Migrations between two versions of a template.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::version::DiffType;

/// A registered, immutable migration between two existing versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
    /// UUID v4
    pub id: String,
    pub template_id: String,
    pub from_version: String,
    pub to_version: String,
    pub diff_type: DiffType,
    /// `spec.breaking` or a major diff
    pub breaking: bool,
    /// Only automated migrations are applied when `auto_only` is set
    pub automated: bool,
    #[serde(default)]
    pub transformations: Vec<Transformation>,
    #[serde(default)]
    pub requirements: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub created_by: String,
}

/// Caller input for registering a migration.
///
/// # Examples
///
/// ```rust
/// use tmplver::models::{MigrationSpec, Transformation};
///
/// let spec = MigrationSpec::automated()
///     .with_transformation(Transformation::rename("oldName", "newName"))
///     .with_warning("Review custom helpers by hand");
/// assert!(spec.automated);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MigrationSpec {
    pub breaking: bool,
    pub automated: bool,
    pub transformations: Vec<Transformation>,
    pub requirements: Vec<String>,
    pub warnings: Vec<String>,
}

impl MigrationSpec {
    /// A migration that is applied automatically.
    pub fn automated() -> Self {
        Self {
            automated: true,
            ..Self::default()
        }
    }

    /// A migration that has to be applied by hand.
    pub fn manual() -> Self {
        Self::default()
    }

    pub fn breaking(mut self, breaking: bool) -> Self {
        self.breaking = breaking;
        self
    }

    pub fn with_transformation(mut self, transformation: Transformation) -> Self {
        self.transformations.push(transformation);
        self
    }

    pub fn with_requirement(mut self, requirement: impl Into<String>) -> Self {
        self.requirements.push(requirement.into());
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// One content edit inside a migration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transformation {
    pub kind: TransformKind,
    /// Regex for `replace`/`remove`, literal word for `rename`
    #[serde(default)]
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replacement: Option<String>,
    /// Evaluated against the current content right before this edit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Transformation {
    fn new(kind: TransformKind, target: impl Into<String>, replacement: Option<String>) -> Self {
        Self {
            kind,
            target: target.into(),
            replacement,
            condition: None,
            reason: None,
        }
    }

    pub fn rename(target: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self::new(TransformKind::Rename, target, Some(replacement.into()))
    }

    pub fn replace(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self::new(TransformKind::Replace, pattern, Some(replacement.into()))
    }

    pub fn remove(pattern: impl Into<String>) -> Self {
        Self::new(TransformKind::Remove, pattern, None)
    }

    pub fn add(text: impl Into<String>) -> Self {
        Self::new(TransformKind::Add, "", Some(text.into()))
    }

    pub fn modify(target: impl Into<String>) -> Self {
        Self::new(TransformKind::Modify, target, None)
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn because(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformKind {
    Rename,
    Remove,
    Add,
    Modify,
    Replace,
    Restructure,
}

impl TransformKind {
    /// Kinds whose `target` is compiled as a regular expression.
    #[must_use]
    pub const fn uses_pattern(self) -> bool {
        matches!(self, Self::Replace | Self::Remove)
    }

    /// Kinds that need structural edits and are not applied to raw text.
    #[must_use]
    pub const fn is_structural(self) -> bool {
        matches!(self, Self::Modify | Self::Restructure)
    }
}

impl fmt::Display for TransformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Rename => "rename",
            Self::Remove => "remove",
            Self::Add => "add",
            Self::Modify => "modify",
            Self::Replace => "replace",
            Self::Restructure => "restructure",
        };
        f.write_str(name)
    }
}

/// Predicate over the content a transformation is about to edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Condition {
    Contains(String),
    NotContains(String),
    /// Regular expression that must match somewhere
    Matches(String),
    /// Regular expression that must not match anywhere
    NotMatches(String),
}

impl Condition {
    /// The regex source, for conditions that carry one.
    #[must_use]
    pub fn pattern(&self) -> Option<&str> {
        match self {
            Self::Matches(p) | Self::NotMatches(p) => Some(p),
            Self::Contains(_) | Self::NotContains(_) => None,
        }
    }
}
